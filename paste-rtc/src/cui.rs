use std::io::{self, Write};

use anyhow::{Context, Result};
use paste_rtc_lib::text_store::{Clipboard, MemoryTextStore, Slot, TextStore};

fn read_line() -> Result<String> {
    io::stdout().flush()?;
    let mut buf = String::new();
    if io::stdin()
        .read_line(&mut buf)
        .context("Failed to read stdin")?
        == 0
    {
        anyhow::bail!("stdin closed");
    }
    Ok(buf.trim().to_owned())
}

/// Prompts until a non-empty line is entered.
pub fn read_line_loop(msg: &str) -> Result<String> {
    loop {
        println!("{}", msg);
        let buf = read_line()?;
        if !buf.is_empty() {
            break Ok(buf);
        }
        println!("Session Description must not be empty");
    }
}

/// Text slots shown on the terminal. Publishing the local description
/// prints it so the operator can paste it to the remote peer.
#[derive(Default)]
pub struct TerminalTextStore {
    inner: MemoryTextStore,
}

impl TextStore for TerminalTextStore {
    fn get(&self, slot: Slot) -> Option<String> {
        self.inner.get(slot)
    }

    fn set(&self, slot: Slot, value: String) {
        if slot == Slot::LocalDescription {
            println!();
            println!("Your signaling code:");
            println!();
            println!("{}", value);
            println!();
        }
        self.inner.set(slot, value);
    }
}

pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    #[cfg(windows)]
    fn copy(&self, text: &str) -> Result<()> {
        clipboard_win::set_clipboard_string(text)
            .map_err(|err| anyhow::anyhow!("{}", err))
    }

    #[cfg(not(windows))]
    fn copy(&self, _text: &str) -> Result<()> {
        anyhow::bail!("clipboard is not supported on this platform, copy the code above manually")
    }
}
