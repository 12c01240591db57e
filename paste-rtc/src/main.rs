mod cui;
mod tracing_helper;

use std::{future::pending, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use paste_rtc_lib::{
    connection::{peer_connection::RtcPeerConnection, ConnectionCoordinator},
    log_sink::TracingLogSink,
    settings::Settings,
    text_store::{Slot, TextStore},
};
use tokio::{select, signal::ctrl_c, spawn, task::spawn_blocking};
use tracing::{info, warn};

use crate::cui::{read_line_loop, SystemClipboard, TerminalTextStore};

/// Answers a pasted WebRTC offer and sends random messages over the data
/// channel the offerer opens.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Settings file. Defaults are used when it does not exist.
    #[arg(long, env = "PASTE_RTC_CONFIG", default_value = "paste-rtc.toml")]
    config: PathBuf,
    /// Remote session description. Prompted for when omitted.
    #[arg(long)]
    offer: Option<String>,
    /// Do not copy the answer to the clipboard.
    #[arg(long)]
    no_clipboard: bool,
}

async fn wait_for_terminal_state(coordinator: &ConnectionCoordinator, exit: bool) {
    if exit {
        coordinator.terminated().await;
    } else {
        pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(&args.config)?;
    tracing_helper::init_tracing(settings.log());
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let (engine, events) = RtcPeerConnection::new(&settings)
        .await
        .context("Failed to create peer connection")?;
    let store = Arc::new(TerminalTextStore::default());
    let coordinator = ConnectionCoordinator::new(
        Arc::new(engine),
        store.clone(),
        Arc::new(TracingLogSink),
        settings.session().clone(),
    );
    spawn(coordinator.clone().run(events));

    let mut offer = args.offer;
    loop {
        let token = match offer.take() {
            Some(token) => token,
            None => {
                spawn_blocking(|| read_line_loop("Input remote session description:")).await??
            }
        };
        store.set(Slot::RemoteDescription, token);
        match coordinator.start_session().await {
            Ok(_) => break,
            Err(err) if err.is_retryable() => {
                warn!("Failed to answer the offer, please try again");
            }
            Err(err) => {
                coordinator.shutdown().await;
                return Err(err.into());
            }
        }
    }

    if !args.no_clipboard && coordinator.copy_local_description(&SystemClipboard) {
        println!("It was copied to your clipboard. Share your signaling code with your peer.");
    }
    println!("Waiting for peer to connect...");

    select! {
        result = ctrl_c() => {
            result.context("Failed to listen for ctrl-c")?;
            info!("interrupted");
        }
        _ = wait_for_terminal_state(&coordinator, settings.exit_on_terminal_state()) => {
            info!("session ended");
        }
    }
    coordinator.shutdown().await;
    Ok(())
}
