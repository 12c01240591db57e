#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use paste_rtc_lib::{
    connection::{ChannelEvent, ChannelHandle, EngineEvent, PeerEngine},
    log_sink::{LogSink, SessionEvent},
    signaling::SessionDescription,
    text_store::Clipboard,
};
use tokio::sync::mpsc;

pub const OFFER_SDP: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
    m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n";
pub const ANSWER_SDP: &str = "v=0\r\no=- 3 4 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
    m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n";
pub const GATHERED_SUFFIX: &str = "a=candidate:1 1 udp 2130706431 192.168.0.2 50000 typ host\r\n";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EngineCall {
    SetRemoteDescription(SessionDescription),
    CreateAnswer,
    SetLocalDescription(SessionDescription),
    LocalDescription,
    Close,
}

/// Scripted engine: records calls and reports the answer with the gathered
/// candidates appended, mimicking a finished ICE gathering.
#[derive(Default)]
pub struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
    local: Mutex<Option<SessionDescription>>,
    pub fail_create_answer: AtomicBool,
    pub fail_set_remote: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn gathered_answer() -> SessionDescription {
        SessionDescription::answer(format!("{}{}", ANSWER_SDP, GATHERED_SUFFIX))
    }
}

#[async_trait]
impl PeerEngine for MockEngine {
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::SetRemoteDescription(desc));
        if self.fail_set_remote.load(Ordering::SeqCst) {
            bail!("remote description rejected");
        }
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.calls.lock().unwrap().push(EngineCall::CreateAnswer);
        if self.fail_create_answer.load(Ordering::SeqCst) {
            bail!("no remote description");
        }
        Ok(SessionDescription::answer(ANSWER_SDP))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::SetLocalDescription(desc));
        *self.local.lock().unwrap() = Some(Self::gathered_answer());
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.calls.lock().unwrap().push(EngineCall::LocalDescription);
        self.local.lock().unwrap().clone()
    }

    async fn close(&self) -> Result<()> {
        self.calls.lock().unwrap().push(EngineCall::Close);
        Ok(())
    }
}

pub struct MockChannel {
    label: String,
    id: u16,
    sent: Mutex<Vec<String>>,
    fail_after: Mutex<Option<usize>>,
    attempts: AtomicUsize,
    closed: AtomicBool,
}

impl MockChannel {
    pub fn new(label: &str, id: u16) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_owned(),
            id,
            sent: Mutex::new(Vec::new()),
            fail_after: Mutex::new(None),
            attempts: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Sends succeed `n` times, then fail.
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock().unwrap() = Some(n);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelHandle for MockChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn id(&self) -> u16 {
        self.id
    }

    async fn send_text(&self, text: String) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(n) = *self.fail_after.lock().unwrap() {
            if attempt >= n {
                bail!("sctp association closed");
            }
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn channel_event(
    channel: &Arc<MockChannel>,
    buffer: usize,
) -> (EngineEvent, mpsc::Sender<ChannelEvent>) {
    let (tx, rx) = mpsc::channel(buffer);
    (
        EngineEvent::DataChannel {
            handle: channel.clone(),
            events: rx,
        },
        tx,
    )
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<VecDeque<SessionEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().iter().cloned().collect()
    }

    pub fn sending(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Sending { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }
}

impl LogSink for RecordingSink {
    fn log(&self, event: SessionEvent) {
        self.events.lock().unwrap().push_back(event);
    }
}

#[derive(Default)]
pub struct MockClipboard {
    pub copied: Mutex<Option<String>>,
    pub fail: bool,
}

impl Clipboard for MockClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        if self.fail {
            bail!("clipboard is locked");
        }
        *self.copied.lock().unwrap() = Some(text.to_owned());
        Ok(())
    }
}
