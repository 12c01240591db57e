use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{
    select, spawn,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{interval_at, Instant},
};
use tracing::{debug, trace};

use crate::{
    error::SendError,
    log_sink::{LogSink, SessionEvent},
    random_message::rand_seq,
    settings::SessionSettings,
};

use super::{ChannelEvent, ChannelHandle};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelState {
    Created,
    Open,
    Closed,
}

/// Drives one data channel: logs inbound messages and, once open, sends a
/// random message every broadcast interval until the channel closes.
pub struct DataChannelSession {
    handle: Arc<dyn ChannelHandle>,
    settings: SessionSettings,
    sink: Arc<dyn LogSink>,
    state_tx: watch::Sender<ChannelState>,
    broadcaster: Mutex<Option<JoinHandle<()>>>,
}

impl DataChannelSession {
    pub fn new(
        handle: Arc<dyn ChannelHandle>,
        settings: SessionSettings,
        sink: Arc<dyn LogSink>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ChannelState::Created);
        Arc::new(Self {
            handle,
            settings,
            sink,
            state_tx,
            broadcaster: Mutex::new(None),
        })
    }

    pub fn label(&self) -> &str {
        self.handle.label()
    }

    pub fn id(&self) -> u16 {
        self.handle.id()
    }

    pub fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    fn transition(&self, from: ChannelState, to: ChannelState) -> bool {
        self.state_tx.send_if_modified(|state| {
            if *state != from {
                return false;
            }
            *state = to;
            true
        })
    }

    /// Pumps the engine's channel events into this session until the channel
    /// or the session closes.
    pub fn spawn(self: &Arc<Self>, mut events: mpsc::Receiver<ChannelEvent>) -> JoinHandle<()> {
        let session = self.clone();
        let mut state_rx = self.state_tx.subscribe();
        spawn(async move {
            loop {
                let event = select! {
                    biased;
                    _ = wait_closed(&mut state_rx) => return,
                    event = events.recv() => event,
                };
                trace!("channel event {:?}", event);
                match event {
                    Some(ChannelEvent::Open) => session.on_open(),
                    Some(ChannelEvent::Message(data)) => session.on_message(&data),
                    Some(ChannelEvent::Error(reason)) => session.on_error(&reason),
                    Some(ChannelEvent::Close) | None => {
                        session.close();
                        return;
                    }
                }
            }
        })
    }

    pub fn on_open(&self) {
        if !self.transition(ChannelState::Created, ChannelState::Open) {
            debug!("ignored open of DataChannel '{}' in {:?}", self.label(), self.state());
            return;
        }
        self.sink.log(SessionEvent::ChannelOpened {
            label: self.label().to_owned(),
            id: self.id(),
        });

        let handle = self.handle.clone();
        let sink = self.sink.clone();
        let state_rx = self.state_tx.subscribe();
        let interval = self.settings.broadcast_interval();
        let len = self.settings.message_length();
        let task = spawn(async move {
            if let Err(err) = broadcast(handle, state_rx, interval, len, sink.as_ref()).await {
                sink.log(SessionEvent::Error(err.to_string()));
            }
        });
        *self
            .broadcaster
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    pub fn on_message(&self, payload: &[u8]) {
        self.sink.log(SessionEvent::Received {
            label: self.label().to_owned(),
            message: String::from_utf8_lossy(payload).into_owned(),
        });
    }

    pub fn on_error(&self, reason: &str) {
        self.sink.log(SessionEvent::Error(format!(
            "DataChannel '{}' error: {}",
            self.label(),
            reason
        )));
    }

    /// Stops the broadcaster. A tick already past its close check may still
    /// finish its send; use [`Self::closed`] to wait for it.
    pub fn close(&self) {
        let closed = self.state_tx.send_if_modified(|state| {
            if *state == ChannelState::Closed {
                return false;
            }
            *state = ChannelState::Closed;
            true
        });
        if closed {
            self.sink.log(SessionEvent::ChannelClosed {
                label: self.label().to_owned(),
            });
        }
    }

    /// Resolves once the session is closed and its broadcaster has exited.
    pub async fn closed(&self) {
        let mut state_rx = self.state_tx.subscribe();
        wait_closed(&mut state_rx).await;
        let task = self
            .broadcaster
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Closes the session, waits for the broadcaster and closes the
    /// underlying channel.
    pub async fn shutdown(&self) {
        self.close();
        self.closed().await;
        if let Err(err) = self.handle.close().await {
            self.sink.log(SessionEvent::Warning(format!(
                "cannot close DataChannel '{}': {:#}",
                self.label(),
                err
            )));
        }
    }
}

async fn wait_closed(state_rx: &mut watch::Receiver<ChannelState>) {
    loop {
        if *state_rx.borrow_and_update() == ChannelState::Closed {
            return;
        }
        if state_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn broadcast(
    handle: Arc<dyn ChannelHandle>,
    mut state_rx: watch::Receiver<ChannelState>,
    interval: Duration,
    len: usize,
    sink: &dyn LogSink,
) -> Result<(), SendError> {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    loop {
        select! {
            biased;
            _ = wait_closed(&mut state_rx) => return Ok(()),
            _ = ticker.tick() => {}
        }
        if *state_rx.borrow() == ChannelState::Closed {
            return Ok(());
        }
        let message = rand_seq(len);
        sink.log(SessionEvent::Sending {
            label: handle.label().to_owned(),
            message: message.clone(),
        });
        handle
            .send_text(message)
            .await
            .map_err(|source| SendError {
                label: handle.label().to_owned(),
                source,
            })?;
    }
}
