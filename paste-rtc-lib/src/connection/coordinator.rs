use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{
    select,
    sync::{mpsc, watch},
};
use tracing::{debug, trace};

use crate::{
    error::{NegotiationError, SessionError, ValidationError},
    log_sink::{LogSink, SessionEvent},
    settings::{SessionSettings, TerminalStatePolicy},
    signaling::{SdpKind, SignalingCodec, SignalingToken},
    text_store::{Clipboard, Slot, TextStore},
};

use super::{
    ChannelEvent, ChannelHandle, ChannelState, ConnectionState, DataChannelSession, EngineEvent,
    GatheringGate, PeerEngine,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignalingPhase {
    Idle,
    AnsweringLocal,
    LocalDescriptionReady,
    Terminated,
}

/// Answers a single remote offer and supervises the resulting data channels.
pub struct ConnectionCoordinator {
    engine: Arc<dyn PeerEngine>,
    store: Arc<dyn TextStore>,
    sink: Arc<dyn LogSink>,
    settings: SessionSettings,
    codec: SignalingCodec,
    gate: GatheringGate,
    phase: Mutex<SignalingPhase>,
    teardown_tx: watch::Sender<bool>,
    sessions: Mutex<Vec<Arc<DataChannelSession>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn wait_teardown(teardown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *teardown_rx.borrow_and_update() {
            return;
        }
        if teardown_rx.changed().await.is_err() {
            return;
        }
    }
}

impl ConnectionCoordinator {
    pub fn new(
        engine: Arc<dyn PeerEngine>,
        store: Arc<dyn TextStore>,
        sink: Arc<dyn LogSink>,
        settings: SessionSettings,
    ) -> Arc<Self> {
        let (teardown_tx, _) = watch::channel(false);
        Arc::new(Self {
            engine,
            store,
            sink,
            codec: SignalingCodec::new(settings.signaling_format()),
            settings,
            gate: GatheringGate::new(),
            phase: Mutex::new(SignalingPhase::Idle),
            teardown_tx,
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn phase(&self) -> SignalingPhase {
        *lock(&self.phase)
    }

    pub fn gathering_gate(&self) -> &GatheringGate {
        &self.gate
    }

    pub fn is_terminated(&self) -> bool {
        *self.teardown_tx.borrow()
    }

    /// Resolves once the session has been torn down.
    pub async fn terminated(&self) {
        wait_teardown(&mut self.teardown_tx.subscribe()).await;
    }

    /// Dispatches engine events until the engine drops its sender.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<EngineEvent>) {
        while let Some(event) = events.recv().await {
            trace!("engine event {:?}", event);
            match event {
                EngineEvent::ConnectionStateChanged(state) => {
                    self.handle_connection_state_change(state)
                }
                EngineEvent::GatheringComplete => self.handle_gathering_complete(),
                EngineEvent::DataChannel { handle, events } => {
                    self.handle_incoming_channel(handle, events);
                }
            }
        }
        debug!("engine event stream ended");
    }

    /// Reads the remote description slot and answers it.
    pub async fn start_session(&self) -> Result<SignalingToken, SessionError> {
        let token = self.store.get(Slot::RemoteDescription).unwrap_or_default();
        self.handle_remote_offer(&token).await
    }

    /// Answers `token` and publishes the final local description once
    /// gathering has completed. Nothing is published on failure.
    pub async fn handle_remote_offer(&self, token: &str) -> Result<SignalingToken, SessionError> {
        if token.trim().is_empty() {
            return Err(self.report(ValidationError::EmptyRemoteDescription.into()));
        }
        self.begin_answering().map_err(|err| self.report(err))?;

        let mut teardown_rx = self.teardown_tx.subscribe();
        let result = select! {
            biased;
            result = self.answer(token) => result,
            _ = wait_teardown(&mut teardown_rx) => Err(SessionError::Cancelled),
        };
        match result {
            Ok(token) => Ok(token),
            Err(err) => {
                let mut phase = lock(&self.phase);
                if *phase == SignalingPhase::AnsweringLocal {
                    *phase = SignalingPhase::Idle;
                }
                drop(phase);
                Err(self.report(err))
            }
        }
    }

    fn begin_answering(&self) -> Result<(), SessionError> {
        let mut phase = lock(&self.phase);
        match *phase {
            SignalingPhase::Idle => {
                *phase = SignalingPhase::AnsweringLocal;
                Ok(())
            }
            SignalingPhase::AnsweringLocal | SignalingPhase::LocalDescriptionReady => {
                Err(SessionError::AlreadyNegotiated)
            }
            SignalingPhase::Terminated => Err(SessionError::Terminated),
        }
    }

    async fn answer(&self, token: &str) -> Result<SignalingToken, SessionError> {
        let offer = self.codec.decode(token)?;
        if offer.kind() != SdpKind::Offer {
            return Err(ValidationError::NotAnOffer(offer.kind()).into());
        }
        self.engine
            .set_remote_description(offer)
            .await
            .map_err(NegotiationError::SetRemoteDescription)?;
        let answer = self
            .engine
            .create_answer()
            .await
            .map_err(NegotiationError::CreateAnswer)?;
        debug!("CreateAnswer");

        self.engine
            .set_local_description(answer)
            .await
            .map_err(NegotiationError::SetLocalDescription)?;
        debug!("SetLocalDescription");

        // The pasted description must carry every candidate.
        self.gate.wait().await;
        debug!("gathering complete");

        let local_desc = self
            .engine
            .local_description()
            .await
            .ok_or(NegotiationError::MissingLocalDescription)?;
        let local_token = self.codec.encode(&local_desc)?;
        self.publish(&local_token)?;
        Ok(local_token)
    }

    fn publish(&self, token: &SignalingToken) -> Result<(), SessionError> {
        let mut phase = lock(&self.phase);
        if *phase == SignalingPhase::Terminated {
            return Err(SessionError::Cancelled);
        }
        self.store
            .set(Slot::LocalDescription, token.as_str().to_owned());
        *phase = SignalingPhase::LocalDescriptionReady;
        drop(phase);
        self.sink.log(SessionEvent::LocalDescriptionPublished);
        Ok(())
    }

    /// Hands the published local description to `clipboard` verbatim.
    pub fn copy_local_description(&self, clipboard: &dyn Clipboard) -> bool {
        let Some(local_desc) = self.store.get(Slot::LocalDescription) else {
            self.sink.log(SessionEvent::Error(
                "local description is not ready".to_owned(),
            ));
            self.sink.log(SessionEvent::Copied { success: false });
            return false;
        };
        let success = match clipboard.copy(&local_desc) {
            Ok(()) => true,
            Err(err) => {
                self.sink
                    .log(SessionEvent::Error(format!("clipboard: {:#}", err)));
                false
            }
        };
        self.sink.log(SessionEvent::Copied { success });
        success
    }

    fn handle_gathering_complete(&self) {
        if let Err(err) = self.gate.release() {
            self.sink.log(SessionEvent::Warning(err.to_string()));
        }
    }

    pub fn handle_incoming_channel(
        &self,
        handle: Arc<dyn ChannelHandle>,
        events: mpsc::Receiver<ChannelEvent>,
    ) -> Arc<DataChannelSession> {
        self.sink.log(SessionEvent::ChannelCreated {
            label: handle.label().to_owned(),
            id: handle.id(),
        });
        let session = DataChannelSession::new(handle, self.settings.clone(), self.sink.clone());
        let mut sessions = lock(&self.sessions);
        if self.is_terminated() {
            drop(sessions);
            session.close();
            return session;
        }
        sessions.retain(|session| session.state() != ChannelState::Closed);
        sessions.push(session.clone());
        drop(sessions);
        session.spawn(events);
        session
    }

    pub fn handle_connection_state_change(&self, state: ConnectionState) {
        self.sink.log(SessionEvent::ConnectionStateChanged(state));
        if !state.is_terminal() {
            return;
        }
        match self.settings.on_terminal_state() {
            TerminalStatePolicy::Teardown => {
                self.teardown();
            }
            TerminalStatePolicy::LogOnly => {
                debug!("keeping session alive in {} state", state);
            }
        }
    }

    /// Closes every data channel session and cancels in-flight signaling.
    /// Returns the sessions that were closed.
    fn teardown(&self) -> Vec<Arc<DataChannelSession>> {
        let sessions = {
            let mut sessions = lock(&self.sessions);
            self.teardown_tx.send_replace(true);
            std::mem::take(&mut *sessions)
        };
        *lock(&self.phase) = SignalingPhase::Terminated;
        for session in &sessions {
            session.close();
        }
        sessions
    }

    /// Explicit close: tears the session down, waits for every broadcaster to
    /// stop and closes the engine.
    pub async fn shutdown(&self) {
        let sessions = self.teardown();
        for session in sessions {
            session.shutdown().await;
        }
        if let Err(err) = self.engine.close().await {
            self.sink.log(SessionEvent::Error(format!(
                "cannot close peerConnection: {:#}",
                err
            )));
        }
    }

    fn report(&self, err: SessionError) -> SessionError {
        self.sink.log(SessionEvent::Error(err.to_string()));
        err
    }
}
