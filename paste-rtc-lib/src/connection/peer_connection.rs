use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::{spawn, sync::mpsc};
use tracing::{debug, trace};
use webrtc::{
    api::setting_engine::SettingEngine,
    data_channel::RTCDataChannel,
    ice_transport::ice_server::RTCIceServer,
    peer_connection::{
        configuration::RTCConfiguration,
        peer_connection_state::RTCPeerConnectionState,
        sdp::{sdp_type::RTCSdpType, session_description::RTCSessionDescription},
        RTCPeerConnection,
    },
};

use crate::{
    settings::Settings,
    signaling::{SdpKind, SessionDescription},
};

use super::{ChannelEvent, ChannelHandle, ConnectionState, EngineEvent, PeerEngine};

fn create_config(settings: &Settings) -> RTCConfiguration {
    let ice_servers = if settings.ice_servers().is_empty() {
        vec![]
    } else {
        vec![RTCIceServer {
            urls: settings.ice_servers().clone(),
            ..Default::default()
        }]
    };
    RTCConfiguration {
        ice_servers,
        ..Default::default()
    }
}

async fn create_peer_connection(settings: &Settings) -> Result<RTCPeerConnection> {
    let mut setting_engine = SettingEngine::default();
    setting_engine.set_ice_timeouts(
        settings.ice_disconnected_timeout(),
        settings.ice_failed_timeout(),
        None,
    );
    Ok(webrtc::api::APIBuilder::new()
        .with_setting_engine(setting_engine)
        .build()
        .new_peer_connection(create_config(settings))
        .await?)
}

pub fn to_rtc_session_description(desc: SessionDescription) -> Result<RTCSessionDescription> {
    Ok(match desc.kind() {
        SdpKind::Offer => RTCSessionDescription::offer(desc.into_body())?,
        SdpKind::Answer => RTCSessionDescription::answer(desc.into_body())?,
    })
}

pub fn from_rtc_session_description(desc: RTCSessionDescription) -> Result<SessionDescription> {
    Ok(match desc.sdp_type {
        RTCSdpType::Offer => SessionDescription::offer(desc.sdp),
        RTCSdpType::Answer => SessionDescription::answer(desc.sdp),
        RTCSdpType::Pranswer | RTCSdpType::Unspecified | RTCSdpType::Rollback => {
            bail!("unsupported sdp type: {}", desc.sdp_type)
        }
    })
}

fn to_connection_state(state: RTCPeerConnectionState) -> Option<ConnectionState> {
    Some(match state {
        RTCPeerConnectionState::New => ConnectionState::New,
        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
        RTCPeerConnectionState::Connected => ConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectionState::Failed,
        RTCPeerConnectionState::Closed => ConnectionState::Closed,
        RTCPeerConnectionState::Unspecified => return None,
    })
}

/// [`PeerEngine`] backed by a `webrtc` peer connection. Engine callbacks are
/// forwarded as [`EngineEvent`]s.
pub struct RtcPeerConnection {
    rtc: Option<RTCPeerConnection>,
    events_tx: mpsc::Sender<EngineEvent>,
}

impl Drop for RtcPeerConnection {
    fn drop(&mut self) {
        trace!("drop connection");
        let Some(rtc_peer_connection) = self.rtc.take() else {
            return;
        };
        let drop = async move {
            // NOTE: If the connection was established, it will not be disconnected by drop,
            //       so close it explicitly.
            let _ = rtc_peer_connection.close().await;
            trace!("connection closed");
        };
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(drop);
        } else if let Ok(rt) = tokio::runtime::Builder::new_current_thread().build() {
            rt.block_on(drop);
        }
    }
}

impl RtcPeerConnection {
    pub async fn new(settings: &Settings) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        let rtc = create_peer_connection(settings).await?;
        let buffer = settings.session().event_buffer().max(1);
        let (events_tx, events_rx) = mpsc::channel(buffer);

        {
            let events_tx = events_tx.clone();
            rtc.on_peer_connection_state_change(Box::new(move |state| {
                debug!("on_peer_connection_state_change {}", state);
                let events_tx = events_tx.clone();
                Box::pin(async move {
                    if let Some(state) = to_connection_state(state) {
                        let _ = events_tx
                            .send(EngineEvent::ConnectionStateChanged(state))
                            .await;
                    }
                })
            }));
        }
        {
            let events_tx = events_tx.clone();
            rtc.on_data_channel(Box::new(move |rtc_data_channel| {
                let events_tx = events_tx.clone();
                Box::pin(async move {
                    let (handle, events) = RtcDataChannel::new(rtc_data_channel, buffer);
                    let _ = events_tx
                        .send(EngineEvent::DataChannel {
                            handle: Arc::new(handle),
                            events,
                        })
                        .await;
                })
            }));
        }

        Ok((
            Self {
                rtc: Some(rtc),
                events_tx,
            },
            events_rx,
        ))
    }

    fn rtc(&self) -> Result<&RTCPeerConnection> {
        match self.rtc.as_ref() {
            Some(rtc) => Ok(rtc),
            None => bail!("RTCPeerConnection already dropped"),
        }
    }
}

#[async_trait]
impl PeerEngine for RtcPeerConnection {
    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = to_rtc_session_description(desc)?;
        self.rtc()?.set_remote_description(desc).await?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.rtc()?.create_answer(None).await?;
        from_rtc_session_description(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let rtc = self.rtc()?;
        let mut gather_complete = rtc.gathering_complete_promise().await;
        rtc.set_local_description(to_rtc_session_description(desc)?)
            .await?;

        let events_tx = self.events_tx.clone();
        spawn(async move {
            let _ = gather_complete.recv().await;
            let _ = events_tx.send(EngineEvent::GatheringComplete).await;
        });
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let desc = self.rtc().ok()?.local_description().await?;
        from_rtc_session_description(desc).ok()
    }

    async fn close(&self) -> Result<()> {
        Ok(self.rtc()?.close().await?)
    }
}

/// [`ChannelHandle`] backed by a `webrtc` data channel.
pub struct RtcDataChannel {
    rtc: Arc<RTCDataChannel>,
}

impl RtcDataChannel {
    pub fn new(
        rtc: Arc<RTCDataChannel>,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::channel(buffer);
        {
            let events_tx = events_tx.clone();
            rtc.on_open(Box::new(move || {
                Box::pin(async move {
                    let _ = events_tx.send(ChannelEvent::Open).await;
                })
            }));
        }
        {
            let events_tx = events_tx.clone();
            rtc.on_message(Box::new(move |msg| {
                let events_tx = events_tx.clone();
                Box::pin(async move {
                    let _ = events_tx.send(ChannelEvent::Message(msg.data)).await;
                })
            }));
        }
        {
            let events_tx = events_tx.clone();
            rtc.on_error(Box::new(move |err| {
                let events_tx = events_tx.clone();
                Box::pin(async move {
                    let _ = events_tx.send(ChannelEvent::Error(err.to_string())).await;
                })
            }));
        }
        rtc.on_close(Box::new(move || {
            let events_tx = events_tx.clone();
            Box::pin(async move {
                let _ = events_tx.send(ChannelEvent::Close).await;
            })
        }));
        (Self { rtc }, events_rx)
    }
}

#[async_trait]
impl ChannelHandle for RtcDataChannel {
    fn label(&self) -> &str {
        self.rtc.label()
    }

    fn id(&self) -> u16 {
        self.rtc.id()
    }

    async fn send_text(&self, text: String) -> Result<()> {
        self.rtc.send_text(text).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(self.rtc.close().await?)
    }
}
