use crate::config::{ServerConfig, SessionConfig};
use crate::error::EngineError;
use crate::peer::data_channel::{attach_dc, WebRtcChannel};
use crate::peer::engine::{Detach, Engine, EngineFactory, EngineParts, EventSink};
use crate::peer::types::{
    DescriptorKind, EngineEvent, GatheringState, LocalSnapshot, RawPhase, SessionDescriptor,
};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn, Level};
use webrtc::api::setting_engine::SettingEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_gathering_state::RTCIceGatheringState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::{
    api::APIBuilder,
    data_channel::data_channel_init::RTCDataChannelInit,
    ice_transport::ice_server::RTCIceServer,
    peer_connection::{
        configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
        sdp::session_description::RTCSessionDescription, RTCPeerConnection,
    },
};

/// Builds engines on top of webrtc-rs.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebRtcEngineFactory;

#[async_trait]
impl EngineFactory for WebRtcEngineFactory {
    async fn create(&self, config: &SessionConfig, events: EventSink) -> Result<EngineParts, EngineError> {
        let link = open_link(config, &events).await?;
        let channel = Arc::new(WebRtcChannel::new(link.dc.clone()));

        info!(
            label = %config.channel_label,
            id = config.channel_id,
            ice_servers = config.effective_ice_servers().len(),
            loopback = config.include_loopback_candidates,
            "peer connection created"
        );

        let engine = Arc::new(WebRtcEngine {
            config: config.clone(),
            events,
            link: RwLock::new(Arc::new(link)),
            channel: channel.clone(),
        });
        Ok(EngineParts { engine, channel })
    }
}

/// Peer connection плюс его data channel. Живут и умирают вместе.
struct Link {
    pc: Arc<RTCPeerConnection>,
    dc: Arc<RTCDataChannel>,
    detach: Detach,
}

impl Link {
    async fn shutdown(&self) {
        close_quietly(&self.pc, &self.detach).await;
    }
}

/// Закрываем соединение, не пуская его события в сессию.
async fn close_quietly(pc: &RTCPeerConnection, detach: &Detach) {
    // сначала глушим колбэки, иначе закрытие долетит до сессии как disconnect
    detach.detach();
    if let Err(e) = pc.close().await {
        warn!(error = %e, "closing peer connection failed");
    }
}

/// Создаём peer connection и согласованный data channel.
async fn open_link(config: &SessionConfig, events: &EventSink) -> Result<Link, EngineError> {
    let (sink, detach) = events.scoped();

    let mut setting = SettingEngine::default();
    setting.set_include_loopback_candidate(config.include_loopback_candidates);
    let api = APIBuilder::new().with_setting_engine(setting).build();

    let pc = Arc::new(
        api.new_peer_connection(rtc_config(config))
            .await
            .map_err(|e| EngineError::Setup(e.to_string()))?,
    );
    attach_pc(&pc, sink.clone());

    // Обе стороны открывают один и тот же id, без DCEP
    let created = pc
        .create_data_channel(
            &config.channel_label,
            Some(RTCDataChannelInit {
                ordered: Some(true),
                negotiated: Some(config.channel_id),
                ..Default::default()
            }),
        )
        .await;
    let dc = match created {
        Ok(dc) => dc,
        Err(e) => {
            close_quietly(&pc, &detach).await;
            return Err(EngineError::Setup(e.to_string()));
        }
    };
    attach_dc(&dc, sink);

    Ok(Link { pc, dc, detach })
}

pub struct WebRtcEngine {
    config: SessionConfig,
    events: EventSink,
    link: RwLock<Arc<Link>>,
    channel: Arc<WebRtcChannel>,
}

#[async_trait]
impl Engine for WebRtcEngine {
    async fn generate_local_descriptor(&self) -> Result<LocalSnapshot, EngineError> {
        let pc = self.link().pc.clone();
        let desc = if pc.signaling_state() == RTCSignalingState::HaveRemoteOffer {
            debug!("creating answer");
            pc.create_answer(None).await?
        } else {
            debug!("creating offer");
            pc.create_offer(None).await?
        };
        pc.set_local_description(desc).await?;

        let gathering = match pc.ice_gathering_state() {
            RTCIceGatheringState::Complete => GatheringState::Complete,
            RTCIceGatheringState::Gathering => GatheringState::Gathering,
            _ => GatheringState::New,
        };
        let descriptor = pc.local_description().await.and_then(from_rtc);
        Ok(LocalSnapshot {
            gathering,
            descriptor,
        })
    }

    async fn apply_remote_descriptor(&self, desc: SessionDescriptor) -> Result<(), EngineError> {
        let kind = desc.kind;
        let rtc = to_rtc(desc)?;
        let current = self.link();

        // Обе стороны начинают с offer. webrtc-rs не умеет откатить локальный
        // offer из have-local-offer, поэтому отвечаем с нового соединения.
        if kind == DescriptorKind::Offer
            && current.pc.signaling_state() == RTCSignalingState::HaveLocalOffer
        {
            debug!("replacing offering connection to answer remote offer");
            let fresh = open_link(&self.config, &self.events).await?;
            if let Err(e) = fresh.pc.set_remote_description(rtc).await {
                fresh.shutdown().await;
                return Err(EngineError::Rejected(e.to_string()));
            }
            self.install(fresh).await;
            return Ok(());
        }

        current
            .pc
            .set_remote_description(rtc)
            .await
            .map_err(|e| EngineError::Rejected(e.to_string()))
    }

    async fn close(&self) {
        self.link().shutdown().await;
    }
}

impl WebRtcEngine {
    fn link(&self) -> Arc<Link> {
        self.link
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in `fresh` and shut the previous connection down.
    async fn install(&self, fresh: Link) {
        self.channel.replace(fresh.dc.clone());
        let fresh = Arc::new(fresh);
        let old = std::mem::replace(
            &mut *self.link.write().unwrap_or_else(PoisonError::into_inner),
            fresh,
        );
        old.shutdown().await;
    }
}

/// Подписываемся на события соединения и шлём их в sink.
fn attach_pc(pc: &Arc<RTCPeerConnection>, events: EventSink) {
    let weak = Arc::downgrade(pc);
    let sink = events.clone();
    pc.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
        let weak = weak.clone();
        let sink = sink.clone();
        Box::pin(async move {
            let state = match state {
                RTCIceGathererState::New => GatheringState::New,
                RTCIceGathererState::Gathering => GatheringState::Gathering,
                RTCIceGathererState::Complete => GatheringState::Complete,
                other => {
                    debug!(state = ?other, "ignoring ICE gatherer state");
                    return;
                }
            };
            let local_description = match weak.upgrade() {
                Some(pc) => pc.local_description().await.and_then(from_rtc),
                None => None,
            };
            sink.emit(EngineEvent::GatheringStateChanged {
                state,
                local_description,
            });
        })
    }));

    let weak = Arc::downgrade(pc);
    pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
        debug!(state = ?st, "peer connection state changed");
        events.emit(EngineEvent::ConnectionPhaseChanged(raw_phase(st)));

        let weak = weak.clone();
        Box::pin(async move {
            if st == RTCPeerConnectionState::Connected && tracing::enabled!(Level::DEBUG) {
                if let Some(pc) = weak.upgrade() {
                    dump_selected_pair(&pc, "connected").await;
                }
            }
        })
    }));
}

/// Быстрый снимок getStats → выбранная пара
async fn dump_selected_pair(pc: &RTCPeerConnection, moment: &str) {
    let stats = pc.get_stats().await;
    for (_, report) in stats.reports {
        if let webrtc::stats::StatsReportType::CandidatePair(pair) = report {
            if pair.nominated {
                debug!(
                    moment,
                    local = %pair.local_candidate_id,
                    remote = %pair.remote_candidate_id,
                    bytes_sent = pair.bytes_sent,
                    bytes_received = pair.bytes_received,
                    state = ?pair.state,
                    "selected candidate pair"
                );
            }
        }
    }
}

pub fn raw_phase(state: RTCPeerConnectionState) -> RawPhase {
    match state {
        RTCPeerConnectionState::New => RawPhase::New,
        RTCPeerConnectionState::Connecting => RawPhase::Connecting,
        RTCPeerConnectionState::Connected => RawPhase::Connected,
        RTCPeerConnectionState::Disconnected => RawPhase::Disconnected,
        RTCPeerConnectionState::Failed => RawPhase::Failed,
        RTCPeerConnectionState::Closed => RawPhase::Closed,
        _ => RawPhase::Unknown,
    }
}

fn from_rtc(desc: RTCSessionDescription) -> Option<SessionDescriptor> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => DescriptorKind::Offer,
        RTCSdpType::Pranswer => DescriptorKind::Pranswer,
        RTCSdpType::Answer => DescriptorKind::Answer,
        RTCSdpType::Rollback => DescriptorKind::Rollback,
        _ => return None,
    };
    Some(SessionDescriptor::new(kind, desc.sdp))
}

fn to_rtc(desc: SessionDescriptor) -> Result<RTCSessionDescription, EngineError> {
    let parsed = match desc.kind {
        DescriptorKind::Offer => RTCSessionDescription::offer(desc.sdp),
        DescriptorKind::Answer => RTCSessionDescription::answer(desc.sdp),
        DescriptorKind::Pranswer => RTCSessionDescription::pranswer(desc.sdp),
        DescriptorKind::Rollback => {
            return Err(EngineError::Rejected(
                "rollback is not a remote descriptor".into(),
            ))
        }
    };
    parsed.map_err(|e| EngineError::Rejected(e.to_string()))
}

/// Конфигурация соединения для сессии
fn rtc_config(config: &SessionConfig) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: ice_servers(&config.effective_ice_servers()),
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

pub fn ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_mapping() {
        assert_eq!(raw_phase(RTCPeerConnectionState::Connecting), RawPhase::Connecting);
        assert_eq!(raw_phase(RTCPeerConnectionState::Closed), RawPhase::Closed);
        assert_eq!(raw_phase(RTCPeerConnectionState::Unspecified), RawPhase::Unknown);
    }

    #[test]
    fn ice_servers_get_schemes_and_credentials() {
        let servers = ice_servers(&[ServerConfig {
            id: "relay".into(),
            r#type: "turn".into(),
            url: "relay.example.org:3478".into(),
            username: Some("alice".into()),
            credential: Some("secret".into()),
        }]);
        assert_eq!(servers[0].urls, vec!["turn:relay.example.org:3478".to_string()]);
        assert_eq!(servers[0].username, "alice");
        assert_eq!(servers[0].credential, "secret");
    }

    #[test]
    fn no_relay_means_no_servers() {
        assert!(rtc_config(&SessionConfig::with_relay(false)).ice_servers.is_empty());
        assert_eq!(rtc_config(&SessionConfig::with_relay(true)).ice_servers.len(), 2);
    }

    #[tokio::test]
    async fn abandoned_connection_is_closed_without_reaching_the_session() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let link = open_link(&SessionConfig::default(), &EventSink::new(1, tx))
            .await
            .expect("link");

        close_quietly(&link.pc, &link.detach).await;
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(link.pc.connection_state(), RTCPeerConnectionState::Closed);
        while let Ok(event) = rx.try_recv() {
            assert!(
                !matches!(
                    event.event,
                    EngineEvent::ConnectionPhaseChanged(RawPhase::Closed) | EngineEvent::ChannelClosed
                ),
                "close leaked: {event:?}"
            );
        }
    }

    #[test]
    fn rollback_is_not_accepted_from_remote() {
        let err = to_rtc(SessionDescriptor::new(DescriptorKind::Rollback, "")).unwrap_err();
        assert!(matches!(err, EngineError::Rejected(_)));
    }
}
