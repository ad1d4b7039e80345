use crate::error::EngineError;
use crate::peer::engine::{Channel, EventSink};
use crate::peer::types::EngineEvent;
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;

/// Пробрасываем колбэки data channel в sink событий.
pub fn attach_dc(dc: &Arc<RTCDataChannel>, events: EventSink) {
    let label = dc.label().to_string();

    let sink = events.clone();
    let open_label = label.clone();
    dc.on_open(Box::new(move || {
        debug!(label = %open_label, "data channel opened");
        sink.emit(EngineEvent::ChannelOpened);
        Box::pin(async {})
    }));

    let sink = events.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        if !msg.is_string {
            warn!(len = msg.data.len(), "dropping binary data channel message");
        } else {
            match String::from_utf8(msg.data.to_vec()) {
                Ok(text) => sink.emit(EngineEvent::ChannelMessage(text)),
                Err(e) => warn!(error = %e, "dropping non UTF-8 text message"),
            }
        }
        Box::pin(async {})
    }));

    dc.on_close(Box::new(move || {
        debug!(label = %label, "data channel closed");
        events.emit(EngineEvent::ChannelClosed);
        Box::pin(async {})
    }));
}

/// Канал сессии. Движок может подменить data channel, если пересоздаёт соединение.
pub struct WebRtcChannel {
    current: RwLock<Arc<RTCDataChannel>>,
}

impl WebRtcChannel {
    pub fn new(dc: Arc<RTCDataChannel>) -> Self {
        Self {
            current: RwLock::new(dc),
        }
    }

    pub(crate) fn replace(&self, dc: Arc<RTCDataChannel>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = dc;
    }

    fn current(&self) -> Arc<RTCDataChannel> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Channel for WebRtcChannel {
    async fn send_text(&self, text: String) -> Result<(), EngineError> {
        self.current()
            .send_text(text)
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Channel(e.to_string()))
    }

    async fn close(&self) {
        if let Err(e) = self.current().close().await {
            warn!(error = %e, "closing data channel failed");
        }
    }
}
