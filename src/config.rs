// Конфигурация приложения
// В debug-сборке логирование включено, в release только при заданном SSC_LOG

use crate::error::PeerError;
use serde::{Deserialize, Serialize};

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true;

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false;

/// Переменная окружения, включающая логирование в release.
pub const LOG_ENV_OVERRIDE: &str = "SSC_LOG";

/// Фильтр по умолчанию, если RUST_LOG не задан.
pub const DEFAULT_LOG_FILTER: &str = "serverless_webrtc=info,webrtc=warn";

/// Заранее согласованный data channel: обе стороны открывают его с одним id, без DCEP.
pub const DEFAULT_CHANNEL_LABEL: &str = "text";
pub const DEFAULT_CHANNEL_ID: u16 = 0;

pub const DEFAULT_STUN_SERVERS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// How the local descriptor is rendered for out-of-band transfer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorFormat {
    /// Plain `{"type": ..., "sdp": ...}` JSON.
    #[default]
    Json,
    /// JSON, gzip, base64. Small enough for a QR code.
    Compact,
}

/// ICE server entry as supplied by the user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub id: String,
    pub r#type: String, // "stun" или "turn"
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl ServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: url.clone(),
            r#type: "stun".into(),
            url,
            username: None,
            credential: None,
        }
    }

    pub fn is_turn(&self) -> bool {
        self.r#type == "turn" || self.url.starts_with("turn:")
    }
}

/// Everything a session is built from. Changing it means building a new session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Use STUN/TURN servers. Without them only host candidates are gathered.
    pub use_relay_server: bool,
    /// Explicit servers; empty means the default STUN pair when `use_relay_server` is set.
    #[serde(default)]
    pub ice_servers: Vec<ServerConfig>,
    #[serde(default)]
    pub descriptor_format: DescriptorFormat,
    #[serde(default = "default_channel_label")]
    pub channel_label: String,
    #[serde(default = "default_channel_id")]
    pub channel_id: u16,
    /// Gather 127.0.0.1/::1 host candidates too. Off by default, like browsers.
    #[serde(default)]
    pub include_loopback_candidates: bool,
}

fn default_channel_label() -> String {
    DEFAULT_CHANNEL_LABEL.to_string()
}

fn default_channel_id() -> u16 {
    DEFAULT_CHANNEL_ID
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            use_relay_server: false,
            ice_servers: Vec::new(),
            descriptor_format: DescriptorFormat::default(),
            channel_label: default_channel_label(),
            channel_id: default_channel_id(),
            include_loopback_candidates: false,
        }
    }
}

impl SessionConfig {
    pub fn with_relay(use_relay_server: bool) -> Self {
        Self {
            use_relay_server,
            ..Self::default()
        }
    }

    /// Servers the engine should be created with.
    pub fn effective_ice_servers(&self) -> Vec<ServerConfig> {
        if !self.use_relay_server {
            return Vec::new();
        }
        if !self.ice_servers.is_empty() {
            return self.ice_servers.clone();
        }
        DEFAULT_STUN_SERVERS
            .iter()
            .map(|url| ServerConfig::stun(*url))
            .collect()
    }

    pub fn validate(&self) -> Result<(), PeerError> {
        for server in &self.ice_servers {
            if server.url.is_empty() {
                return Err(PeerError::InvalidConfig(format!(
                    "server `{}` has an empty url",
                    server.id
                )));
            }
            if server.is_turn() && (server.username.is_none() || server.credential.is_none()) {
                return Err(PeerError::InvalidConfig(format!(
                    "TURN server `{}` requires username and credential",
                    server.id
                )));
            }
        }
        if self.channel_label.is_empty() {
            return Err(PeerError::InvalidConfig("channel label is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_off_uses_no_servers() {
        let cfg = SessionConfig {
            ice_servers: vec![ServerConfig::stun("stun:example.org")],
            ..SessionConfig::with_relay(false)
        };
        assert!(cfg.effective_ice_servers().is_empty());
    }

    #[test]
    fn relay_on_falls_back_to_default_stun() {
        let servers = SessionConfig::with_relay(true).effective_ice_servers();
        let urls: Vec<_> = servers.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, DEFAULT_STUN_SERVERS);
    }

    #[test]
    fn turn_without_credentials_is_rejected() {
        let cfg = SessionConfig {
            ice_servers: vec![ServerConfig {
                id: "relay".into(),
                r#type: "turn".into(),
                url: "turn.example.org:3478".into(),
                username: Some("user".into()),
                credential: None,
            }],
            ..SessionConfig::with_relay(true)
        };
        assert!(matches!(cfg.validate(), Err(PeerError::InvalidConfig(_))));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: SessionConfig = serde_json::from_str(r#"{"use_relay_server": true}"#).unwrap();
        assert_eq!(cfg.channel_label, DEFAULT_CHANNEL_LABEL);
        assert_eq!(cfg.channel_id, DEFAULT_CHANNEL_ID);
        assert_eq!(cfg.descriptor_format, DescriptorFormat::Json);
        assert!(!cfg.include_loopback_candidates);
    }
}
