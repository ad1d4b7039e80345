use crate::config::ServerConfig;
use rand::Rng;

/// Короткий случайный id сессии для логов.
pub fn random_id() -> String {
    hex::encode(rand::rng().random::<[u8; 8]>())
}

// Добавляем схему к URL ICE сервера, если пользователь её не указал
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    if config.url.starts_with("turn:")
        || config.url.starts_with("turns:")
        || config.url.starts_with("stun:")
        || config.url.starts_with("stuns:")
    {
        config.url.clone()
    } else {
        let scheme = if config.r#type == "turn" {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, config.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(kind: &str, url: &str) -> ServerConfig {
        ServerConfig {
            id: "t".into(),
            r#type: kind.into(),
            url: url.into(),
            username: None,
            credential: None,
        }
    }

    #[test]
    fn scheme_added_by_type() {
        assert_eq!(add_ice_url_scheme(&server("turn", "relay.example:3478")), "turn:relay.example:3478");
        assert_eq!(add_ice_url_scheme(&server("stun", "stun.example:3478")), "stun:stun.example:3478");
    }

    #[test]
    fn existing_scheme_kept() {
        assert_eq!(add_ice_url_scheme(&server("stun", "turn:x:1")), "turn:x:1");
    }

    #[test]
    fn random_ids_are_hex() {
        let id = random_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
