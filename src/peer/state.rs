use crate::peer::types::RawPhase;
use serde::Serialize;
use std::fmt;

/// What the caller sees of the connection.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    #[default]
    Initial,
    WaitingForRemoteDescriptor,
    NeedToSendLocalDescriptor,
    Connected,
    /// Терминальное. Для новой попытки нужна новая сессия.
    Disconnected,
}

impl ConnectionState {
    /// Pure function of the engine phase and whether a remote descriptor was applied.
    pub fn derive(phase: RawPhase, has_remote_descriptor: bool) -> Self {
        match (phase, has_remote_descriptor) {
            (RawPhase::New, _) => ConnectionState::Initial,
            (RawPhase::Connecting, false) => ConnectionState::WaitingForRemoteDescriptor,
            (RawPhase::Connecting, true) => ConnectionState::NeedToSendLocalDescriptor,
            (RawPhase::Connected, _) => ConnectionState::Connected,
            (
                RawPhase::Closed | RawPhase::Disconnected | RawPhase::Failed | RawPhase::Unknown,
                _,
            ) => ConnectionState::Disconnected,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Disconnected
    }

    /// Подсказка пользователю о следующем ручном шаге.
    pub fn prompt(self) -> &'static str {
        match self {
            ConnectionState::Initial => {
                "To start a call, copy the local descriptor and send it to a friend. \
                 To answer a call, paste your friend's descriptor with /connect."
            }
            ConnectionState::WaitingForRemoteDescriptor => {
                "Now get your friend to send you their descriptor and paste it with /connect."
            }
            ConnectionState::NeedToSendLocalDescriptor => {
                "Now copy your local descriptor and send it to your friend."
            }
            ConnectionState::Connected => "You are now connected, try sending each other a message!",
            ConnectionState::Disconnected => {
                "Something went wrong and you are disconnected. Restart to connect again."
            }
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Initial => "initial",
            ConnectionState::WaitingForRemoteDescriptor => "waitingForRemoteDescriptor",
            ConnectionState::NeedToSendLocalDescriptor => "needToSendLocalDescriptor",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table() {
        let cases = [
            (RawPhase::New, false, ConnectionState::Initial),
            (RawPhase::New, true, ConnectionState::Initial),
            (RawPhase::Connecting, false, ConnectionState::WaitingForRemoteDescriptor),
            (RawPhase::Connecting, true, ConnectionState::NeedToSendLocalDescriptor),
            (RawPhase::Connected, false, ConnectionState::Connected),
            (RawPhase::Connected, true, ConnectionState::Connected),
            (RawPhase::Closed, false, ConnectionState::Disconnected),
            (RawPhase::Disconnected, true, ConnectionState::Disconnected),
            (RawPhase::Failed, false, ConnectionState::Disconnected),
            (RawPhase::Failed, true, ConnectionState::Disconnected),
        ];
        for (phase, remote, want) in cases {
            assert_eq!(ConnectionState::derive(phase, remote), want, "{phase:?}/{remote}");
        }
    }

    #[test]
    fn unknown_phase_is_disconnected() {
        assert_eq!(ConnectionState::derive(RawPhase::Unknown, false), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::derive(RawPhase::Unknown, true), ConnectionState::Disconnected);
    }

    #[test]
    fn serialises_camel_case() {
        let json = serde_json::to_string(&ConnectionState::NeedToSendLocalDescriptor).unwrap();
        assert_eq!(json, "\"needToSendLocalDescriptor\"");
        assert_eq!(ConnectionState::WaitingForRemoteDescriptor.to_string(), "waitingForRemoteDescriptor");
    }
}
