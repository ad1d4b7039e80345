use crate::peer::types::GatheringState;
use tracing::{debug, info, warn};

/// Не отдаём локальный дескриптор, пока сбор кандидатов не завершён:
/// строка для второй стороны должна быть полной и самодостаточной.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReadinessGate {
    complete: bool,
    finalized: Option<String>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a gathering state change together with the engine's current
    /// self-description (already rendered as a blob).
    pub fn on_gathering_state(&mut self, state: GatheringState, current: Option<String>) {
        if state.is_complete() {
            if current.is_none() {
                warn!("ICE gathering complete but engine has no local description");
            }
            debug!("ICE gathering complete");
            self.complete = true;
            self.finalized = current;
        } else {
            debug!(?state, "ICE gathering in progress");
            self.complete = false;
            self.finalized = None;
        }
    }

    /// Сбрасываем готовый дескриптор перед повторным согласованием.
    pub fn clear(&mut self) {
        self.complete = false;
        self.finalized = None;
    }

    /// The finalized descriptor, never a partial one.
    pub fn local_descriptor(&self) -> Option<&str> {
        if self.complete {
            self.finalized.as_deref()
        } else {
            None
        }
    }

    pub fn is_loading(&self) -> bool {
        !self.complete
    }
}

/// Candidate counts found in an SDP blob.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSummary {
    pub host: usize,
    pub srflx: usize,
    pub relay: usize,
}

impl CandidateSummary {
    pub fn total(&self) -> usize {
        self.host + self.srflx + self.relay
    }
}

pub fn analyze_candidates(sdp: &str) -> CandidateSummary {
    let mut summary = CandidateSummary::default();
    for line in sdp.lines().filter(|l| l.starts_with("a=candidate:")) {
        if line.contains(" typ host") {
            summary.host += 1;
        } else if line.contains(" typ srflx") || line.contains(" typ prflx") {
            summary.srflx += 1;
        } else if line.contains(" typ relay") {
            summary.relay += 1;
        }
    }
    summary
}

/// Печать кандидатов из готового дескриптора.
pub fn log_candidates(sdp: &str, expect_public: bool) -> CandidateSummary {
    let summary = analyze_candidates(sdp);
    info!(
        host = summary.host,
        srflx = summary.srflx,
        relay = summary.relay,
        "candidate analysis"
    );
    if summary.total() == 0 {
        warn!("local descriptor carries no ICE candidates");
    } else if expect_public && summary.srflx + summary.relay == 0 {
        warn!("no server-reflexive or relay candidates found; connection through NAT may fail");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_until_complete() {
        let mut gate = ReadinessGate::new();
        assert!(gate.is_loading());
        assert_eq!(gate.local_descriptor(), None);

        gate.on_gathering_state(GatheringState::Gathering, Some("partial".into()));
        assert!(gate.is_loading());
        assert_eq!(gate.local_descriptor(), None);

        gate.on_gathering_state(GatheringState::Complete, Some("D".into()));
        assert!(!gate.is_loading());
        assert_eq!(gate.local_descriptor(), Some("D"));
    }

    #[test]
    fn new_gathering_round_hides_old_descriptor() {
        let mut gate = ReadinessGate::new();
        gate.on_gathering_state(GatheringState::Complete, Some("D1".into()));
        gate.on_gathering_state(GatheringState::Gathering, Some("D2-partial".into()));
        assert_eq!(gate.local_descriptor(), None);
        gate.on_gathering_state(GatheringState::Complete, Some("D2".into()));
        assert_eq!(gate.local_descriptor(), Some("D2"));
    }

    #[test]
    fn new_state_counts_as_in_progress() {
        let mut gate = ReadinessGate::new();
        gate.on_gathering_state(GatheringState::Complete, Some("D".into()));
        gate.on_gathering_state(GatheringState::New, None);
        assert!(gate.is_loading());
        assert_eq!(gate.local_descriptor(), None);
    }

    #[test]
    fn clear_resets() {
        let mut gate = ReadinessGate::new();
        gate.on_gathering_state(GatheringState::Complete, Some("D".into()));
        gate.clear();
        assert_eq!(gate, ReadinessGate::new());
    }

    #[test]
    fn counts_candidate_types() {
        let sdp = "v=0\r\n\
                   a=candidate:1 1 udp 2130706431 10.0.0.2 5000 typ host\r\n\
                   a=candidate:2 1 udp 1694498815 203.0.113.9 5001 typ srflx raddr 10.0.0.2 rport 5000\r\n\
                   a=candidate:3 1 udp 16777215 198.51.100.1 5002 typ relay raddr 203.0.113.9 rport 5001\r\n\
                   a=candidate:4 1 udp 2130706431 10.0.0.3 5003 typ host\r\n\
                   a=end-of-candidates\r\n";
        assert_eq!(
            analyze_candidates(sdp),
            CandidateSummary { host: 2, srflx: 1, relay: 1 }
        );
    }
}
