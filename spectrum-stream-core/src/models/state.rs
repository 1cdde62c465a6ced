use serde::{Deserialize, Serialize};

/// Lifecycle state of a streamer.
///
/// State transitions:
/// ```text
/// idle → starting → streaming → stopping → idle
///           ↓           ↓
///          idle        idle   (open retries exhausted / read failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Idle,
    Starting,
    Streaming,
    Stopping,
}

impl StreamState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::Idle
    }
}

/// How a streaming session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Stopped on request.
    Stopped,
    /// A mid-stream read failed and the session closed itself.
    ReadFailed(String),
    /// The device never opened.
    DeviceUnavailable(String),
    /// The capture thread panicked.
    Aborted(String),
}

impl SessionOutcome {
    /// Whether the session ended for any reason other than a requested stop.
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        assert!(StreamState::default().is_idle());
        assert!(!StreamState::default().is_streaming());
    }

    #[test]
    fn only_requested_stop_is_not_an_error() {
        assert!(!SessionOutcome::Stopped.is_error());
        assert!(SessionOutcome::ReadFailed("x".into()).is_error());
        assert!(SessionOutcome::DeviceUnavailable("x".into()).is_error());
        assert!(SessionOutcome::Aborted("x".into()).is_error());
    }

    #[test]
    fn outcome_serializes_with_kind_tag() {
        let json = serde_json::to_string(&SessionOutcome::ReadFailed("overrun".into())).unwrap();
        assert_eq!(json, r#"{"kind":"read_failed","message":"overrun"}"#);
    }
}
