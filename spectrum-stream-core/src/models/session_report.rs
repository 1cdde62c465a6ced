use serde::{Deserialize, Serialize};

use super::state::SessionOutcome;

/// Counters collected by the capture loop over one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDiagnostics {
    pub open_attempts: u32,
    pub frames_captured: u64,
    pub frames_emitted: u64,
    pub frames_throttled: u64,
}

/// Summary returned when a session ends, however it ended.
///
/// Serializable for JSON export to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: String,
    pub started_at: String,
    pub sample_rate: Option<u32>,
    pub window_size: usize,
    pub diagnostics: StreamDiagnostics,
    pub outcome: SessionOutcome,
}

impl SessionReport {
    /// A report for a session that is just beginning.
    pub fn begin(window_size: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            sample_rate: None,
            window_size,
            diagnostics: StreamDiagnostics::default(),
            outcome: SessionOutcome::Stopped,
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_error()
    }
}
