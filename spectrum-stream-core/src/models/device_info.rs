use serde::{Deserialize, Serialize};

/// An audio input device available for capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub is_default: bool,
    /// Native rate in Hz, when the backend reports one.
    pub default_sample_rate: Option<u32>,
    pub channels: u16,
}
