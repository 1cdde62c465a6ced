//! Input device enumeration via the cpal default host.

use cpal::traits::{DeviceTrait, HostTrait};

use spectrum_stream_core::models::device_info::DeviceInfo;
use spectrum_stream_core::models::error::DeviceError;

/// List the input devices of the default host.
///
/// Devices whose name or default configuration cannot be queried are still
/// listed, with whatever could be read.
pub fn list_input_devices() -> Result<Vec<DeviceInfo>, DeviceError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| DeviceError::Open(format!("failed to enumerate input devices: {}", e)))?;

    Ok(devices
        .map(|device| describe_device(&device, default_name.as_deref()))
        .collect())
}

/// Resolve `name` to an input device, or the host default for `None`.
pub(crate) fn find_input_device(name: Option<&str>) -> Result<cpal::Device, DeviceError> {
    let host = cpal::default_host();
    let Some(name) = name else {
        return host.default_input_device().ok_or(DeviceError::NoDevice);
    };

    let mut devices = host
        .input_devices()
        .map_err(|e| DeviceError::Open(format!("failed to enumerate input devices: {}", e)))?;
    devices
        .find(|device| device.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| DeviceError::Open(format!("input device '{}' not found", name)))
}

pub(crate) fn describe_device(device: &cpal::Device, default_name: Option<&str>) -> DeviceInfo {
    let name = device.name().unwrap_or_else(|_| "unknown device".into());
    let (default_sample_rate, channels) = match device.default_input_config() {
        Ok(config) => (Some(config.sample_rate().0), config.channels()),
        Err(e) => {
            log::debug!("no default input config for {}: {}", name, e);
            (None, 0)
        }
    };

    DeviceInfo {
        is_default: default_name == Some(name.as_str()),
        name,
        default_sample_rate,
        channels,
    }
}
