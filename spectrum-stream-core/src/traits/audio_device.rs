use crate::models::config::CaptureConfig;
use crate::models::device_info::DeviceInfo;
use crate::models::error::DeviceError;
use crate::models::spectrum::RawFrame;

/// A source of microphone audio that can be opened once per session.
///
/// Implemented by:
/// - `CpalMicrophone` (any platform cpal supports)
/// - test doubles in this crate
///
/// `open` is called on the capture thread, so the returned handle never
/// crosses threads and need not be `Send`.
pub trait AudioDevice: Send + Sync + 'static {
    type Handle: DeviceHandle;

    /// Acquire the device for capture with the given configuration.
    ///
    /// A `sample_rate` of `None` asks for the device's native rate.
    fn open(&self, config: &CaptureConfig) -> Result<Self::Handle, DeviceError>;

    /// Information about the device this source is bound to.
    fn describe(&self) -> DeviceInfo;
}

/// Exclusive ownership of one opened input device.
pub trait DeviceHandle {
    /// Rate the device actually delivers, in Hz.
    fn sample_rate(&self) -> u32;

    /// Block until `window_size` mono samples are available.
    fn read(&mut self, window_size: usize) -> Result<RawFrame, DeviceError>;

    /// Stop delivering audio. Safe to call more than once.
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Release the device.
    fn close(self) -> Result<(), DeviceError>
    where
        Self: Sized;
}
