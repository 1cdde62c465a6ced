pub mod audio_device;
pub mod transport_sink;
