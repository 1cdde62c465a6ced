use crate::models::session_report::SessionReport;
use crate::models::spectrum::SpectralFrame;
use crate::models::state::StreamState;

/// Downstream consumer of finished spectra.
///
/// All methods are called from the capture thread (state changes may also
/// come from the thread calling `start`/`stop`). Implementations must
/// return quickly; anything that can block belongs on another thread.
pub trait TransportSink: Send + Sync {
    /// Called with each spectrum admitted by the rate gate, in capture order.
    fn emit(&self, frame: SpectralFrame);

    /// Called when a session fails (device never opened, read failed).
    fn emit_error(&self, message: &str);

    /// Called whenever the streamer changes state.
    fn on_state_changed(&self, _state: StreamState) {}

    /// Called once per session after the device has been released.
    fn on_session_finished(&self, _report: &SessionReport) {}
}
