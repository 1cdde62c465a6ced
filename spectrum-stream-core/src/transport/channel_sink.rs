use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::error::StreamError;
use crate::models::session_report::SessionReport;
use crate::models::spectrum::SpectralFrame;
use crate::models::state::StreamState;
use crate::traits::transport_sink::TransportSink;

/// Everything a streamer reports, as one message type.
///
/// Serializes to tagged JSON for a web layer to relay:
/// ```text
/// {"event": "spectrum", "freqs": [...], "mags": [...], "samples": [...]}
/// {"event": "audio_error", "error": "..."}
/// {"event": "state_changed", "state": "streaming"}
/// {"event": "session_finished", "id": "...", ...}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SinkEvent {
    Spectrum(SpectralFrame),
    #[serde(rename = "audio_error")]
    Error { error: String },
    StateChanged { state: StreamState },
    SessionFinished(SessionReport),
}

impl SinkEvent {
    pub fn to_json(&self) -> Result<String, StreamError> {
        serde_json::to_string(self)
            .map_err(|e| StreamError::Unknown(format!("failed to serialize event: {}", e)))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Spectrum(_) => "spectrum",
            Self::Error { .. } => "audio_error",
            Self::StateChanged { .. } => "state_changed",
            Self::SessionFinished(_) => "session_finished",
        }
    }
}

/// Transport sink backed by a channel with a bounded spectrum backlog.
///
/// Never blocks the capture thread. Only spectra count against the
/// capacity: when the receiver falls behind the newest spectrum is dropped,
/// and the consumer simply sees a fresher frame next time. Errors, state
/// changes and session reports are always delivered.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
    queued: Arc<AtomicUsize>,
    capacity: usize,
}

impl ChannelSink {
    /// A sink holding at most `capacity` undelivered spectra (at least one).
    pub fn bounded(capacity: usize) -> (Self, SinkReceiver) {
        let (tx, rx) = mpsc::channel();
        let queued = Arc::new(AtomicUsize::new(0));
        let sink = Self {
            tx,
            queued: Arc::clone(&queued),
            capacity: capacity.max(1),
        };
        (sink, SinkReceiver { rx, queued })
    }

    fn send_spectrum(&self, frame: SpectralFrame) {
        let reserved = self
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .is_ok();
        if !reserved {
            log::debug!("sink backlog full; dropped spectrum event");
            return;
        }
        if self.tx.send(SinkEvent::Spectrum(frame)).is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            log::debug!("sink receiver gone; dropped spectrum event");
        }
    }

    fn send(&self, event: SinkEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            log::debug!("sink receiver gone; dropped {kind} event");
        }
    }
}

/// Receiving end of a [`ChannelSink`].
///
/// Mirrors the `std::sync::mpsc::Receiver` calls; every spectrum taken off
/// the channel frees one slot of the sink's backlog.
#[derive(Debug)]
pub struct SinkReceiver {
    rx: Receiver<SinkEvent>,
    queued: Arc<AtomicUsize>,
}

impl SinkReceiver {
    pub fn recv(&self) -> Result<SinkEvent, RecvError> {
        self.rx.recv().map(|event| self.taken(event))
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<SinkEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout).map(|event| self.taken(event))
    }

    pub fn try_recv(&self) -> Result<SinkEvent, TryRecvError> {
        self.rx.try_recv().map(|event| self.taken(event))
    }

    /// Drain whatever is queued right now without blocking.
    pub fn try_iter(&self) -> impl Iterator<Item = SinkEvent> + '_ {
        std::iter::from_fn(move || self.try_recv().ok())
    }

    fn taken(&self, event: SinkEvent) -> SinkEvent {
        if matches!(event, SinkEvent::Spectrum(_)) {
            self.queued.fetch_sub(1, Ordering::AcqRel);
        }
        event
    }
}

impl TransportSink for ChannelSink {
    fn emit(&self, frame: SpectralFrame) {
        self.send_spectrum(frame);
    }

    fn emit_error(&self, message: &str) {
        self.send(SinkEvent::Error {
            error: message.to_string(),
        });
    }

    fn on_state_changed(&self, state: StreamState) {
        self.send(SinkEvent::StateChanged { state });
    }

    fn on_session_finished(&self, report: &SessionReport) {
        self.send(SinkEvent::SessionFinished(report.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(level: f32) -> SpectralFrame {
        SpectralFrame {
            freqs: vec![100.0],
            mags: vec![level],
            samples: None,
        }
    }

    #[test]
    fn forwards_events_in_order() {
        let (sink, rx) = ChannelSink::bounded(8);

        sink.on_state_changed(StreamState::Streaming);
        sink.emit(frame(1.0));
        sink.emit(frame(2.0));
        sink.emit_error("device unplugged");

        let events: Vec<SinkEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                SinkEvent::StateChanged { state: StreamState::Streaming },
                SinkEvent::Spectrum(frame(1.0)),
                SinkEvent::Spectrum(frame(2.0)),
                SinkEvent::Error { error: "device unplugged".into() },
            ]
        );
    }

    #[test]
    fn full_backlog_drops_spectra_without_blocking() {
        let (sink, rx) = ChannelSink::bounded(1);

        sink.emit(frame(1.0));
        sink.emit(frame(2.0));

        assert_eq!(rx.try_recv().unwrap(), SinkEvent::Spectrum(frame(1.0)));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn errors_and_lifecycle_events_survive_a_full_backlog() {
        let (sink, rx) = ChannelSink::bounded(2);
        for level in 0..5 {
            sink.emit(frame(level as f32));
        }

        sink.emit_error("Error reading audio data");
        sink.on_state_changed(StreamState::Idle);
        sink.on_session_finished(&SessionReport::begin(256));

        let events: Vec<SinkEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], SinkEvent::Spectrum(frame(0.0)));
        assert_eq!(events[1], SinkEvent::Spectrum(frame(1.0)));
        assert_eq!(events[2], SinkEvent::Error { error: "Error reading audio data".into() });
        assert_eq!(events[3], SinkEvent::StateChanged { state: StreamState::Idle });
        assert!(matches!(events[4], SinkEvent::SessionFinished(_)));
    }

    #[test]
    fn draining_frees_backlog_slots() {
        let (sink, rx) = ChannelSink::bounded(1);

        sink.emit(frame(1.0));
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), SinkEvent::Spectrum(frame(1.0)));

        sink.emit(frame(2.0));
        assert_eq!(rx.recv().unwrap(), SinkEvent::Spectrum(frame(2.0)));
    }

    #[test]
    fn dropped_receiver_is_tolerated() {
        let (sink, rx) = ChannelSink::bounded(1);
        drop(rx);
        sink.emit(frame(1.0));
        sink.emit_error("ignored");
    }

    #[test]
    fn error_event_json_shape() {
        let event = SinkEvent::Error { error: "Unable to start audio stream".into() };
        assert_eq!(
            event.to_json().unwrap(),
            r#"{"event":"audio_error","error":"Unable to start audio stream"}"#
        );
    }

    #[test]
    fn spectrum_event_json_is_flat() {
        let json = SinkEvent::Spectrum(frame(-6.0)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["event"], "spectrum");
        assert_eq!(value["freqs"], serde_json::json!([100.0]));
        assert_eq!(value["mags"], serde_json::json!([-6.0]));
    }

    #[test]
    fn state_event_json_shape() {
        let json = SinkEvent::StateChanged { state: StreamState::Idle }.to_json().unwrap();
        assert_eq!(json, r#"{"event":"state_changed","state":"idle"}"#);
    }
}
