use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::state::StreamState;
use crate::traits::transport_sink::TransportSink;

/// The one piece of state shared by the controlling thread and the
/// capture thread. Every change is reported to the sink.
pub(crate) struct StateCell {
    state: Mutex<StreamState>,
    changed: Condvar,
    sink: Arc<dyn TransportSink>,
}

impl StateCell {
    pub(crate) fn new(sink: Arc<dyn TransportSink>) -> Self {
        Self {
            state: Mutex::new(StreamState::Idle),
            changed: Condvar::new(),
            sink,
        }
    }

    pub(crate) fn get(&self) -> StreamState {
        *self.state.lock()
    }

    pub(crate) fn set(&self, new_state: StreamState) {
        let changed = {
            let mut state = self.state.lock();
            let changed = *state != new_state;
            *state = new_state;
            changed
        };
        if changed {
            self.changed.notify_all();
            self.sink.on_state_changed(new_state);
        }
    }

    /// Move to `to` only if the current state is `from`.
    pub(crate) fn transition(&self, from: StreamState, to: StreamState) -> bool {
        {
            let mut state = self.state.lock();
            if *state != from {
                return false;
            }
            *state = to;
        }
        if from != to {
            self.changed.notify_all();
            self.sink.on_state_changed(to);
        }
        true
    }

    /// Block while the state is still `current`, for at most `timeout`.
    ///
    /// Returns the state seen on wake-up.
    pub(crate) fn wait_while(&self, current: StreamState, timeout: Duration) -> StreamState {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while *state == current {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
        *state
    }
}
