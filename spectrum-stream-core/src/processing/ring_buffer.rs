use std::collections::VecDeque;

/// Bounded FIFO of 16-bit samples between an audio callback and a
/// window-sized reader.
///
/// Once full, new samples push the oldest ones out, so a reader that fell
/// behind resumes on recent audio. Wrap in `parking_lot::Mutex` to share it.
#[derive(Debug)]
pub struct RingBuffer {
    samples: VecDeque<i16>,
    capacity: usize,
    dropped: u64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append samples, evicting from the front as needed.
    pub fn write(&mut self, incoming: &[i16]) {
        let keep = incoming.len().min(self.capacity);
        let skipped = incoming.len() - keep;

        let evict = (self.samples.len() + keep).saturating_sub(self.capacity);
        self.samples.drain(..evict);
        self.samples.extend(&incoming[skipped..]);

        self.dropped += (skipped + evict) as u64;
    }

    /// Take exactly `count` samples from the front, or none at all.
    pub fn read_exact(&mut self, count: usize) -> Option<Vec<i16>> {
        if count == 0 || count > self.samples.len() {
            return None;
        }
        Some(self.samples.drain(..count).collect())
    }

    /// Samples waiting to be read.
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples lost to eviction since creation or the last reset.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.dropped = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
