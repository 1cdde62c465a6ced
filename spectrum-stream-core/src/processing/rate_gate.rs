use std::time::{Duration, Instant};

/// Depth-one throttle for outgoing spectra.
///
/// Admits a call only when strictly more than one period has passed since
/// the last admitted call. Rejected calls are not queued and never cause a
/// catch-up emission later.
#[derive(Debug, Clone)]
pub struct RateGate {
    period: Duration,
    last_emit: Option<Instant>,
}

impl RateGate {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_emit: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Decide whether a spectrum ready at `now` goes out.
    pub fn admit(&mut self, now: Instant) -> bool {
        let open = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.period,
        };
        if open {
            self.last_emit = Some(now);
        }
        open
    }

    /// Forget the last emission so the next call is admitted.
    pub fn reset(&mut self) {
        self.last_emit = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admitted_over(gate: &mut RateGate, step: Duration, calls: u32) -> u32 {
        let base = Instant::now();
        (0..calls).filter(|&i| gate.admit(base + step * i)).count() as u32
    }

    #[test]
    fn first_call_is_admitted() {
        let mut gate = RateGate::new(Duration::from_millis(100));
        assert!(gate.admit(Instant::now()));
    }

    #[test]
    fn exactly_one_period_is_not_enough() {
        let mut gate = RateGate::new(Duration::from_millis(100));
        let t0 = Instant::now();

        assert!(gate.admit(t0));
        assert!(!gate.admit(t0 + Duration::from_millis(50)));
        assert!(!gate.admit(t0 + Duration::from_millis(100)));
        assert!(gate.admit(t0 + Duration::from_millis(101)));
    }

    #[test]
    fn fast_caller_is_capped_at_target_rate() {
        // 10 fps, called every millisecond for two seconds
        let mut gate = RateGate::new(Duration::from_millis(100));
        let admitted = admitted_over(&mut gate, Duration::from_millis(1), 2000);

        let expected = 10.0 * 2.0;
        assert!(
            (admitted as f64 - expected).abs() <= 1.0,
            "admitted {admitted}, expected about {expected}"
        );
    }

    #[test]
    fn slow_caller_is_always_admitted() {
        let mut gate = RateGate::new(Duration::from_millis(100));
        assert_eq!(admitted_over(&mut gate, Duration::from_millis(150), 20), 20);
    }

    #[test]
    fn rejected_calls_do_not_move_the_window() {
        let mut gate = RateGate::new(Duration::from_millis(100));
        let t0 = Instant::now();

        assert!(gate.admit(t0));
        for ms in (10..=100).step_by(10) {
            assert!(!gate.admit(t0 + Duration::from_millis(ms)));
        }
        assert!(gate.admit(t0 + Duration::from_millis(105)));
    }

    #[test]
    fn clock_going_backwards_is_rejected() {
        let mut gate = RateGate::new(Duration::from_millis(100));
        let t0 = Instant::now() + Duration::from_secs(1);

        assert!(gate.admit(t0));
        assert!(!gate.admit(t0 - Duration::from_millis(500)));
    }

    #[test]
    fn reset_reopens_gate() {
        let mut gate = RateGate::new(Duration::from_millis(100));
        let t0 = Instant::now();

        assert!(gate.admit(t0));
        gate.reset();
        assert!(gate.admit(t0 + Duration::from_millis(1)));
    }
}
