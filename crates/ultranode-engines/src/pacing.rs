use std::time::{Duration, Instant};

/// Absolute-deadline frame pacing (§4.2): sleeps to `previous_wake + period`
/// rather than a relative duration, so jitter in the render work doesn't
/// accumulate into long-run drift. No frame skipping is implemented — if a
/// render overruns its period the next wake is simply in the past and
/// `tick()` returns immediately, letting the loop free-run until it catches
/// back up.
pub struct FramePacer {
    period: Duration,
    next_wake: Instant,
}

impl FramePacer {
    pub fn new(frame_rate_hz: u32) -> Self {
        let hz = frame_rate_hz.max(1);
        let period = Duration::from_nanos(1_000_000_000 / hz as u64);
        Self { period, next_wake: Instant::now() + period }
    }

    pub fn period(&self) -> Duration { self.period }

    /// Block until this frame's deadline, then arm the next one.
    pub fn tick(&mut self) {
        let now = Instant::now();
        if self.next_wake > now {
            std::thread::sleep(self.next_wake - now);
        }
        self.next_wake += self.period;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_ticks_clamp_to_at_least_one_nanosecond_step() {
        let pacer = FramePacer::new(0);
        assert!(pacer.period() > Duration::from_nanos(0));
    }

    #[test]
    fn tick_advances_the_deadline_by_one_period_each_call() {
        let mut pacer = FramePacer::new(1000);
        let before = pacer.next_wake;
        pacer.tick();
        assert_eq!(pacer.next_wake, before + pacer.period);
    }
}
