//! Silence synthesis: the non-trivial policy that keeps an idle audio
//! stream's timeline continuous.
//!
//! Pure state machine, deliberately free of any OS handle so it can be
//! unit-tested without a real audio device: driven entirely by elapsed wall
//! time, producing a sample-count delta.

use std::time::Instant;

/// One audio source's idle-period bookkeeping.
///
/// Reset whenever the underlying hardware delivers a real (non-idle)
/// packet, so each silent stretch starts its own wall-clock baseline rather
/// than accumulating drift across interleaved real/silent periods.
#[derive(Debug)]
pub struct SilenceGenerator {
    sample_rate: u32,
    start_time: Option<Instant>,
    total_generated_samples: u64,
}

impl SilenceGenerator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            start_time: None,
            total_generated_samples: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn total_generated_samples(&self) -> u64 {
        self.total_generated_samples
    }

    /// Called whenever the hardware delivers a real packet — ends the
    /// current idle stretch, if any.
    pub fn reset(&mut self) {
        self.start_time = None;
        self.total_generated_samples = 0;
    }

    /// Called on every idle poll. Returns the number of synthetic frames to
    /// emit this call; `0` means "stay `Idle`, do not advance."
    ///
    /// `expected_samples = sample_rate * elapsed_ms / 1000`; the generator
    /// never emits more than it needs to catch up to that line, and never
    /// more than a 50 ms chunk per call (matching the audio ring's own
    /// buffer duration).
    pub fn poll(&mut self, now: Instant) -> u64 {
        let start = *self.start_time.get_or_insert(now);
        let elapsed_ms = now.duration_since(start).as_millis() as u64;
        let expected_samples = (self.sample_rate as u64 * elapsed_ms) / 1000;

        if self.total_generated_samples >= expected_samples {
            return 0;
        }

        let max_chunk = (self.sample_rate as u64 * 50) / 1000;
        let frames = (expected_samples - self.total_generated_samples).min(max_chunk);
        self.total_generated_samples += frames;
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_poll_starts_the_clock_and_may_return_zero() {
        let mut gen = SilenceGenerator::new(48_000);
        let t0 = Instant::now();
        // elapsed == 0 on the very first poll, so expected_samples == 0.
        assert_eq!(gen.poll(t0), 0);
    }

    #[test]
    fn emits_expected_samples_after_elapsed_time() {
        let mut gen = SilenceGenerator::new(48_000);
        let t0 = Instant::now();
        gen.poll(t0);
        let t1 = t0 + Duration::from_millis(20);
        let frames = gen.poll(t1);
        // 48000 * 20ms / 1000 = 960, under the 50ms/2400-frame cap.
        assert_eq!(frames, 960);
        assert_eq!(gen.total_generated_samples(), 960);
    }

    #[test]
    fn caps_a_single_chunk_at_fifty_milliseconds() {
        let mut gen = SilenceGenerator::new(48_000);
        let t0 = Instant::now();
        gen.poll(t0);
        let t1 = t0 + Duration::from_millis(500);
        let frames = gen.poll(t1);
        assert_eq!(frames, 48_000 * 50 / 1000);
    }

    #[test]
    fn does_not_overshoot_expected_once_caught_up() {
        let mut gen = SilenceGenerator::new(44_100);
        let t0 = Instant::now();
        gen.poll(t0);
        let t1 = t0 + Duration::from_millis(10);
        let first = gen.poll(t1);
        let second = gen.poll(t1);
        assert!(first > 0);
        assert_eq!(second, 0);
    }

    #[test]
    fn reset_starts_a_fresh_idle_stretch() {
        let mut gen = SilenceGenerator::new(48_000);
        let t0 = Instant::now();
        gen.poll(t0);
        gen.poll(t0 + Duration::from_millis(20));
        assert!(gen.total_generated_samples() > 0);
        gen.reset();
        assert_eq!(gen.total_generated_samples(), 0);
    }
}
