use crate::scenarios::{ChannelEvent, Scenario, due_events};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};

// --- 1. Quiet Channel ---
/// Healthy fibre link: QBER drawn uniformly from `[low, high)`.
pub struct QuietChannel {
    pub samples_per_sec: f64,
    pub low: f64,
    pub high: f64,
    carry: f64,
}

impl QuietChannel {
    pub fn new(samples_per_sec: f64) -> Self {
        Self {
            samples_per_sec,
            low: 0.02,
            high: 0.06,
            carry: 0.0,
        }
    }
}

impl Scenario for QuietChannel {
    fn name(&self) -> &str {
        "Quiet Channel"
    }

    fn tick(&mut self, _current_time_ns: u64, delta_ns: u64) -> Vec<ChannelEvent> {
        let count = due_events(self.samples_per_sec, delta_ns, &mut self.carry);
        let mut rng = rand::rng();
        (0..count)
            .map(|_| ChannelEvent::Sample(rng.random_range(self.low..self.high)))
            .collect()
    }
}

// --- 2. Noisy Channel ---
/// Link whose mean QBER drifts from `start_qber` to `end_qber` over
/// `ramp_secs`, then stays there.
pub struct NoisyChannel {
    pub samples_per_sec: f64,
    pub start_qber: f64,
    pub end_qber: f64,
    pub ramp_secs: f64,
    pub jitter: f64,
    elapsed_secs: f64,
    carry: f64,
}

impl NoisyChannel {
    pub fn new(samples_per_sec: f64, start_qber: f64, end_qber: f64, ramp_secs: f64) -> Self {
        Self {
            samples_per_sec,
            start_qber,
            end_qber,
            ramp_secs,
            jitter: 0.01,
            elapsed_secs: 0.0,
            carry: 0.0,
        }
    }

    /// Mean QBER at the current point of the ramp.
    pub fn current_mean(&self) -> f64 {
        let progress = if self.ramp_secs > 0.0 {
            (self.elapsed_secs / self.ramp_secs).min(1.0)
        } else {
            1.0
        };
        self.start_qber + (self.end_qber - self.start_qber) * progress
    }
}

impl Scenario for NoisyChannel {
    fn name(&self) -> &str {
        "Noisy Channel"
    }

    fn tick(&mut self, _current_time_ns: u64, delta_ns: u64) -> Vec<ChannelEvent> {
        self.elapsed_secs += delta_ns as f64 / 1_000_000_000.0;
        let count = due_events(self.samples_per_sec, delta_ns, &mut self.carry);

        let mean = self.current_mean();
        let mut rng = rand::rng();
        match Normal::new(mean, self.jitter.max(f64::MIN_POSITIVE)) {
            Ok(dist) => (0..count)
                .map(|_| ChannelEvent::Sample(dist.sample(&mut rng).clamp(0.0, 1.0)))
                .collect(),
            Err(_) => (0..count).map(|_| ChannelEvent::Sample(mean)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(events: &[ChannelEvent]) -> Vec<f64> {
        events
            .iter()
            .filter_map(|e| match e {
                ChannelEvent::Sample(q) => Some(*q),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_quiet_channel_stays_below_threshold() {
        let mut channel = QuietChannel::new(10.0);
        let events = channel.tick(0, 5_000_000_000);
        let qber = samples(&events);

        assert_eq!(qber.len(), 50);
        assert!(qber.iter().all(|q| (0.02..0.06).contains(q)));
    }

    #[test]
    fn test_noisy_channel_ramps() {
        let mut channel = NoisyChannel::new(1.0, 0.02, 0.10, 10.0);
        assert!((channel.current_mean() - 0.02).abs() < 1e-12);

        channel.tick(0, 5_000_000_000);
        assert!((channel.current_mean() - 0.06).abs() < 1e-9);

        channel.tick(0, 20_000_000_000);
        assert!((channel.current_mean() - 0.10).abs() < 1e-12);
    }
}
