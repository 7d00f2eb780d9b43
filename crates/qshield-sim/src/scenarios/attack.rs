use crate::scenarios::{ChannelEvent, Scenario, due_events};
use rand_distr::{Distribution, Normal};

// --- 1. Intercept-Resend ---
/// Eve measures every photon in a random basis and resends it.
///
/// Error rates jump to roughly 25%, and the Bell test of the first round
/// under attack catches her.
pub struct InterceptResend {
    pub samples_per_sec: f64,
    pub induced_qber: f64,
    pub jitter: f64,
    bell_test_reported: bool,
    carry: f64,
}

impl InterceptResend {
    pub fn new(samples_per_sec: f64, induced_qber: f64) -> Self {
        Self {
            samples_per_sec,
            induced_qber,
            jitter: 0.02,
            bell_test_reported: false,
            carry: 0.0,
        }
    }
}

impl Scenario for InterceptResend {
    fn name(&self) -> &str {
        "Intercept-Resend"
    }

    fn tick(&mut self, _current_time_ns: u64, delta_ns: u64) -> Vec<ChannelEvent> {
        let mut events = Vec::new();
        if !self.bell_test_reported {
            self.bell_test_reported = true;
            events.push(ChannelEvent::Eavesdrop);
        }

        let count = due_events(self.samples_per_sec, delta_ns, &mut self.carry);
        let mut rng = rand::rng();
        let dist = Normal::new(self.induced_qber, self.jitter.max(f64::MIN_POSITIVE)).ok();
        for _ in 0..count {
            let qber = match &dist {
                Some(d) => d.sample(&mut rng).clamp(0.0, 1.0),
                None => self.induced_qber,
            };
            events.push(ChannelEvent::Sample(qber));
        }

        events
    }
}

// --- 2. Detector Alarm ---
/// The correlation anomaly detector fires once; the channel itself is quiet.
pub struct DetectorAlarm {
    fired: bool,
}

impl DetectorAlarm {
    pub fn new() -> Self {
        Self { fired: false }
    }
}

impl Default for DetectorAlarm {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario for DetectorAlarm {
    fn name(&self) -> &str {
        "Detector Alarm"
    }

    fn tick(&mut self, _current_time_ns: u64, _delta_ns: u64) -> Vec<ChannelEvent> {
        if self.fired {
            return Vec::new();
        }
        self.fired = true;
        vec![ChannelEvent::AnomalyFlag]
    }
}
