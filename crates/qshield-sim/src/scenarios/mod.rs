//! Channel Scenarios
//!
//! Pluggable generators of key distribution channel events:
//! - **channel**: quiet and degrading (noisy) links
//! - **attack**: intercept-resend eavesdropper, detector alarm

pub mod attack;
pub mod channel;

use serde::{Deserialize, Serialize};

/// One thing that happened on the channel during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// A QBER measurement
    Sample(f64),
    /// The protocol's Bell test caught an eavesdropper
    Eavesdrop,
    /// The anomaly detector fired on its own
    AnomalyFlag,
}

/// Trait for channel scenarios
///
/// `tick` is called with the current simulation time and the time elapsed
/// since the previous tick, and returns the events produced in that span.
pub trait Scenario: Send {
    /// Human-readable name of the scenario
    fn name(&self) -> &str;

    fn tick(&mut self, current_time_ns: u64, delta_ns: u64) -> Vec<ChannelEvent>;
}

pub use attack::{DetectorAlarm, InterceptResend};
pub use channel::{NoisyChannel, QuietChannel};

/// Create a scenario by name with default parameters
pub fn create_scenario(name: &str) -> Option<Box<dyn Scenario>> {
    match name.to_lowercase().as_str() {
        "quiet_channel" | "normal" => Some(Box::new(QuietChannel::new(2.0))),
        "noisy_channel" | "degrading" => Some(Box::new(NoisyChannel::new(2.0, 0.02, 0.10, 30.0))),
        "intercept_resend" | "eavesdropper" => Some(Box::new(InterceptResend::new(2.0, 0.25))),
        "detector_alarm" | "anomaly" => Some(Box::new(DetectorAlarm::new())),
        _ => None,
    }
}

/// List all available scenarios
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("quiet_channel", "Healthy link, QBER 2-6%"),
        ("noisy_channel", "Link degrading towards the abort threshold"),
        ("intercept_resend", "Eavesdropper measuring and resending photons"),
        ("detector_alarm", "Anomaly detector fires without channel evidence"),
    ]
}

/// Upper bound on events a scenario emits in one tick.
pub const MAX_EVENTS_PER_TICK: u64 = 10_000;

/// Number of events due in this tick, carrying the fractional part over.
///
/// Ticks that would produce more than [`MAX_EVENTS_PER_TICK`] are cut
/// short and drop the remainder.
pub(crate) fn due_events(rate_per_sec: f64, delta_ns: u64, carry: &mut f64) -> u64 {
    let exact = rate_per_sec.max(0.0) * delta_ns as f64 / 1_000_000_000.0 + *carry;
    if exact >= MAX_EVENTS_PER_TICK as f64 {
        *carry = 0.0;
        return MAX_EVENTS_PER_TICK;
    }
    let whole = exact.floor();
    *carry = exact - whole;
    whole as u64
}
