//! Simulation Driver
//!
//! Feeds channel scenarios into a [`ThreatStateEngine`] tick by tick and
//! tracks when each injected attack was active, so a run can report how
//! quickly the engine reacted.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   SimulationDriver                      │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐ │
//! │  │  Scenarios  │  │  Scheduler  │  │  Ground Truth   │ │
//! │  │  (plugins)  │──│  (timing)   │──│  (tracking)     │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────┘ │
//! │         │                                              │
//! │         ▼                                              │
//! │  ┌──────────────────┐       ┌────────────────────┐     │
//! │  │ ThreatStateEngine│ ────▶ │     TickReport     │     │
//! │  └──────────────────┘       └────────────────────┘     │
//! └─────────────────────────────────────────────────────────┘
//! ```

use crate::scenarios::{self, ChannelEvent, Scenario};
use chrono::Utc;
use qshield_core::{SimulationState, ThreatLevel, ThreatStateEngine, ThreatStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Drives a threat-state engine with simulated channel traffic.
pub struct SimulationDriver {
    engine: ThreatStateEngine,

    /// Baseline scenario (always running)
    baseline: Option<Box<dyn Scenario>>,

    /// Scheduled attack scenarios
    scheduled: Vec<ScheduledScenario>,

    current_time_ns: u64,
    start_time_ns: u64,

    ground_truth: GroundTruthTracker,
    state: DriverState,
    stats: DriverStats,
}

struct ScheduledScenario {
    scenario: Box<dyn Scenario>,
    start_time_ns: u64,
    end_time_ns: u64,
    attack_id: String,
    activated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverState {
    Stopped,
    Running,
    Paused,
}

/// Window during which an injected attack was active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackWindow {
    pub attack_id: String,
    pub attack_type: String,
    pub start_time_ns: u64,
    pub end_time_ns: u64,
    pub event_count: u64,
    /// First time the engine left CALM while this attack was active
    pub detected_at_ns: Option<u64>,
}

impl AttackWindow {
    pub fn detection_latency_ns(&self) -> Option<u64> {
        self.detected_at_ns
            .map(|at| at.saturating_sub(self.start_time_ns))
    }
}

struct GroundTruthTracker {
    active: HashMap<String, AttackWindow>,
    completed: Vec<AttackWindow>,
}

impl GroundTruthTracker {
    fn new() -> Self {
        Self {
            active: HashMap::new(),
            completed: Vec::new(),
        }
    }

    fn start_attack(&mut self, id: String, attack_type: String, start_ns: u64, end_ns: u64) {
        self.active.insert(
            id.clone(),
            AttackWindow {
                attack_id: id,
                attack_type,
                start_time_ns: start_ns,
                end_time_ns: end_ns,
                event_count: 0,
                detected_at_ns: None,
            },
        );
    }

    fn record_events(&mut self, attack_id: &str, count: u64) {
        if let Some(window) = self.active.get_mut(attack_id) {
            window.event_count += count;
        }
    }

    fn mark_detected(&mut self, at_ns: u64) {
        for window in self.active.values_mut() {
            if window.detected_at_ns.is_none() {
                window.detected_at_ns = Some(at_ns);
            }
        }
    }

    fn finalize_attack(&mut self, id: &str, current_time_ns: u64) {
        if let Some(mut window) = self.active.remove(id) {
            window.end_time_ns = current_time_ns;
            self.completed.push(window);
        }
    }

    fn windows(&self) -> Vec<AttackWindow> {
        let mut all: Vec<AttackWindow> = self.completed.clone();
        let mut active: Vec<AttackWindow> = self.active.values().cloned().collect();
        active.sort_by_key(|w| w.start_time_ns);
        all.extend(active);
        all
    }

    fn reset(&mut self) {
        self.active.clear();
        self.completed.clear();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverStats {
    pub tick_count: u64,
    pub samples_observed: u64,
    pub alerts_raised: u64,
    pub eavesdrop_events: u64,
    pub anomaly_flags: u64,
    pub attacks_activated: u64,
    pub attacks_completed: u64,
}

/// Result of one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub timestamp_ns: u64,
    pub elapsed_ns: u64,
    pub events: Vec<ChannelEvent>,
    /// Alert messages raised during this tick, oldest first
    pub alerts: Vec<String>,
    pub threat_level: ThreatLevel,
    pub recommendation: String,
    pub snapshot: SimulationState,
    pub ground_truth: Vec<AttackWindow>,
    pub active_scenarios: Vec<String>,
}

fn now_ns() -> u64 {
    Utc::now()
        .timestamp_nanos_opt()
        .map(|ns| ns.max(0) as u64)
        .unwrap_or_default()
}

impl SimulationDriver {
    pub fn new(engine: ThreatStateEngine) -> Self {
        let now = now_ns();
        Self {
            engine,
            baseline: None,
            scheduled: Vec::new(),
            current_time_ns: now,
            start_time_ns: now,
            ground_truth: GroundTruthTracker::new(),
            state: DriverState::Stopped,
            stats: DriverStats::default(),
        }
    }

    /// Start from a clean engine with a baseline scenario.
    ///
    /// Unknown names fall back to the quiet channel.
    pub fn start(&mut self, baseline_scenario: &str) {
        self.reset();

        self.baseline = scenarios::create_scenario(baseline_scenario).or_else(|| {
            info!(requested = baseline_scenario, "unknown baseline, using quiet_channel");
            scenarios::create_scenario("quiet_channel")
        });

        self.start_time_ns = now_ns();
        self.current_time_ns = self.start_time_ns;
        self.state = DriverState::Running;
    }

    pub fn stop(&mut self) {
        self.state = DriverState::Stopped;
        self.baseline = None;
        self.scheduled.clear();
    }

    pub fn pause(&mut self) {
        if self.state == DriverState::Running {
            self.state = DriverState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == DriverState::Paused || self.state == DriverState::Stopped {
            self.state = DriverState::Running;
        }
    }

    /// Clear scenarios, ground truth and statistics, and reset the engine.
    pub fn reset(&mut self) {
        self.baseline = None;
        self.scheduled.clear();
        self.ground_truth.reset();
        self.stats = DriverStats::default();
        self.engine.reset();
    }

    /// Schedule an attack scenario relative to the current simulation time.
    pub fn schedule_attack(
        &mut self,
        scenario_name: &str,
        start_offset_ns: u64,
        duration_ns: u64,
    ) -> Option<String> {
        let scenario = scenarios::create_scenario(scenario_name)?;
        let attack_id = format!("{}_{}", scenario_name, &Uuid::new_v4().simple().to_string()[..8]);

        let start_time_ns = self.current_time_ns.saturating_add(start_offset_ns);
        let end_time_ns = start_time_ns.saturating_add(duration_ns);

        debug!(%attack_id, start_offset_ns, duration_ns, "attack scheduled");
        self.scheduled.push(ScheduledScenario {
            scenario,
            start_time_ns,
            end_time_ns,
            attack_id: attack_id.clone(),
            activated: false,
        });

        Some(attack_id)
    }

    /// Start an attack right away.
    pub fn inject_attack(&mut self, scenario_name: &str, duration_ms: u64) -> Option<String> {
        self.schedule_attack(scenario_name, 0, duration_ms.saturating_mul(1_000_000))
    }

    /// Advance by `delta_ns`, feeding every generated event to the engine.
    pub fn tick(&mut self, delta_ns: u64) -> TickReport {
        if self.state != DriverState::Running {
            return self.report(Vec::new(), Vec::new(), Vec::new());
        }

        let current = self.current_time_ns;
        let mut events: Vec<ChannelEvent> = Vec::new();
        let mut active_scenarios: Vec<String> = Vec::new();

        if let Some(ref mut baseline) = self.baseline {
            events.extend(baseline.tick(current, delta_ns));
            active_scenarios.push(baseline.name().to_string());
        }

        for scheduled in &mut self.scheduled {
            if !scheduled.activated && current >= scheduled.start_time_ns {
                scheduled.activated = true;
                self.stats.attacks_activated += 1;
                info!(attack_id = %scheduled.attack_id, kind = scheduled.scenario.name(), "attack started");
                self.ground_truth.start_attack(
                    scheduled.attack_id.clone(),
                    scheduled.scenario.name().to_string(),
                    scheduled.start_time_ns,
                    scheduled.end_time_ns,
                );
            }
        }

        let mut completed_indices: Vec<usize> = Vec::new();
        for (i, scheduled) in self.scheduled.iter_mut().enumerate() {
            if scheduled.activated && current < scheduled.end_time_ns {
                let attack_events = scheduled.scenario.tick(current, delta_ns);
                self.ground_truth
                    .record_events(&scheduled.attack_id, attack_events.len() as u64);
                active_scenarios.push(format!("{}(attack)", scheduled.scenario.name()));
                events.extend(attack_events);
            } else if scheduled.activated {
                self.ground_truth
                    .finalize_attack(&scheduled.attack_id, current);
                completed_indices.push(i);
            }
        }

        for i in completed_indices.iter().rev() {
            let done = self.scheduled.remove(*i);
            self.stats.attacks_completed += 1;
            info!(attack_id = %done.attack_id, "attack finished");
        }

        let alerts = self.apply(&events);

        self.current_time_ns = current.saturating_add(delta_ns);
        self.stats.tick_count += 1;

        if self.engine.status() != ThreatStatus::Calm {
            self.ground_truth.mark_detected(self.current_time_ns);
        }

        self.report(events, alerts, active_scenarios)
    }

    fn apply(&mut self, events: &[ChannelEvent]) -> Vec<String> {
        let mut alerts = Vec::new();
        for event in events {
            match *event {
                ChannelEvent::Sample(qber) => {
                    self.stats.samples_observed += 1;
                    let obs = self.engine.observe_error_rate_sample(qber);
                    if let Some(message) = obs.alert_message {
                        alerts.push(message);
                    }
                }
                ChannelEvent::Eavesdrop => {
                    self.stats.eavesdrop_events += 1;
                    self.engine.simulate_eavesdropping();
                    alerts.extend(self.latest_alert());
                }
                ChannelEvent::AnomalyFlag => {
                    self.stats.anomaly_flags += 1;
                    self.engine.trigger_anomaly();
                    alerts.extend(self.latest_alert());
                }
            }
        }
        self.stats.alerts_raised += alerts.len() as u64;
        alerts
    }

    fn latest_alert(&self) -> Option<String> {
        self.engine
            .state()
            .recent_alerts
            .latest()
            .map(|a| a.message.clone())
    }

    fn report(
        &self,
        events: Vec<ChannelEvent>,
        alerts: Vec<String>,
        active_scenarios: Vec<String>,
    ) -> TickReport {
        TickReport {
            timestamp_ns: self.current_time_ns,
            elapsed_ns: self.elapsed(),
            events,
            alerts,
            threat_level: self.engine.threat_level(),
            recommendation: self.engine.recommendation().to_string(),
            snapshot: self.engine.snapshot(),
            ground_truth: self.ground_truth.windows(),
            active_scenarios,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    pub fn engine(&self) -> &ThreatStateEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ThreatStateEngine {
        &mut self.engine
    }

    pub fn current_time(&self) -> u64 {
        self.current_time_ns
    }

    pub fn elapsed(&self) -> u64 {
        self.current_time_ns.saturating_sub(self.start_time_ns)
    }

    /// Attack windows seen so far, completed first.
    pub fn ground_truth(&self) -> Vec<AttackWindow> {
        self.ground_truth.windows()
    }

    pub fn tick_ms(&mut self, delta_ms: u64) -> TickReport {
        self.tick(delta_ms.saturating_mul(1_000_000))
    }

    pub fn tick_json(&mut self, delta_ns: u64) -> String {
        let report = self.tick(delta_ns);
        serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new(ThreatStateEngine::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qshield_core::EngineConfig;

    fn driver() -> SimulationDriver {
        SimulationDriver::new(ThreatStateEngine::new(EngineConfig {
            seed: Some(11),
            ..EngineConfig::default()
        }))
    }

    #[test]
    fn test_driver_lifecycle() {
        let mut driver = driver();
        assert_eq!(driver.state(), DriverState::Stopped);

        driver.start("quiet_channel");
        assert_eq!(driver.state(), DriverState::Running);

        driver.pause();
        assert_eq!(driver.state(), DriverState::Paused);

        driver.resume();
        assert_eq!(driver.state(), DriverState::Running);

        driver.stop();
        assert_eq!(driver.state(), DriverState::Stopped);
    }

    #[test]
    fn test_paused_tick_is_empty() {
        let mut driver = driver();
        driver.start("quiet_channel");
        driver.pause();

        let report = driver.tick_ms(1000);
        assert!(report.events.is_empty());
        assert_eq!(driver.stats().tick_count, 0);
    }

    #[test]
    fn test_quiet_baseline_stays_calm() {
        let mut driver = driver();
        driver.start("quiet_channel");

        for _ in 0..20 {
            let report = driver.tick_ms(500);
            assert!(report.alerts.is_empty());
        }

        assert_eq!(driver.engine().status(), ThreatStatus::Calm);
        assert_eq!(driver.stats().samples_observed, 20);
        assert!((driver.engine().anomaly_score() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_injected_attack_is_detected() {
        let mut driver = driver();
        driver.start("quiet_channel");
        let id = driver.inject_attack("intercept_resend", 2000).unwrap();

        let report = driver.tick_ms(500);
        assert!(report.snapshot.is_under_attack);
        assert_eq!(report.threat_level, ThreatLevel::High);
        assert!(!report.alerts.is_empty());

        let window = report
            .ground_truth
            .iter()
            .find(|w| w.attack_id == id)
            .unwrap();
        assert_eq!(window.detection_latency_ns(), Some(500_000_000));
    }

    #[test]
    fn test_attack_window_completes() {
        let mut driver = driver();
        driver.start("quiet_channel");
        driver.inject_attack("detector_alarm", 1000);

        for _ in 0..4 {
            driver.tick_ms(500);
        }

        assert_eq!(driver.stats().attacks_activated, 1);
        assert_eq!(driver.stats().attacks_completed, 1);
        assert_eq!(driver.stats().anomaly_flags, 1);
        assert_eq!(driver.ground_truth().len(), 1);
    }

    #[test]
    fn test_huge_durations_saturate() {
        let mut driver = driver();
        driver.start("quiet_channel");
        assert!(driver.inject_attack("detector_alarm", u64::MAX).is_some());
        assert!(driver.schedule_attack("intercept_resend", u64::MAX, u64::MAX).is_some());

        let report = driver.tick_ms(u64::MAX);
        assert_eq!(report.timestamp_ns, u64::MAX);
        assert!(report.snapshot.is_under_attack);
        assert_eq!(driver.stats().attacks_activated, 1);
        assert_eq!(driver.stats().samples_observed, scenarios::MAX_EVENTS_PER_TICK);

        // Clock is pinned at the top; further ticks must not wrap.
        driver.tick_ms(500);
        assert_eq!(driver.current_time(), u64::MAX);
    }

    #[test]
    fn test_unknown_attack_is_rejected() {
        let mut driver = driver();
        driver.start("quiet_channel");
        assert!(driver.inject_attack("quantum_teleport", 1000).is_none());
    }
}
