//! Threat State Engine
//!
//! Owns the [`SimulationState`] and maps each dashboard event to a new state
//! plus a derived threat level and recommendation. The engine never renders,
//! never sleeps, and performs no I/O; callers serialize access and re-render
//! from the returned snapshots.
//!
//! ## Threat status
//!
//! ```text
//!            high sample (score >= 1.0)
//!   CALM  ─────────────────────────────▶  MONITORING
//!    ▲  ◀─────────────────────────────     │
//!    │      low samples (score < 0.5)      │ trigger_anomaly /
//!    │                                     │ simulate_eavesdropping
//!    │ reset                               ▼
//!    └───────────────────────────────  UNDER_ATTACK
//! ```
//!
//! Triggers move any state to UNDER_ATTACK. Only `reset` leaves it.

use crate::classify::{self, ThreatLevel};
use crate::config::{DEFAULT_ASSETS, DemoAssets, EngineConfig};
use crate::entropy::{HealthPolicy, HealthReport, RandomnessQuality};
use crate::error::{EngineError, EngineResult};
use crate::history::{self, HistoryAssessment};
use crate::state::{
    Alert, AlertLog, AlertSeverity, KeyExchangeProfiles, KeyExchangeStats, ProfileKind,
    SimulationState, ThreatStatus,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

pub const CLASSICAL_LIMIT: f64 = 2.0;
/// Tsirelson bound, 2√2
pub const QUANTUM_LIMIT: f64 = 2.828;
pub const BELL_ALARM_BELOW: f64 = 2.1;

/// Result of feeding one QBER sample to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub new_anomaly_score: f64,
    pub alert_emitted: bool,
    pub alert_message: Option<String>,
}

/// Result of a key exchange run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchangeOutcome {
    /// Pseudo-random '0'/'1' string. Illustrative only.
    pub shared_key: String,
    pub stats: KeyExchangeStats,
    pub profile: ProfileKind,
    pub requested_pairs: u32,
    /// xxh3 of the key bits, for display
    pub fingerprint: String,
    pub secure: bool,
    pub recommendation: String,
    pub health: HealthReport,
    pub quality: RandomnessQuality,
}

/// Illustrative CHSH inequality check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BellTestReport {
    pub s_parameter: f64,
    pub bell_violation: bool,
    pub classical_limit: f64,
    pub quantum_limit: f64,
    pub security_level: ThreatLevel,
    pub security_margin: f64,
    pub alarm: bool,
}

pub struct ThreatStateEngine {
    config: EngineConfig,
    assets: DemoAssets,
    state: SimulationState,
    health: HealthPolicy,
    rng: StdRng,
}

impl ThreatStateEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_assets(config, DEFAULT_ASSETS.clone())
    }

    /// Build an engine. A config that fails [`EngineConfig::validate`] is
    /// replaced by the defaults (keeping its seed) and logged.
    pub fn with_assets(config: EngineConfig, assets: DemoAssets) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!(error = %e, "Rejected engine config, using defaults");
                EngineConfig {
                    seed: config.seed,
                    ..EngineConfig::default()
                }
            }
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let state = default_state(&config, &assets);
        Self {
            config,
            assets,
            state,
            health: HealthPolicy::default(),
            rng,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn assets(&self) -> &DemoAssets {
        &self.assets
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn snapshot(&self) -> SimulationState {
        self.state.clone()
    }

    pub fn snapshot_json(&self) -> String {
        serde_json::to_string(&self.state).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn status(&self) -> ThreatStatus {
        self.state.status
    }

    pub fn anomaly_score(&self) -> f64 {
        self.state.anomaly_score
    }

    pub fn is_under_attack(&self) -> bool {
        self.state.is_under_attack
    }

    /// Swap the display constants (e.g. after loading overrides).
    pub fn replace_assets(&mut self, assets: DemoAssets) {
        self.state.profiles = classified_profiles(&self.config, &assets);
        self.assets = assets;
    }

    /// Feed one QBER observation.
    ///
    /// The sample is taken as-is: no range check, no clamping. A NaN sample
    /// compares false against the threshold and is treated as a low sample.
    pub fn observe_error_rate_sample(&mut self, sample: f64) -> Observation {
        let threshold = self.config.qber_threshold;
        let prior = self.state.anomaly_score;

        let alert_message = if sample > threshold {
            self.state.anomaly_score = self
                .config
                .clamp_score(prior + self.config.high_sample_step);
            let message = format!(
                "High QBER detected: {:.3} (threshold: {})",
                sample, threshold
            );
            self.push_alert(AlertSeverity::Warning, message.clone());
            Some(message)
        } else {
            let decayed = (prior - self.config.low_sample_step).max(self.config.score_floor);
            self.state.anomaly_score = self.config.clamp_score(decayed);
            None
        };

        self.record_sample(sample);
        self.update_status();

        debug!(
            sample,
            prior,
            score = self.state.anomaly_score,
            status = ?self.state.status,
            "QBER sample observed"
        );

        Observation {
            new_anomaly_score: self.state.anomaly_score,
            alert_emitted: alert_message.is_some(),
            alert_message,
        }
    }

    /// Force the attack state, as if the anomaly detector fired.
    pub fn trigger_anomaly(&mut self) -> SimulationState {
        self.force_attack();
        self.push_alert(
            AlertSeverity::Critical,
            "AI anomaly detector flagged abnormal correlation pattern - channel marked compromised",
        );
        info!(score = self.state.anomaly_score, "Anomaly triggered");
        self.snapshot()
    }

    /// Model an eavesdropper on the channel.
    pub fn simulate_eavesdropping(&mut self) -> SimulationState {
        self.force_attack();
        let qber = self.state.profiles.under_attack.qber;
        self.push_alert(
            AlertSeverity::Critical,
            format!(
                "Eavesdropping detected: QBER {:.3} exceeds threshold {}",
                qber, self.config.qber_threshold
            ),
        );
        warn!(qber, "Eavesdropper simulated on key distribution channel");
        self.snapshot()
    }

    /// Run an illustrative key exchange against the active profile.
    pub fn start_key_exchange(&mut self, pair_count: i64) -> EngineResult<KeyExchangeOutcome> {
        if pair_count < 1 {
            return Err(EngineError::InvalidArgument(format!(
                "pair_count must be >= 1 (got {})",
                pair_count
            )));
        }
        let requested_pairs = u32::try_from(pair_count).map_err(|_| {
            EngineError::InvalidArgument(format!("pair_count too large (got {})", pair_count))
        })?;

        let profile = self.state.active_profile_kind();
        let stats = self.state.profiles.get(profile).clone();
        let shared_key = self.random_bits(stats.shared_key_length as usize);
        let fingerprint = format!(
            "{:016x}",
            xxhash_rust::xxh3::xxh3_64(shared_key.as_bytes())
        );

        info!(
            profile = profile.name(),
            requested_pairs,
            key_len = shared_key.len(),
            qber = stats.qber,
            "Key exchange completed"
        );

        Ok(KeyExchangeOutcome {
            secure: stats.qber < self.config.qber_threshold,
            recommendation: self.recommendation().to_string(),
            health: self.health.check(&shared_key),
            quality: RandomnessQuality::assess(&shared_key),
            shared_key,
            stats,
            profile,
            requested_pairs,
            fingerprint,
        })
    }

    /// Key exchange with the configured default pair count.
    pub fn start_default_key_exchange(&mut self) -> EngineResult<KeyExchangeOutcome> {
        self.start_key_exchange(self.config.default_pair_count)
    }

    /// Illustrative CHSH test. Under attack the value falls to the classical range.
    pub fn bell_test(&mut self) -> BellTestReport {
        let s = if self.state.is_under_attack {
            self.rng.random_range(1.6..CLASSICAL_LIMIT)
        } else {
            self.rng.random_range(2.3..2.7)
        };
        let bell_violation = s > CLASSICAL_LIMIT;
        BellTestReport {
            s_parameter: s,
            bell_violation,
            classical_limit: CLASSICAL_LIMIT,
            quantum_limit: QUANTUM_LIMIT,
            security_level: if bell_violation {
                ThreatLevel::High
            } else {
                ThreatLevel::Low
            },
            security_margin: (s - CLASSICAL_LIMIT).max(0.0),
            alarm: s < BELL_ALARM_BELOW,
        }
    }

    /// Restore every field to its default.
    pub fn reset(&mut self) -> SimulationState {
        self.state = default_state(&self.config, &self.assets);
        info!("Simulation state reset");
        self.snapshot()
    }

    pub fn classify_threat_level(&self, score: f64) -> ThreatLevel {
        classify::classify_threat_level(score)
    }

    pub fn recommendation_for(&self, score: f64) -> &'static str {
        classify::recommendation_for(score)
    }

    /// Threat level for the current score.
    pub fn threat_level(&self) -> ThreatLevel {
        classify::classify_threat_level(self.state.anomaly_score)
    }

    /// Recommendation for the current score.
    pub fn recommendation(&self) -> &'static str {
        classify::recommendation_for(self.state.anomaly_score)
    }

    /// Assess the recorded QBER history together with caller-supplied entropy readings.
    pub fn assess_history(&self, entropy: &[f64]) -> HistoryAssessment {
        history::assess_history(
            entropy.iter().copied(),
            self.state.qber_history.iter().copied(),
            self.config.qber_threshold,
        )
    }

    fn force_attack(&mut self) {
        self.state.is_under_attack = true;
        self.state.anomaly_score = self.config.clamp_score(self.config.forced_attack_score);
        self.update_status();
    }

    fn push_alert(&mut self, severity: AlertSeverity, message: impl Into<String>) {
        self.state.recent_alerts.push(Alert::new(severity, message));
    }

    fn record_sample(&mut self, sample: f64) {
        let history = &mut self.state.qber_history;
        history.push_back(sample);
        while history.len() > self.config.history_capacity {
            history.pop_front();
        }
    }

    fn update_status(&mut self) {
        let score = self.state.anomaly_score;
        let next = if self.state.is_under_attack {
            ThreatStatus::UnderAttack
        } else {
            match self.state.status {
                ThreatStatus::Calm if score >= self.config.monitoring_enter => {
                    ThreatStatus::Monitoring
                }
                ThreatStatus::Monitoring if score < self.config.monitoring_exit => {
                    ThreatStatus::Calm
                }
                current => current,
            }
        };
        if next != self.state.status {
            info!(from = ?self.state.status, to = ?next, score, "Threat status changed");
            self.state.status = next;
        }
    }

    fn random_bits(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| if self.rng.random_bool(0.5) { '1' } else { '0' })
            .collect()
    }
}

impl Default for ThreatStateEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn classified_profiles(config: &EngineConfig, assets: &DemoAssets) -> KeyExchangeProfiles {
    let mut profiles = assets.profiles.clone();
    profiles.normal.reclassify(config.qber_baseline, config.qber_threshold);
    profiles.under_attack.reclassify(config.qber_baseline, config.qber_threshold);
    profiles
}

fn default_state(config: &EngineConfig, assets: &DemoAssets) -> SimulationState {
    SimulationState {
        is_under_attack: false,
        anomaly_score: config.clamp_score(config.score_floor),
        qber_baseline: config.qber_baseline,
        qber_threshold: config.qber_threshold,
        profiles: classified_profiles(config, assets),
        recent_alerts: AlertLog::new(config.alert_capacity),
        status: ThreatStatus::Calm,
        qber_history: VecDeque::with_capacity(config.history_capacity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> ThreatStateEngine {
        ThreatStateEngine::new(EngineConfig {
            seed: Some(42),
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_defaults() {
        let engine = seeded();
        let state = engine.state();
        assert!(!state.is_under_attack);
        assert!((state.anomaly_score - 0.1).abs() < 1e-12);
        assert!(state.recent_alerts.is_empty());
        assert_eq!(state.status, ThreatStatus::Calm);
        assert_eq!(engine.threat_level(), ThreatLevel::Low);
    }

    #[test]
    fn test_high_sample_raises_score_and_alerts() {
        let mut engine = seeded();
        let obs = engine.observe_error_rate_sample(0.15);

        assert!((obs.new_anomaly_score - 0.4).abs() < 1e-9);
        assert!(obs.alert_emitted);
        assert_eq!(
            obs.alert_message.as_deref(),
            Some("High QBER detected: 0.150 (threshold: 0.11)")
        );
        let latest = engine.state().recent_alerts.latest().unwrap();
        assert_eq!(latest.severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_low_sample_floors_at_point_one() {
        let mut engine = seeded();
        let obs = engine.observe_error_rate_sample(0.03);
        assert!((obs.new_anomaly_score - 0.1).abs() < 1e-12);
        assert!(!obs.alert_emitted);
        assert!(obs.alert_message.is_none());
    }

    #[test]
    fn test_threshold_sample_is_low() {
        let mut engine = seeded();
        let obs = engine.observe_error_rate_sample(0.11);
        assert!(!obs.alert_emitted);
    }

    #[test]
    fn test_score_clamped_at_three() {
        let mut engine = seeded();
        for _ in 0..20 {
            engine.observe_error_rate_sample(0.5);
        }
        assert!((engine.anomaly_score() - 3.0).abs() < 1e-12);
        assert_eq!(engine.state().recent_alerts.len(), 5);
    }

    #[test]
    fn test_status_transitions() {
        let mut engine = seeded();
        // 0.1 -> 0.4 -> 0.7 -> 1.0
        for _ in 0..3 {
            engine.observe_error_rate_sample(0.2);
        }
        assert_eq!(engine.status(), ThreatStatus::Monitoring);

        // Hysteresis: 0.9 .. 0.6 stays in MONITORING
        for _ in 0..4 {
            engine.observe_error_rate_sample(0.01);
        }
        assert_eq!(engine.status(), ThreatStatus::Monitoring);

        // Exactly 0.5 still holds, 0.4 leaves
        engine.observe_error_rate_sample(0.01);
        assert_eq!(engine.status(), ThreatStatus::Monitoring);
        assert_eq!(engine.anomaly_score(), 0.5);
        engine.observe_error_rate_sample(0.01);
        assert_eq!(engine.status(), ThreatStatus::Calm);

        engine.simulate_eavesdropping();
        assert_eq!(engine.status(), ThreatStatus::UnderAttack);

        // Low samples never leave UNDER_ATTACK
        for _ in 0..30 {
            engine.observe_error_rate_sample(0.01);
        }
        assert_eq!(engine.status(), ThreatStatus::UnderAttack);

        engine.reset();
        assert_eq!(engine.status(), ThreatStatus::Calm);
    }

    #[test]
    fn test_score_stays_on_tenths_grid() {
        let mut engine = seeded();
        // 0.1 +0.3 +0.3 -0.1 +0.3 +0.3 -0.1 -0.1 = 1.0
        for sample in [0.5, 0.5, 0.0, 0.5, 0.5, 0.0, 0.0] {
            engine.observe_error_rate_sample(sample);
        }
        assert_eq!(engine.anomaly_score(), 1.0);
        assert_eq!(engine.threat_level(), ThreatLevel::Medium);
        assert_eq!(engine.recommendation(), "Monitor closely - Elevated error rate detected");
        assert_eq!(engine.status(), ThreatStatus::Monitoring);

        // 1.3 1.6 1.9 1.8 1.7 2.0: HIGH at exactly 2.0
        for sample in [0.5, 0.5, 0.5, 0.0, 0.0, 0.5] {
            engine.observe_error_rate_sample(sample);
        }
        assert_eq!(engine.anomaly_score(), 2.0);
        assert_eq!(engine.threat_level(), ThreatLevel::High);
        assert_eq!(engine.recommendation(), "Abort key exchange - Possible eavesdropping detected");

        // Down to 0.5 exactly: MEDIUM
        for _ in 0..15 {
            engine.observe_error_rate_sample(0.0);
        }
        assert_eq!(engine.anomaly_score(), 0.5);
        assert_eq!(engine.threat_level(), ThreatLevel::Medium);
        engine.observe_error_rate_sample(0.0);
        assert_eq!(engine.threat_level(), ThreatLevel::Low);
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let engine = ThreatStateEngine::new(EngineConfig {
            score_min: 5.0,
            score_max: 3.0,
            alert_capacity: 50,
            seed: Some(9),
            ..EngineConfig::default()
        });
        assert_eq!(engine.config().score_max, 3.0);
        assert_eq!(engine.config().score_min, 0.0);
        assert_eq!(engine.config().alert_capacity, 5);
        assert_eq!(engine.config().seed, Some(9));
        assert_eq!(engine.anomaly_score(), 0.1);
    }

    #[test]
    fn test_trigger_anomaly_forces_values() {
        let mut engine = seeded();
        for _ in 0..10 {
            engine.observe_error_rate_sample(0.9);
        }
        let state = engine.trigger_anomaly();
        assert!(state.is_under_attack);
        assert!((state.anomaly_score - 2.5).abs() < 1e-12);
        assert_eq!(
            state.recent_alerts.latest().unwrap().severity,
            AlertSeverity::Critical
        );

        let again = engine.trigger_anomaly();
        assert!((again.anomaly_score - 2.5).abs() < 1e-12);
        assert!(again.is_under_attack);
    }

    #[test]
    fn test_eavesdropping_alert_reports_attack_qber() {
        let mut engine = seeded();
        let state = engine.simulate_eavesdropping();
        let alert = state.recent_alerts.latest().unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(
            alert.message,
            "Eavesdropping detected: QBER 0.250 exceeds threshold 0.11"
        );
    }

    #[test]
    fn test_key_exchange_profiles() {
        let mut engine = seeded();
        let normal = engine.start_key_exchange(100).unwrap();
        assert_eq!(normal.shared_key.len(), 19);
        assert_eq!(normal.profile, ProfileKind::Normal);
        assert!(normal.secure);
        assert!(normal.shared_key.chars().all(|c| c == '0' || c == '1'));
        assert_eq!(normal.fingerprint.len(), 16);

        engine.simulate_eavesdropping();
        let attacked = engine.start_key_exchange(100).unwrap();
        assert_eq!(attacked.shared_key.len(), 16);
        assert_eq!(attacked.profile, ProfileKind::UnderAttack);
        assert!(!attacked.secure);
        assert_eq!(attacked.stats.threat_level, ThreatLevel::High);
        assert_eq!(
            attacked.recommendation,
            "Abort key exchange - Possible eavesdropping detected"
        );
        assert!(engine.is_under_attack());
    }

    #[test]
    fn test_key_exchange_rejects_non_positive_pairs() {
        let mut engine = seeded();
        assert!(matches!(
            engine.start_key_exchange(0),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.start_key_exchange(-5),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_seeded_keys_are_reproducible() {
        let mut a = seeded();
        let mut b = seeded();
        assert_eq!(
            a.start_default_key_exchange().unwrap().shared_key,
            b.start_default_key_exchange().unwrap().shared_key
        );
    }

    #[test]
    fn test_bell_test_ranges() {
        let mut engine = seeded();
        let report = engine.bell_test();
        assert!(report.s_parameter >= 2.3 && report.s_parameter < 2.7);
        assert!(report.bell_violation);
        assert!(!report.alarm);

        engine.trigger_anomaly();
        let report = engine.bell_test();
        assert!(report.s_parameter < CLASSICAL_LIMIT);
        assert!(!report.bell_violation);
        assert!(report.alarm);
        assert_eq!(report.security_margin, 0.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut engine = ThreatStateEngine::new(EngineConfig {
            history_capacity: 4,
            seed: Some(1),
            ..EngineConfig::default()
        });
        for i in 0..10 {
            engine.observe_error_rate_sample(i as f64 / 100.0);
        }
        let history: Vec<f64> = engine.state().qber_history.iter().copied().collect();
        assert_eq!(history, vec![0.06, 0.07, 0.08, 0.09]);
    }

    #[test]
    fn test_replace_assets_updates_profiles() {
        let mut engine = seeded();
        let mut assets = DemoAssets::default();
        assets.profiles.normal.shared_key_length = 24;
        engine.replace_assets(assets);
        assert_eq!(engine.start_key_exchange(100).unwrap().shared_key.len(), 24);
        engine.reset();
        assert_eq!(engine.state().profiles.normal.shared_key_length, 24);
    }
}
