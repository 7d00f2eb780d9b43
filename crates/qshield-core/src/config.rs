//! Engine configuration and demo asset overrides.
//!
//! `EngineConfig` holds the fixed reference points and score dynamics.
//! `DemoAssets` holds the constants the dashboard displays (RSA walkthrough,
//! key exchange profiles). Assets can be overridden at startup from two
//! independent JSON documents using shallow merge semantics:
//! - unknown keys are ignored
//! - missing keys keep their current value
//! - a key whose value has the wrong type is skipped
//! - derived RSA numbers (`n`, `phi`, `ciphertext`) are recomputed
//! - an override that breaks an invariant is dropped as a whole
//!
//! Asset merging never returns an error; bad input degrades to defaults.
//! `EngineConfig` is different: it is validated and rejected with
//! [`EngineError::InvalidConfig`].

use crate::error::{EngineError, EngineResult};
use crate::state::{KeyExchangeProfiles, KeyExchangeStats};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// QBER expected on a quiet channel
    pub qber_baseline: f64,
    /// QBER above which a sample counts as hostile
    pub qber_threshold: f64,
    /// Anomaly score bounds. Updates are clamped to this range.
    pub score_min: f64,
    pub score_max: f64,
    /// Initial score, and the floor low samples decay towards
    pub score_floor: f64,
    pub high_sample_step: f64,
    pub low_sample_step: f64,
    /// Score forced by an anomaly trigger or a detected eavesdropper
    pub forced_attack_score: f64,
    /// CALM -> MONITORING when the score reaches this
    pub monitoring_enter: f64,
    /// MONITORING -> CALM when the score drops below this
    pub monitoring_exit: f64,
    pub alert_capacity: usize,
    pub history_capacity: usize,
    pub default_pair_count: i64,
    /// Fixed RNG seed for reproducible key bits
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            qber_baseline: 0.02,
            qber_threshold: 0.11,
            score_min: 0.0,
            score_max: 3.0,
            score_floor: 0.1,
            high_sample_step: 0.3,
            low_sample_step: 0.1,
            forced_attack_score: 2.5,
            monitoring_enter: 1.0,
            monitoring_exit: 0.5,
            alert_capacity: 5,
            history_capacity: 32,
            default_pair_count: 100,
            seed: None,
        }
    }
}

/// Most alerts the dashboard shows at once.
pub const MAX_ALERT_CAPACITY: usize = 5;
pub const MAX_HISTORY_CAPACITY: usize = 4096;

impl EngineConfig {
    /// Parse and validate a (possibly partial) JSON config.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        let reals = [
            ("qber_baseline", self.qber_baseline),
            ("qber_threshold", self.qber_threshold),
            ("score_min", self.score_min),
            ("score_max", self.score_max),
            ("score_floor", self.score_floor),
            ("high_sample_step", self.high_sample_step),
            ("low_sample_step", self.low_sample_step),
            ("forced_attack_score", self.forced_attack_score),
            ("monitoring_enter", self.monitoring_enter),
            ("monitoring_exit", self.monitoring_exit),
        ];
        if let Some((name, value)) = reals.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("{} must be finite (got {})", name, value)));
        }

        if self.score_min > self.score_max {
            return Err(invalid(format!(
                "score_min {} > score_max {}",
                self.score_min, self.score_max
            )));
        }
        let bounds = self.score_min..=self.score_max;
        if !bounds.contains(&self.score_floor) {
            return Err(invalid(format!("score_floor {} outside score bounds", self.score_floor)));
        }
        if !bounds.contains(&self.forced_attack_score) {
            return Err(invalid(format!(
                "forced_attack_score {} outside score bounds",
                self.forced_attack_score
            )));
        }
        if self.high_sample_step < 0.0 || self.low_sample_step < 0.0 {
            return Err(invalid("sample steps must be >= 0".to_string()));
        }
        if self.monitoring_exit > self.monitoring_enter {
            return Err(invalid(format!(
                "monitoring_exit {} > monitoring_enter {}",
                self.monitoring_exit, self.monitoring_enter
            )));
        }
        if self.qber_baseline < 0.0 || self.qber_baseline >= self.qber_threshold {
            return Err(invalid(format!(
                "need 0 <= qber_baseline < qber_threshold (got {} / {})",
                self.qber_baseline, self.qber_threshold
            )));
        }
        if !(1..=MAX_ALERT_CAPACITY).contains(&self.alert_capacity) {
            return Err(invalid(format!(
                "alert_capacity must be in 1..={} (got {})",
                MAX_ALERT_CAPACITY, self.alert_capacity
            )));
        }
        if !(1..=MAX_HISTORY_CAPACITY).contains(&self.history_capacity) {
            return Err(invalid(format!(
                "history_capacity must be in 1..={} (got {})",
                MAX_HISTORY_CAPACITY, self.history_capacity
            )));
        }
        if self.default_pair_count < 1 {
            return Err(invalid(format!(
                "default_pair_count must be >= 1 (got {})",
                self.default_pair_count
            )));
        }
        Ok(())
    }

    /// Snap to the 0.1 score grid, then bound.
    ///
    /// Never panics, even on a config that failed validation.
    pub fn clamp_score(&self, score: f64) -> f64 {
        let snapped = (score * 10.0).round() / 10.0;
        snapped.max(self.score_min).min(self.score_max)
    }
}

fn invalid(msg: String) -> EngineError {
    EngineError::InvalidConfig(msg)
}

/// Textbook RSA numbers used by the factoring walkthrough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsaDemo {
    pub p: u64,
    pub q: u64,
    pub n: u64,
    pub phi: u64,
    pub e: u64,
    pub d: u64,
    pub message: u64,
    pub ciphertext: u64,
}

impl Default for RsaDemo {
    fn default() -> Self {
        Self {
            p: 61,
            q: 53,
            n: 3233,
            phi: 3120,
            e: 17,
            d: 2753,
            message: 65,
            ciphertext: 2790,
        }
    }
}

impl RsaDemo {
    /// Whether the numbers describe a consistent toy key pair.
    pub fn is_consistent(&self) -> bool {
        if self.p < 2 || self.q < 2 || self.n == 0 || self.phi == 0 {
            return false;
        }
        let product = (self.p as u128) * (self.q as u128);
        let phi = ((self.p - 1) as u128) * ((self.q - 1) as u128);
        product == self.n as u128
            && phi == self.phi as u128
            && (self.e as u128 * self.d as u128) % phi == 1
            && self.message < self.n
            && mod_pow(self.message, self.e, self.n) == self.ciphertext
    }

    /// Recompute `n`, `phi` and `ciphertext` from the primes, exponent and
    /// message. `None` when the primes are degenerate or `n` overflows.
    pub fn with_derived(mut self) -> Option<Self> {
        if self.p < 2 || self.q < 2 {
            return None;
        }
        self.n = self.p.checked_mul(self.q)?;
        self.phi = (self.p - 1).checked_mul(self.q - 1)?;
        self.ciphertext = mod_pow(self.message, self.e, self.n);
        Some(self)
    }
}

/// `base^exp mod modulus` on small numbers.
pub fn mod_pow(base: u64, exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let m = modulus as u128;
    let mut result: u128 = 1;
    let mut b = base as u128 % m;
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = result * b % m;
        }
        b = b * b % m;
        e >>= 1;
    }
    result as u64
}

pub static DEFAULT_ASSETS: Lazy<DemoAssets> = Lazy::new(DemoAssets::default);

/// Constants displayed by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DemoAssets {
    pub rsa: RsaDemo,
    pub profiles: KeyExchangeProfiles,
}

/// Which override documents were applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub rsa_applied: bool,
    pub profiles_applied: bool,
}

impl DemoAssets {
    /// Merge an RSA override document. Returns true when something changed.
    ///
    /// `n`, `phi` and `ciphertext` follow from the other fields and are
    /// recomputed after the merge; overriding them directly has no effect.
    pub fn merge_rsa(&mut self, overlay: &Value) -> bool {
        let Some(merged) = shallow_merge(&self.rsa, overlay) else {
            return false;
        };
        let Some(merged) = merged.with_derived() else {
            warn!("Ignoring RSA override with degenerate primes");
            return false;
        };
        if !merged.is_consistent() {
            warn!(?merged, "Ignoring inconsistent RSA override");
            return false;
        }
        let changed = merged != self.rsa;
        self.rsa = merged;
        changed
    }

    /// Merge a key exchange profile document (`{"normal": {..}, "underAttack": {..}}`).
    ///
    /// Each profile is merged field by field. Threat levels are always
    /// recomputed from the merged QBER, so an override cannot set them.
    pub fn merge_profiles(&mut self, overlay: &Value, config: &EngineConfig) -> bool {
        let Some(obj) = overlay.as_object() else {
            warn!("Profile override is not a JSON object; keeping defaults");
            return false;
        };

        let mut changed = false;
        if let Some(normal) = obj.get("normal") {
            if let Some(stats) = merge_profile(&self.profiles.normal, normal, config) {
                if stats.qber < config.qber_threshold {
                    changed |= stats != self.profiles.normal;
                    self.profiles.normal = stats;
                } else {
                    warn!(
                        qber = stats.qber,
                        threshold = config.qber_threshold,
                        "Normal profile override at or above threshold; keeping defaults"
                    );
                }
            }
        }
        if let Some(attack) = obj.get("underAttack") {
            if let Some(stats) = merge_profile(&self.profiles.under_attack, attack, config) {
                if stats.qber >= config.qber_threshold {
                    changed |= stats != self.profiles.under_attack;
                    self.profiles.under_attack = stats;
                } else {
                    warn!(
                        qber = stats.qber,
                        threshold = config.qber_threshold,
                        "Attack profile override below threshold; keeping defaults"
                    );
                }
            }
        }
        changed
    }

    /// Parse and merge both documents. Malformed text is ignored.
    pub fn apply_overrides(
        &mut self,
        rsa_json: Option<&str>,
        profiles_json: Option<&str>,
        config: &EngineConfig,
    ) -> MergeReport {
        let mut report = MergeReport::default();
        if let Some(text) = rsa_json {
            match serde_json::from_str::<Value>(text) {
                Ok(value) => report.rsa_applied = self.merge_rsa(&value),
                Err(e) => warn!(error = %e, "Malformed RSA override; keeping defaults"),
            }
        }
        if let Some(text) = profiles_json {
            match serde_json::from_str::<Value>(text) {
                Ok(value) => report.profiles_applied = self.merge_profiles(&value, config),
                Err(e) => warn!(error = %e, "Malformed profile override; keeping defaults"),
            }
        }
        debug!(?report, "Asset overrides processed");
        report
    }
}

fn merge_profile(
    base: &KeyExchangeStats,
    overlay: &Value,
    config: &EngineConfig,
) -> Option<KeyExchangeStats> {
    let mut stats = shallow_merge(base, overlay)?;
    if stats.shared_key_length == 0 || stats.matching_pairs > stats.num_pairs {
        warn!(?stats, "Ignoring implausible profile override");
        return None;
    }
    stats.reclassify(config.qber_baseline, config.qber_threshold);
    Some(stats)
}

/// Overlay the top-level keys of `overlay` onto `base`.
///
/// Only keys already present in `base`'s JSON form are considered. A key is
/// kept only if the result still deserializes. Returns `None` when the
/// overlay is not an object.
pub fn shallow_merge<T>(base: &T, overlay: &Value) -> Option<T>
where
    T: Serialize + DeserializeOwned,
{
    let overlay = overlay.as_object()?;
    let Ok(Value::Object(mut current)) = serde_json::to_value(base) else {
        return None;
    };

    for (key, value) in overlay {
        if !current.contains_key(key) {
            continue;
        }
        let mut candidate = current.clone();
        candidate.insert(key.clone(), value.clone());
        if serde_json::from_value::<T>(Value::Object(candidate.clone())).is_ok() {
            current = candidate;
        } else {
            debug!(key = %key, "Skipping override with wrong type");
        }
    }

    serde_json::from_value(Value::Object(current)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ThreatLevel;
    use serde_json::json;

    #[test]
    fn test_default_rsa_is_consistent() {
        assert!(RsaDemo::default().is_consistent());
        assert_eq!(mod_pow(2790, 2753, 3233), 65);
    }

    #[test]
    fn test_shallow_merge_ignores_unknown_and_keeps_missing() {
        let base = RsaDemo::default();
        let merged = shallow_merge(&base, &json!({ "message": 42, "colour": "red" })).unwrap();
        assert_eq!(merged.message, 42);
        assert_eq!(merged.n, 3233);
    }

    #[test]
    fn test_shallow_merge_skips_wrong_types() {
        let base = RsaDemo::default();
        let merged = shallow_merge(&base, &json!({ "p": "sixty-one", "message": 7 })).unwrap();
        assert_eq!(merged.p, 61);
        assert_eq!(merged.message, 7);
    }

    #[test]
    fn test_shallow_merge_rejects_non_object() {
        assert!(shallow_merge(&RsaDemo::default(), &json!([1, 2, 3])).is_none());
    }

    #[test]
    fn test_rsa_override_applied_when_consistent() {
        let mut assets = DemoAssets::default();
        // 42^17 mod 3233
        let ciphertext = mod_pow(42, 17, 3233);
        assert!(assets.merge_rsa(&json!({ "message": 42, "ciphertext": ciphertext })));
        assert_eq!(assets.rsa.message, 42);
    }

    #[test]
    fn test_rsa_message_override_recomputes_ciphertext() {
        let mut assets = DemoAssets::default();
        assert!(assets.merge_rsa(&json!({ "message": 42 })));
        assert_eq!(assets.rsa.message, 42);
        assert_eq!(assets.rsa.ciphertext, mod_pow(42, 17, 3233));
        assert!(assets.rsa.is_consistent());
    }

    #[test]
    fn test_rsa_derived_fields_cannot_be_forced() {
        let mut assets = DemoAssets::default();
        assert!(!assets.merge_rsa(&json!({ "n": 3000, "ciphertext": 1 })));
        assert_eq!(assets.rsa, RsaDemo::default());
    }

    #[test]
    fn test_rsa_override_rejected_when_inconsistent() {
        let mut assets = DemoAssets::default();
        // 7 * 2753 is not 1 mod 3120
        assert!(!assets.merge_rsa(&json!({ "e": 7 })));
        assert!(!assets.merge_rsa(&json!({ "p": 1 })));
        assert!(!assets.merge_rsa(&json!({ "p": 4294967311u64, "q": 4294967357u64 })));
        assert_eq!(assets.rsa, RsaDemo::default());
    }

    #[test]
    fn test_profile_override_reclassifies() {
        let config = EngineConfig::default();
        let mut assets = DemoAssets::default();
        let changed = assets.merge_profiles(
            &json!({ "normal": { "qber": 0.07, "threatLevel": "LOW" } }),
            &config,
        );
        assert!(changed);
        assert_eq!(assets.profiles.normal.qber, 0.07);
        assert_eq!(assets.profiles.normal.threat_level, ThreatLevel::Medium);
        assert_eq!(assets.profiles.normal.shared_key_length, 19);
    }

    #[test]
    fn test_profile_override_breaking_threshold_is_dropped() {
        let config = EngineConfig::default();
        let mut assets = DemoAssets::default();
        let changed = assets.merge_profiles(
            &json!({ "normal": { "qber": 0.3 }, "underAttack": { "qber": 0.05 } }),
            &config,
        );
        assert!(!changed);
        assert_eq!(assets.profiles, KeyExchangeProfiles::default());
    }

    #[test]
    fn test_apply_overrides_tolerates_garbage() {
        let config = EngineConfig::default();
        let mut assets = DemoAssets::default();
        let report = assets.apply_overrides(Some("not json"), Some("{\"normal\": 5}"), &config);
        assert_eq!(report, MergeReport::default());
        assert_eq!(assets, *DEFAULT_ASSETS);
    }

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());

        let rejected = [
            r#"{ "score_min": 5.0, "score_max": 3.0 }"#,
            r#"{ "score_floor": 4.0 }"#,
            r#"{ "forced_attack_score": -1.0 }"#,
            r#"{ "alert_capacity": 6 }"#,
            r#"{ "alert_capacity": 0 }"#,
            r#"{ "history_capacity": 1000000000000 }"#,
            r#"{ "high_sample_step": -0.3 }"#,
            r#"{ "monitoring_enter": 0.2 }"#,
            r#"{ "qber_baseline": 0.2 }"#,
            r#"{ "default_pair_count": 0 }"#,
            r#"{ "alert_capacity": "five" }"#,
        ];
        for json in rejected {
            assert!(
                matches!(EngineConfig::from_json_str(json), Err(EngineError::InvalidConfig(_))),
                "accepted {}",
                json
            );
        }

        let nan = EngineConfig {
            low_sample_step: f64::NAN,
            ..EngineConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_clamp_score_snaps_to_tenths() {
        let config = EngineConfig::default();
        assert_eq!(config.clamp_score(0.9999999999999999), 1.0);
        assert_eq!(config.clamp_score(0.5000000000000001), 0.5);
        assert_eq!(config.clamp_score(3.3), 3.0);
        assert_eq!(config.clamp_score(-0.2), 0.0);

        // Inverted bounds must not panic.
        let broken = EngineConfig {
            score_min: 5.0,
            score_max: 3.0,
            ..EngineConfig::default()
        };
        assert_eq!(broken.clamp_score(1.0), 3.0);
    }

    #[test]
    fn test_partial_engine_config() {
        let config = EngineConfig::from_json_str(r#"{ "alert_capacity": 3, "seed": 7 }"#).unwrap();
        assert_eq!(config.alert_capacity, 3);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.qber_threshold, 0.11);
    }
}
