//! Simulation state owned by the engine.
//!
//! Everything here is plain data. Mutation goes through
//! [`crate::engine::ThreatStateEngine`]; snapshots are handed to the
//! presentation surface as clones (or JSON, via serde).

use crate::classify::{ThreatLevel, threat_level_for_qber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub severity: AlertSeverity,
}

impl Alert {
    pub fn new(severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            severity,
        }
    }
}

/// Bounded alert log, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertLog {
    capacity: usize,
    entries: VecDeque<Alert>,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Push to the front, evicting the oldest entry past capacity.
    pub fn push(&mut self, alert: Alert) {
        self.entries.push_front(alert);
        self.entries.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Alert> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Statistics of one key exchange profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchangeStats {
    pub num_pairs: u32,
    pub matching_pairs: u32,
    pub shared_key_length: u32,
    pub qber: f64,
    pub threat_level: ThreatLevel,
}

impl KeyExchangeStats {
    /// Recompute `threat_level` from `qber`.
    pub fn reclassify(&mut self, baseline: f64, threshold: f64) {
        self.threat_level = threat_level_for_qber(self.qber, baseline, threshold);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    Normal,
    UnderAttack,
}

impl ProfileKind {
    pub fn for_attack_flag(is_under_attack: bool) -> Self {
        if is_under_attack {
            Self::UnderAttack
        } else {
            Self::Normal
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "normal operation",
            Self::UnderAttack => "under attack",
        }
    }
}

/// The two key exchange profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExchangeProfiles {
    pub normal: KeyExchangeStats,
    pub under_attack: KeyExchangeStats,
}

impl KeyExchangeProfiles {
    pub fn get(&self, kind: ProfileKind) -> &KeyExchangeStats {
        match kind {
            ProfileKind::Normal => &self.normal,
            ProfileKind::UnderAttack => &self.under_attack,
        }
    }
}

impl Default for KeyExchangeProfiles {
    fn default() -> Self {
        Self {
            normal: KeyExchangeStats {
                num_pairs: 100,
                matching_pairs: 22,
                shared_key_length: 19,
                qber: 0.03,
                threat_level: ThreatLevel::Low,
            },
            under_attack: KeyExchangeStats {
                num_pairs: 100,
                matching_pairs: 21,
                shared_key_length: 16,
                qber: 0.25,
                threat_level: ThreatLevel::High,
            },
        }
    }
}

/// Coarse threat status shown by the dashboard.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatStatus {
    #[default]
    Calm,
    Monitoring,
    UnderAttack,
}

/// Mutable aggregate owned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub is_under_attack: bool,
    pub anomaly_score: f64,
    pub qber_baseline: f64,
    pub qber_threshold: f64,
    pub profiles: KeyExchangeProfiles,
    pub recent_alerts: AlertLog,
    pub status: ThreatStatus,
    pub qber_history: VecDeque<f64>,
}

impl SimulationState {
    /// Profile selected by the attack flag.
    pub fn active_profile_kind(&self) -> ProfileKind {
        ProfileKind::for_attack_flag(self.is_under_attack)
    }

    pub fn key_exchange_stats(&self) -> &KeyExchangeStats {
        self.profiles.get(self.active_profile_kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_log_evicts_oldest() {
        let mut log = AlertLog::new(5);
        for i in 0..8 {
            log.push(Alert::new(AlertSeverity::Info, format!("alert {}", i)));
        }

        assert_eq!(log.len(), 5);
        let messages: Vec<&str> = log.iter().map(|a| a.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["alert 7", "alert 6", "alert 5", "alert 4", "alert 3"]
        );
    }

    #[test]
    fn test_default_profiles_respect_threshold() {
        let profiles = KeyExchangeProfiles::default();
        assert!(profiles.normal.qber < 0.11);
        assert!(profiles.under_attack.qber >= 0.11);
        assert_eq!(profiles.normal.shared_key_length, 19);
        assert_eq!(profiles.under_attack.shared_key_length, 16);
    }

    #[test]
    fn test_reclassify() {
        let mut stats = KeyExchangeProfiles::default().normal;
        stats.qber = 0.08;
        stats.reclassify(0.02, 0.11);
        assert_eq!(stats.threat_level, ThreatLevel::Medium);
    }

    #[test]
    fn test_stats_json_is_camel_case() {
        let json = serde_json::to_value(KeyExchangeProfiles::default()).unwrap();
        assert_eq!(json["underAttack"]["sharedKeyLength"], 16);
        assert_eq!(json["normal"]["threatLevel"], "LOW");
    }
}
