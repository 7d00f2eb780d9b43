//! Threat classification and operator recommendations.
//!
//! Two independent mappings live here:
//! - anomaly score -> [`ScoreBracket`] -> threat level + recommendation
//! - profile QBER -> threat level (used for the key exchange profiles)
//!
//! Score brackets are calibrated on four reference points
//! (0.1 -> LOW, 0.2 -> LOW, 0.8 -> MEDIUM, 2.5 -> HIGH) with the cut-offs
//! placed at the midpoints between them.

use serde::{Deserialize, Serialize};

/// Scores below this are nominal.
pub const ELEVATED_FROM: f64 = 0.5;
/// Scores at or above this are escalated (still MEDIUM, same advice).
pub const ESCALATED_FROM: f64 = 1.0;
/// Scores at or above this are HIGH.
pub const CRITICAL_FROM: f64 = 2.0;

/// Multiplier applied to the QBER baseline for the LOW/MEDIUM boundary.
pub const BASELINE_MARGIN: f64 = 1.5;

pub const RECOMMEND_CONTINUE: &str = "Continue key exchange - Normal operation";
pub const RECOMMEND_MONITOR: &str = "Monitor closely - Elevated error rate detected";
pub const RECOMMEND_ABORT: &str = "Abort key exchange - Possible eavesdropping detected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anomaly score bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBracket {
    Nominal,
    Elevated,
    Escalated,
    Critical,
}

impl ScoreBracket {
    pub fn from_score(score: f64) -> Self {
        if score >= CRITICAL_FROM {
            Self::Critical
        } else if score >= ESCALATED_FROM {
            Self::Escalated
        } else if score >= ELEVATED_FROM {
            Self::Elevated
        } else {
            // NaN lands here too
            Self::Nominal
        }
    }

    pub fn threat_level(&self) -> ThreatLevel {
        match self {
            Self::Nominal => ThreatLevel::Low,
            Self::Elevated | Self::Escalated => ThreatLevel::Medium,
            Self::Critical => ThreatLevel::High,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Nominal => RECOMMEND_CONTINUE,
            Self::Elevated | Self::Escalated => RECOMMEND_MONITOR,
            Self::Critical => RECOMMEND_ABORT,
        }
    }
}

/// Threat level for an anomaly score.
pub fn classify_threat_level(score: f64) -> ThreatLevel {
    ScoreBracket::from_score(score).threat_level()
}

/// Fixed advisory string for an anomaly score.
pub fn recommendation_for(score: f64) -> &'static str {
    ScoreBracket::from_score(score).recommendation()
}

/// Threat level of a key exchange profile, derived from its QBER alone.
pub fn threat_level_for_qber(qber: f64, baseline: f64, threshold: f64) -> ThreatLevel {
    if qber <= baseline * BASELINE_MARGIN {
        ThreatLevel::Low
    } else if qber <= threshold {
        ThreatLevel::Medium
    } else {
        ThreatLevel::High
    }
}
