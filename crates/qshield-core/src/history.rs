//! Rule-based assessment of entropy and QBER histories.

use serde::{Deserialize, Serialize};

pub const ENTROPY_THRESHOLD: f64 = 0.90;
pub const TREND_WINDOW: usize = 5;
pub const DECLINE_SLOPE: f64 = -0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistoryStatus {
    Normal,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityAssessment {
    Secure,
    Compromised,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryAssessment {
    pub alerts: Vec<String>,
    pub status: HistoryStatus,
    pub security_assessment: SecurityAssessment,
    pub entropy_level: Option<f64>,
    pub qber_level: Option<f64>,
}

/// Assess the latest values and the recent entropy trend.
///
/// Non-finite values are dropped before anything else is looked at.
pub fn assess_history<E, Q>(entropy: E, qber: Q, qber_threshold: f64) -> HistoryAssessment
where
    E: IntoIterator<Item = f64>,
    Q: IntoIterator<Item = f64>,
{
    let entropy: Vec<f64> = entropy.into_iter().filter(|v| v.is_finite()).collect();
    let qber: Vec<f64> = qber.into_iter().filter(|v| v.is_finite()).collect();

    let entropy_level = entropy.last().copied();
    let qber_level = qber.last().copied();
    let mut alerts = Vec::new();

    if let Some(latest) = entropy_level {
        if latest < ENTROPY_THRESHOLD {
            alerts.push(format!(
                "Low entropy detected: {:.3} (expected >{})",
                latest, ENTROPY_THRESHOLD
            ));
        }
        let window = &entropy[entropy.len().saturating_sub(TREND_WINDOW)..];
        if let Some(slope) = linear_slope(window) {
            if slope < DECLINE_SLOPE {
                alerts.push("Declining entropy trend - possible hardware degradation".to_string());
            }
        }
    }

    if let Some(latest) = qber_level {
        if latest > qber_threshold {
            alerts.push(format!(
                "High QBER detected: {:.3} (threshold: {})",
                latest, qber_threshold
            ));
            alerts.push("Possible eavesdropping attempt or channel noise".to_string());
        }
    }

    let (status, security_assessment) = if alerts.is_empty() {
        (HistoryStatus::Normal, SecurityAssessment::Secure)
    } else {
        (HistoryStatus::Alert, SecurityAssessment::Compromised)
    };

    HistoryAssessment {
        alerts,
        status,
        security_assessment,
        entropy_level,
        qber_level,
    }
}

/// Least-squares slope of `ys` against 0, 1, 2, ... (needs two points).
fn linear_slope(ys: &[f64]) -> Option<f64> {
    if ys.len() < 2 {
        return None;
    }
    let n = ys.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = ys.iter().sum::<f64>() / n;
    let (num, den) = ys
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, &y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    Some(num / den)
}
