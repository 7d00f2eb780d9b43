//! Bit-string quality checks.
//!
//! Shannon entropy, a quick randomness quality summary, and two online
//! health tests in the style of SP 800-90B (repetition count and adaptive
//! proportion). Cutoffs are derived from a policy min-entropy per bit. These
//! are display aids for the dashboard, not an entropy certification.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_ENTROPY_PER_BIT: f64 = 0.80;
pub const AP_WINDOW: usize = 1024;

/// Count of '0' and '1' characters. Other characters are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitCounts {
    pub zeros: usize,
    pub ones: usize,
}

impl BitCounts {
    pub fn of(bits: &str) -> Self {
        bits.bytes().fold(Self::default(), |mut acc, b| {
            match b {
                b'0' => acc.zeros += 1,
                b'1' => acc.ones += 1,
                _ => {}
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.zeros + self.ones
    }
}

/// Shannon entropy in bits per symbol (0.0 ..= 1.0).
pub fn shannon_entropy(counts: BitCounts) -> f64 {
    let total = counts.total();
    if total == 0 {
        return 0.0;
    }
    let p0 = counts.zeros as f64 / total as f64;
    let p1 = 1.0 - p0;
    let h = |p: f64| if p <= 0.0 { 0.0 } else { -p * p.log2() };
    h(p0) + h(p1)
}

/// Longest run of identical symbols.
pub fn longest_run(bits: &str) -> usize {
    let bytes = bits.as_bytes();
    if bytes.is_empty() {
        return 0;
    }
    let mut longest = 1;
    let mut current = 1;
    for pair in bytes.windows(2) {
        if pair[0] == pair[1] {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 1;
        }
    }
    longest
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomnessQuality {
    pub entropy: f64,
    /// 1.0 = perfectly balanced zeros and ones
    pub frequency_balance: f64,
    pub max_run_length: usize,
    pub defense_grade: bool,
}

impl RandomnessQuality {
    pub fn assess(bits: &str) -> Self {
        let counts = BitCounts::of(bits);
        let n = counts.total();
        let imbalance = counts.zeros.abs_diff(counts.ones) as f64 / n.max(1) as f64;
        let frequency_balance = 1.0 - imbalance;
        let max_run_length = longest_run(bits);
        let defense_grade = frequency_balance > 0.8 && max_run_length < (n / 6).max(8);

        Self {
            entropy: shannon_entropy(counts),
            frequency_balance,
            max_run_length,
            defense_grade,
        }
    }
}

/// Health test cutoffs for a given min-entropy policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthPolicy {
    pub min_entropy_per_bit: f64,
    pub rct_cutoff: usize,
    pub ap_window: usize,
    pub ap_cutoff: usize,
}

impl HealthPolicy {
    pub fn new(min_entropy_per_bit: f64) -> Self {
        let h = min_entropy_per_bit.max(0.05);
        let rct_cutoff = ((1.0 + 30.0 / h) as usize).max(6);
        let ap_cutoff = ((AP_WINDOW as f64 * (1.0 - min_entropy_per_bit / 2.0)) as usize).max(40);
        Self {
            min_entropy_per_bit,
            rct_cutoff,
            ap_window: AP_WINDOW,
            ap_cutoff,
        }
    }

    /// Run both tests over `bits`.
    pub fn check(&self, bits: &str) -> HealthReport {
        let rct_ok = repetition_count_test(bits, self.rct_cutoff);
        let ap_ok = adaptive_proportion_test(bits, self.ap_window, self.ap_cutoff);
        let ok = rct_ok && ap_ok;
        let reason = if ok {
            String::new()
        } else {
            format!(
                "RCT/AP violation (rct_cutoff={}, ap_cutoff={})",
                self.rct_cutoff, self.ap_cutoff
            )
        };
        HealthReport {
            ok,
            reason,
            rct_cutoff: self.rct_cutoff,
            ap_window: self.ap_window,
            ap_cutoff: self.ap_cutoff,
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ENTROPY_PER_BIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub ok: bool,
    pub reason: String,
    pub rct_cutoff: usize,
    pub ap_window: usize,
    pub ap_cutoff: usize,
}

/// Fails when any run reaches `cutoff`. An empty string fails.
pub fn repetition_count_test(bits: &str, cutoff: usize) -> bool {
    !bits.is_empty() && longest_run(bits) < cutoff
}

/// Fails when a non-overlapping window holds `cutoff` or more '0' symbols.
/// Inputs shorter than one window pass.
pub fn adaptive_proportion_test(bits: &str, window: usize, cutoff: usize) -> bool {
    if window == 0 || bits.len() < window {
        return true;
    }
    bits.as_bytes()
        .chunks_exact(window)
        .all(|block| block.iter().filter(|&&b| b == b'0').count() < cutoff)
}
