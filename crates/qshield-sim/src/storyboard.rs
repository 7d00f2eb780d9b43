//! Step-by-step walkthroughs of the two protocols the dashboard animates.
//!
//! A storyboard is an iterator of [`Frame`]s. Captions are computed from
//! the engine's demo assets and key exchange results; nothing here
//! touches engine state.

use qshield_core::{BellTestReport, KeyExchangeOutcome, RsaDemo, engine::CLASSICAL_LIMIT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    // RSA
    ChoosePrimes,
    Modulus,
    Totient,
    PublicExponent,
    PrivateExponent,
    Encrypt,
    Decrypt,
    FactorModulus,
    // E91
    Entangle,
    ChooseBases,
    Measure,
    Reconcile,
    BellTest,
    EstimateQber,
    DistilKey,
    Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub index: usize,
    pub total: usize,
    pub stage: Stage,
    pub caption: String,
}

pub struct Storyboard {
    frames: std::vec::IntoIter<Frame>,
}

impl Storyboard {
    fn from_captions(captions: Vec<(Stage, String)>) -> Self {
        let total = captions.len();
        let frames: Vec<Frame> = captions
            .into_iter()
            .enumerate()
            .map(|(index, (stage, caption))| Frame {
                index,
                total,
                stage,
                caption,
            })
            .collect();
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl Iterator for Storyboard {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.frames.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.frames.size_hint()
    }
}

impl ExactSizeIterator for Storyboard {}

/// Smallest non-trivial factor of `n` by trial division, with the number
/// of candidates tried.
pub fn trial_division(n: u64) -> Option<(u64, u64)> {
    if n < 4 {
        return None;
    }
    let mut tried = 0;
    let mut candidate = 2u64;
    while candidate.saturating_mul(candidate) <= n {
        tried += 1;
        if n % candidate == 0 {
            return Some((candidate, tried));
        }
        candidate += 1;
    }
    None
}

/// Textbook RSA with the demo primes, ending with the attacker factoring `n`.
pub fn rsa_walkthrough(rsa: &RsaDemo) -> Storyboard {
    let recovered = qshield_core::config::mod_pow(rsa.ciphertext, rsa.d, rsa.n);
    let factoring = match trial_division(rsa.n) {
        Some((factor, tried)) => format!(
            "Trial division splits n = {} into {} x {} after {} candidates; the private key follows immediately",
            rsa.n,
            factor,
            rsa.n / factor,
            tried
        ),
        None => format!("n = {} has no small factor", rsa.n),
    };

    Storyboard::from_captions(vec![
        (
            Stage::ChoosePrimes,
            format!("Pick two secret primes p = {} and q = {}", rsa.p, rsa.q),
        ),
        (
            Stage::Modulus,
            format!("Public modulus n = p x q = {}", rsa.n),
        ),
        (
            Stage::Totient,
            format!("Totient phi(n) = (p-1)(q-1) = {}", rsa.phi),
        ),
        (
            Stage::PublicExponent,
            format!("Public exponent e = {}, coprime to {}", rsa.e, rsa.phi),
        ),
        (
            Stage::PrivateExponent,
            format!("Private exponent d = {} with e*d = 1 mod {}", rsa.d, rsa.phi),
        ),
        (
            Stage::Encrypt,
            format!(
                "Encrypt m = {}: c = m^e mod n = {}",
                rsa.message, rsa.ciphertext
            ),
        ),
        (
            Stage::Decrypt,
            format!("Decrypt: c^d mod n = {}", recovered),
        ),
        (Stage::FactorModulus, factoring),
    ])
}

/// E91 entanglement-based key exchange for one completed exchange.
pub fn e91_walkthrough(outcome: &KeyExchangeOutcome, bell: &BellTestReport) -> Storyboard {
    let stats = &outcome.stats;
    let match_pct = if stats.num_pairs > 0 {
        stats.matching_pairs as f64 / stats.num_pairs as f64 * 100.0
    } else {
        0.0
    };
    let bell_caption = if bell.bell_violation {
        format!(
            "CHSH S = {:.3} violates the classical bound {} (quantum limit {}): the pairs are entangled",
            bell.s_parameter, CLASSICAL_LIMIT, bell.quantum_limit
        )
    } else {
        format!(
            "CHSH S = {:.3} stays within the classical bound {}: entanglement lost, someone is measuring",
            bell.s_parameter, CLASSICAL_LIMIT
        )
    };
    let verdict = if outcome.secure {
        format!("Key accepted ({}). {}", outcome.profile.name(), outcome.recommendation)
    } else {
        format!("Key discarded ({}). {}", outcome.profile.name(), outcome.recommendation)
    };

    Storyboard::from_captions(vec![
        (
            Stage::Entangle,
            format!(
                "Source emits {} entangled pairs in the state (|00> + |11>)/sqrt(2)",
                stats.num_pairs
            ),
        ),
        (
            Stage::ChooseBases,
            "Alice and Bob each measure along one of three randomly chosen angles".to_string(),
        ),
        (
            Stage::Measure,
            format!("{} pairs measured, results kept private", stats.num_pairs),
        ),
        (
            Stage::Reconcile,
            format!(
                "Bases compared in public: {} of {} match ({:.0}%)",
                stats.matching_pairs, stats.num_pairs, match_pct
            ),
        ),
        (Stage::BellTest, bell_caption),
        (
            Stage::EstimateQber,
            format!(
                "Sampled error rate {:.1}% (threat level {})",
                stats.qber * 100.0,
                stats.threat_level
            ),
        ),
        (
            Stage::DistilKey,
            format!(
                "{}-bit shared key {} (fingerprint {})",
                outcome.shared_key.len(),
                outcome.shared_key,
                outcome.fingerprint
            ),
        ),
        (Stage::Verdict, verdict),
    ])
}
