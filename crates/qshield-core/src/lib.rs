//! # qshield-core - QKD threat-state engine
//!
//! Illustrative engine behind the QShield dashboard: an E91-style key
//! exchange with hardcoded statistics, a rule-based anomaly score, and the
//! threat status the dashboard renders. Nothing here is real cryptography
//! or real quantum simulation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    ThreatStateEngine                     │
//! │                                                          │
//! │   events ──▶ transition ──▶ SimulationState snapshot     │
//! │                  │                                       │
//! │                  ├── classify (score ─▶ level/advice)    │
//! │                  ├── entropy  (key bit health)           │
//! │                  └── history  (QBER / entropy trends)    │
//! │                                                          │
//! │   DemoAssets ◀── JSON overrides (shallow merge)          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qshield_core::{EngineConfig, ThreatStateEngine, ThreatLevel};
//!
//! let mut engine = ThreatStateEngine::new(EngineConfig::default());
//! let obs = engine.observe_error_rate_sample(0.18);
//! assert!(obs.alert_emitted);
//!
//! engine.simulate_eavesdropping();
//! assert_eq!(engine.threat_level(), ThreatLevel::High);
//! let outcome = engine.start_key_exchange(100).unwrap();
//! assert_eq!(outcome.shared_key.len(), 16);
//! ```

pub mod classify;
pub mod config;
pub mod engine;
pub mod entropy;
pub mod error;
pub mod ffi;
pub mod history;
pub mod state;

pub use classify::{ScoreBracket, ThreatLevel, classify_threat_level, recommendation_for};
pub use config::{DemoAssets, EngineConfig, MergeReport, RsaDemo};
pub use engine::{BellTestReport, KeyExchangeOutcome, Observation, ThreatStateEngine};
pub use entropy::{HealthPolicy, HealthReport, RandomnessQuality};
pub use error::{EngineError, EngineResult};
pub use history::{HistoryAssessment, assess_history};
pub use state::{
    Alert, AlertLog, AlertSeverity, KeyExchangeProfiles, KeyExchangeStats, ProfileKind,
    SimulationState, ThreatStatus,
};
