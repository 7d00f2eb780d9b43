//! # qshield-sim - channel simulation and storyboards for QShield
//!
//! Drives [`qshield_core::ThreatStateEngine`] with simulated key
//! distribution traffic, and turns engine data into step-by-step protocol
//! walkthroughs for display.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          qshield-sim                            │
//! │                                                                 │
//! │   ┌──────────────┐    ChannelEvent    ┌─────────────────────┐   │
//! │   │  Scenarios   │ ─────────────────▶ │  SimulationDriver   │   │
//! │   │  (plugins)   │                    │  (engine + ground   │   │
//! │   └──────────────┘                    │   truth + stats)    │   │
//! │                                       └──────────┬──────────┘   │
//! │   ┌──────────────┐                               ▼              │
//! │   │ Asset loader │ ──▶ DemoAssets          TickReport           │
//! │   │ (http / dir) │                                              │
//! │   └──────────────┘     Storyboards: RSA, E91 (frame iterators)  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qshield_sim::{SimulationDriver, ThreatStatus};
//!
//! let mut driver = SimulationDriver::default();
//! driver.start("quiet_channel");
//! driver.inject_attack("intercept_resend", 1_000);
//!
//! let report = driver.tick_ms(500);
//! assert!(report.snapshot.is_under_attack);
//! assert_eq!(driver.engine().status(), ThreatStatus::UnderAttack);
//! ```
//!
//! ## Available Scenarios
//!
//! | Scenario           | Events                                     |
//! |--------------------|--------------------------------------------|
//! | `quiet_channel`    | QBER samples in 2-6%                       |
//! | `noisy_channel`    | QBER drifting from 2% towards 10%          |
//! | `intercept_resend` | Eavesdrop, then QBER samples around 25%    |
//! | `detector_alarm`   | One anomaly flag                           |

pub mod assets;
pub mod driver;
pub mod scenarios;
pub mod storyboard;

pub use assets::{
    AssetDocument, AssetError, AssetSource, DirAssetSource, HttpAssetSource, LoaderConfig,
    load_assets,
};
pub use driver::{AttackWindow, DriverState, DriverStats, SimulationDriver, TickReport};
pub use qshield_core::ThreatStatus;
pub use scenarios::{ChannelEvent, Scenario, create_scenario, list_scenarios};
pub use storyboard::{Frame, Stage, Storyboard, e91_walkthrough, rsa_walkthrough};
