//! Engine error surface.
//!
//! Declared failures are a bad argument to a key exchange and a rejected
//! engine configuration. Optional external data (asset overrides) never
//! surfaces here; it degrades to the compiled-in defaults instead.

/// Errors returned by [`crate::engine::ThreatStateEngine`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    InvalidArgument(String),
    InvalidConfig(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;
