use crate::orchestrator::PhaseResult;
use crate::types::Phase;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SparcError {
    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    #[error("unknown gate: {0}")]
    UnknownGate(String),

    #[error("invalid gate catalog: {0}")]
    InvalidCatalog(String),

    #[error("validator '{name}' failed: {message}")]
    Validator { name: String, message: String },

    /// The only error that blocks progression to the next phase. Carries the
    /// full phase result so callers can still report every gate.
    #[error("critical gate failure in phase '{phase}': {}", gates.join(", "))]
    CriticalGateFailure {
        phase: Phase,
        gates: Vec<String>,
        result: Box<PhaseResult>,
    },

    #[error("could not persist result '{key}': {message}")]
    Persistence { key: String, message: String },

    #[error("no recorded result for '{0}'")]
    ResultNotFound(String),

    #[error("phase '{phase}' is blocked: {reason}")]
    Blocked { phase: Phase, reason: String },

    #[error("hook failed: {0}")]
    Hook(String),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SparcError {
    pub fn validator(name: impl Into<String>, message: impl Into<String>) -> Self {
        SparcError::Validator {
            name: name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SparcError>;
