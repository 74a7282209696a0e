use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine-level failure taxonomy. Every mutating entry point either commits
/// fully or returns one of these with the document untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("selection is stale or unresolved: {0}")]
    SelectionInvalid(String),
    #[error("structural precondition failed: {0}")]
    StructureViolation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported in this context: {0}")]
    Unsupported(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::SelectionInvalid(_) => "selection_invalid",
            EngineError::StructureViolation(_) => "structure_violation",
            EngineError::NotFound(_) => "not_found",
            EngineError::Unsupported(_) => "unsupported",
        }
    }

    /// Whether the host should surface this to the user. Lost or stale
    /// selections are routine; the rest indicate an internal inconsistency.
    pub fn alert(&self) -> bool {
        !matches!(
            self,
            EngineError::SelectionInvalid(_) | EngineError::Unsupported(_)
        )
    }
}

/// Host-facing projection of an [`EngineError`], carried on the bridge's
/// error event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSignal {
    pub code: String,
    pub message: String,
    pub alert: bool,
}

impl From<&EngineError> for ErrorSignal {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            alert: err.alert(),
        }
    }
}
