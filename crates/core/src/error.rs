use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// One or more human-readable reasons the input was rejected.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A conditional write lost the race against another actor.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Build a validation error carrying a single reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(vec![reason.into()])
    }

    /// Turn a list of collected reasons into `Ok(())` or a validation error.
    pub fn check(reasons: Vec<String>) -> Result<(), Self> {
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(Self::Validation(reasons))
        }
    }

    /// Reasons attached to a validation error, or the display string otherwise.
    pub fn reasons(&self) -> Vec<String> {
        match self {
            Self::Validation(reasons) => reasons.clone(),
            other => vec![other.to_string()],
        }
    }
}
