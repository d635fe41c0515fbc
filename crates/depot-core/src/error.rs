use thiserror::Error;

/// Caller mistakes detected before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("{name} must not be blank")]
    Blank { name: &'static str },
    #[error("deployment type is not recognized")]
    DeploymentTypeNotRecognized,
    #[error("{name} must be provided (an empty list is accepted)")]
    MissingProfiles { name: &'static str },
}

pub fn ensure_not_blank(value: &str, name: &'static str) -> Result<(), ArgumentError> {
    if value.trim().is_empty() {
        return Err(ArgumentError::Blank { name });
    }
    Ok(())
}
