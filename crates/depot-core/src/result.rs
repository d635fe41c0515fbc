use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Success,
    Failure,
}

/// Outcome of a single pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResult {
    pub status: ServiceStatus,
    pub message: Option<String>,
    pub artifact: Option<PathBuf>,
}

impl ServiceResult {
    pub fn success() -> Self {
        Self {
            status: ServiceStatus::Success,
            message: None,
            artifact: None,
        }
    }

    pub fn success_with(message: impl Into<String>) -> Self {
        Self {
            status: ServiceStatus::Success,
            message: Some(message.into()),
            artifact: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ServiceStatus::Failure,
            message: Some(message.into()),
            artifact: None,
        }
    }

    /// Failure carrying the full context chain of `err`.
    pub fn from_error(context: &str, err: &anyhow::Error) -> Self {
        Self::failure(format!("{context}: {err:#}"))
    }

    pub fn with_artifact(mut self, artifact: impl Into<PathBuf>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ServiceStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        self.status == ServiceStatus::Failure
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }
}
