use crate::exit_codes::ExitCode;

/// A run that could not produce a verdict. Scenario failures are not errors; they are reported
/// through [`ExitCode::ScenariosFailed`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Bad flags, an unreadable or malformed config file, or an unusable base URL.
    #[error("{0:#}")]
    InvalidInput(anyhow::Error),

    /// The suite ran but its results could not be presented or saved.
    #[error("{0:#}")]
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }
}
