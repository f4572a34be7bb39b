use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot build command: {0}")]
    Build(String),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Failed to start process: {0}")]
    Spawn(String),

    #[error("Process failed: {0}")]
    Runtime(String),

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Another job is already running")]
    AlreadyRunning,

    #[error("Command is empty")]
    EmptyCommand,

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl StudioError {
    /// Whether the error deserves an explicit notification to the user.
    ///
    /// Cancellation is an expected terminal state and probe failures degrade
    /// to sentinels, so neither is surfaced.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, StudioError::Cancelled | StudioError::Probe(_))
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_visible_taxonomy() {
        assert!(StudioError::Build("no source".into()).is_user_visible());
        assert!(StudioError::Spawn("missing".into()).is_user_visible());
        assert!(StudioError::Runtime("exit code 1".into()).is_user_visible());
        assert!(!StudioError::Cancelled.is_user_visible());
        assert!(!StudioError::Probe("timeout".into()).is_user_visible());
    }
}
