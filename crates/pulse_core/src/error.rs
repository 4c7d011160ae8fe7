use thiserror::Error;

/// Error taxonomy for the triage and voting core. `UpstreamUnavailable` is
/// absorbed inside the enrichment layer and never reaches callers of the
/// analysis path; every other kind propagates as a typed failure.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for PulseError {
    fn from(err: rusqlite::Error) -> Self {
        // A rejected duplicate vote surfaces as SQLITE_CONSTRAINT; keep the
        // distinction so callers can tell it apart from storage faults.
        if let rusqlite::Error::SqliteFailure(code, message) = &err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                let detail = message.clone().unwrap_or_else(|| code.to_string());
                return PulseError::ConstraintViolation(detail);
            }
        }
        PulseError::Storage(err)
    }
}

pub type Result<T> = std::result::Result<T, PulseError>;
