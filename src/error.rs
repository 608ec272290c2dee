use serde::Serialize;

/// Engine error types, surfaced to the interface layer.
///
/// None of these are fatal to the process: the scheduler loop keeps polling
/// whatever a single tick or mutation reports.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// The persisted document could not be parsed
    #[error("Corrupt state: {0}")]
    CorruptState(String),
    /// A time-of-day, weekday set or duration that can never be scheduled
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),
    /// Writing the persisted document failed; in-memory state is kept
    #[error("Persistence error: {0}")]
    PersistenceIo(String),
    /// The referenced reminder or alarm no longer exists
    #[error("Not found: {0}")]
    NotFound(String),
}

// Conversion to String for interface layers that only display messages
impl From<AppError> for String {
    fn from(error: AppError) -> Self {
        error.to_string()
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::PersistenceIo(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::CorruptState(error.to_string())
    }
}

// Convenience constructors
impl AppError {
    pub fn corrupt_state<S: Into<String>>(msg: S) -> Self {
        AppError::CorruptState(msg.into())
    }

    pub fn invalid_schedule<S: Into<String>>(msg: S) -> Self {
        AppError::InvalidSchedule(msg.into())
    }

    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        AppError::PersistenceIo(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AppError::NotFound(msg.into())
    }

    /// True when the mutation was applied in memory and only the write failed.
    pub fn is_warning(&self) -> bool {
        matches!(self, AppError::PersistenceIo(_))
    }
}

/// Result type alias for engine operations
pub type AppResult<T> = Result<T, AppError>;
