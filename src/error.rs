use thiserror::Error;

#[derive(Error, Debug)]
pub enum PeriodicError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Query cannot contain more than one periodic window")]
    MultiplePeriodicNodes,
    #[error("Metadata graph inconsistent: {0}")]
    Consistency(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Export error: {0}")]
    Export(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, PeriodicError>;

// Helper conversions
impl From<rusqlite::Error> for PeriodicError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<::config::ConfigError> for PeriodicError {
    fn from(e: ::config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<serde_json::Error> for PeriodicError {
    fn from(e: serde_json::Error) -> Self { Self::Serialization(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for PeriodicError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}

// Shorthands used where validation fails
pub(crate) fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(PeriodicError::InvalidArgument(message.into()))
}
pub(crate) fn inconsistent<T>(message: impl Into<String>) -> Result<T> {
    Err(PeriodicError::Consistency(message.into()))
}
