use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Timestamp decode error: {0}")]
    Decode(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Service error: {0}")]
    Service(String),
}
