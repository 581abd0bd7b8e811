use thiserror::Error;

#[derive(Debug, Error)]
pub enum McaError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for McaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization: {err}"))
    }
}

pub type McaResult<T> = Result<T, McaError>;
