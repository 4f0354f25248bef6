use thiserror::Error;

#[derive(Error, Debug)]
pub enum BloomifyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
