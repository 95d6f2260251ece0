use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("completion error: {0}")]
    Completion(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
