use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("unknown queue: {0}")]
    UnknownQueue(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
