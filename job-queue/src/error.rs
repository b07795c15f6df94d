use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("NATS connection error: {0}")]
    Connection(String),

    #[error("Stream creation error: {0}")]
    StreamCreation(String),

    #[error("Consumer creation error: {0}")]
    ConsumerCreation(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Subscribe error: {0}")]
    Subscribe(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
