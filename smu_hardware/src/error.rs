use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("serial port error: {0}")]
    Port(String),
    #[error("read timeout waiting for instrument reply")]
    Timeout,
    #[error("instrument reply is not valid UTF-8")]
    BadReply,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
