//! Error types for property exchange.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] midi_ci_core::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Header of {header_len} bytes does not fit in a {chunk_size} byte message")]
    HeaderTooLarge { header_len: usize, chunk_size: usize },

    #[error("Body is not 7-bit clean, it cannot be sent as {0}")]
    NotSevenBitClean(midi_ci_core::Encoding),

    #[error("Output closed")]
    OutputClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
