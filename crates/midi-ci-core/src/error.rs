//! Error types for MIDI-CI core types and codecs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed MIDI-CI message: {0}")]
    Malformed(String),

    #[error("Not a MIDI-CI message")]
    NotMidiCi,

    #[error("Not a property exchange message (sub-ID #2 {0:#04x})")]
    NotPropertyExchange(u8),

    #[error("Reserved MIDI-CI version bits set: {0:#04x}")]
    ReservedVersion(u8),

    #[error("Invalid MUID: {0:#x} does not fit in 28 bits")]
    InvalidMuid(u32),

    #[error("Value {0} does not fit in a 14-bit field")]
    FieldOverflow(usize),

    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
