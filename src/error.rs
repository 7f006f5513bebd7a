//! Centralized error type for the midi-ci umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] midi_ci_core::Error),

    #[cfg(feature = "property")]
    #[error("Property exchange: {0}")]
    Property(#[from] midi_ci_property::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
