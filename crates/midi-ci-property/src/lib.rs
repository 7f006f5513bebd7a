//! MIDI-CI property exchange.
//!
//! Splits outgoing transactions into chunks, reassembles incoming ones, and tracks
//! in-flight transactions for both initiators and responders.

pub mod error;
pub use error::{Error, Result};

mod config;
pub use config::PropertyExchangeConfig;

pub mod chunker;
pub use chunker::PropertyDataMessageChunker;

pub mod cache;
pub use cache::{CacheState, PropertyExchangeCache};

pub mod transactions;
pub use transactions::{
    InitiatorPropertyExchangeCache, RequestId, ResponderPropertyExchangeCache, Token64,
};

mod output;
pub use output::{
    encode_body, send_property_data, BufferOutput, ChannelOutput, OutgoingMessage,
};
