//! Core types and codecs for MIDI-CI property exchange.
//!
//! Provides MUIDs, body encodings, typed JSON headers, transaction results and the
//! property exchange wire format.

pub mod error;
pub use error::{Error, Result};

mod muid;
pub use muid::Muid;

mod encoding;
pub use encoding::Encoding;

pub mod encodings;

pub mod header;
pub use header::{
    Pagination, PropertyReplyHeader, PropertyRequestHeader, PropertySubscriptionCommand,
    PropertySubscriptionHeader,
};

mod result;
pub use result::{OwningResult, PropertyExchangeError, PropertyExchangeResult};

pub mod message;
pub use message::{
    parse_property_exchange, sub_id, write_property_exchange, write_property_exchange_prefix,
    DeviceId, DynamicSizePropertyExchange, MessageHeader,
};
