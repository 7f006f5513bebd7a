//! # midi-ci - MIDI Capability Inquiry property exchange
//!
//! Exchange JSON-described properties with MIDI-CI devices over a 7-bit SysEx
//! transport.
//!
//! ## Architecture
//!
//! midi-ci is an umbrella crate that coordinates:
//! - **midi-ci-core** - MUIDs, 7-bit encodings, typed JSON headers, wire messages
//! - **midi-ci-property** - Chunking, reassembly caches, transaction tables, outputs
//!
//! ## Quick Start
//!
//! ```ignore
//! use midi_ci::prelude::*;
//!
//! let (output, transport_rx) = ChannelOutput::unbounded();
//! let mut endpoint = PropertyExchangeEndpoint::builder()
//!     .max_simultaneous_requests(4)
//!     .build(output, my_delegate)?;
//!
//! // Ask a remote device for its resource list
//! endpoint.send_get_data(remote_muid, &PropertyRequestHeader::new("ResourceList"), |result| {
//!     // ...
//! })?;
//!
//! // Feed every MIDI-CI message received from the transport
//! endpoint.process_message(&bytes)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Everything enabled
//! - `property` - Property exchange machinery and `PropertyExchangeEndpoint`

/// Re-export of midi-ci-core for direct access
pub use midi_ci_core as core;

#[cfg(feature = "property")]
pub use midi_ci_property as property;

pub use midi_ci_core::{
    encodings, header, message, DeviceId, DynamicSizePropertyExchange, Encoding, MessageHeader,
    Muid, OwningResult, PropertyExchangeError, PropertyExchangeResult, PropertyReplyHeader,
    PropertyRequestHeader, PropertySubscriptionCommand, PropertySubscriptionHeader,
};

#[cfg(feature = "property")]
pub use midi_ci_property::{
    send_property_data, BufferOutput, ChannelOutput, InitiatorPropertyExchangeCache,
    OutgoingMessage, PropertyDataMessageChunker, PropertyExchangeCache, PropertyExchangeConfig,
    RequestId, ResponderPropertyExchangeCache, Token64,
};

mod error;
pub use error::{Error, Result};

#[cfg(feature = "property")]
mod builder;
#[cfg(feature = "property")]
mod endpoint;

#[cfg(feature = "property")]
pub use builder::PropertyExchangeEndpointBuilder;
#[cfg(feature = "property")]
pub use endpoint::{PropertyDelegate, PropertyExchangeEndpoint, PropertyReplyData, RequestKey};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Encoding, Error, Muid, OwningResult, PropertyExchangeError, PropertyReplyHeader,
        PropertyRequestHeader, Result,
    };

    #[cfg(feature = "property")]
    pub use crate::{
        BufferOutput, ChannelOutput, PropertyDelegate, PropertyExchangeConfig,
        PropertyExchangeEndpoint, PropertyReplyData, RequestKey,
    };
}
