//! Reassembly of one inbound property exchange transaction.

use midi_ci_core::header::status;
use midi_ci_core::{
    encodings, DynamicSizePropertyExchange, Encoding, OwningResult, PropertyExchangeError,
};
use serde_json::Value;
use tracing::{debug, warn};

/// Called when a transaction is abandoned before it resolves.
pub type OnTerminate = Box<dyn FnOnce() + Send>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheState {
    #[default]
    Accumulating,
    Complete,
    Terminated,
}

/// Accumulates the chunks of one transaction until it completes or is terminated.
///
/// Not thread-safe; the owner serializes access.
#[derive(Default)]
pub struct PropertyExchangeCache {
    header_storage: Vec<u8>,
    body_storage: Vec<u8>,
    last_chunk: u16,
    on_terminate: Option<OnTerminate>,
    state: CacheState,
}

impl PropertyExchangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that calls `on_terminate` if [`terminate`](Self::terminate) is called
    /// before the transaction resolves.
    pub fn with_on_terminate(on_terminate: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_terminate: Some(Box::new(on_terminate)),
            ..Self::default()
        }
    }

    #[inline]
    pub fn state(&self) -> CacheState {
        self.state
    }

    /// Adds the next chunk. Returns the result once the final chunk has arrived.
    pub fn add_chunk(&mut self, chunk: &DynamicSizePropertyExchange<'_>) -> Option<OwningResult> {
        if self.state != CacheState::Accumulating {
            return None;
        }

        let in_order = chunk.this_chunk_num == 0
            || Some(chunk.this_chunk_num) == self.last_chunk.checked_add(1);
        if !in_order {
            warn!(
                "Chunk {} received after chunk {}, aborting transaction",
                chunk.this_chunk_num, self.last_chunk
            );
            self.on_terminate = None;
            self.state = CacheState::Complete;
            return Some(PropertyExchangeError::OutOfOrderChunk.into());
        }

        self.last_chunk = chunk.this_chunk_num;
        self.header_storage.extend_from_slice(chunk.header);
        self.body_storage.extend_from_slice(chunk.data);

        if !chunk.is_final() {
            return None;
        }

        self.on_terminate = None;
        self.state = CacheState::Complete;

        let header = match encodings::json_from_7bit_text(&self.header_storage) {
            Ok(header) => header,
            Err(e) => {
                warn!("Failed to parse property exchange header: {}", e);
                return Some(PropertyExchangeError::MalformedHeader.into());
            }
        };

        let encoding = header
            .get("mutualEncoding")
            .and_then(Value::as_str)
            .map(|name| {
                name.parse().unwrap_or_else(|_| {
                    warn!("Unknown mutualEncoding '{}', assuming ASCII", name);
                    Encoding::Ascii
                })
            })
            .unwrap_or_default();

        if chunk.this_chunk_num != chunk.total_num_chunks {
            return Some(PropertyExchangeError::Partial.into());
        }

        let body = encodings::decode(&self.body_storage, encoding);
        debug!(
            "Property exchange complete: {} chunks, {} body bytes",
            chunk.total_num_chunks,
            body.len()
        );

        self.header_storage = Vec::new();
        self.body_storage = Vec::new();
        Some(OwningResult::new(header, body))
    }

    /// Handles a Notify message header for this transaction.
    ///
    /// Returns `None` when the notify does not end the transaction, e.g. a status of
    /// 100 meaning the remote is still working.
    pub fn notify(&mut self, header: &[u8]) -> Option<OwningResult> {
        let value = encodings::json_from_7bit_text(header).ok()?;
        let code = value.as_object()?.get("status")?.as_i64()?;

        if code == status::STILL_PROCESSING {
            return None;
        }

        debug!("Transaction ended by notify with status {}", code);
        self.on_terminate = None;
        self.state = CacheState::Terminated;
        Some(PropertyExchangeError::Notify.into())
    }

    /// Abandons the transaction, calling the termination callback if it is still set.
    pub fn terminate(&mut self) {
        self.state = CacheState::Terminated;
        if let Some(on_terminate) = self.on_terminate.take() {
            on_terminate();
        }
    }
}

impl std::fmt::Debug for PropertyExchangeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyExchangeCache")
            .field("state", &self.state)
            .field("last_chunk", &self.last_chunk)
            .field("header_len", &self.header_storage.len())
            .field("body_len", &self.body_storage.len())
            .field("has_on_terminate", &self.on_terminate.is_some())
            .finish()
    }
}
