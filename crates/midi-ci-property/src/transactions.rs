//! Tables of in-flight property exchange transactions.
//!
//! The initiator side allocates request ids for outgoing inquiries and collects the
//! replies. The responder side tracks inquiries received from remote initiators.

use std::collections::{BTreeMap, HashMap};

use midi_ci_core::header::status;
use midi_ci_core::{DynamicSizePropertyExchange, OwningResult, PropertyExchangeError};
use tracing::debug;

use crate::cache::PropertyExchangeCache;

/// Receives the outcome of a transaction.
pub type OnDone = Box<dyn FnOnce(OwningResult) + Send>;

/// Upper bound on simultaneous transactions, one per 7-bit request id.
pub const MAX_TRANSACTIONS: usize = 128;

/// A 7-bit property exchange request id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u8);

impl RequestId {
    pub const MAX: u8 = 0x7f;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    #[inline]
    pub const fn as_byte(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies an initiator transaction for its whole lifetime.
///
/// Request ids are reused once a transaction finishes; tokens are not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token64(u64);

impl Token64 {
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

struct Transaction {
    request_id: RequestId,
    cache: PropertyExchangeCache,
    on_done: OnDone,
}

/// Outgoing inquiries awaiting replies.
#[derive(Default)]
pub struct InitiatorPropertyExchangeCache {
    transactions: BTreeMap<Token64, Transaction>,
    last_token: u64,
}

impl InitiatorPropertyExchangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a transaction on the lowest free request id.
    ///
    /// Returns `None` if `max_simultaneous` transactions are already in flight.
    pub fn prime_cache(
        &mut self,
        max_simultaneous: usize,
        on_done: impl FnOnce(OwningResult) + Send + 'static,
    ) -> Option<Token64> {
        if self.transactions.len() >= max_simultaneous.min(MAX_TRANSACTIONS) {
            debug!(
                "Refusing new transaction, {} already in flight",
                self.transactions.len()
            );
            return None;
        }

        let mut used = [false; MAX_TRANSACTIONS];
        for transaction in self.transactions.values() {
            used[transaction.request_id.as_byte() as usize] = true;
        }
        let request_id = RequestId(used.iter().position(|u| !u)? as u8);

        self.last_token += 1;
        let token = Token64(self.last_token);

        let cache = PropertyExchangeCache::with_on_terminate(move || {
            debug!("Terminated initiator transaction with request id {}", request_id);
        });
        self.transactions.insert(
            token,
            Transaction {
                request_id,
                cache,
                on_done: Box::new(on_done),
            },
        );

        Some(token)
    }

    /// Feeds a reply chunk to the transaction using `request_id`.
    pub fn add_chunk(&mut self, request_id: RequestId, chunk: &DynamicSizePropertyExchange<'_>) {
        let Some(token) = self.token_for_request_id(request_id) else {
            debug!("Ignoring chunk for unknown request id {}", request_id);
            return;
        };
        let result = self
            .transactions
            .get_mut(&token)
            .and_then(|transaction| transaction.cache.add_chunk(chunk));

        if let Some(result) = result {
            self.finish(token, result);
        }
    }

    /// Feeds a Notify message header to the transaction using `request_id`.
    pub fn notify(&mut self, request_id: RequestId, header: &[u8]) {
        let Some(token) = self.token_for_request_id(request_id) else {
            return;
        };
        let result = self
            .transactions
            .get_mut(&token)
            .and_then(|transaction| transaction.cache.notify(header));

        if let Some(result) = result {
            self.finish(token, result);
        }
    }

    /// Abandons a transaction. Returns false if it had already finished.
    pub fn terminate(&mut self, token: Token64) -> bool {
        match self.transactions.remove(&token) {
            Some(mut transaction) => {
                transaction.cache.terminate();
                true
            }
            None => false,
        }
    }

    pub fn request_id_for_token(&self, token: Token64) -> Option<RequestId> {
        self.transactions.get(&token).map(|t| t.request_id)
    }

    pub fn token_for_request_id(&self, request_id: RequestId) -> Option<Token64> {
        self.transactions
            .iter()
            .find(|(_, t)| t.request_id == request_id)
            .map(|(token, _)| *token)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Tokens of all live transactions, oldest first.
    pub fn ongoing_transactions(&self) -> Vec<Token64> {
        self.transactions.keys().copied().collect()
    }

    fn finish(&mut self, token: Token64, result: OwningResult) {
        let Some(transaction) = self.transactions.remove(&token) else {
            return;
        };

        let busy = result
            .header()
            .and_then(|header| header.get("status"))
            .and_then(|code| code.as_i64())
            == Some(status::RETRY);

        if busy {
            debug!(
                "Responder busy, request id {} was not processed",
                transaction.request_id
            );
            (transaction.on_done)(PropertyExchangeError::TooManyTransactions.into());
        } else {
            (transaction.on_done)(result);
        }
    }
}

impl std::fmt::Debug for InitiatorPropertyExchangeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitiatorPropertyExchangeCache")
            .field("ongoing", &self.transactions.len())
            .field("last_token", &self.last_token)
            .finish()
    }
}

/// Inquiries received from remote initiators, keyed by their request id.
#[derive(Default)]
pub struct ResponderPropertyExchangeCache {
    transactions: HashMap<RequestId, Transaction>,
}

impl ResponderPropertyExchangeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking the inquiry using `request_id`.
    ///
    /// A live transaction already using the id is terminated first. If the table is
    /// full, `on_done` immediately receives `TooManyTransactions`.
    pub fn prime_cache(
        &mut self,
        max_simultaneous: usize,
        on_done: impl FnOnce(OwningResult) + Send + 'static,
        request_id: RequestId,
    ) {
        if let Some(mut previous) = self.transactions.remove(&request_id) {
            previous.cache.terminate();
        }

        if self.transactions.len() >= max_simultaneous.min(MAX_TRANSACTIONS) {
            debug!(
                "Too many transactions, rejecting request id {}",
                request_id
            );
            on_done(PropertyExchangeError::TooManyTransactions.into());
            return;
        }

        let cache = PropertyExchangeCache::with_on_terminate(move || {
            debug!("Terminated responder transaction with request id {}", request_id);
        });
        self.transactions.insert(
            request_id,
            Transaction {
                request_id,
                cache,
                on_done: Box::new(on_done),
            },
        );
    }

    pub fn add_chunk(&mut self, request_id: RequestId, chunk: &DynamicSizePropertyExchange<'_>) {
        let result = self
            .transactions
            .get_mut(&request_id)
            .and_then(|transaction| transaction.cache.add_chunk(chunk));

        if let Some(result) = result {
            self.finish(request_id, result);
        }
    }

    pub fn notify(&mut self, request_id: RequestId, header: &[u8]) {
        let result = self
            .transactions
            .get_mut(&request_id)
            .and_then(|transaction| transaction.cache.notify(header));

        if let Some(result) = result {
            self.finish(request_id, result);
        }
    }

    #[inline]
    pub fn contains(&self, request_id: RequestId) -> bool {
        self.transactions.contains_key(&request_id)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    #[inline]
    pub fn count_ongoing_transactions(&self) -> usize {
        self.transactions.len()
    }

    fn finish(&mut self, request_id: RequestId, result: OwningResult) {
        if let Some(transaction) = self.transactions.remove(&request_id) {
            (transaction.on_done)(result);
        }
    }
}

impl std::fmt::Debug for ResponderPropertyExchangeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponderPropertyExchangeCache")
            .field("ongoing", &self.transactions.len())
            .finish()
    }
}
