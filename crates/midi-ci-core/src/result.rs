//! Results of completed property exchange transactions.

use std::borrow::Cow;

use serde_json::Value;

use crate::header::{PropertyReplyHeader, PropertyRequestHeader, PropertySubscriptionHeader};

/// Ways a property exchange transaction can end without data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyExchangeError {
    /// The final chunk bookkeeping was inconsistent, e.g. a chunk numbered 0 ended a
    /// multi-chunk transaction early.
    Partial,
    /// The remote device terminated the transaction with a Notify message.
    Notify,
    /// Too many transactions are already in flight.
    TooManyTransactions,
    /// A chunk arrived out of sequence and the transaction was aborted.
    OutOfOrderChunk,
    /// The reassembled header was not valid JSON.
    MalformedHeader,
}

impl std::fmt::Display for PropertyExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Partial => "transaction ended before all chunks were received",
            Self::Notify => "transaction terminated by notify",
            Self::TooManyTransactions => "too many simultaneous transactions",
            Self::OutOfOrderChunk => "chunk received out of order",
            Self::MalformedHeader => "malformed JSON header",
        };
        f.write_str(text)
    }
}

impl std::error::Error for PropertyExchangeError {}

#[derive(Clone, Debug, PartialEq)]
enum Outcome<'a> {
    Error(PropertyExchangeError),
    Data {
        header: Cow<'a, Value>,
        body: &'a [u8],
    },
}

/// Outcome of a property exchange transaction: a header and body, or an error.
///
/// The body is borrowed. Use [`OwningResult`] (or copy the body) to keep the data
/// beyond the lifetime of its storage.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyExchangeResult<'a> {
    outcome: Outcome<'a>,
}

impl<'a> PropertyExchangeResult<'a> {
    pub fn new(header: Value, body: &'a [u8]) -> Self {
        Self {
            outcome: Outcome::Data {
                header: Cow::Owned(header),
                body,
            },
        }
    }

    pub fn from_error(error: PropertyExchangeError) -> Self {
        Self {
            outcome: Outcome::Error(error),
        }
    }

    fn borrowed(header: &'a Value, body: &'a [u8]) -> Self {
        Self {
            outcome: Outcome::Data {
                header: Cow::Borrowed(header),
                body,
            },
        }
    }

    pub fn error(&self) -> Option<PropertyExchangeError> {
        match self.outcome {
            Outcome::Error(e) => Some(e),
            Outcome::Data { .. } => None,
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error().is_none()
    }

    /// The raw JSON header, `None` for error results.
    pub fn header(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Data { header, .. } => Some(header.as_ref()),
            Outcome::Error(_) => None,
        }
    }

    /// Interpret the header as a subscription header.
    ///
    /// The caller must know from context which header shape to expect; a mismatched
    /// header yields mostly-default fields.
    pub fn header_as_subscription_header(&self) -> PropertySubscriptionHeader {
        PropertySubscriptionHeader::from_value(self.header().unwrap_or(&Value::Null))
    }

    pub fn header_as_request_header(&self) -> PropertyRequestHeader {
        PropertyRequestHeader::from_value(self.header().unwrap_or(&Value::Null))
    }

    pub fn header_as_reply_header(&self) -> PropertyReplyHeader {
        PropertyReplyHeader::from_value(self.header().unwrap_or(&Value::Null))
    }

    /// The decoded body. Empty for error results.
    pub fn body(&self) -> &'a [u8] {
        match self.outcome {
            Outcome::Data { body, .. } => body,
            Outcome::Error(_) => &[],
        }
    }
}

/// A [`PropertyExchangeResult`] that owns its body.
#[derive(Clone, Debug, PartialEq)]
pub struct OwningResult {
    header: Option<Value>,
    backing_storage: Vec<u8>,
    error: Option<PropertyExchangeError>,
}

impl OwningResult {
    pub fn new(header: Value, body: Vec<u8>) -> Self {
        Self {
            header: Some(header),
            backing_storage: body,
            error: None,
        }
    }

    pub fn from_error(error: PropertyExchangeError) -> Self {
        Self {
            header: None,
            backing_storage: Vec::new(),
            error: Some(error),
        }
    }

    /// Borrowing view, valid while `self` is alive.
    pub fn result(&self) -> PropertyExchangeResult<'_> {
        match (&self.error, &self.header) {
            (Some(e), _) => PropertyExchangeResult::from_error(*e),
            (None, Some(header)) => PropertyExchangeResult::borrowed(header, &self.backing_storage),
            (None, None) => PropertyExchangeResult::new(Value::Null, &self.backing_storage),
        }
    }

    #[inline]
    pub fn error(&self) -> Option<PropertyExchangeError> {
        self.error
    }

    #[inline]
    pub fn header(&self) -> Option<&Value> {
        self.header.as_ref()
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.backing_storage
    }

    pub fn into_parts(self) -> Result<(Value, Vec<u8>), PropertyExchangeError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok((self.header.unwrap_or(Value::Null), self.backing_storage)),
        }
    }
}

impl From<PropertyExchangeError> for OwningResult {
    fn from(error: PropertyExchangeError) -> Self {
        Self::from_error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::PropertySubscriptionCommand;
    use serde_json::json;

    #[test]
    fn test_error_result() {
        let result = PropertyExchangeResult::from_error(PropertyExchangeError::Notify);
        assert_eq!(result.error(), Some(PropertyExchangeError::Notify));
        assert!(result.header().is_none());
        assert!(result.body().is_empty());
    }

    #[test]
    fn test_borrowed_body() {
        let body = vec![1, 2, 3];
        let result = PropertyExchangeResult::new(json!({"status": 200}), &body);
        assert!(result.is_ok());
        assert_eq!(result.body(), &[1, 2, 3]);
        assert_eq!(result.header_as_reply_header().status, 200);
    }

    #[test]
    fn test_owning_result_views() {
        let owned = OwningResult::new(json!({"command": "full", "subscribeId": "a"}), b"{}".to_vec());
        let view = owned.result();
        assert_eq!(view.body(), b"{}");
        let header = view.header_as_subscription_header();
        assert_eq!(header.command, PropertySubscriptionCommand::Full);
        assert_eq!(header.subscribe_id, "a");

        let (header, body) = owned.into_parts().unwrap();
        assert_eq!(header["subscribeId"], "a");
        assert_eq!(body, b"{}");
    }

    #[test]
    fn test_owning_error() {
        let owned = OwningResult::from(PropertyExchangeError::Partial);
        assert_eq!(owned.result().error(), Some(PropertyExchangeError::Partial));
        assert_eq!(owned.into_parts(), Err(PropertyExchangeError::Partial));
    }
}
