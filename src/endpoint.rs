//! A MIDI-CI endpoint that speaks property exchange.
//!
//! Owns one initiator and one responder transaction table per remote MUID with
//! transactions in flight, routes incoming messages to them, and answers completed
//! inquiries through a [`PropertyDelegate`].

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender};
use midi_ci_core::header::status;
use midi_ci_core::{
    encodings, sub_id, write_property_exchange, DynamicSizePropertyExchange, MessageHeader, Muid,
    OwningResult, PropertyExchangeError, PropertyReplyHeader, PropertyRequestHeader,
    PropertySubscriptionCommand, PropertySubscriptionHeader,
};
use midi_ci_property::{
    encode_body, send_property_data, BufferOutput, InitiatorPropertyExchangeCache,
    PropertyExchangeConfig, RequestId, ResponderPropertyExchangeCache, Token64,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::builder::PropertyExchangeEndpointBuilder;
use crate::Result;

/// Reply to a Get Data inquiry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyReplyData {
    pub header: PropertyReplyHeader,
    /// Unencoded body, encoded with `header.mutual_encoding` before sending.
    pub body: Vec<u8>,
}

/// Answers property exchange inquiries from remote devices.
pub trait PropertyDelegate {
    fn property_get_data(&mut self, source: Muid, header: &PropertyRequestHeader)
        -> PropertyReplyData;

    fn property_set_data(
        &mut self,
        source: Muid,
        header: &PropertyRequestHeader,
        body: &[u8],
    ) -> PropertyReplyHeader;

    /// Called for every subscription message from a remote device except `start`.
    /// The message is acknowledged with a default reply whatever this does.
    fn property_subscription_data(
        &mut self,
        _source: Muid,
        _header: &PropertySubscriptionHeader,
        _body: &[u8],
    ) {
    }
}

/// Identifies a request sent by [`PropertyExchangeEndpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
    pub muid: Muid,
    pub token: Token64,
}

struct CompletedInquiry {
    source: Muid,
    category: u8,
    request_id: RequestId,
    result: OwningResult,
}

pub struct PropertyExchangeEndpoint<O, D> {
    muid: Muid,
    group: u8,
    config: PropertyExchangeConfig,
    output: O,
    delegate: D,
    initiators: HashMap<Muid, InitiatorPropertyExchangeCache>,
    responders: HashMap<Muid, ResponderPropertyExchangeCache>,
    inquiries_tx: Sender<CompletedInquiry>,
    inquiries_rx: Receiver<CompletedInquiry>,
}

impl PropertyExchangeEndpoint<(), ()> {
    pub fn builder() -> PropertyExchangeEndpointBuilder {
        PropertyExchangeEndpointBuilder::default()
    }
}

impl<O: BufferOutput, D: PropertyDelegate> PropertyExchangeEndpoint<O, D> {
    pub(crate) fn new(
        muid: Muid,
        group: u8,
        config: PropertyExchangeConfig,
        output: O,
        delegate: D,
    ) -> Self {
        let (inquiries_tx, inquiries_rx) = crossbeam_channel::unbounded();
        Self {
            muid,
            group,
            config,
            output,
            delegate,
            initiators: HashMap::new(),
            responders: HashMap::new(),
            inquiries_tx,
            inquiries_rx,
        }
    }

    #[inline]
    pub fn muid(&self) -> Muid {
        self.muid
    }

    #[inline]
    pub fn config(&self) -> &PropertyExchangeConfig {
        &self.config
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    /// Sends a Get Data inquiry.
    ///
    /// Returns `None` if the maximum number of requests to `destination` is already
    /// in flight.
    pub fn send_get_data(
        &mut self,
        destination: Muid,
        header: &PropertyRequestHeader,
        on_done: impl FnOnce(OwningResult) + Send + 'static,
    ) -> Result<Option<RequestKey>> {
        self.send_inquiry(
            sub_id::GET_DATA_INQUIRY,
            destination,
            header,
            Vec::new(),
            on_done,
        )
    }

    /// Sends a Set Data inquiry, encoding `body` with `header.mutual_encoding`.
    pub fn send_set_data(
        &mut self,
        destination: Muid,
        header: &PropertyRequestHeader,
        body: &[u8],
        on_done: impl FnOnce(OwningResult) + Send + 'static,
    ) -> Result<Option<RequestKey>> {
        let encoded = encode_body(body, header.mutual_encoding)?;
        self.send_inquiry(
            sub_id::SET_DATA_INQUIRY,
            destination,
            header,
            encoded,
            on_done,
        )
    }

    fn send_inquiry(
        &mut self,
        category: u8,
        destination: Muid,
        header: &PropertyRequestHeader,
        encoded_body: Vec<u8>,
        on_done: impl FnOnce(OwningResult) + Send + 'static,
    ) -> Result<Option<RequestKey>> {
        let table = self.initiators.entry(destination).or_default();
        let primed = table
            .prime_cache(self.config.max_simultaneous_requests as usize, on_done)
            .and_then(|token| Some((token, table.request_id_for_token(token)?)));
        let Some((token, request_id)) = primed else {
            self.prune(destination);
            return Ok(None);
        };

        let json = encodings::json_to_7bit_text(&header.to_value_condensed());
        let sent = send_property_data(
            &mut self.output,
            &self.config,
            self.group,
            category,
            self.muid,
            destination,
            request_id,
            &json,
            &encoded_body,
        );

        if let Err(e) = sent {
            if let Some(table) = self.initiators.get_mut(&destination) {
                table.terminate(token);
            }
            self.prune(destination);
            return Err(e.into());
        }

        debug!(
            "Sent inquiry {:#04x} for '{}' to {}",
            category, header.resource, destination
        );
        Ok(Some(RequestKey {
            muid: destination,
            token,
        }))
    }

    /// Abandons a request and tells the remote device with a Notify message.
    ///
    /// Returns false if the request had already finished.
    pub fn abort_request(&mut self, key: RequestKey) -> Result<bool> {
        let Some(table) = self.initiators.get_mut(&key.muid) else {
            return Ok(false);
        };
        let Some(request_id) = table.request_id_for_token(key.token) else {
            return Ok(false);
        };
        if !table.terminate(key.token) {
            return Ok(false);
        }
        self.prune(key.muid);

        let notify = encodings::json_to_7bit_text(&json!({ "status": status::TERMINATE }));
        let chunk = DynamicSizePropertyExchange {
            request_id: request_id.as_byte(),
            header: &notify,
            total_num_chunks: 1,
            this_chunk_num: 1,
            data: &[],
        };
        let mut bytes = Vec::new();
        write_property_exchange(
            &mut bytes,
            &MessageHeader::new(sub_id::NOTIFY, self.muid, key.muid),
            &chunk,
        )?;
        self.output.process_message(self.group, &bytes)?;

        Ok(true)
    }

    /// Requests to all remote devices that are still awaiting replies.
    pub fn ongoing_requests(&self) -> Vec<RequestKey> {
        let mut keys: Vec<RequestKey> = self
            .initiators
            .iter()
            .flat_map(|(muid, table)| {
                table
                    .ongoing_transactions()
                    .into_iter()
                    .map(move |token| RequestKey { muid: *muid, token })
            })
            .collect();
        keys.sort();
        keys
    }

    /// Remote devices with at least one transaction in flight, in either direction.
    pub fn active_remotes(&self) -> Vec<Muid> {
        let mut muids: Vec<Muid> = self
            .initiators
            .keys()
            .chain(self.responders.keys())
            .copied()
            .collect();
        muids.sort();
        muids.dedup();
        muids
    }

    /// Drops the tables for `muid` once they hold no transactions.
    fn prune(&mut self, muid: Muid) {
        if self.initiators.get(&muid).is_some_and(|t| t.is_empty()) {
            self.initiators.remove(&muid);
        }
        if self.responders.get(&muid).is_some_and(|t| t.is_empty()) {
            self.responders.remove(&muid);
        }
    }

    /// Handles one incoming MIDI-CI message.
    ///
    /// Messages addressed to other MUIDs and non-property-exchange messages are
    /// ignored. Subscription messages are passed to the delegate and acknowledged;
    /// subscription replies are ignored since this endpoint never subscribes.
    pub fn process_message(&mut self, bytes: &[u8]) -> Result<()> {
        let (header, chunk) = match midi_ci_core::parse_property_exchange(bytes) {
            Ok(parsed) => parsed,
            Err(midi_ci_core::Error::NotPropertyExchange(category)) => {
                debug!("Ignoring MIDI-CI message {:#04x}", category);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if !header.destination.is_broadcast() && header.destination != self.muid {
            return Ok(());
        }
        if header.source == self.muid {
            warn!("Received a message from our own MUID {}", self.muid);
            return Ok(());
        }

        let Some(request_id) = RequestId::new(chunk.request_id) else {
            return Ok(());
        };

        match header.category {
            sub_id::GET_DATA_REPLY | sub_id::SET_DATA_REPLY => {
                if let Some(table) = self.initiators.get_mut(&header.source) {
                    table.add_chunk(request_id, &chunk);
                }
            }
            sub_id::GET_DATA_INQUIRY
            | sub_id::SET_DATA_INQUIRY
            | sub_id::SUBSCRIPTION_INQUIRY => {
                let table = self.responders.entry(header.source).or_default();
                let starts = chunk.this_chunk_num == 1
                    || (chunk.this_chunk_num == 0 && !table.contains(request_id));
                if starts {
                    let tx = self.inquiries_tx.clone();
                    let source = header.source;
                    let category = header.category;
                    table.prime_cache(
                        self.config.max_simultaneous_requests as usize,
                        move |result| {
                            let _ = tx.send(CompletedInquiry {
                                source,
                                category,
                                request_id,
                                result,
                            });
                        },
                        request_id,
                    );
                }
                table.add_chunk(request_id, &chunk);
            }
            sub_id::NOTIFY => {
                if let Some(table) = self.initiators.get_mut(&header.source) {
                    table.notify(request_id, chunk.header);
                }
                if let Some(table) = self.responders.get_mut(&header.source) {
                    table.notify(request_id, chunk.header);
                }
            }
            other => debug!("No handler for property exchange message {:#04x}", other),
        }

        self.prune(header.source);
        self.answer_inquiries()
    }

    fn answer_inquiries(&mut self) -> Result<()> {
        while let Ok(inquiry) = self.inquiries_rx.try_recv() {
            self.answer(inquiry)?;
        }
        Ok(())
    }

    fn answer(&mut self, inquiry: CompletedInquiry) -> Result<()> {
        let reply_category = inquiry.category + 1;

        let (reply, body) = match inquiry.result.error() {
            Some(e) if inquiry.category == sub_id::SUBSCRIPTION_INQUIRY => {
                debug!("Dropping subscription message from {}: {}", inquiry.source, e);
                return Ok(());
            }
            // No reply is sent for a Notify
            Some(PropertyExchangeError::Notify) => return Ok(()),
            Some(PropertyExchangeError::TooManyTransactions) => {
                (PropertyReplyHeader::with_status(status::RETRY), Vec::new())
            }
            Some(e) => {
                debug!("Rejecting inquiry from {}: {}", inquiry.source, e);
                (
                    PropertyReplyHeader::with_status(status::BAD_REQUEST),
                    Vec::new(),
                )
            }
            None => self.delegate_reply(&inquiry),
        };

        let json = encodings::json_to_7bit_text(&reply.to_value_condensed());
        send_property_data(
            &mut self.output,
            &self.config,
            self.group,
            reply_category,
            self.muid,
            inquiry.source,
            inquiry.request_id,
            &json,
            &body,
        )?;

        Ok(())
    }

    fn delegate_reply(&mut self, inquiry: &CompletedInquiry) -> (PropertyReplyHeader, Vec<u8>) {
        let view = inquiry.result.result();

        if inquiry.category == sub_id::SUBSCRIPTION_INQUIRY {
            let header = view.header_as_subscription_header();
            if header.command != PropertySubscriptionCommand::Start {
                self.delegate
                    .property_subscription_data(inquiry.source, &header, view.body());
            }
            return (PropertyReplyHeader::default(), Vec::new());
        }

        let request = view.header_as_request_header();

        if inquiry.category == sub_id::SET_DATA_INQUIRY {
            let reply = self
                .delegate
                .property_set_data(inquiry.source, &request, view.body());
            return (reply, Vec::new());
        }

        let data = self.delegate.property_get_data(inquiry.source, &request);
        match encode_body(&data.body, data.header.mutual_encoding) {
            Ok(body) => (data.header, body),
            Err(e) => {
                warn!("Cannot send reply for '{}': {}", request.resource, e);
                (
                    PropertyReplyHeader::with_status(status::BAD_REQUEST),
                    Vec::new(),
                )
            }
        }
    }
}

impl<O, D> std::fmt::Debug for PropertyExchangeEndpoint<O, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyExchangeEndpoint")
            .field("muid", &self.muid)
            .field("group", &self.group)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
