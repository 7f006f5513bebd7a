//! Sending property exchange messages to a MIDI transport.

use std::io::Cursor;

use crossbeam_channel::{Receiver, Sender};
use midi_ci_core::message::MAX_14_BIT;
use midi_ci_core::{encodings, Encoding, Muid};
use tracing::debug;

use crate::chunker::{room_for_body, PropertyDataMessageChunker};
use crate::config::PropertyExchangeConfig;
use crate::transactions::RequestId;
use crate::{Error, Result};

/// Destination for outgoing MIDI-CI messages.
///
/// `bytes` is a Universal SysEx body without `F0`/`F7` framing. Implementations must
/// copy it if they need it after returning.
pub trait BufferOutput {
    fn process_message(&mut self, group: u8, bytes: &[u8]) -> Result<()>;
}

/// An owned outgoing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub group: u8,
    pub bytes: Vec<u8>,
}

impl BufferOutput for Vec<OutgoingMessage> {
    fn process_message(&mut self, group: u8, bytes: &[u8]) -> Result<()> {
        self.push(OutgoingMessage {
            group,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

/// Hands messages to a transport thread over a channel.
#[derive(Clone, Debug)]
pub struct ChannelOutput {
    tx: Sender<OutgoingMessage>,
}

impl ChannelOutput {
    pub fn new(tx: Sender<OutgoingMessage>) -> Self {
        Self { tx }
    }

    /// Creates an output and the receiver the transport thread reads from.
    pub fn unbounded() -> (Self, Receiver<OutgoingMessage>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    pub fn bounded(capacity: usize) -> (Self, Receiver<OutgoingMessage>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl BufferOutput for ChannelOutput {
    fn process_message(&mut self, group: u8, bytes: &[u8]) -> Result<()> {
        self.tx
            .send(OutgoingMessage {
                group,
                bytes: bytes.to_vec(),
            })
            .map_err(|_| Error::OutputClosed)
    }
}

/// Encodes a body for sending, failing if ASCII was requested for 8-bit data.
pub fn encode_body(body: &[u8], encoding: Encoding) -> Result<Vec<u8>> {
    encodings::try_encode(body, encoding).ok_or(Error::NotSevenBitClean(encoding))
}

/// Sends one property exchange transaction as a series of chunks.
///
/// `header` must already be 7-bit JSON text and `body` already encoded. Returns the
/// number of messages sent.
#[allow(clippy::too_many_arguments)]
pub fn send_property_data<O: BufferOutput + ?Sized>(
    output: &mut O,
    config: &PropertyExchangeConfig,
    group: u8,
    message_kind: u8,
    source: Muid,
    destination: Muid,
    request_id: RequestId,
    header: &[u8],
    body: &[u8],
) -> Result<usize> {
    let chunk_size = config.max_sysex_size;
    let room = room_for_body(chunk_size, header.len()).ok_or(Error::HeaderTooLarge {
        header_len: header.len(),
        chunk_size,
    })?;

    let needed = body.len().div_ceil(room).max(1);
    if needed > MAX_14_BIT {
        return Err(midi_ci_core::Error::FieldOverflow(needed).into());
    }

    let mut storage = Vec::with_capacity(chunk_size);
    let mut chunker = PropertyDataMessageChunker::new(
        &mut storage,
        chunk_size,
        message_kind,
        request_id.as_byte(),
        header,
        source,
        destination,
        Cursor::new(body),
    )?;

    let mut sent = 0;
    while let Some(chunk) = chunker.current() {
        output.process_message(group, chunk)?;
        sent += 1;
        chunker.advance()?;
    }

    debug!(
        "Sent {} chunks for request id {} to {}",
        sent, request_id, destination
    );
    Ok(sent)
}
