//! Splits a property exchange header and body into wire-sized chunks.

use std::io::{self, Read, Seek, SeekFrom};

use midi_ci_core::message::{self, MAX_14_BIT, PROPERTY_EXCHANGE_OVERHEAD};
use midi_ci_core::{MessageHeader, Muid};
use tracing::{debug, warn};

/// Body bytes that fit next to a header of `header_len` bytes in a message of
/// `chunk_size` bytes, or `None` if the header does not fit.
pub fn room_for_body(chunk_size: usize, header_len: usize) -> Option<usize> {
    if header_len > MAX_14_BIT {
        return None;
    }
    chunk_size
        .checked_sub(PROPERTY_EXCHANGE_OVERHEAD + header_len)
        .filter(|room| *room > 0)
        .map(|room| room.min(MAX_14_BIT))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct ChunkerState {
    chunk_size: usize,
    message_kind: u8,
    request_id: u8,
    source: Muid,
    destination: Muid,
    this_chunk: u16,
    total_num_chunks: u16,
}

/// Produces the messages of one property exchange transaction, one at a time.
///
/// Each message is written into a caller-owned buffer that is overwritten on every
/// [`advance`](Self::advance), so a chunk must be sent (or copied) before moving on.
/// The header travels in the first chunk only.
///
/// ```ignore
/// let mut chunker = PropertyDataMessageChunker::new(&mut storage, 512, kind, id, header, src, dst, body)?;
/// while let Some(chunk) = chunker.current() {
///     output.process_message(group, chunk);
///     chunker.advance()?;
/// }
/// ```
pub struct PropertyDataMessageChunker<'s, R> {
    storage: &'s mut Vec<u8>,
    header: Vec<u8>,
    body: R,
    room: usize,
    remaining: usize,
    state: ChunkerState,
}

impl<'s, R: Read + Seek> PropertyDataMessageChunker<'s, R> {
    /// See [`room_for_body`].
    #[inline]
    pub fn room_for_body(chunk_size: usize, header_len: usize) -> Option<usize> {
        room_for_body(chunk_size, header_len)
    }

    /// Creates a chunker positioned on the first chunk.
    ///
    /// The header must fit in `chunk_size` (see [`room_for_body`](Self::room_for_body))
    /// and the body must not need more than 16383 chunks. If either is violated no
    /// chunks are produced.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: &'s mut Vec<u8>,
        chunk_size: usize,
        message_kind: u8,
        request_id: u8,
        header: impl Into<Vec<u8>>,
        source: Muid,
        destination: Muid,
        mut body: R,
    ) -> io::Result<Self> {
        let header = header.into();
        let start = body.stream_position()?;
        let end = body.seek(SeekFrom::End(0))?;
        body.seek(SeekFrom::Start(start))?;
        let body_len = end.saturating_sub(start) as usize;

        let mut chunker = Self {
            storage,
            header,
            body,
            room: 0,
            remaining: 0,
            state: ChunkerState::default(),
        };

        let Some(room) = Self::room_for_body(chunk_size, chunker.header.len()) else {
            warn!(
                "Property exchange header of {} bytes does not fit in a {} byte message",
                chunker.header.len(),
                chunk_size
            );
            chunker.storage.clear();
            return Ok(chunker);
        };

        let total_num_chunks = body_len.div_ceil(room).max(1);
        if total_num_chunks > MAX_14_BIT {
            warn!(
                "Property exchange body of {} bytes needs {} chunks, more than {} allowed",
                body_len, total_num_chunks, MAX_14_BIT
            );
            chunker.storage.clear();
            return Ok(chunker);
        }

        debug!(
            "Chunking request {}: {} body bytes into {} chunks of {} bytes",
            request_id, body_len, total_num_chunks, chunk_size
        );

        chunker.room = room;
        chunker.remaining = body_len;
        chunker.state = ChunkerState {
            chunk_size,
            message_kind,
            request_id,
            source,
            destination,
            this_chunk: 1,
            total_num_chunks: total_num_chunks as u16,
        };
        chunker.storage.reserve(chunk_size);
        chunker.write_chunk()?;

        Ok(chunker)
    }

    /// The bytes of the current chunk, `None` once every chunk has been produced.
    pub fn current(&self) -> Option<&[u8]> {
        if self.is_finished() {
            return None;
        }
        Some(self.storage.as_slice())
    }

    /// Moves to the next chunk, overwriting the storage.
    pub fn advance(&mut self) -> io::Result<()> {
        if self.is_finished() {
            return Ok(());
        }
        if self.state.this_chunk >= self.state.total_num_chunks {
            self.finish();
            return Ok(());
        }

        self.state.this_chunk += 1;
        self.write_chunk()
    }

    pub fn is_finished(&self) -> bool {
        self.state == ChunkerState::default()
    }

    #[inline]
    pub fn total_num_chunks(&self) -> u16 {
        self.state.total_num_chunks
    }

    #[inline]
    pub fn this_chunk(&self) -> u16 {
        self.state.this_chunk
    }

    fn finish(&mut self) {
        self.state = ChunkerState::default();
        self.storage.clear();
    }

    fn write_chunk(&mut self) -> io::Result<()> {
        let result = self.fill_storage();
        if result.is_err() {
            self.finish();
        }
        result
    }

    fn fill_storage(&mut self) -> io::Result<()> {
        let state = self.state;
        let header: &[u8] = if state.this_chunk == 1 {
            &self.header
        } else {
            &[]
        };
        let data_len = self.remaining.min(self.room);

        let storage = &mut *self.storage;
        storage.clear();
        message::write_property_exchange_prefix(
            storage,
            &MessageHeader::new(state.message_kind, state.source, state.destination),
            state.request_id,
            header,
            state.total_num_chunks,
            state.this_chunk,
            data_len,
        )
        .map_err(invalid_input)?;

        let start = storage.len();
        storage.resize(start + data_len, 0);
        self.body.read_exact(&mut storage[start..])?;
        self.remaining -= data_len;

        Ok(())
    }
}

impl<R> PartialEq for PropertyDataMessageChunker<'_, R> {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl<R> std::fmt::Debug for PropertyDataMessageChunker<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyDataMessageChunker")
            .field("request_id", &self.state.request_id)
            .field("this_chunk", &self.state.this_chunk)
            .field("total_num_chunks", &self.state.total_num_chunks)
            .finish_non_exhaustive()
    }
}

fn invalid_input(e: midi_ci_core::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e)
}
