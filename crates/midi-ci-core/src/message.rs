//! Marshalling and parsing of MIDI-CI property exchange messages.
//!
//! Buffers hold the Universal SysEx body without the `F0`/`F7` framing.

use crate::error::{Error, Result};
use crate::muid::Muid;

/// Universal non-realtime SysEx id.
pub const UNIVERSAL_SYSEX: u8 = 0x7e;
/// Sub-ID #1 for MIDI-CI.
pub const MIDI_CI: u8 = 0x0d;
/// MIDI-CI version written into outgoing messages.
pub const IMPLEMENTATION_VERSION: u8 = 0x02;

/// Bytes of envelope and fixed property exchange fields in every chunk.
pub const PROPERTY_EXCHANGE_OVERHEAD: usize = 22;
/// Largest value a 14-bit field can carry.
pub const MAX_14_BIT: usize = 0x3fff;

/// Sub-ID #2 values for property exchange messages.
pub mod sub_id {
    pub const CAPABILITIES_INQUIRY: u8 = 0x30;
    pub const CAPABILITIES_REPLY: u8 = 0x31;
    pub const GET_DATA_INQUIRY: u8 = 0x34;
    pub const GET_DATA_REPLY: u8 = 0x35;
    pub const SET_DATA_INQUIRY: u8 = 0x36;
    pub const SET_DATA_REPLY: u8 = 0x37;
    pub const SUBSCRIPTION_INQUIRY: u8 = 0x38;
    pub const SUBSCRIPTION_REPLY: u8 = 0x39;
    pub const NOTIFY: u8 = 0x3f;

    /// Messages that carry a header and chunked property data.
    pub const fn carries_property_data(id: u8) -> bool {
        matches!(
            id,
            GET_DATA_INQUIRY
                | GET_DATA_REPLY
                | SET_DATA_INQUIRY
                | SET_DATA_REPLY
                | SUBSCRIPTION_INQUIRY
                | SUBSCRIPTION_REPLY
                | NOTIFY
        )
    }
}

/// Addressing byte following the Universal SysEx id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeviceId {
    /// A single channel (0..=15) within the group.
    Channel(u8),
    /// The whole group.
    Group,
    #[default]
    FunctionBlock,
}

impl DeviceId {
    pub const fn to_byte(self) -> u8 {
        match self {
            DeviceId::Channel(channel) => channel & 0x0f,
            DeviceId::Group => 0x7e,
            DeviceId::FunctionBlock => 0x7f,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00..=0x0f => Ok(DeviceId::Channel(byte)),
            0x7e => Ok(DeviceId::Group),
            0x7f => Ok(DeviceId::FunctionBlock),
            _ => Err(Error::Malformed(format!("invalid device id {byte:#04x}"))),
        }
    }
}

/// Fields shared by every MIDI-CI message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageHeader {
    pub device_id: DeviceId,
    /// Sub-ID #2.
    pub category: u8,
    pub version: u8,
    pub source: Muid,
    pub destination: Muid,
}

impl MessageHeader {
    /// Header for an outgoing message addressed to a whole function block.
    pub fn new(category: u8, source: Muid, destination: Muid) -> Self {
        Self {
            device_id: DeviceId::FunctionBlock,
            category,
            version: IMPLEMENTATION_VERSION,
            source,
            destination,
        }
    }
}

/// One chunk of a property exchange transaction.
///
/// `header` is only non-empty in the first chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DynamicSizePropertyExchange<'a> {
    pub request_id: u8,
    pub header: &'a [u8],
    pub total_num_chunks: u16,
    pub this_chunk_num: u16,
    pub data: &'a [u8],
}

impl DynamicSizePropertyExchange<'_> {
    /// True when this chunk ends the transaction.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.this_chunk_num == 0 || self.this_chunk_num == self.total_num_chunks
    }
}

/// Append a 14-bit value, least significant 7 bits first.
pub fn write_u14(out: &mut Vec<u8>, value: usize) -> Result<()> {
    if value > MAX_14_BIT {
        return Err(Error::FieldOverflow(value));
    }
    out.push((value & 0x7f) as u8);
    out.push(((value >> 7) & 0x7f) as u8);
    Ok(())
}

/// Decode a 14-bit value from two 7-bit bytes.
#[inline]
pub fn read_u14(lsb: u8, msb: u8) -> u16 {
    (lsb & 0x7f) as u16 | (((msb & 0x7f) as u16) << 7)
}

/// Append everything of a property exchange message up to its property data: the
/// envelope, request id, header and the chunk and data-length fields.
///
/// The caller appends `data_len` bytes of property data afterwards.
#[allow(clippy::too_many_arguments)]
pub fn write_property_exchange_prefix(
    out: &mut Vec<u8>,
    header: &MessageHeader,
    request_id: u8,
    json_header: &[u8],
    total_num_chunks: u16,
    this_chunk_num: u16,
    data_len: usize,
) -> Result<()> {
    out.extend_from_slice(&[
        UNIVERSAL_SYSEX,
        header.device_id.to_byte(),
        MIDI_CI,
        header.category,
        header.version,
    ]);
    out.extend_from_slice(&header.source.to_bytes());
    out.extend_from_slice(&header.destination.to_bytes());

    out.push(request_id & 0x7f);
    write_u14(out, json_header.len())?;
    out.extend_from_slice(json_header);
    write_u14(out, total_num_chunks as usize)?;
    write_u14(out, this_chunk_num as usize)?;
    write_u14(out, data_len)
}

/// Append a complete property exchange message to `out`.
pub fn write_property_exchange(
    out: &mut Vec<u8>,
    header: &MessageHeader,
    chunk: &DynamicSizePropertyExchange<'_>,
) -> Result<()> {
    out.reserve(PROPERTY_EXCHANGE_OVERHEAD + chunk.header.len() + chunk.data.len());
    write_property_exchange_prefix(
        out,
        header,
        chunk.request_id,
        chunk.header,
        chunk.total_num_chunks,
        chunk.this_chunk_num,
        chunk.data.len(),
    )?;
    out.extend_from_slice(chunk.data);
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.bytes.len() < len {
            return Err(Error::Malformed(format!("truncated {what}")));
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    fn byte(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u14(&mut self, what: &str) -> Result<u16> {
        let bytes = self.take(2, what)?;
        Ok(read_u14(bytes[0], bytes[1]))
    }

    fn muid(&mut self, what: &str) -> Result<Muid> {
        let bytes = self.take(4, what)?;
        Ok(Muid::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Parse only the common MIDI-CI fields.
pub fn parse_header(bytes: &[u8]) -> Result<MessageHeader> {
    let mut reader = Reader { bytes };
    read_header(&mut reader)
}

fn read_header(reader: &mut Reader<'_>) -> Result<MessageHeader> {
    let sysex = reader.byte("universal sysex id")?;
    let device = reader.byte("device id")?;
    let sub_id_1 = reader.byte("sub-ID #1")?;
    if sysex != UNIVERSAL_SYSEX || sub_id_1 != MIDI_CI {
        return Err(Error::NotMidiCi);
    }

    let header = MessageHeader {
        device_id: DeviceId::from_byte(device)?,
        category: reader.byte("sub-ID #2")?,
        version: reader.byte("version")?,
        source: reader.muid("source MUID")?,
        destination: reader.muid("destination MUID")?,
    };

    if header.version & 0x70 != 0 {
        return Err(Error::ReservedVersion(header.version));
    }

    Ok(header)
}

/// Parse a property exchange message. The returned chunk borrows from `bytes`.
pub fn parse_property_exchange(
    bytes: &[u8],
) -> Result<(MessageHeader, DynamicSizePropertyExchange<'_>)> {
    if bytes.iter().any(|byte| byte & 0x80 != 0) {
        return Err(Error::Malformed("byte with high bit set".into()));
    }

    let mut reader = Reader { bytes };
    let header = read_header(&mut reader)?;

    if !sub_id::carries_property_data(header.category) {
        return Err(Error::NotPropertyExchange(header.category));
    }

    let request_id = reader.byte("request id")?;
    let header_len = reader.u14("header length")?;
    let json_header = reader.take(header_len as usize, "header")?;
    let total_num_chunks = reader.u14("chunk count")?;
    let this_chunk_num = reader.u14("chunk number")?;
    let data_len = reader.u14("data length")?;
    let data = reader.take(data_len as usize, "property data")?;

    let chunk = DynamicSizePropertyExchange {
        request_id,
        header: json_header,
        total_num_chunks,
        this_chunk_num,
        data,
    };

    Ok((header, chunk))
}
