//! 7-bit-safe encodings for property exchange headers and bodies.
//!
//! MIDI-CI messages travel inside SysEx, so every byte on the wire must have its
//! high bit clear. Headers are JSON written as 7-bit text; bodies use whichever
//! [`Encoding`] the two devices agreed on.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde_json::Value;
use tracing::warn;

use crate::encoding::Encoding;
use crate::error::Result;

/// Decode 7-bit text into a string.
///
/// `\uXXXX` escapes (lowercase hex) naming a code unit of 0x80 or above are turned
/// back into characters. Escaped backslashes are left as they are, so JSON string
/// escapes pass through untouched.
pub fn string_from_7bit_text(bytes: &[u8]) -> String {
    let mut units = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        let byte = bytes[index];

        if byte == b'\\' {
            match bytes.get(index + 1) {
                Some(b'\\') => {
                    units.extend([b'\\' as u16, b'\\' as u16]);
                    index += 2;
                    continue;
                }
                Some(b'u') => {
                    if let Some(unit) = bytes.get(index + 2..index + 6).and_then(parse_escape) {
                        if unit >= 0x80 {
                            units.push(unit);
                            index += 6;
                            continue;
                        }
                    }
                }
                _ => {}
            }
        }

        units.push(byte as u16);
        index += 1;
    }

    String::from_utf16_lossy(&units)
}

/// Encode a string as 7-bit text. UTF-16 code units of 0x80 and above become
/// `\uXXXX` escapes.
pub fn string_to_7bit_text(text: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(text.len());

    for unit in text.encode_utf16() {
        if unit < 0x80 {
            result.push(unit as u8);
        } else {
            result.extend_from_slice(format!("\\u{unit:04x}").as_bytes());
        }
    }

    result
}

fn parse_escape(digits: &[u8]) -> Option<u16> {
    if !digits
        .iter()
        .all(|d| d.is_ascii_digit() || (b'a'..=b'f').contains(d))
    {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    u16::from_str_radix(text, 16).ok()
}

/// Regroup 8-bit data into 7-bit-clean bytes.
///
/// Each group of up to 7 input bytes is preceded by a byte collecting their high
/// bits, the first byte's MSB in bit 6, the second's in bit 5, and so on.
pub fn to_mcoded7(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len() + bytes.len().div_ceil(7));

    for group in bytes.chunks(7) {
        let high_bits = group
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, byte)| acc | ((byte & 0x80) >> (i + 1)));

        result.push(high_bits);
        result.extend(group.iter().map(|byte| byte & 0x7f));
    }

    result
}

/// Inverse of [`to_mcoded7`].
pub fn from_mcoded7(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len());

    for group in bytes.chunks(8) {
        let Some((&high_bits, low)) = group.split_first() else {
            continue;
        };

        result.extend(
            low.iter()
                .enumerate()
                .map(|(i, byte)| (byte & 0x7f) | ((high_bits << (i + 1)) & 0x80)),
        );
    }

    result
}

/// Encode a body for transmission.
///
/// Returns `None` if ASCII was requested but the data is not 7-bit clean.
pub fn try_encode(bytes: &[u8], encoding: Encoding) -> Option<Vec<u8>> {
    match encoding {
        Encoding::Ascii => {
            if bytes.iter().any(|byte| byte & 0x80 != 0) {
                return None;
            }
            Some(bytes.to_vec())
        }
        Encoding::Mcoded7 => Some(to_mcoded7(bytes)),
        Encoding::ZlibAndMcoded7 => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(bytes).ok()?;
            let compressed = encoder.finish().ok()?;
            Some(to_mcoded7(&compressed))
        }
    }
}

/// Decode a received body.
///
/// Input that is not 7-bit clean produces unspecified output.
pub fn decode(bytes: &[u8], encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Ascii => bytes.to_vec(),
        Encoding::Mcoded7 => from_mcoded7(bytes),
        Encoding::ZlibAndMcoded7 => {
            let compressed = from_mcoded7(bytes);
            let mut result = Vec::new();

            if let Err(e) = ZlibDecoder::new(compressed.as_slice()).read_to_end(&mut result) {
                warn!("Failed to inflate zlib+Mcoded7 body: {}", e);
                return Vec::new();
            }

            result
        }
    }
}

/// Parse a 7-bit text JSON header.
pub fn json_from_7bit_text(bytes: &[u8]) -> Result<Value> {
    Ok(serde_json::from_str(&string_from_7bit_text(bytes))?)
}

/// Serialize JSON as compact 7-bit text.
pub fn json_to_7bit_text(value: &Value) -> Vec<u8> {
    string_to_7bit_text(&value.to_string())
}
