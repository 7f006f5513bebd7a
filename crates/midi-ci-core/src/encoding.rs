//! Property body encodings negotiated through the `mutualEncoding` header key.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Encoding applied to a property exchange body before it is put on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// 7-bit text, bytes are sent unchanged.
    #[default]
    #[serde(rename = "ASCII")]
    Ascii,
    /// 8-bit data regrouped into 7-bit-clean bytes.
    #[serde(rename = "Mcoded7")]
    Mcoded7,
    /// zlib-compressed, then Mcoded7.
    #[serde(rename = "zlib+Mcoded7")]
    ZlibAndMcoded7,
}

impl Encoding {
    pub const ALL: [Encoding; 3] = [
        Encoding::Ascii,
        Encoding::Mcoded7,
        Encoding::ZlibAndMcoded7,
    ];

    /// Name used in JSON headers.
    pub const fn as_str(self) -> &'static str {
        match self {
            Encoding::Ascii => "ASCII",
            Encoding::Mcoded7 => "Mcoded7",
            Encoding::ZlibAndMcoded7 => "zlib+Mcoded7",
        }
    }

    #[inline]
    pub fn is_ascii(&self) -> bool {
        *self == Encoding::Ascii
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Encoding::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| Error::UnknownEncoding(s.to_owned()))
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
