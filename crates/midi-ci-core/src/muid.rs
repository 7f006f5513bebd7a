//! MIDI Unique Identifiers.

use rand::Rng;

use crate::error::{Error, Result};

/// A 28-bit MIDI-CI endpoint identifier.
///
/// MUIDs are opaque: they are only ever compared for equality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Muid(u32);

impl Muid {
    const MASK: u32 = 0x0fff_ffff;
    const BROADCAST: u32 = 0x0fff_ffff;
    /// First value of the reserved range (`0x0FFFFF00..=0x0FFFFFFE`).
    const RESERVED_START: u32 = 0x0fff_ff00;

    /// The broadcast MUID, addressing every device on the function block.
    #[inline]
    pub const fn broadcast() -> Self {
        Self(Self::BROADCAST)
    }

    /// Wrap a raw value, rejecting anything wider than 28 bits.
    pub fn from_raw(value: u32) -> Result<Self> {
        if value & !Self::MASK != 0 {
            return Err(Error::InvalidMuid(value));
        }
        Ok(Self(value))
    }

    /// Masks the value to 28 bits.
    #[inline]
    pub const fn make_unchecked(value: u32) -> Self {
        Self(value & Self::MASK)
    }

    /// A random MUID outside the reserved and broadcast range.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(0..Self::RESERVED_START))
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST
    }

    /// Wire form: four 7-bit groups, least significant first.
    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        [
            (self.0 & 0x7f) as u8,
            ((self.0 >> 7) & 0x7f) as u8,
            ((self.0 >> 14) & 0x7f) as u8,
            ((self.0 >> 21) & 0x7f) as u8,
        ]
    }

    /// Inverse of [`Muid::to_bytes`]. High bits of each byte are ignored.
    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        let value = bytes
            .iter()
            .rev()
            .fold(0u32, |acc, byte| (acc << 7) | (*byte & 0x7f) as u32);
        Self(value)
    }
}

impl std::fmt::Display for Muid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:07x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_bytes() {
        let muid = Muid::from_bytes([0x01, 0x02, 0x03, 0x04]);
        assert_eq!(muid.as_u32(), 0x80c101);
        assert_eq!(muid.to_bytes(), [0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_broadcast() {
        assert_eq!(Muid::from_bytes([0x7f; 4]), Muid::broadcast());
        assert!(Muid::broadcast().is_broadcast());
        assert_eq!(Muid::broadcast().to_bytes(), [0x7f; 4]);
    }

    #[test]
    fn test_from_raw_rejects_wide_values() {
        assert!(Muid::from_raw(0x0fff_fffe).is_ok());
        assert!(matches!(
            Muid::from_raw(0x1000_0000),
            Err(Error::InvalidMuid(0x1000_0000))
        ));
        assert_eq!(Muid::make_unchecked(0xffff_ffff), Muid::broadcast());
    }

    #[test]
    fn test_random_avoids_reserved_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let muid = Muid::random(&mut rng);
            assert!(muid.as_u32() < 0x0fff_ff00);
        }
    }
}
