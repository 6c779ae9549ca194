//! Byte order (endianness) handling
//!
//! Raster payloads declare the byte order they were written in. Elements are
//! always decoded in the executing platform's native order first; when the
//! declared order differs, the decoded value is swapped exactly once.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::io::Element;

/// Represents the byte order (endianness) of binary data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ByteOrder {
    /// Little-endian byte order (least significant byte first)
    LittleEndian,
    /// Big-endian byte order (most significant byte first)
    BigEndian,
}

impl ByteOrder {
    /// Returns the byte order of the executing platform
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    /// Parses the ENVI `byte order` field (0 = little, 1 = big)
    pub fn from_envi_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(ByteOrder::LittleEndian),
            1 => Ok(ByteOrder::BigEndian),
            _ => Err(Error::InvalidFormat(format!("byte order {}", code))),
        }
    }

    /// Returns true when data in this order can be used without swapping
    pub fn is_native(&self) -> bool {
        *self == Self::native()
    }

    /// Decodes one element stored in this byte order
    ///
    /// `bytes` must hold exactly `T::DATA_TYPE.size()` bytes.
    pub fn decode<T: Element>(&self, bytes: &[u8]) -> T {
        let value = T::from_ne_slice(bytes);
        if self.is_native() {
            value
        } else {
            value.swap_bytes()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opposite() -> ByteOrder {
        match ByteOrder::native() {
            ByteOrder::LittleEndian => ByteOrder::BigEndian,
            ByteOrder::BigEndian => ByteOrder::LittleEndian,
        }
    }

    #[test]
    fn test_native_is_native() {
        assert!(ByteOrder::native().is_native());
        assert!(!opposite().is_native());
    }

    #[test]
    fn test_from_envi_code() {
        assert_eq!(ByteOrder::from_envi_code(0).unwrap(), ByteOrder::LittleEndian);
        assert_eq!(ByteOrder::from_envi_code(1).unwrap(), ByteOrder::BigEndian);
        assert!(ByteOrder::from_envi_code(2).is_err());
    }

    #[test]
    fn test_decode_little_endian_u16() {
        let value: u16 = ByteOrder::LittleEndian.decode(&[0x34, 0x12]);
        assert_eq!(value, 0x1234);
    }

    #[test]
    fn test_decode_big_endian_u16() {
        let value: u16 = ByteOrder::BigEndian.decode(&[0x12, 0x34]);
        assert_eq!(value, 0x1234);
    }

    #[test]
    fn test_decode_big_endian_i32() {
        let value: i32 = ByteOrder::BigEndian.decode(&(-5i32).to_be_bytes());
        assert_eq!(value, -5);
    }

    #[test]
    fn test_decode_f32_both_orders() {
        let value = std::f32::consts::PI;
        let le: f32 = ByteOrder::LittleEndian.decode(&value.to_le_bytes());
        let be: f32 = ByteOrder::BigEndian.decode(&value.to_be_bytes());
        assert_eq!(le, value);
        assert_eq!(be, value);
    }

    #[test]
    fn test_opposite_order_swaps_raw_value() {
        let raw = 0x0102u16.to_ne_bytes();
        let native: u16 = ByteOrder::native().decode(&raw);
        let swapped: u16 = opposite().decode(&raw);
        assert_eq!(native, 0x0102);
        assert_eq!(swapped, 0x0201);
    }

    #[test]
    fn test_decode_f64() {
        let value = std::f64::consts::E;
        let read: f64 = ByteOrder::BigEndian.decode(&value.to_be_bytes());
        assert_eq!(read, value);
    }
}
