//! Fixed-width numeric element types

use crate::types::DataType;

/// Extra bound required by the hierarchical container backend
#[cfg(feature = "hdf5")]
pub trait ContainerElement: hdf5::H5Type {}

#[cfg(feature = "hdf5")]
impl<T: hdf5::H5Type> ContainerElement for T {}

/// Extra bound required by the hierarchical container backend
#[cfg(not(feature = "hdf5"))]
pub trait ContainerElement {}

#[cfg(not(feature = "hdf5"))]
impl<T> ContainerElement for T {}

/// A numeric type that raster elements can be read as
pub trait Element: Copy + Default + PartialEq + Send + Sync + ContainerElement + 'static {
    /// The raster data type this element corresponds to
    const DATA_TYPE: DataType;

    /// Decodes a value from exactly `size_of::<Self>()` native-order bytes
    fn from_ne_slice(bytes: &[u8]) -> Self;

    /// Reverses the byte order of the value
    fn swap_bytes(self) -> Self;

    /// Widens the value to `f64`
    fn to_f64(self) -> f64;
}

macro_rules! impl_int_element {
    ($($t:ty => $dt:expr),* $(,)?) => {
        $(
            impl Element for $t {
                const DATA_TYPE: DataType = $dt;

                fn from_ne_slice(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_ne_bytes(buf)
                }

                fn swap_bytes(self) -> Self {
                    <$t>::swap_bytes(self)
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

macro_rules! impl_float_element {
    ($($t:ty => $dt:expr),* $(,)?) => {
        $(
            impl Element for $t {
                const DATA_TYPE: DataType = $dt;

                fn from_ne_slice(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_ne_bytes(buf)
                }

                fn swap_bytes(self) -> Self {
                    <$t>::from_bits(self.to_bits().swap_bytes())
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_int_element!(
    u8 => DataType::U8,
    u16 => DataType::U16,
    u32 => DataType::U32,
    u64 => DataType::U64,
    i8 => DataType::I8,
    i16 => DataType::I16,
    i32 => DataType::I32,
    i64 => DataType::I64,
);

impl_float_element!(
    f32 => DataType::F32,
    f64 => DataType::F64,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_matches_size() {
        assert_eq!(<u16 as Element>::DATA_TYPE.size(), 2);
        assert_eq!(<i32 as Element>::DATA_TYPE.size(), 4);
        assert_eq!(<f64 as Element>::DATA_TYPE.size(), 8);
    }

    #[test]
    fn test_from_ne_slice() {
        let value = -1234i16;
        assert_eq!(i16::from_ne_slice(&value.to_ne_bytes()), value);
    }

    #[test]
    fn test_int_swap_bytes() {
        assert_eq!(Element::swap_bytes(0x1234u16), 0x3412);
        assert_eq!(Element::swap_bytes(0x12u8), 0x12);
    }

    #[test]
    fn test_float_swap_round_trips() {
        let value = 1.5f32;
        let swapped = Element::swap_bytes(value);
        assert_eq!(swapped.to_bits(), value.to_bits().swap_bytes());
        assert_eq!(Element::swap_bytes(swapped), value);
    }

    #[test]
    fn test_to_f64() {
        assert_eq!((-7i16).to_f64(), -7.0);
        assert_eq!(250u8.to_f64(), 250.0);
    }
}
