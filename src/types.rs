//! Core data types for hyraster

use serde::Serialize;

use crate::error::{Error, Result};

/// Represents raster element types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Unsigned 64-bit integer
    U64,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point
    F64,
}

impl DataType {
    /// Returns the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    /// Returns the name of this data type
    pub fn name(&self) -> &'static str {
        match self {
            DataType::U8 => "U8",
            DataType::U16 => "U16",
            DataType::U32 => "U32",
            DataType::U64 => "U64",
            DataType::I8 => "I8",
            DataType::I16 => "I16",
            DataType::I32 => "I32",
            DataType::I64 => "I64",
            DataType::F32 => "F32",
            DataType::F64 => "F64",
        }
    }

    /// Maps an ENVI `data type` code onto an element type
    ///
    /// Complex types (6, 9) have no counterpart and are rejected.
    pub fn from_envi_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(DataType::U8),
            2 => Ok(DataType::I16),
            3 => Ok(DataType::I32),
            4 => Ok(DataType::F32),
            5 => Ok(DataType::F64),
            12 => Ok(DataType::U16),
            13 => Ok(DataType::U32),
            14 => Ok(DataType::I64),
            15 => Ok(DataType::U64),
            _ => Err(Error::Unsupported(format!("ENVI data type {}", code))),
        }
    }
}

/// Order in which line, column and band dimensions are serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Interleave {
    /// Band-sequential: (band, line, column)
    Bsq,
    /// Band-interleaved-by-line: (line, band, column)
    Bil,
    /// Band-interleaved-by-pixel: (line, column, band)
    Bip,
}

impl Interleave {
    /// Parses an interleave tag, case-insensitively
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "bsq" => Ok(Interleave::Bsq),
            "bil" => Ok(Interleave::Bil),
            "bip" => Ok(Interleave::Bip),
            other => Err(Error::Unsupported(format!("interleave '{}'", other))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Interleave::Bsq => "bsq",
            Interleave::Bil => "bil",
            Interleave::Bip => "bip",
        }
    }
}

/// Raster extent in lines, columns and bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RasterShape {
    pub lines: usize,
    pub columns: usize,
    pub bands: usize,
}

impl RasterShape {
    /// Creates a shape, rejecting empty dimensions
    pub fn new(lines: usize, columns: usize, bands: usize) -> Result<Self> {
        if lines == 0 || columns == 0 || bands == 0 {
            return Err(Error::InvalidFormat(format!(
                "raster dimensions must be positive, got {} x {} x {}",
                lines, columns, bands
            )));
        }
        let shape = Self { lines, columns, bands };
        if shape.checked_element_count().is_none() {
            return Err(Error::InvalidFormat(format!(
                "raster of {} x {} x {} elements is not addressable",
                lines, columns, bands
            )));
        }
        Ok(shape)
    }

    /// Returns the number of pixels in one band
    pub fn pixel_count(&self) -> usize {
        self.lines * self.columns
    }

    /// Returns the total number of elements across all bands
    pub fn element_count(&self) -> usize {
        self.lines * self.columns * self.bands
    }

    /// Like [`element_count`](Self::element_count), `None` on overflow
    pub fn checked_element_count(&self) -> Option<usize> {
        self.lines.checked_mul(self.columns)?.checked_mul(self.bands)
    }
}
