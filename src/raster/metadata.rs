//! Raster shape, encoding and spectral metadata

use serde::Serialize;

use crate::error::{Error, Result};
use crate::formats::envi::HeaderMap;
use crate::io::ByteOrder;
use crate::types::{DataType, Interleave, RasterShape};

/// Everything needed to locate and decode a raster, plus spectral tables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterMetadata {
    pub shape: RasterShape,
    pub dtype: DataType,
    pub interleave: Interleave,
    /// Byte order of the stored payload (flat binary only)
    pub byte_order: ByteOrder,
    /// Byte offset of the payload within the file (flat binary only)
    pub offset: u64,
    pub no_data: Option<f64>,
    pub wavelengths: Vec<f64>,
    pub fwhm: Vec<f64>,
    pub wavelength_units: Option<String>,
    /// Per-band usability, `true` = usable
    pub bad_bands: Vec<bool>,
}

impl RasterMetadata {
    /// Builds metadata from parsed ENVI header fields
    pub fn from_header(header: &HeaderMap) -> Result<Self> {
        let shape = RasterShape::new(
            header.require("lines")?,
            header.require("samples")?,
            header.require("bands")?,
        )?;

        let dtype = DataType::from_envi_code(header.require("data type")?)?;

        let interleave = header
            .scalar("interleave")
            .ok_or_else(|| Error::MissingField("interleave".to_string()))
            .and_then(Interleave::from_tag)?;

        let byte_order = match header.parse_scalar::<u32>("byte order")? {
            Some(code) => ByteOrder::from_envi_code(code)?,
            None => ByteOrder::LittleEndian,
        };

        let bad_bands = header
            .parse_list::<f64>("bbl")?
            .into_iter()
            .map(|flag| flag != 0.0)
            .collect();

        let metadata = Self {
            shape,
            dtype,
            interleave,
            byte_order,
            offset: header.parse_scalar("header offset")?.unwrap_or(0),
            no_data: header.parse_scalar("data ignore value")?,
            wavelengths: header.parse_list("wavelength")?,
            fwhm: header.parse_list("fwhm")?,
            wavelength_units: header.scalar("wavelength units").map(str::to_string),
            bad_bands,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Payload size in bytes, an error when it cannot be addressed
    pub fn payload_len(&self) -> Result<usize> {
        self.shape
            .checked_element_count()
            .and_then(|count| count.checked_mul(self.dtype.size()))
            .ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "{} x {} x {} {} payload overflows the address space",
                    self.shape.lines,
                    self.shape.columns,
                    self.shape.bands,
                    self.dtype.name()
                ))
            })
    }

    /// Checks the payload extent and that per-band tables are empty or one
    /// entry per band
    pub fn validate(&self) -> Result<()> {
        let len = self.payload_len()?;
        if self.offset.checked_add(len as u64).is_none() {
            return Err(Error::InvalidFormat(format!(
                "header offset {} plus {} payload bytes overflows",
                self.offset, len
            )));
        }

        let bands = self.shape.bands;
        let tables = [
            ("wavelength", self.wavelengths.len()),
            ("fwhm", self.fwhm.len()),
            ("bbl", self.bad_bands.len()),
        ];
        for (name, len) in tables {
            if len != 0 && len != bands {
                return Err(Error::ShapeMismatch(format!(
                    "{} has {} entries for {} bands",
                    name, len, bands
                )));
            }
        }
        Ok(())
    }

    /// Smallest and largest registered wavelength
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        let min = self.wavelengths.iter().copied().reduce(f64::min)?;
        let max = self.wavelengths.iter().copied().reduce(f64::max)?;
        Some((min, max))
    }
}
