//! Flat binary (ENVI) raster backend
//!
//! A raw byte-interleaved payload described by a sidecar `.hdr` text file.

pub mod header;
pub mod payload;

pub use header::{find_header_path, parse_envi_header, read_envi_header, HeaderMap, HeaderValue};
pub use payload::{AccessAdvice, FlatBinarySource, MappedPayload};
