//! I/O primitives for hyraster
//!
//! Byte order handling and the element types that can be decoded from a
//! raster payload.

pub mod byte_order;
pub mod element;

pub use byte_order::ByteOrder;
pub use element::Element;
