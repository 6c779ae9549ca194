//! hyraster - uniform read access to multi-band raster imagery
//!
//! hyraster reads hyperspectral cubes stored either as a flat interleaved
//! binary payload with an ENVI text header, or (with the `hdf5` feature) as a
//! reflectance dataset inside an HDF5 container. Both are exposed through one
//! [`RasterHandle`] that returns bands, lines, columns, pixel spectra and
//! rectangular chunks with identical shapes regardless of the layout on disk.
//!
//! # Examples
//!
//! ## Reading a band
//!
//! ```no_run
//! use hyraster::{BackendKind, RasterHandle};
//!
//! let raster = RasterHandle::open("scene.img", BackendKind::FlatBinary)?;
//! let band = raster.get_band::<i16>(10)?;
//! println!("band 10: {:?}", band.dim());
//!
//! if let Some(red) = raster.get_wavelength_band::<i16>(660.0)? {
//!     println!("red mean: {:?}", red.mapv(f64::from).mean());
//! }
//! # Ok::<(), hyraster::Error>(())
//! ```
//!
//! ## Sweeping the raster in chunks
//!
//! ```no_run
//! use hyraster::{BackendKind, RasterHandle, TraversalMode, Unit};
//!
//! let raster = RasterHandle::open("scene.img", BackendKind::FlatBinary)?;
//! for unit in raster.iterate::<i16>(TraversalMode::chunk(100, 100)?) {
//!     if let Unit::Chunk { window, data } = unit? {
//!         println!("{:?} -> {:?}", window, data.dim());
//!     }
//! }
//! # Ok::<(), hyraster::Error>(())
//! ```

pub mod error;
pub mod formats;
pub mod interleave;
pub mod io;
pub mod raster;
pub mod traversal;
pub mod types;

pub use error::{Error, Result};
pub use formats::envi::{HeaderMap, HeaderValue};
pub use interleave::{AccessPlan, ChunkWindow, Layout, StridedPlan};
pub use io::{ByteOrder, Element};
pub use raster::{BackendKind, MaskRegistry, OpenOptions, RasterHandle, RasterMetadata, NO_DATA_MASK};
pub use traversal::{ChunkShape, Cursor, Step, Traversal, TraversalMode, Unit, DEFAULT_CHUNK_SHAPE};
pub use types::{DataType, Interleave, RasterShape};
