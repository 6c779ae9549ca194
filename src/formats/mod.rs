//! On-disk raster backends

pub mod envi;
#[cfg(feature = "hdf5")]
pub mod neon;
