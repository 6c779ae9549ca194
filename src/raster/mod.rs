//! The raster handle
//!
//! [`RasterHandle`] unifies the flat-binary and hierarchical-container
//! backends behind one read API. It holds metadata and masks only; a data
//! handle (memory map or open container) is acquired at the start of every
//! read and released when the read returns, on success or failure.

pub mod mask;
pub mod metadata;

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use ndarray::{Array1, Array2, Array3};

use crate::error::{Error, Result};
use crate::formats::envi::{find_header_path, read_envi_header, AccessAdvice, FlatBinarySource, HeaderMap};
use crate::interleave::{AccessPlan, ChunkWindow, Layout};
use crate::io::{ByteOrder, Element};
use crate::traversal::{Traversal, TraversalMode};
use crate::types::{DataType, Interleave, RasterShape};

#[cfg(feature = "hdf5")]
use crate::formats::neon::{self, ContainerSource};

pub use mask::{MaskRegistry, NO_DATA_MASK};
pub use metadata::RasterMetadata;

/// Which on-disk layout backs a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Raw interleaved payload with a text header (ENVI)
    FlatBinary,
    /// Hierarchical scientific container (HDF5)
    HierarchicalContainer,
}

impl BackendKind {
    /// Parses a backend name: `envi` or `neon`
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "envi" => Ok(BackendKind::FlatBinary),
            "neon" | "hdf5" => Ok(BackendKind::HierarchicalContainer),
            other => Err(Error::Unsupported(format!("file type '{}'", other))),
        }
    }
}

/// Options applied when opening a raster
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Issue `madvise` hints on mapped payloads
    pub advise_kernel: bool,
    /// Register the `no_data` mask at open time
    pub no_data_mask: bool,
    /// Override for the reflectance dataset path inside a container
    pub dataset_path: Option<String>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            advise_kernel: true,
            no_data_mask: true,
            dataset_path: None,
        }
    }
}

enum Backend {
    FlatBinary(FlatBinarySource),
    #[cfg(feature = "hdf5")]
    Container(ContainerSource),
}

/// An opened multi-band raster
pub struct RasterHandle {
    path: PathBuf,
    metadata: RasterMetadata,
    backend: Backend,
    masks: MaskRegistry,
}

/// Widens a band of whatever element type the raster holds to `f64`
macro_rules! dispatch_dtype {
    ($self:ident, $dtype:expr, $method:ident ( $($arg:expr),* )) => {
        match $dtype {
            DataType::U8 => $self.$method::<u8>($($arg),*)?.mapv(Element::to_f64),
            DataType::U16 => $self.$method::<u16>($($arg),*)?.mapv(Element::to_f64),
            DataType::U32 => $self.$method::<u32>($($arg),*)?.mapv(Element::to_f64),
            DataType::U64 => $self.$method::<u64>($($arg),*)?.mapv(Element::to_f64),
            DataType::I8 => $self.$method::<i8>($($arg),*)?.mapv(Element::to_f64),
            DataType::I16 => $self.$method::<i16>($($arg),*)?.mapv(Element::to_f64),
            DataType::I32 => $self.$method::<i32>($($arg),*)?.mapv(Element::to_f64),
            DataType::I64 => $self.$method::<i64>($($arg),*)?.mapv(Element::to_f64),
            DataType::F32 => $self.$method::<f32>($($arg),*)?.mapv(Element::to_f64),
            DataType::F64 => $self.$method::<f64>($($arg),*)?,
        }
    };
}

impl RasterHandle {
    /// Opens a raster of the given backend kind with default options
    pub fn open<P: AsRef<Path>>(path: P, kind: BackendKind) -> Result<Self> {
        Self::open_with_options(path, kind, &OpenOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, kind: BackendKind, options: &OpenOptions) -> Result<Self> {
        match kind {
            BackendKind::FlatBinary => Self::open_envi_with_options(path, options),
            #[cfg(feature = "hdf5")]
            BackendKind::HierarchicalContainer => Self::open_neon_with_options(path, options),
            #[cfg(not(feature = "hdf5"))]
            BackendKind::HierarchicalContainer => Err(Error::Unsupported(
                "hierarchical containers require the `hdf5` feature".to_string(),
            )),
        }
    }

    /// Opens a flat binary payload, reading its `.hdr` sidecar
    pub fn open_envi<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_envi_with_options(path, &OpenOptions::default())
    }

    pub fn open_envi_with_options<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        let header = read_envi_header(find_header_path(path.as_ref())?)?;
        Self::from_header(path, &header, options)
    }

    /// Opens a flat binary payload described by already-parsed header fields
    pub fn from_header<P: AsRef<Path>>(path: P, header: &HeaderMap, options: &OpenOptions) -> Result<Self> {
        let metadata = RasterMetadata::from_header(header)?;
        Self::from_metadata(path, metadata, options)
    }

    /// Opens a flat binary payload from explicit metadata
    pub fn from_metadata<P: AsRef<Path>>(path: P, metadata: RasterMetadata, options: &OpenOptions) -> Result<Self> {
        metadata.validate()?;
        let path = path.as_ref().to_path_buf();
        let source = FlatBinarySource::new(
            &path,
            metadata.offset,
            metadata.dtype,
            Layout::new(metadata.shape, metadata.interleave),
            metadata.byte_order,
        )
        .with_kernel_advice(options.advise_kernel);

        Self::finish_open(path, metadata, Backend::FlatBinary(source), options)
    }

    /// Opens a hierarchical container, deriving metadata from its contents
    #[cfg(feature = "hdf5")]
    pub fn open_neon<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_neon_with_options(path, &OpenOptions::default())
    }

    #[cfg(feature = "hdf5")]
    pub fn open_neon_with_options<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (metadata, dataset_path) = neon::describe(&path, options.dataset_path.as_deref())?;
        let source = ContainerSource::new(&path, &dataset_path, metadata.shape);
        Self::finish_open(path, metadata, Backend::Container(source), options)
    }

    fn finish_open(path: PathBuf, metadata: RasterMetadata, backend: Backend, options: &OpenOptions) -> Result<Self> {
        let shape = metadata.shape;
        let mut raster = Self {
            path,
            metadata,
            backend,
            masks: MaskRegistry::new(shape.lines, shape.columns),
        };

        if options.no_data_mask {
            raster.compute_mask(NO_DATA_MASK, Self::no_data_mask)?;
        }

        debug!(
            "opened {} ({} x {} x {}, {}, {})",
            raster.path.display(),
            shape.lines,
            shape.columns,
            shape.bands,
            raster.metadata.dtype.name(),
            raster.metadata.interleave.name()
        );
        Ok(raster)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    pub fn shape(&self) -> RasterShape {
        self.metadata.shape
    }

    pub fn lines(&self) -> usize {
        self.metadata.shape.lines
    }

    pub fn columns(&self) -> usize {
        self.metadata.shape.columns
    }

    pub fn bands(&self) -> usize {
        self.metadata.shape.bands
    }

    pub fn dtype(&self) -> DataType {
        self.metadata.dtype
    }

    pub fn interleave(&self) -> Interleave {
        self.metadata.interleave
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.metadata.byte_order
    }

    pub fn no_data(&self) -> Option<f64> {
        self.metadata.no_data
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.metadata.wavelengths
    }

    pub fn bad_bands(&self) -> &[bool] {
        &self.metadata.bad_bands
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self.backend {
            Backend::FlatBinary(_) => BackendKind::FlatBinary,
            #[cfg(feature = "hdf5")]
            Backend::Container(_) => BackendKind::HierarchicalContainer,
        }
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.metadata.shape, self.metadata.interleave)
    }

    pub fn masks(&self) -> &MaskRegistry {
        &self.masks
    }

    pub fn mask(&self, name: &str) -> Result<&Array2<bool>> {
        self.masks.get(name)
    }

    fn check_type<T: Element>(&self) -> Result<()> {
        if T::DATA_TYPE != self.metadata.dtype {
            return Err(Error::TypeMismatch {
                expected: self.metadata.dtype,
                found: T::DATA_TYPE,
            });
        }
        Ok(())
    }

    /// Maps the payload, gathers `plan`, and unmaps before returning
    fn read_flat<T: Element>(source: &FlatBinarySource, plan: AccessPlan) -> Result<Vec<T>> {
        let payload = source.acquire(AccessAdvice::for_plan(&plan))?;
        payload.read(&plan)
    }

    /// Reads one band, shaped (lines, columns)
    pub fn get_band<T: Element>(&self, index: usize) -> Result<Array2<T>> {
        self.check_type::<T>()?;
        let plan = self.layout().band(index)?;
        debug!("band {} of {}", index, self.path.display());
        match &self.backend {
            Backend::FlatBinary(source) => {
                let values = Self::read_flat(source, AccessPlan::Strided(plan))?;
                Ok(Array2::from_shape_vec((self.lines(), self.columns()), values)?)
            }
            #[cfg(feature = "hdf5")]
            Backend::Container(source) => source.acquire()?.band(index),
        }
    }

    /// Reads one band and keeps the entries where the named mask is true
    pub fn get_band_masked<T: Element>(&self, index: usize, mask: &str) -> Result<Array1<T>> {
        self.masks.get(mask)?;
        let band = self.get_band::<T>(index)?;
        self.masks.apply(mask, &band)
    }

    /// Reads one band widened to `f64`, whatever the stored element type
    pub fn get_band_f64(&self, index: usize) -> Result<Array2<f64>> {
        Ok(dispatch_dtype!(self, self.metadata.dtype, get_band(index)))
    }

    /// Resolves a wavelength to the nearest band
    ///
    /// Returns `None` when no wavelengths are registered or `wavelength` lies
    /// outside their range. NaN is never in range.
    pub fn wave_to_band(&self, wavelength: f64) -> Option<usize> {
        let Some((min, max)) = self.metadata.wavelength_range() else {
            warn!("{} has no wavelength table", self.path.display());
            return None;
        };
        if !(min..=max).contains(&wavelength) {
            warn!(
                "wavelength {} outside image range [{}, {}]",
                wavelength, min, max
            );
            return None;
        }

        self.metadata
            .wavelengths
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (index, w)| {
                let distance = (w - wavelength).abs();
                match best {
                    Some((_, d)) if d <= distance => best,
                    _ => Some((index, distance)),
                }
            })
            .map(|(index, _)| index)
    }

    /// Reads the band nearest to `wavelength`, `None` when out of range
    pub fn get_wavelength_band<T: Element>(&self, wavelength: f64) -> Result<Option<Array2<T>>> {
        self.wave_to_band(wavelength)
            .map(|band| self.get_band(band))
            .transpose()
    }

    pub fn get_wavelength_band_masked<T: Element>(&self, wavelength: f64, mask: &str) -> Result<Option<Array1<T>>> {
        self.wave_to_band(wavelength)
            .map(|band| self.get_band_masked(band, mask))
            .transpose()
    }

    /// Reads the spectra of paired (line, column) positions, shaped (n, bands)
    pub fn get_pixels<T: Element>(&self, lines: &[usize], columns: &[usize]) -> Result<Array2<T>> {
        self.check_type::<T>()?;
        let plan = self.layout().pixels(lines, columns)?;
        debug!("{} pixels of {}", lines.len(), self.path.display());
        match &self.backend {
            Backend::FlatBinary(source) => {
                let values = Self::read_flat(source, plan)?;
                Ok(Array2::from_shape_vec((lines.len(), self.bands()), values)?)
            }
            #[cfg(feature = "hdf5")]
            Backend::Container(source) => source.acquire()?.pixels(lines, columns, self.bands()),
        }
    }

    /// Reads one line, shaped (columns, bands)
    pub fn get_line<T: Element>(&self, index: usize) -> Result<Array2<T>> {
        self.check_type::<T>()?;
        let plan = self.layout().line(index)?;
        match &self.backend {
            Backend::FlatBinary(source) => {
                let values = Self::read_flat(source, AccessPlan::Strided(plan))?;
                Ok(Array2::from_shape_vec((self.columns(), self.bands()), values)?)
            }
            #[cfg(feature = "hdf5")]
            Backend::Container(source) => source.acquire()?.line(index),
        }
    }

    /// Reads one column, shaped (lines, bands)
    pub fn get_column<T: Element>(&self, index: usize) -> Result<Array2<T>> {
        self.check_type::<T>()?;
        let plan = self.layout().column(index)?;
        match &self.backend {
            Backend::FlatBinary(source) => {
                let values = Self::read_flat(source, AccessPlan::Strided(plan))?;
                Ok(Array2::from_shape_vec((self.lines(), self.bands()), values)?)
            }
            #[cfg(feature = "hdf5")]
            Backend::Container(source) => source.acquire()?.column(index),
        }
    }

    /// Reads the half-open window `[line_start, line_end) x [col_start, col_end)`
    ///
    /// Bounds are not clipped; a window outside the raster is an error.
    pub fn get_chunk<T: Element>(
        &self,
        col_start: usize,
        col_end: usize,
        line_start: usize,
        line_end: usize,
    ) -> Result<Array3<T>> {
        self.get_window(&ChunkWindow::new(col_start, col_end, line_start, line_end))
    }

    /// Reads a window, shaped (rows, cols, bands)
    pub fn get_window<T: Element>(&self, window: &ChunkWindow) -> Result<Array3<T>> {
        self.check_type::<T>()?;
        let plan = self.layout().chunk(window)?;
        debug!("chunk {:?} of {}", window, self.path.display());
        match &self.backend {
            Backend::FlatBinary(source) => {
                let values = Self::read_flat(source, AccessPlan::Strided(plan))?;
                Ok(Array3::from_shape_vec((window.rows(), window.cols(), self.bands()), values)?)
            }
            #[cfg(feature = "hdf5")]
            Backend::Container(source) => source.acquire()?.chunk(window),
        }
    }

    /// Registers a mask verbatim
    pub fn set_mask(&mut self, name: &str, mask: Array2<bool>) -> Result<()> {
        self.masks.insert(name, mask)
    }

    /// Registers the mask produced by `predicate`
    ///
    /// The registry is left untouched if the predicate fails.
    pub fn compute_mask<F>(&mut self, name: &str, predicate: F) -> Result<()>
    where
        F: FnOnce(&Self) -> Result<Array2<bool>>,
    {
        let mask = predicate(&*self)?;
        self.masks.insert(name, mask)
    }

    /// Registers the mask produced by `predicate` called with `args`
    pub fn compute_mask_with<A, F>(&mut self, name: &str, predicate: F, args: A) -> Result<()>
    where
        F: FnOnce(&Self, A) -> Result<Array2<bool>>,
    {
        let mask = predicate(&*self, args)?;
        self.masks.insert(name, mask)
    }

    /// Mask predicate: true where band 0 differs from the no-data sentinel
    ///
    /// Every pixel is valid when no sentinel is declared.
    pub fn no_data_mask(&self) -> Result<Array2<bool>> {
        match self.metadata.no_data {
            Some(no_data) => Ok(self.get_band_f64(0)?.mapv(|v| v != no_data)),
            None => Ok(Array2::from_elem((self.lines(), self.columns()), true)),
        }
    }

    /// Computes `(a - b) / (a + b)` for the bands nearest two wavelengths
    ///
    /// Returns `None` when either wavelength is out of range.
    pub fn normalized_difference(&self, wave1: f64, wave2: f64) -> Result<Option<Array2<f64>>> {
        let (Some(band1), Some(band2)) = (self.wave_to_band(wave1), self.wave_to_band(wave2)) else {
            return Ok(None);
        };
        let a = self.get_band_f64(band1)?;
        let b = self.get_band_f64(band2)?;
        Ok(Some((&a - &b) / (&a + &b)))
    }

    pub fn normalized_difference_masked(&self, wave1: f64, wave2: f64, mask: &str) -> Result<Option<Array1<f64>>> {
        self.masks.get(mask)?;
        self.normalized_difference(wave1, wave2)?
            .map(|index| self.masks.apply(mask, &index))
            .transpose()
    }

    /// Marks bands whose wavelength lies in any inclusive `[start, end]` region
    /// as unusable
    pub fn create_bad_bands(&mut self, regions: &[(f64, f64)]) {
        self.metadata.bad_bands = self
            .metadata
            .wavelengths
            .iter()
            .map(|&w| !regions.iter().any(|&(start, end)| w >= start && w <= end))
            .collect();
    }

    /// Starts a restartable traversal over lines, columns, bands or chunks
    pub fn iterate<T: Element>(&self, mode: TraversalMode) -> Traversal<'_, T> {
        Traversal::new(self, mode)
    }
}

impl fmt::Debug for RasterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterHandle")
            .field("path", &self.path)
            .field("backend", &self.backend_kind())
            .field("metadata", &self.metadata)
            .field("masks", &self.masks.names().collect::<Vec<_>>())
            .finish()
    }
}
