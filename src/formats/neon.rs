//! Hierarchical container (HDF5) raster backend
//!
//! Reflectance cubes live in a 3-D dataset addressed as (line, column, band)
//! in native order, so requests are direct sub-selections with no interleave
//! arithmetic and no byte-order correction.

use std::path::{Path, PathBuf};

use hdf5::types::{FloatSize, IntSize, TypeDescriptor};
use log::debug;
use ndarray::{s, Array2, Array3, Axis};

use crate::error::{Error, Result};
use crate::interleave::ChunkWindow;
use crate::io::{ByteOrder, Element};
use crate::raster::RasterMetadata;
use crate::types::{DataType, Interleave, RasterShape};

/// Reflectance dataset path below the site group
pub const REFLECTANCE_DATASET: &str = "Reflectance/Reflectance_Data";

/// Wavelength table path below the site group
pub const WAVELENGTH_DATASET: &str = "Reflectance/Metadata/Spectral_Data/Wavelength";

/// Band width table path below the site group
pub const FWHM_DATASET: &str = "Reflectance/Metadata/Spectral_Data/FWHM";

/// Attribute on the reflectance dataset holding the no-data sentinel
pub const NO_DATA_ATTRIBUTE: &str = "Data_Ignore_Value";

/// Location of a reflectance dataset inside a container file
#[derive(Debug, Clone)]
pub struct ContainerSource {
    path: PathBuf,
    dataset_path: String,
    shape: RasterShape,
}

impl ContainerSource {
    pub fn new<P: AsRef<Path>>(path: P, dataset_path: &str, shape: RasterShape) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            dataset_path: dataset_path.to_string(),
            shape,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dataset_path(&self) -> &str {
        &self.dataset_path
    }

    /// Opens the container and its reflectance dataset
    pub fn acquire(&self) -> Result<OpenContainer> {
        let file = hdf5::File::open(&self.path)?;
        let dataset = file.dataset(&self.dataset_path)?;

        let expected = [self.shape.lines, self.shape.columns, self.shape.bands];
        if dataset.shape() != expected {
            return Err(Error::ShapeMismatch(format!(
                "dataset {} has shape {:?}, expected {:?}",
                self.dataset_path,
                dataset.shape(),
                expected
            )));
        }

        debug!("opened {}:{}", self.path.display(), self.dataset_path);
        Ok(OpenContainer { _file: file, dataset })
    }
}

/// An open container, closed when dropped
pub struct OpenContainer {
    _file: hdf5::File,
    dataset: hdf5::Dataset,
}

impl OpenContainer {
    pub fn band<T: Element>(&self, band: usize) -> Result<Array2<T>> {
        Ok(self.dataset.read_slice_2d::<T, _>(s![.., .., band])?)
    }

    pub fn line<T: Element>(&self, line: usize) -> Result<Array2<T>> {
        Ok(self.dataset.read_slice_2d::<T, _>(s![line, .., ..])?)
    }

    pub fn column<T: Element>(&self, column: usize) -> Result<Array2<T>> {
        Ok(self.dataset.read_slice_2d::<T, _>(s![.., column, ..])?)
    }

    /// Reads the spectra of paired (line, column) positions in input order
    pub fn pixels<T: Element>(&self, lines: &[usize], columns: &[usize], bands: usize) -> Result<Array2<T>> {
        let mut out = Array2::<T>::default((lines.len(), bands));
        for (row, (&line, &column)) in lines.iter().zip(columns).enumerate() {
            let spectrum = self.dataset.read_slice_1d::<T, _>(s![line, column, ..])?;
            out.index_axis_mut(Axis(0), row).assign(&spectrum);
        }
        Ok(out)
    }

    pub fn chunk<T: Element>(&self, window: &ChunkWindow) -> Result<Array3<T>> {
        Ok(self.dataset.read_slice::<T, _, ndarray::Ix3>(s![
            window.line_start..window.line_end,
            window.col_start..window.col_end,
            ..
        ])?)
    }
}

impl Drop for OpenContainer {
    fn drop(&mut self) {
        debug!("closed container dataset {}", self.dataset.name());
    }
}

/// Derives raster metadata from a container's own structure
///
/// The site group is the first top-level member. Returns the metadata and
/// the full reflectance dataset path.
pub fn describe<P: AsRef<Path>>(path: P, dataset_override: Option<&str>) -> Result<(RasterMetadata, String)> {
    let file = hdf5::File::open(path.as_ref())?;

    let base_key = file
        .member_names()?
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidFormat("container has no top-level group".to_string()))?;

    let dataset_path = match dataset_override {
        Some(p) => p.to_string(),
        None => format!("{}/{}", base_key, REFLECTANCE_DATASET),
    };
    let dataset = file.dataset(&dataset_path)?;

    let dims = dataset.shape();
    let &[lines, columns, bands] = dims.as_slice() else {
        return Err(Error::ShapeMismatch(format!(
            "reflectance dataset must be 3-D, got {:?}",
            dims
        )));
    };

    let dtype = match dataset.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(IntSize::U1) => DataType::I8,
        TypeDescriptor::Integer(IntSize::U2) => DataType::I16,
        TypeDescriptor::Integer(IntSize::U4) => DataType::I32,
        TypeDescriptor::Integer(IntSize::U8) => DataType::I64,
        TypeDescriptor::Unsigned(IntSize::U1) => DataType::U8,
        TypeDescriptor::Unsigned(IntSize::U2) => DataType::U16,
        TypeDescriptor::Unsigned(IntSize::U4) => DataType::U32,
        TypeDescriptor::Unsigned(IntSize::U8) => DataType::U64,
        TypeDescriptor::Float(FloatSize::U4) => DataType::F32,
        TypeDescriptor::Float(FloatSize::U8) => DataType::F64,
        other => return Err(Error::Unsupported(format!("dataset type {:?}", other))),
    };

    let read_table = |name: &str| -> Result<Vec<f64>> {
        match file.dataset(&format!("{}/{}", base_key, name)) {
            Ok(table) => Ok(table.read_raw::<f64>()?),
            Err(_) => Ok(Vec::new()),
        }
    };

    let no_data = match dataset.attr(NO_DATA_ATTRIBUTE) {
        Ok(attr) => attr.read_raw::<f64>()?.first().copied(),
        Err(_) => None,
    };

    let metadata = RasterMetadata {
        shape: RasterShape::new(lines, columns, bands)?,
        dtype,
        interleave: Interleave::Bip,
        byte_order: ByteOrder::native(),
        offset: 0,
        no_data,
        wavelengths: read_table(WAVELENGTH_DATASET)?,
        fwhm: read_table(FWHM_DATASET)?,
        wavelength_units: Some("nanometers".to_string()),
        bad_bands: Vec::new(),
    };
    metadata.validate()?;

    Ok((metadata, dataset_path))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::Array3;

    /// Writes a 3 x 4 x 2 i16 cube holding `line * 100 + column * 10 + band`
    pub(crate) fn write_container(path: &Path) {
        let file = hdf5::File::create(path).unwrap();
        let site = file.create_group("SITE").unwrap();
        let reflectance = site.create_group("Reflectance").unwrap();

        let cube = Array3::from_shape_fn((3, 4, 2), |(l, c, b)| (l * 100 + c * 10 + b) as i16);
        let dataset = reflectance
            .new_dataset_builder()
            .with_data(&cube)
            .create("Reflectance_Data")
            .unwrap();
        dataset
            .new_attr_builder()
            .with_data(&[-9999.0f64])
            .create(NO_DATA_ATTRIBUTE)
            .unwrap();

        let spectral = reflectance
            .create_group("Metadata")
            .unwrap()
            .create_group("Spectral_Data")
            .unwrap();
        spectral
            .new_dataset_builder()
            .with_data(&[450.0f64, 550.0])
            .create("Wavelength")
            .unwrap();
    }

    #[test]
    fn test_describe_and_slice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.h5");
        write_container(&path);

        let (metadata, dataset_path) = describe(&path, None).unwrap();
        assert_eq!(dataset_path, "SITE/Reflectance/Reflectance_Data");
        assert_eq!(metadata.shape, RasterShape::new(3, 4, 2).unwrap());
        assert_eq!(metadata.dtype, DataType::I16);
        assert_eq!(metadata.no_data, Some(-9999.0));
        assert_eq!(metadata.wavelengths, vec![450.0, 550.0]);

        let source = ContainerSource::new(&path, &dataset_path, metadata.shape);
        let open = source.acquire().unwrap();

        let band: Array2<i16> = open.band(1).unwrap();
        assert_eq!(band.dim(), (3, 4));
        assert_eq!(band[[2, 3]], 231);

        let line: Array2<i16> = open.line(1).unwrap();
        assert_eq!(line.dim(), (4, 2));
        assert_eq!(line[[3, 1]], 131);

        let column: Array2<i16> = open.column(2).unwrap();
        assert_eq!(column.dim(), (3, 2));
        assert_eq!(column[[1, 0]], 120);

        let pixels: Array2<i16> = open.pixels(&[2, 0], &[1, 3], 2).unwrap();
        assert_eq!(pixels.row(0).to_vec(), vec![210, 211]);
        assert_eq!(pixels.row(1).to_vec(), vec![30, 31]);

        let chunk: Array3<i16> = open.chunk(&ChunkWindow::new(1, 3, 0, 2)).unwrap();
        assert_eq!(chunk.dim(), (2, 2, 2));
        assert_eq!(chunk[[1, 1, 0]], 120);
    }

    #[test]
    fn test_missing_container() {
        let shape = RasterShape::new(1, 1, 1).unwrap();
        let source = ContainerSource::new("/nonexistent/scene.h5", REFLECTANCE_DATASET, shape);
        assert!(matches!(source.acquire(), Err(Error::Container(_))));
    }
}
