//! Memory-mapped access to a flat binary raster payload
//!
//! The payload is mapped read-only for the duration of a single read and
//! unmapped when the returned [`MappedPayload`] is dropped.

use std::fs::File;
use std::path::{Path, PathBuf};

use log::debug;
use memmap2::{Mmap, MmapOptions};

use crate::error::{Error, Result};
use crate::interleave::{AccessPlan, Layout};
use crate::io::{ByteOrder, Element};
use crate::types::DataType;

/// Expected access pattern, forwarded to the kernel as an `madvise` hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAdvice {
    Sequential,
    Random,
}

impl AccessAdvice {
    /// Picks the hint for a plan: contiguous innermost runs read sequentially
    pub fn for_plan(plan: &AccessPlan) -> Self {
        match plan {
            AccessPlan::Strided(strided) if strided.strides.last() == Some(&1) => {
                AccessAdvice::Sequential
            }
            _ => AccessAdvice::Random,
        }
    }

    #[cfg(unix)]
    fn flags(&self) -> libc::c_int {
        match self {
            AccessAdvice::Sequential => libc::MADV_SEQUENTIAL,
            AccessAdvice::Random => libc::MADV_RANDOM,
        }
    }
}

/// Location and encoding of a flat binary payload
#[derive(Debug, Clone)]
pub struct FlatBinarySource {
    path: PathBuf,
    offset: u64,
    dtype: DataType,
    layout: Layout,
    byte_order: ByteOrder,
    advise_kernel: bool,
}

impl FlatBinarySource {
    pub fn new<P: AsRef<Path>>(
        path: P,
        offset: u64,
        dtype: DataType,
        layout: Layout,
        byte_order: ByteOrder,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            offset,
            dtype,
            layout,
            byte_order,
            advise_kernel: true,
        }
    }

    /// Enables or disables `madvise` hints on mapped regions
    pub fn with_kernel_advice(mut self, enabled: bool) -> Self {
        self.advise_kernel = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Payload size in bytes
    pub fn payload_len(&self) -> Result<usize> {
        self.layout
            .shape
            .checked_element_count()
            .and_then(|count| count.checked_mul(self.dtype.size()))
            .ok_or_else(|| Error::InvalidFormat(format!("{} payload size overflows", self.path.display())))
    }

    /// Maps the payload region of the file
    pub fn acquire(&self, advice: AccessAdvice) -> Result<MappedPayload> {
        let payload_len = self.payload_len()?;
        let needed = self.offset.checked_add(payload_len as u64).ok_or_else(|| {
            Error::InvalidFormat(format!(
                "{}: offset {} plus {} payload bytes overflows",
                self.path.display(),
                self.offset,
                payload_len
            ))
        })?;

        let file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        if file_len < needed {
            return Err(Error::InvalidFormat(format!(
                "{} holds {} bytes, payload needs {} starting at offset {}",
                self.path.display(),
                file_len,
                payload_len,
                self.offset
            )));
        }

        let mmap = unsafe {
            MmapOptions::new()
                .offset(self.offset)
                .len(payload_len)
                .map(&file)?
        };

        #[cfg(unix)]
        if self.advise_kernel {
            advise(&mmap, advice);
        }
        #[cfg(not(unix))]
        let _ = advice;

        debug!("mapped {} ({} bytes)", self.path.display(), mmap.len());

        Ok(MappedPayload {
            mmap,
            dtype: self.dtype,
            byte_order: self.byte_order,
        })
    }
}

#[cfg(unix)]
fn advise(mmap: &Mmap, advice: AccessAdvice) {
    unsafe {
        let page = libc::sysconf(libc::_SC_PAGESIZE).max(1) as usize;
        let addr = mmap.as_ptr() as usize;
        let aligned = addr - addr % page;
        libc::madvise(
            aligned as *mut libc::c_void,
            mmap.len() + (addr - aligned),
            advice.flags(),
        );
    }
}

/// A mapped payload, valid until dropped
pub struct MappedPayload {
    mmap: Mmap,
    dtype: DataType,
    byte_order: ByteOrder,
}

impl MappedPayload {
    /// Gathers the elements selected by `plan`, in plan order
    ///
    /// Each element is decoded in native order and byte-swapped once when the
    /// declared order differs.
    pub fn read<T: Element>(&self, plan: &AccessPlan) -> Result<Vec<T>> {
        if T::DATA_TYPE != self.dtype {
            return Err(Error::TypeMismatch {
                expected: self.dtype,
                found: T::DATA_TYPE,
            });
        }

        let size = self.dtype.size();
        let mut values = Vec::with_capacity(plan.len());
        for index in plan.indices() {
            let start = index * size;
            let bytes = self.mmap.get(start..start + size).ok_or_else(|| {
                Error::OutOfBounds(format!(
                    "element {} beyond mapped payload of {} bytes",
                    index,
                    self.mmap.len()
                ))
            })?;
            values.push(self.byte_order.decode(bytes));
        }
        Ok(values)
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

impl Drop for MappedPayload {
    fn drop(&mut self) {
        debug!("unmapped payload ({} bytes)", self.mmap.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Interleave, RasterShape};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn layout() -> Layout {
        Layout::new(RasterShape::new(2, 3, 2).unwrap(), Interleave::Bsq)
    }

    fn write_payload(prefix: &[u8], values: &[u16], order: ByteOrder) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(prefix).unwrap();
        for v in values {
            let bytes = match order {
                ByteOrder::LittleEndian => v.to_le_bytes(),
                ByteOrder::BigEndian => v.to_be_bytes(),
            };
            file.write_all(&bytes).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_with_offset() {
        let values: Vec<u16> = (0..12).collect();
        let file = write_payload(&[0xAA; 7], &values, ByteOrder::LittleEndian);
        let source = FlatBinarySource::new(file.path(), 7, DataType::U16, layout(), ByteOrder::LittleEndian);

        let payload = source.acquire(AccessAdvice::Sequential).unwrap();
        let plan = AccessPlan::Strided(layout().band(1).unwrap());
        let band: Vec<u16> = payload.read(&plan).unwrap();
        assert_eq!(band, vec![6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_big_endian_payload_is_corrected() {
        let values: Vec<u16> = vec![0x0102, 0xA0B0, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let file = write_payload(&[], &values, ByteOrder::BigEndian);
        let source = FlatBinarySource::new(file.path(), 0, DataType::U16, layout(), ByteOrder::BigEndian);

        let payload = source.acquire(AccessAdvice::Random).unwrap();
        let plan = AccessPlan::Strided(layout().band(0).unwrap());
        let band: Vec<u16> = payload.read(&plan).unwrap();
        assert_eq!(&band[..2], &[0x0102, 0xA0B0]);
    }

    #[test]
    fn test_declared_order_mismatch_yields_swapped_values() {
        let values: Vec<u16> = (1..=12).collect();
        let file = write_payload(&[], &values, ByteOrder::LittleEndian);
        let source = FlatBinarySource::new(file.path(), 0, DataType::U16, layout(), ByteOrder::BigEndian);

        let payload = source.acquire(AccessAdvice::Sequential).unwrap();
        let plan = AccessPlan::Strided(layout().band(0).unwrap());
        let band: Vec<u16> = payload.read(&plan).unwrap();
        let expected: Vec<u16> = (1..=6u16).map(|v| v.swap_bytes()).collect();
        assert_eq!(band, expected);
    }

    #[test]
    fn test_truncated_file() {
        let file = write_payload(&[], &[1, 2, 3], ByteOrder::LittleEndian);
        let source = FlatBinarySource::new(file.path(), 0, DataType::U16, layout(), ByteOrder::LittleEndian);
        assert!(matches!(source.acquire(AccessAdvice::Sequential), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_missing_file() {
        let source = FlatBinarySource::new("/nonexistent/raster.img", 0, DataType::U16, layout(), ByteOrder::LittleEndian);
        assert!(matches!(source.acquire(AccessAdvice::Sequential), Err(Error::Io(_))));
    }

    #[test]
    fn test_type_mismatch() {
        let values: Vec<u16> = (0..12).collect();
        let file = write_payload(&[], &values, ByteOrder::LittleEndian);
        let source = FlatBinarySource::new(file.path(), 0, DataType::U16, layout(), ByteOrder::LittleEndian)
            .with_kernel_advice(false);

        let payload = source.acquire(AccessAdvice::Sequential).unwrap();
        let plan = AccessPlan::Strided(layout().line(0).unwrap());
        let result: Result<Vec<f32>> = payload.read(&plan);
        assert!(matches!(result, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_overflowing_offset() {
        let values: Vec<u16> = (0..12).collect();
        let file = write_payload(&[], &values, ByteOrder::LittleEndian);
        let source = FlatBinarySource::new(file.path(), u64::MAX, DataType::U16, layout(), ByteOrder::LittleEndian);
        assert!(matches!(source.acquire(AccessAdvice::Sequential), Err(Error::InvalidFormat(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_advice_is_a_single_madvise_value() {
        assert_eq!(AccessAdvice::Sequential.flags(), libc::MADV_SEQUENTIAL);
        assert_eq!(AccessAdvice::Random.flags(), libc::MADV_RANDOM);
        assert_ne!(AccessAdvice::Sequential.flags(), libc::MADV_WILLNEED);
    }

    #[test]
    fn test_advice_for_plan() {
        let bsq = layout();
        assert_eq!(
            AccessAdvice::for_plan(&AccessPlan::Strided(bsq.band(0).unwrap())),
            AccessAdvice::Sequential
        );
        assert_eq!(
            AccessAdvice::for_plan(&AccessPlan::Strided(bsq.line(0).unwrap())),
            AccessAdvice::Random
        );
    }
}
