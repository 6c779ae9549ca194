//! Interleave-aware index arithmetic
//!
//! Maps logical raster requests (a band, a line, a column, a set of pixels or
//! a rectangular window) onto element offsets inside a flat buffer of
//! `lines * columns * bands` elements. No I/O happens here; the plans are
//! consumed by the flat-binary backend.
//!
//! Output ordering is fixed regardless of layout:
//!
//! | request | shape                      |
//! |---------|----------------------------|
//! | band    | (lines, columns)           |
//! | line    | (columns, bands)           |
//! | column  | (lines, bands)             |
//! | pixels  | (n_pixels, bands)          |
//! | chunk   | (rows, cols, bands)        |

use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{Interleave, RasterShape};

/// Half-open rectangular window `[line_start, line_end) x [col_start, col_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkWindow {
    pub col_start: usize,
    pub col_end: usize,
    pub line_start: usize,
    pub line_end: usize,
}

impl ChunkWindow {
    pub fn new(col_start: usize, col_end: usize, line_start: usize, line_end: usize) -> Self {
        Self { col_start, col_end, line_start, line_end }
    }

    /// Number of lines covered
    pub fn rows(&self) -> usize {
        self.line_end.saturating_sub(self.line_start)
    }

    /// Number of columns covered
    pub fn cols(&self) -> usize {
        self.col_end.saturating_sub(self.col_start)
    }
}

/// A selection expressed as offset + shape + strides, all in elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StridedPlan {
    pub offset: usize,
    pub shape: Vec<usize>,
    pub strides: Vec<usize>,
}

impl StridedPlan {
    /// Number of elements selected
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat element indices in row-major output order
    pub fn indices(&self) -> PlanIndices<'_> {
        PlanIndices {
            plan: self,
            counter: vec![0; self.shape.len()],
            remaining: self.len(),
        }
    }
}

/// Row-major walk over a [`StridedPlan`]
pub struct PlanIndices<'a> {
    plan: &'a StridedPlan,
    counter: Vec<usize>,
    remaining: usize,
}

impl Iterator for PlanIndices<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let index = self.plan.offset
            + self.counter.iter()
                .zip(&self.plan.strides)
                .map(|(c, s)| c * s)
                .sum::<usize>();

        for axis in (0..self.counter.len()).rev() {
            self.counter[axis] += 1;
            if self.counter[axis] < self.plan.shape[axis] {
                break;
            }
            self.counter[axis] = 0;
        }

        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PlanIndices<'_> {}

/// How to pull a request out of the flat buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPlan {
    /// A single strided view
    Strided(StridedPlan),
    /// An explicit list of flat indices, already in output order
    Gather {
        shape: Vec<usize>,
        indices: Vec<usize>,
    },
}

impl AccessPlan {
    /// Output shape of the selection
    pub fn shape(&self) -> &[usize] {
        match self {
            AccessPlan::Strided(plan) => &plan.shape,
            AccessPlan::Gather { shape, .. } => shape,
        }
    }

    /// Number of elements selected
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat element indices in output order
    pub fn indices(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        match self {
            AccessPlan::Strided(plan) => Box::new(plan.indices()),
            AccessPlan::Gather { indices, .. } => Box::new(indices.iter().copied()),
        }
    }
}

/// Raster dimensions combined with an interleave layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub shape: RasterShape,
    pub interleave: Interleave,
}

impl Layout {
    pub fn new(shape: RasterShape, interleave: Interleave) -> Self {
        Self { shape, interleave }
    }

    /// Element strides for (line, column, band)
    pub fn strides(&self) -> (usize, usize, usize) {
        let RasterShape { lines, columns, bands } = self.shape;
        match self.interleave {
            Interleave::Bsq => (columns, 1, lines * columns),
            Interleave::Bil => (bands * columns, 1, columns),
            Interleave::Bip => (columns * bands, bands, 1),
        }
    }

    /// Flat index of the element at (line, column, band)
    pub fn flat_index(&self, line: usize, column: usize, band: usize) -> usize {
        let (ls, cs, bs) = self.strides();
        line * ls + column * cs + band * bs
    }

    /// Plan for one band, shaped (lines, columns)
    pub fn band(&self, band: usize) -> Result<StridedPlan> {
        check_index("band", band, self.shape.bands)?;
        let (ls, cs, _) = self.strides();
        Ok(StridedPlan {
            offset: self.flat_index(0, 0, band),
            shape: vec![self.shape.lines, self.shape.columns],
            strides: vec![ls, cs],
        })
    }

    /// Plan for one line, shaped (columns, bands)
    pub fn line(&self, line: usize) -> Result<StridedPlan> {
        check_index("line", line, self.shape.lines)?;
        let (_, cs, bs) = self.strides();
        Ok(StridedPlan {
            offset: self.flat_index(line, 0, 0),
            shape: vec![self.shape.columns, self.shape.bands],
            strides: vec![cs, bs],
        })
    }

    /// Plan for one column, shaped (lines, bands)
    pub fn column(&self, column: usize) -> Result<StridedPlan> {
        check_index("column", column, self.shape.columns)?;
        let (ls, _, bs) = self.strides();
        Ok(StridedPlan {
            offset: self.flat_index(0, column, 0),
            shape: vec![self.shape.lines, self.shape.bands],
            strides: vec![ls, bs],
        })
    }

    /// Plan for the full spectrum of one pixel, shaped (bands,)
    pub fn pixel(&self, line: usize, column: usize) -> Result<StridedPlan> {
        check_index("line", line, self.shape.lines)?;
        check_index("column", column, self.shape.columns)?;
        let (_, _, bs) = self.strides();
        Ok(StridedPlan {
            offset: self.flat_index(line, column, 0),
            shape: vec![self.shape.bands],
            strides: vec![bs],
        })
    }

    /// Plan for paired (line, column) lists, shaped (n_pixels, bands)
    ///
    /// Pixels keep their input order.
    pub fn pixels(&self, lines: &[usize], columns: &[usize]) -> Result<AccessPlan> {
        if lines.len() != columns.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} line indices paired with {} column indices",
                lines.len(),
                columns.len()
            )));
        }

        let mut indices = Vec::with_capacity(lines.len() * self.shape.bands);
        for (&line, &column) in lines.iter().zip(columns) {
            indices.extend(self.pixel(line, column)?.indices());
        }

        Ok(AccessPlan::Gather {
            shape: vec![lines.len(), self.shape.bands],
            indices,
        })
    }

    /// Plan for a half-open window, shaped (rows, cols, bands)
    pub fn chunk(&self, window: &ChunkWindow) -> Result<StridedPlan> {
        check_range("line", window.line_start, window.line_end, self.shape.lines)?;
        check_range("column", window.col_start, window.col_end, self.shape.columns)?;
        let (ls, cs, bs) = self.strides();
        Ok(StridedPlan {
            offset: self.flat_index(window.line_start, window.col_start, 0),
            shape: vec![window.rows(), window.cols(), self.shape.bands],
            strides: vec![ls, cs, bs],
        })
    }
}

fn check_index(axis: &str, index: usize, size: usize) -> Result<()> {
    if index >= size {
        return Err(Error::OutOfBounds(format!(
            "{} {} outside [0, {})",
            axis, index, size
        )));
    }
    Ok(())
}

fn check_range(axis: &str, start: usize, end: usize, size: usize) -> Result<()> {
    if start > end || end > size {
        return Err(Error::OutOfBounds(format!(
            "{} range [{}, {}) outside [0, {}]",
            axis, start, end, size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUTS: [Interleave; 3] = [Interleave::Bsq, Interleave::Bil, Interleave::Bip];

    fn layout(interleave: Interleave) -> Layout {
        Layout::new(RasterShape::new(3, 4, 5).unwrap(), interleave)
    }

    #[test]
    fn test_flat_index_formulas() {
        let (l, c, b) = (2, 3, 4);
        assert_eq!(layout(Interleave::Bsq).flat_index(l, c, b), b * 3 * 4 + l * 4 + c);
        assert_eq!(layout(Interleave::Bil).flat_index(l, c, b), l * 5 * 4 + b * 4 + c);
        assert_eq!(layout(Interleave::Bip).flat_index(l, c, b), l * 4 * 5 + c * 5 + b);
    }

    #[test]
    fn test_flat_index_is_a_bijection() {
        for interleave in LAYOUTS {
            let layout = layout(interleave);
            let mut seen = vec![false; layout.shape.element_count()];
            for l in 0..3 {
                for c in 0..4 {
                    for b in 0..5 {
                        let idx = layout.flat_index(l, c, b);
                        assert!(!seen[idx]);
                        seen[idx] = true;
                    }
                }
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn test_bsq_band_is_contiguous() {
        let plan = layout(Interleave::Bsq).band(2).unwrap();
        let indices: Vec<usize> = plan.indices().collect();
        let expected: Vec<usize> = (24..36).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn test_bil_line_is_contiguous_after_transpose() {
        let plan = layout(Interleave::Bil).line(1).unwrap();
        assert_eq!(plan.shape, vec![4, 5]);
        let mut indices: Vec<usize> = plan.indices().collect();
        indices.sort_unstable();
        let expected: Vec<usize> = (20..40).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn test_bip_pixel_is_contiguous() {
        let plan = layout(Interleave::Bip).pixel(1, 2).unwrap();
        let indices: Vec<usize> = plan.indices().collect();
        assert_eq!(indices, vec![30, 31, 32, 33, 34]);
    }

    #[test]
    fn test_plans_agree_with_flat_index() {
        for interleave in LAYOUTS {
            let layout = layout(interleave);
            for b in 0..5 {
                let idx: Vec<usize> = layout.band(b).unwrap().indices().collect();
                for l in 0..3 {
                    for c in 0..4 {
                        assert_eq!(idx[l * 4 + c], layout.flat_index(l, c, b));
                    }
                }
            }
            for l in 0..3 {
                let idx: Vec<usize> = layout.line(l).unwrap().indices().collect();
                for c in 0..4 {
                    for b in 0..5 {
                        assert_eq!(idx[c * 5 + b], layout.flat_index(l, c, b));
                    }
                }
            }
            for c in 0..4 {
                let idx: Vec<usize> = layout.column(c).unwrap().indices().collect();
                for l in 0..3 {
                    for b in 0..5 {
                        assert_eq!(idx[l * 5 + b], layout.flat_index(l, c, b));
                    }
                }
            }
        }
    }

    #[test]
    fn test_pixels_keep_input_order() {
        for interleave in LAYOUTS {
            let layout = layout(interleave);
            let plan = layout.pixels(&[2, 0], &[1, 3]).unwrap();
            assert_eq!(plan.shape(), &[2, 5]);
            let idx: Vec<usize> = plan.indices().collect();
            for b in 0..5 {
                assert_eq!(idx[b], layout.flat_index(2, 1, b));
                assert_eq!(idx[5 + b], layout.flat_index(0, 3, b));
            }
        }
    }

    #[test]
    fn test_pixels_length_mismatch() {
        let result = layout(Interleave::Bip).pixels(&[0, 1], &[0]);
        assert!(matches!(result, Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn test_chunk_plan() {
        for interleave in LAYOUTS {
            let layout = layout(interleave);
            let window = ChunkWindow::new(1, 3, 1, 3);
            let plan = layout.chunk(&window).unwrap();
            assert_eq!(plan.shape, vec![2, 2, 5]);
            let idx: Vec<usize> = plan.indices().collect();
            assert_eq!(idx.len(), 20);
            for r in 0..2 {
                for c in 0..2 {
                    for b in 0..5 {
                        assert_eq!(idx[(r * 2 + c) * 5 + b], layout.flat_index(1 + r, 1 + c, b));
                    }
                }
            }
        }
    }

    #[test]
    fn test_chunk_full_extent_allowed() {
        let window = ChunkWindow::new(0, 4, 0, 3);
        assert!(layout(Interleave::Bsq).chunk(&window).is_ok());
    }

    #[test]
    fn test_out_of_bounds() {
        let layout = layout(Interleave::Bil);
        assert!(matches!(layout.band(5), Err(Error::OutOfBounds(_))));
        assert!(matches!(layout.line(3), Err(Error::OutOfBounds(_))));
        assert!(matches!(layout.column(4), Err(Error::OutOfBounds(_))));
        assert!(layout.chunk(&ChunkWindow::new(0, 5, 0, 1)).is_err());
        assert!(layout.chunk(&ChunkWindow::new(2, 1, 0, 1)).is_err());
    }

    #[test]
    fn test_window_dimensions() {
        let window = ChunkWindow::new(200, 250, 100, 200);
        assert_eq!(window.rows(), 100);
        assert_eq!(window.cols(), 50);
    }
}
