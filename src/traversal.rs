//! Restartable traversal over lines, columns, bands or chunks
//!
//! A [`Cursor`] is the pure state machine: it tracks position and completion
//! and yields the next [`Step`]. A [`Traversal`] pairs a cursor with a
//! [`RasterHandle`] and reads the data for each step.
//!
//! `complete` turns true on the call that produces the last unit, so callers
//! check it after consuming a unit. Asking for more units after completion
//! produces out-of-range steps, which the raster rejects as out of bounds.

use std::marker::PhantomData;

use log::debug;
use ndarray::{Array2, Array3};

use crate::error::{Error, Result};
use crate::interleave::ChunkWindow;
use crate::io::Element;
use crate::raster::RasterHandle;
use crate::types::RasterShape;

/// Default chunk shape in (rows, columns)
pub const DEFAULT_CHUNK_SHAPE: (usize, usize) = (100, 100);

/// Non-empty tile shape in (rows, columns)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkShape {
    rows: usize,
    cols: usize,
}

impl ChunkShape {
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidFormat(format!(
                "chunk shape must be positive, got {} x {}",
                rows, cols
            )));
        }
        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

/// Dimension a traversal walks along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalMode {
    Line,
    Column,
    Band,
    /// Rectangular tiles spanning all bands
    Chunk(ChunkShape),
}

impl TraversalMode {
    /// Chunk mode with a validated, non-empty tile shape
    pub fn chunk(rows: usize, cols: usize) -> Result<Self> {
        Ok(TraversalMode::Chunk(ChunkShape::new(rows, cols)?))
    }

    /// Parses `line`, `column`, `band` or `chunk`
    pub fn from_name(name: &str, chunk_shape: (usize, usize)) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(TraversalMode::Line),
            "column" => Ok(TraversalMode::Column),
            "band" => Ok(TraversalMode::Band),
            "chunk" => Self::chunk(chunk_shape.0, chunk_shape.1),
            other => Err(Error::Unsupported(format!("traversal mode '{}'", other))),
        }
    }
}

/// One position produced by a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Line(usize),
    Column(usize),
    Band(usize),
    Chunk(ChunkWindow),
}

/// Position and completion state of a traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    mode: TraversalMode,
    extent: RasterShape,
    current_line: Option<usize>,
    current_column: Option<usize>,
    current_band: Option<usize>,
    complete: bool,
}

impl Cursor {
    pub fn new(mode: TraversalMode, extent: RasterShape) -> Self {
        Self {
            mode,
            extent,
            current_line: None,
            current_column: None,
            current_band: None,
            complete: false,
        }
    }

    pub fn mode(&self) -> TraversalMode {
        self.mode
    }

    /// True once the last unit has been produced
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns to the before-start state
    pub fn reset(&mut self) {
        self.current_line = None;
        self.current_column = None;
        self.current_band = None;
        self.complete = false;
    }

    /// Moves to the next unit
    pub fn advance(&mut self) -> Step {
        match self.mode {
            TraversalMode::Line => {
                let line = Self::bump(&mut self.current_line);
                self.complete |= line + 1 == self.extent.lines;
                Step::Line(line)
            }
            TraversalMode::Column => {
                let column = Self::bump(&mut self.current_column);
                self.complete |= column + 1 == self.extent.columns;
                Step::Column(column)
            }
            TraversalMode::Band => {
                let band = Self::bump(&mut self.current_band);
                self.complete |= band + 1 == self.extent.bands;
                Step::Band(band)
            }
            TraversalMode::Chunk(shape) => {
                let (rows, cols) = (shape.rows(), shape.cols());
                let (line, column) = match (self.current_line, self.current_column) {
                    (Some(line), Some(column)) if column.saturating_add(cols) >= self.extent.columns => {
                        (line.saturating_add(rows), 0)
                    }
                    (Some(line), Some(column)) => (line, column + cols),
                    _ => (0, 0),
                };
                self.current_line = Some(line);
                self.current_column = Some(column);

                let window = ChunkWindow::new(
                    column,
                    column.saturating_add(cols).min(self.extent.columns),
                    line,
                    line.saturating_add(rows).min(self.extent.lines),
                );
                self.complete |= window.line_end == self.extent.lines && window.col_end == self.extent.columns;
                Step::Chunk(window)
            }
        }
    }

    fn bump(counter: &mut Option<usize>) -> usize {
        let next = counter.map_or(0, |c| c + 1);
        *counter = Some(next);
        next
    }
}

/// Data produced by one traversal step
#[derive(Debug, Clone, PartialEq)]
pub enum Unit<T> {
    /// (columns, bands)
    Line { index: usize, data: Array2<T> },
    /// (lines, bands)
    Column { index: usize, data: Array2<T> },
    /// (lines, columns)
    Band { index: usize, data: Array2<T> },
    /// (rows, cols, bands)
    Chunk { window: ChunkWindow, data: Array3<T> },
}

/// A cursor bound to one raster, reading `T` elements
pub struct Traversal<'a, T> {
    raster: &'a RasterHandle,
    cursor: Cursor,
    _marker: PhantomData<T>,
}

impl<'a, T: Element> Traversal<'a, T> {
    pub fn new(raster: &'a RasterHandle, mode: TraversalMode) -> Self {
        Self {
            raster,
            cursor: Cursor::new(mode, raster.shape()),
            _marker: PhantomData,
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor.is_complete()
    }

    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    /// Advances and reads the next line, column, band or chunk
    pub fn read_next(&mut self) -> Result<Unit<T>> {
        let step = self.cursor.advance();
        debug!("traversal step {:?}", step);
        match step {
            Step::Line(index) => Ok(Unit::Line { index, data: self.raster.get_line(index)? }),
            Step::Column(index) => Ok(Unit::Column { index, data: self.raster.get_column(index)? }),
            Step::Band(index) => Ok(Unit::Band { index, data: self.raster.get_band(index)? }),
            Step::Chunk(window) => Ok(Unit::Chunk { window, data: self.raster.get_window(&window)? }),
        }
    }
}

impl<T: Element> Iterator for Traversal<'_, T> {
    type Item = Result<Unit<T>>;

    /// Yields units until the cursor completes
    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_complete() {
            return None;
        }
        Some(self.read_next())
    }
}
