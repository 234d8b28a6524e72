//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{CellSize, Direction, Neighbors, RasterElement};
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

/// A 2D grid of cell values with cell spacing and a nodata sentinel.
///
/// `Raster<T>` backs every grid in the crate: elevations (`f64`),
/// D8 direction codes (`u8`) and accumulation (`f64`).
///
/// # Type Parameters
///
/// - `T`: The cell value type, must implement [`RasterElement`]
///
/// # Example
///
/// ```ignore
/// use digitalrivers_core::{CellSize, Raster};
///
/// let dem = Raster::from_vec(vec![5.0, 4.0, 3.0, 2.0, 1.0], 1, 5)?
///     .with_cell_size(CellSize::square(30.0)?)
///     .with_nodata(Some(-9999.0));
///
/// assert_eq!(dem.get(0, 2)?, 3.0);
/// assert!(dem.is_valid(0, 4));
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Cell values in row-major order (row, col)
    data: Array2<T>,
    cell_size: CellSize,
    /// Upper-left corner in map units, carried through for raster adapters
    origin: (f64, f64),
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidGridShape {
                expected: (rows, cols),
                actual: (1, data.len()),
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            cell_size: CellSize::default(),
            origin: (0.0, 0.0),
            nodata: None,
        }
    }

    /// Zero-filled raster of another cell type with this raster's shape and geometry.
    /// The nodata sentinel is not carried over.
    pub fn with_same_meta<U: RasterElement>(&self) -> Raster<U> {
        Raster {
            data: Array2::zeros(self.data.dim()),
            cell_size: self.cell_size,
            origin: self.origin,
            nodata: None,
        }
    }

    /// Same shape and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            cell_size: self.cell_size,
            origin: self.origin,
            nodata: self.nodata,
        }
    }

    pub fn with_nodata(mut self, nodata: Option<T>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn with_cell_size(mut self, cell_size: CellSize) -> Self {
        self.cell_size = cell_size;
        self
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fail with `InvalidGridShape` unless `other` has this raster's shape
    pub fn ensure_same_shape<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::InvalidGridShape {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        Ok(())
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        let cell = self
            .data
            .get_mut((row, col))
            .ok_or(Error::IndexOutOfBounds { row, col, rows, cols })?;
        *cell = value;
        Ok(())
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.data.view_mut()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    pub fn cell_size(&self) -> CellSize {
        self.cell_size
    }

    pub fn set_cell_size(&mut self, cell_size: CellSize) {
        self.cell_size = cell_size;
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn set_origin(&mut self, x: f64, y: f64) {
        self.origin = (x, y);
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    // Validity

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// In bounds and not nodata
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.data
            .get((row, col))
            .is_some_and(|&value| !self.is_nodata(value))
    }

    /// Number of cells holding data
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// Whether the cell touches the raster edge
    pub fn is_on_boundary(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row + 1 == self.rows() || col + 1 == self.cols()
    }

    // Neighbourhood

    /// Coordinates of the neighbour in `dir`, or `None` outside the raster
    pub fn neighbor(&self, row: usize, col: usize, dir: Direction) -> Option<(usize, usize)> {
        let (dr, dc) = dir.offset();
        let nr = row.checked_add_signed(dr)?;
        let nc = col.checked_add_signed(dc)?;
        (nr < self.rows() && nc < self.cols()).then_some((nr, nc))
    }

    /// In-bounds 8-connected neighbours in code order (E, NE, N, ..., SE)
    pub fn neighbors(&self, row: usize, col: usize) -> Neighbors<'_, T> {
        Neighbors::new(self, row, col, &Direction::ALL)
    }

    /// Whether any 8-connected neighbour is in bounds and holds nodata
    pub fn touches_nodata(&self, row: usize, col: usize) -> bool {
        self.neighbors(row, col).any(|n| n.value.is_none())
    }

    /// Centre-to-centre distance towards `dir`
    pub fn distance(&self, dir: Direction) -> f64 {
        self.cell_size.distance(dir)
    }

    // Statistics

    /// Basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum = 0.0_f64;
        let mut count = 0_usize;

        for &value in self.data.iter().filter(|&&v| !self.is_nodata(v)) {
            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }
            if let Some(v) = value.as_f64() {
                sum += v;
            }
            count += 1;
        }

        RasterStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
