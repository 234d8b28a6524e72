//! 8-connected neighbour queries

use super::{Direction, Raster, RasterElement};

/// A neighbour that lies inside the raster bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<T> {
    pub direction: Direction,
    pub row: usize,
    pub col: usize,
    /// `None` when the neighbour holds nodata
    pub value: Option<T>,
}

/// Iterator over the in-bounds neighbours of a cell.
///
/// Neighbours outside the raster are skipped entirely (they are absent,
/// not nodata). Directions are visited in the order of the slice given
/// at construction.
pub struct Neighbors<'a, T: RasterElement> {
    raster: &'a Raster<T>,
    row: usize,
    col: usize,
    directions: std::slice::Iter<'a, Direction>,
}

impl<'a, T: RasterElement> Neighbors<'a, T> {
    pub fn new(raster: &'a Raster<T>, row: usize, col: usize, order: &'a [Direction]) -> Self {
        Self {
            raster,
            row,
            col,
            directions: order.iter(),
        }
    }
}

impl<'a, T: RasterElement> Iterator for Neighbors<'a, T> {
    type Item = Neighbor<T>;

    fn next(&mut self) -> Option<Self::Item> {
        for &direction in self.directions.by_ref() {
            let Some((row, col)) = self.raster.neighbor(self.row, self.col, direction) else {
                continue;
            };
            // In bounds: checked by `neighbor`
            let value = unsafe { self.raster.get_unchecked(row, col) };
            let value = (!self.raster.is_nodata(value)).then_some(value);
            return Some(Neighbor {
                direction,
                row,
                col,
                value,
            });
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.directions.len()))
    }
}
