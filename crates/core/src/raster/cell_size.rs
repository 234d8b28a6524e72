//! Real-world cell spacing

use crate::error::{Error, Result};
use crate::raster::Direction;
use serde::{Deserialize, Serialize};

/// Horizontal spacing between cell centres.
///
/// `dx` is the width of a column and `dy` the height of a row, both in
/// map units and both strictly positive. Anisotropic grids are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSize {
    pub dx: f64,
    pub dy: f64,
}

impl CellSize {
    pub fn new(dx: f64, dy: f64) -> Result<Self> {
        for (name, value) in [("dx", dx), ("dy", dy)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidParameter {
                    name: if name == "dx" { "cell_size.dx" } else { "cell_size.dy" },
                    value: value.to_string(),
                    reason: "cell size must be finite and positive".to_string(),
                });
            }
        }
        Ok(Self { dx, dy })
    }

    /// Square cells
    pub fn square(size: f64) -> Result<Self> {
        Self::new(size, size)
    }

    /// Distance between the centres of a cell and its neighbour in `dir`
    pub fn distance(&self, dir: Direction) -> f64 {
        match dir.offset() {
            (0, _) => self.dx,
            (_, 0) => self.dy,
            _ => self.dx.hypot(self.dy),
        }
    }

    /// Distances indexed by [`Direction::index`]
    pub fn distances(&self) -> [f64; 8] {
        Direction::ALL.map(|dir| self.distance(dir))
    }

    pub fn cell_area(&self) -> f64 {
        self.dx * self.dy
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self { dx: 1.0, dy: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_square_distances() {
        let cs = CellSize::square(30.0).unwrap();
        assert_relative_eq!(cs.distance(Direction::E), 30.0);
        assert_relative_eq!(cs.distance(Direction::S), 30.0);
        assert_relative_eq!(cs.distance(Direction::NE), 30.0 * std::f64::consts::SQRT_2);
    }

    #[test]
    fn test_anisotropic_distances() {
        let cs = CellSize::new(3.0, 4.0).unwrap();
        assert_relative_eq!(cs.distance(Direction::W), 3.0);
        assert_relative_eq!(cs.distance(Direction::N), 4.0);
        assert_relative_eq!(cs.distance(Direction::SW), 5.0);
        assert_relative_eq!(cs.cell_area(), 12.0);
    }

    #[test]
    fn test_rejects_degenerate_sizes() {
        assert!(CellSize::new(0.0, 1.0).is_err());
        assert!(CellSize::new(1.0, -2.0).is_err());
        assert!(CellSize::square(f64::NAN).is_err());
    }
}
