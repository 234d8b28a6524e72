//! Priority-Flood depression filling
//!
//! O(n log n) filling of closed depressions. Cells are processed in
//! elevation order with a min-heap seeded from every cell that can drain
//! out of the data: cells on the raster edge and cells next to nodata.
//!
//! Reference:
//! Barnes, R., Lehman, C., & Mulla, D. (2014). Priority-Flood: An optimal
//! depression-filling and watershed-labeling algorithm for digital elevation
//! models. *Computers & Geosciences*, 62, 117–127.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use ndarray::Array2;
use digitalrivers_core::raster::{Direction, Raster};
use digitalrivers_core::{Algorithm, Error, Result};
use tracing::debug;

/// A cell in the priority queue.
///
/// Ordered by (elevation, row, col) and reversed so `BinaryHeap` pops the
/// lowest cell first. The row/col tie-break keeps equal-elevation cells in
/// row-major order regardless of push order.
#[derive(Debug, Clone, Copy)]
struct Cell {
    elevation: f64,
    row: usize,
    col: usize,
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .elevation
            .total_cmp(&self.elevation)
            .then_with(|| other.row.cmp(&self.row))
            .then_with(|| other.col.cmp(&self.col))
    }
}

/// Parameters for depression filling
#[derive(Debug, Clone, Default)]
pub struct FillParams {
    /// Elevation added above the spill level for each raised cell.
    /// 0.0 leaves filled depressions perfectly flat.
    pub increment: f64,
}

/// Output of [`fill_depressions`]
#[derive(Debug, Clone)]
pub struct FillResult {
    pub elevation: Raster<f64>,
    /// Cells whose elevation was raised
    pub cells_raised: usize,
    /// 8-connected groups of raised cells
    pub depressions_filled: usize,
}

/// Depression filling algorithm
#[derive(Debug, Clone, Default)]
pub struct FillDepressions;

impl Algorithm for FillDepressions {
    type Input = Raster<f64>;
    type Output = FillResult;
    type Params = FillParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Fill Depressions"
    }

    fn description(&self) -> &'static str {
        "Raise closed depressions to their pour point using Priority-Flood (Barnes 2014)"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        fill_depressions(&input, params.increment)
    }
}

/// Fill closed depressions so that every valid cell can reach the raster
/// edge or a nodata cell along a non-increasing path.
///
/// # Algorithm
/// 1. Seed a min-heap with every valid cell on the edge or next to nodata
/// 2. Pop the lowest cell; its elevation is the current spill level
/// 3. For each unvisited valid neighbour at or below that level, raise it
///    to `level + increment`; push it either way
/// 4. Repeat until the heap is empty
///
/// Nodata cells are copied through unchanged. Cells are never lowered.
///
/// # Arguments
/// * `dem` - Input DEM raster
/// * `increment` - Finite, non-negative rise per filled cell
pub fn fill_depressions(dem: &Raster<f64>, increment: f64) -> Result<FillResult> {
    if !increment.is_finite() || increment < 0.0 {
        return Err(Error::InvalidParameter {
            name: "fill_increment",
            value: increment.to_string(),
            reason: "must be finite and non-negative".to_string(),
        });
    }

    let (rows, cols) = dem.shape();
    let mut output = dem.data().clone();
    let mut visited = Array2::<bool>::from_elem((rows, cols), false);
    let mut raised = Array2::<bool>::from_elem((rows, cols), false);
    let mut heap = BinaryHeap::new();

    for row in 0..rows {
        for col in 0..cols {
            if !dem.is_valid(row, col) {
                visited[(row, col)] = true;
                continue;
            }
            if dem.is_on_boundary(row, col) || dem.touches_nodata(row, col) {
                let elevation = output[(row, col)];
                heap.push(Cell { elevation, row, col });
                visited[(row, col)] = true;
            }
        }
    }

    let mut cells_raised = 0;
    while let Some(cell) = heap.pop() {
        for dir in Direction::ALL {
            let Some((nr, nc)) = dem.neighbor(cell.row, cell.col, dir) else {
                continue;
            };
            if visited[(nr, nc)] {
                continue;
            }
            visited[(nr, nc)] = true;

            let original = output[(nr, nc)];
            let level = if original <= cell.elevation {
                cell.elevation + increment
            } else {
                original
            };
            if level > original {
                output[(nr, nc)] = level;
                raised[(nr, nc)] = true;
                cells_raised += 1;
            }
            heap.push(Cell { elevation: level, row: nr, col: nc });
        }
    }

    let depressions_filled = count_components(&raised);
    debug!(cells_raised, depressions_filled, "filled depressions");

    let mut elevation = dem.like(0.0);
    *elevation.data_mut() = output;

    Ok(FillResult {
        elevation,
        cells_raised,
        depressions_filled,
    })
}

/// Number of 8-connected components of `true` cells
fn count_components(mask: &Array2<bool>) -> usize {
    let (rows, cols) = mask.dim();
    let mut seen = Array2::<bool>::from_elem((rows, cols), false);
    let mut queue = VecDeque::new();
    let mut components = 0;

    for start in mask.indexed_iter().filter(|&(_, &m)| m).map(|(idx, _)| idx) {
        if seen[start] {
            continue;
        }
        components += 1;
        seen[start] = true;
        queue.push_back(start);

        while let Some((row, col)) = queue.pop_front() {
            for dir in Direction::ALL {
                let (dr, dc) = dir.offset();
                let (Some(nr), Some(nc)) = (row.checked_add_signed(dr), col.checked_add_signed(dc))
                else {
                    continue;
                };
                if nr < rows && nc < cols && mask[(nr, nc)] && !seen[(nr, nc)] {
                    seen[(nr, nc)] = true;
                    queue.push_back((nr, nc));
                }
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_dem_with_sink() -> Raster<f64> {
        // 7x7 DEM with a depression in the center
        let values = vec![
            9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0,
            9.0, 8.0, 8.0, 8.0, 8.0, 8.0, 9.0,
            9.0, 8.0, 7.0, 7.0, 7.0, 8.0, 9.0,
            9.0, 8.0, 7.0, 3.0, 7.0, 8.0, 9.0,
            9.0, 8.0, 7.0, 7.0, 7.0, 8.0, 9.0,
            9.0, 8.0, 8.0, 8.0, 8.0, 8.0, 9.0,
            9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0,
        ];
        Raster::from_vec(values, 7, 7).unwrap()
    }

    #[test]
    fn test_fills_nested_bowl_to_rim() {
        let dem = create_dem_with_sink();
        let filled = fill_depressions(&dem, 0.0).unwrap();

        // The whole interior sits below the 9.0 rim and is raised to it
        for row in 1..6 {
            for col in 1..6 {
                assert_eq!(
                    filled.elevation.get(row, col).unwrap(),
                    9.0,
                    "interior cell ({row}, {col}) should spill at the rim"
                );
            }
        }
        assert_eq!(filled.cells_raised, 25);
        assert_eq!(filled.depressions_filled, 1);
    }

    #[test]
    fn test_preserves_border() {
        let dem = create_dem_with_sink();
        let filled = fill_depressions(&dem, 1e-3).unwrap();

        assert_eq!(filled.elevation.get(0, 0).unwrap(), 9.0);
        assert_eq!(filled.elevation.get(0, 3).unwrap(), 9.0);
        assert_eq!(filled.elevation.get(6, 6).unwrap(), 9.0);
    }

    #[test]
    fn test_no_change_on_clean_dem() {
        // Sloped plane: no sinks
        let mut dem = Raster::new(10, 10);
        for row in 0..10 {
            for col in 0..10 {
                dem.set(row, col, (row + col) as f64).unwrap();
            }
        }

        let filled = fill_depressions(&dem, 0.0).unwrap();
        assert_eq!(filled.elevation.data(), dem.data());
        assert_eq!(filled.cells_raised, 0);
        assert_eq!(filled.depressions_filled, 0);
    }

    #[test]
    fn test_increment_creates_gradient() {
        let dem = create_dem_with_sink();
        let filled = fill_depressions(&dem, 0.01).unwrap();

        let ring = filled.elevation.get(1, 3).unwrap();
        let center = filled.elevation.get(3, 3).unwrap();
        assert!(ring > 9.0, "ring next to the rim should be raised above it: {ring}");
        assert!(center > ring, "center further from the rim sits higher: center={center}, ring={ring}");
    }

    #[test]
    fn test_never_lowers_elevation() {
        let dem = create_dem_with_sink();
        let filled = fill_depressions(&dem, 1e-5).unwrap();

        for ((idx, &orig), &fill) in dem.data().indexed_iter().zip(filled.elevation.data().iter()) {
            assert!(fill >= orig, "lowered at {idx:?}: orig={orig}, fill={fill}");
        }
    }

    #[test]
    fn test_outlet_respects_low_border() {
        // Border 10 except an outlet at (4,2) = 2, center sink at (2,2) = 1
        let mut dem = Raster::filled(5, 5, 5.0);
        for row in 0..5 {
            for col in 0..5 {
                if dem.is_on_boundary(row, col) {
                    dem.set(row, col, 10.0).unwrap();
                }
            }
        }
        dem.set(2, 2, 1.0).unwrap();
        dem.set(4, 2, 2.0).unwrap();

        let filled = fill_depressions(&dem, 0.0).unwrap();

        // The sink only needs to reach the 5.0 plateau, which drains through the outlet
        assert_eq!(filled.elevation.get(2, 2).unwrap(), 5.0);
        assert_eq!(filled.elevation.get(3, 2).unwrap(), 5.0);
        assert_eq!(filled.cells_raised, 1);
    }

    #[test]
    fn test_nodata_acts_as_outlet() {
        // Pit next to a nodata hole drains into it and is left alone
        let mut dem = Raster::filled(5, 5, 5.0).with_nodata(Some(-9999.0));
        dem.set(2, 2, -9999.0).unwrap();
        dem.set(2, 3, 1.0).unwrap();

        let filled = fill_depressions(&dem, 0.0).unwrap();
        assert_eq!(filled.elevation.get(2, 3).unwrap(), 1.0);
        assert_eq!(filled.elevation.get(2, 2).unwrap(), -9999.0);
        assert_eq!(filled.cells_raised, 0);
    }

    #[test]
    fn test_counts_separate_depressions() {
        let mut dem = Raster::filled(5, 7, 5.0);
        dem.set(2, 1, 1.0).unwrap();
        dem.set(2, 5, 1.0).unwrap();

        let filled = fill_depressions(&dem, 0.0).unwrap();
        assert_eq!(filled.depressions_filled, 2);
        assert_eq!(filled.cells_raised, 2);
    }

    #[test]
    fn test_rejects_negative_increment() {
        let dem = create_dem_with_sink();
        assert!(fill_depressions(&dem, -1.0).is_err());
    }
}
