//! D8 flow direction algorithm
//!
//! Calculates the direction of flow from each cell to its steepest
//! downslope neighbor using the D8 (deterministic eight-node) method.
//!
//! Flow direction encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = sink, 1-8 = direction to steepest neighbor, 255 = nodata

use ndarray::Array2;
use crate::maybe_rayon::*;
use digitalrivers_core::raster::{
    Direction, FlowCode, Raster, TieBreakOrder, NODATA_CODE, SINK_CODE,
};
use digitalrivers_core::{Algorithm, Error, Result};
use tracing::{debug, warn};

use super::config::{FlowConfig, ForcedDirection};
use super::diagnostics::FlowDiagnostics;
use super::flats::{check_depressions, resolve_flats_deferred};
use super::topology::trace_flow_path;

/// Flow direction algorithm (D8), including flat resolution
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = FlowDirectionResult;
    type Params = FlowConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "Calculate D8 flow direction after resolving flats and depressions"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        flow_direction(&input, &params)
    }
}

/// Direction grid and the diagnostics gathered while producing it
#[derive(Debug, Clone)]
pub struct FlowDirectionResult {
    pub directions: Raster<u8>,
    pub diagnostics: FlowDiagnostics,
}

/// Output of the bare solver
#[derive(Debug, Clone)]
pub struct D8Output {
    pub directions: Raster<u8>,
    /// Valid cells without a lower neighbour that were not designated sinks,
    /// in row-major order
    pub unresolved: Vec<(usize, usize)>,
}

/// Drop per unit distance towards each neighbour, indexed by [`Direction::index`].
///
/// `None` for neighbours outside the raster or holding nodata, and for every
/// direction when the cell itself is nodata. Negative values are rises.
pub fn neighbor_slopes(dem: &Raster<f64>, row: usize, col: usize) -> Result<[Option<f64>; 8]> {
    let center = dem.get(row, col)?;
    let mut slopes = [None; 8];
    if dem.is_nodata(center) {
        return Ok(slopes);
    }
    for n in dem.neighbors(row, col) {
        if let Some(value) = n.value {
            slopes[n.direction.index()] = Some((center - value) / dem.distance(n.direction));
        }
    }
    Ok(slopes)
}

/// Steepest signed drop per unit distance of every cell.
///
/// Pits get the (negative) gentlest rise. Nodata cells and cells with no
/// valid neighbour are NaN.
pub fn max_slope(dem: &Raster<f64>) -> Result<Raster<f64>> {
    let (rows, cols) = dem.shape();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    neighbor_slopes(dem, row, col)
                        .map(|slopes| {
                            slopes
                                .into_iter()
                                .flatten()
                                .fold(f64::NAN, f64::max)
                        })
                        .unwrap_or(f64::NAN)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut output = dem.with_same_meta::<f64>();
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

/// Steepest strictly-lower neighbour, scanning in tie-break order.
///
/// Any strictly lower neighbour is a candidate even when its slope rounds
/// to zero; a later candidate must be strictly steeper to win.
fn steepest_descent(
    dem: &Raster<f64>,
    row: usize,
    col: usize,
    order: &TieBreakOrder,
    distances: &[f64; 8],
) -> Option<Direction> {
    // In bounds: called for cells of `dem`
    let center = unsafe { dem.get_unchecked(row, col) };
    let mut best: Option<(Direction, f64)> = None;

    for dir in order.iter() {
        let Some((nr, nc)) = dem.neighbor(row, col, dir) else {
            continue;
        };
        let neighbor = unsafe { dem.get_unchecked(nr, nc) };
        if dem.is_nodata(neighbor) || neighbor >= center {
            continue;
        }
        let slope = (center - neighbor) / distances[dir.index()];
        if best.map_or(true, |(_, steepest)| slope > steepest) {
            best = Some((dir, slope));
        }
    }

    best.map(|(dir, _)| dir)
}

/// Solve D8 directions on an already resolved elevation grid.
///
/// Pure function of its inputs. Cells flagged in `sinks` get [`SINK_CODE`];
/// other valid cells point to their steepest strictly lower neighbour.
/// A valid cell with no such neighbour also gets [`SINK_CODE`] and is listed
/// in [`D8Output::unresolved`]. Nodata cells get [`NODATA_CODE`].
///
/// # Arguments
/// * `dem` - Elevation grid, normally the output of `resolve_flats`
/// * `sinks` - Designated sinks, same shape as `dem`
/// * `order` - Priority among equally steep neighbours
pub fn d8_directions(
    dem: &Raster<f64>,
    sinks: Option<&Array2<bool>>,
    order: &TieBreakOrder,
) -> Result<D8Output> {
    let (rows, cols) = dem.shape();
    if let Some(sinks) = sinks {
        if sinks.dim() != (rows, cols) {
            return Err(Error::InvalidGridShape {
                expected: (rows, cols),
                actual: sinks.dim(),
            });
        }
    }
    let distances = dem.cell_size().distances();

    let solved: Vec<(Vec<u8>, Vec<usize>)> = (0..rows)
        .into_par_iter()
        .map(|row| {
            let mut row_data = vec![NODATA_CODE; cols];
            let mut unresolved = Vec::new();

            for col in 0..cols {
                if !dem.is_valid(row, col) {
                    continue;
                }
                if sinks.is_some_and(|s| s[(row, col)]) {
                    row_data[col] = SINK_CODE;
                    continue;
                }
                row_data[col] = match steepest_descent(dem, row, col, order, &distances) {
                    Some(dir) => dir.code(),
                    None => {
                        unresolved.push(col);
                        SINK_CODE
                    }
                };
            }

            (row_data, unresolved)
        })
        .collect();

    let mut data = Vec::with_capacity(rows * cols);
    let mut unresolved = Vec::new();
    for (row, (row_data, cells)) in solved.into_iter().enumerate() {
        data.extend(row_data);
        unresolved.extend(cells.into_iter().map(|col| (row, col)));
    }

    let mut directions = dem.with_same_meta::<u8>();
    directions.set_nodata(Some(NODATA_CODE));
    *directions.data_mut() = Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(D8Output {
        directions,
        unresolved,
    })
}

/// Calculate D8 flow direction from a DEM.
///
/// Runs the full pipeline: flat and depression resolution (optionally
/// filling depressions first), the D8 solver, then any forced directions
/// from `config`. A depression whose sink is forced to flow counts as
/// drained. Strictness is checked last: with `config.strict`, remaining
/// depressions or cells fail with `UnresolvedFlat` and loops closed by
/// forced directions fail with `CyclicFlowGraph`; otherwise both are
/// reported in the diagnostics.
///
/// # Direction Encoding
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
/// - `0` = sink (edge outlet, closed depression, or unresolved cell)
/// - `1`-`8` = direction to the steepest downslope neighbor
/// - `255` = nodata
pub fn flow_direction(dem: &Raster<f64>, config: &FlowConfig) -> Result<FlowDirectionResult> {
    let resolution = resolve_flats_deferred(dem, config)?;
    let mut diagnostics = resolution.diagnostics;

    if diagnostics.all_nodata {
        warn!("elevation grid is entirely nodata");
        let mut directions = dem.with_same_meta::<u8>();
        directions.data_mut().fill(NODATA_CODE);
        directions.set_nodata(Some(NODATA_CODE));
        return Ok(FlowDirectionResult {
            directions,
            diagnostics,
        });
    }

    let D8Output {
        mut directions,
        mut unresolved,
    } = d8_directions(
        &resolution.elevation,
        Some(&resolution.sinks),
        &config.tie_break_order,
    )?;

    for forced in &config.forced {
        apply_forced(&mut directions, forced)?;
        let cell = (forced.row, forced.col);
        unresolved.retain(|&c| c != cell);
        if matches!(forced.code, FlowCode::Flow(_)) {
            // A depression whose sink is forced to flow is drained
            diagnostics.unresolved_depressions.retain(|d| d.sink != cell);
        }
    }
    diagnostics.forced_cells = config.forced.len();
    diagnostics.unresolved_cells = unresolved;
    diagnostics.forced_cycles = forced_cycles(&directions, &config.forced)?;

    if !diagnostics.forced_cycles.is_empty() {
        if config.strict {
            return Err(Error::CyclicFlowGraph {
                cells: diagnostics.forced_cycles,
            });
        }
        warn!(
            count = diagnostics.forced_cycles.len(),
            first = ?diagnostics.forced_cycles[0],
            "forced directions close a flow cycle"
        );
    }
    check_depressions(&diagnostics, config.strict)?;
    if !diagnostics.unresolved_cells.is_empty() {
        warn!(
            count = diagnostics.unresolved_cells.len(),
            first = ?diagnostics.unresolved_cells[0],
            "cells left without a downslope direction"
        );
    }
    debug!(
        valid_cells = diagnostics.valid_cells,
        forced = diagnostics.forced_cells,
        "computed D8 flow direction"
    );

    Ok(FlowDirectionResult {
        directions,
        diagnostics,
    })
}

/// Cells on loops reachable from forced cells, sorted and deduplicated.
///
/// The solver only ever points downhill, so any loop runs through a
/// forced cell.
fn forced_cycles(directions: &Raster<u8>, forced: &[ForcedDirection]) -> Result<Vec<(usize, usize)>> {
    let mut cells = Vec::new();
    for f in forced {
        match trace_flow_path(directions, f.row, f.col) {
            Ok(_) => {}
            Err(Error::CyclicFlowGraph { cells: lap }) => cells.extend(lap),
            Err(e) => return Err(e),
        }
    }
    cells.sort_unstable();
    cells.dedup();
    Ok(cells)
}

fn apply_forced(directions: &mut Raster<u8>, forced: &ForcedDirection) -> Result<()> {
    let current = directions.get(forced.row, forced.col)?;
    if current == NODATA_CODE || forced.code == FlowCode::NoData {
        return Err(Error::InvalidParameter {
            name: "forced",
            value: format!("({}, {})", forced.row, forced.col),
            reason: "forced directions apply to valid cells only".to_string(),
        });
    }
    directions.set(forced.row, forced.col, forced.code.code())
}
