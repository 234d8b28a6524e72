//! Flow accumulation algorithm
//!
//! Calculates, for every cell, the number of cells (or the sum of their
//! weights) draining through it, itself included, from a D8 direction grid.

use std::collections::VecDeque;

use ndarray::Array2;
use digitalrivers_core::raster::{FlowCode, Raster, NODATA_CODE, SINK_CODE};
use digitalrivers_core::{Algorithm, Error, Result};
use tracing::debug;

use super::config::AccumulationParams;
use super::diagnostics::AccumulationDiagnostics;

/// Flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulation;

impl Algorithm for FlowAccumulation {
    type Input = Raster<u8>;
    type Output = AccumulationResult;
    type Params = AccumulationParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Calculate upstream contributing area from D8 flow direction"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        flow_accumulation(&input, params.weights.as_raster())
    }
}

/// Accumulation grid (NaN at nodata) and its diagnostics
#[derive(Debug, Clone)]
pub struct AccumulationResult {
    pub accumulation: Raster<f64>,
    pub diagnostics: AccumulationDiagnostics,
}

/// Calculate flow accumulation from a D8 flow direction raster.
///
/// Each valid cell receives its own weight (1 by default) plus the
/// accumulation of every cell draining into it. Sinks, directions pointing
/// off the grid and directions pointing into nodata terminate flow.
///
/// # Algorithm
/// 1. Count incoming flows for each cell (in-degree)
/// 2. Queue the cells with in-degree 0 in row-major order (headwaters)
/// 3. Pop a cell, add its accumulation to its receiver, and queue the
///    receiver once all of its donors are done
///
/// Cells never reaching in-degree 0 lie on a cycle and are reported
/// through `CyclicFlowGraph`. A cycle is treated as invalid input: the
/// whole call fails and no partial grid is returned, even for components
/// the cycle does not touch.
///
/// # Arguments
/// * `flow_dir` - D8 direction codes (output from `flow_direction`)
/// * `weights` - Optional per-cell contribution, same shape, finite and
///   non-negative at every valid cell
pub fn flow_accumulation(
    flow_dir: &Raster<u8>,
    weights: Option<&Raster<f64>>,
) -> Result<AccumulationResult> {
    let (rows, cols) = flow_dir.shape();
    if let Some(weights) = weights {
        flow_dir.ensure_same_shape(weights)?;
    }

    let mut diagnostics = AccumulationDiagnostics::default();
    let mut accumulation = Array2::<f64>::from_elem((rows, cols), f64::NAN);
    // Flat index of the receiving cell
    let mut receiver: Vec<Option<usize>> = vec![None; rows * cols];
    let mut in_degree = vec![0u8; rows * cols];
    let mut valid = vec![false; rows * cols];

    for ((row, col), &code) in flow_dir.data().indexed_iter() {
        let idx = row * cols + col;
        let target = match FlowCode::decode_at(code, row, col)? {
            FlowCode::NoData => continue,
            FlowCode::Sink => {
                diagnostics.sinks += 1;
                None
            }
            FlowCode::Flow(dir) => flow_dir.neighbor(row, col, dir),
        };
        valid[idx] = true;
        diagnostics.valid_cells += 1;
        accumulation[(row, col)] = cell_weight(weights, row, col)?;

        match target {
            Some((tr, tc)) if flow_dir.data()[(tr, tc)] != NODATA_CODE => {
                let t = tr * cols + tc;
                receiver[idx] = Some(t);
                in_degree[t] += 1;
            }
            Some(_) => diagnostics.outflows += 1,
            None if code != SINK_CODE => diagnostics.outflows += 1,
            None => {}
        }
    }

    let mut output = flow_dir.with_same_meta::<f64>();
    output.set_nodata(Some(f64::NAN));

    if diagnostics.valid_cells == 0 {
        debug!("direction grid holds no valid cells");
        diagnostics.all_nodata = true;
        *output.data_mut() = accumulation;
        return Ok(AccumulationResult {
            accumulation: output,
            diagnostics,
        });
    }

    // Row-major seeding and FIFO order keep the summation order fixed
    let mut queue: VecDeque<usize> = (0..rows * cols)
        .filter(|&idx| valid[idx] && in_degree[idx] == 0)
        .collect();
    let acc = accumulation
        .as_slice_mut()
        .ok_or_else(|| Error::Other("accumulation grid is not contiguous".to_string()))?;
    let mut processed = 0;

    while let Some(idx) = queue.pop_front() {
        processed += 1;
        let Some(t) = receiver[idx] else {
            continue;
        };
        acc[t] += acc[idx];
        in_degree[t] -= 1;
        if in_degree[t] == 0 {
            queue.push_back(t);
        }
    }

    if processed < diagnostics.valid_cells {
        let cells = cycle_cells(&in_degree, cols);
        return Err(Error::CyclicFlowGraph { cells });
    }

    diagnostics.max_accumulation = acc.iter().copied().filter(|v| !v.is_nan()).fold(0.0, f64::max);
    debug!(
        valid_cells = diagnostics.valid_cells,
        sinks = diagnostics.sinks,
        outflows = diagnostics.outflows,
        max = diagnostics.max_accumulation,
        "computed flow accumulation"
    );

    *output.data_mut() = accumulation;
    Ok(AccumulationResult {
        accumulation: output,
        diagnostics,
    })
}

fn cell_weight(weights: Option<&Raster<f64>>, row: usize, col: usize) -> Result<f64> {
    let Some(weights) = weights else {
        return Ok(1.0);
    };
    let w = weights.get(row, col)?;
    if weights.is_nodata(w) || !w.is_finite() || w < 0.0 {
        return Err(Error::InvalidParameter {
            name: "weights",
            value: format!("{w} at ({row}, {col})"),
            reason: "weights must be finite and non-negative at every valid cell".to_string(),
        });
    }
    Ok(w)
}

/// Cells left with pending in-degree, in row-major order.
///
/// Each cell has at most one receiver, so nothing lies downstream of a
/// cycle: the cells that never drained are exactly the cycle cells.
fn cycle_cells(in_degree: &[u8], cols: usize) -> Vec<(usize, usize)> {
    in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &pending)| pending > 0)
        .map(|(idx, _)| (idx / cols, idx % cols))
        .collect()
}
