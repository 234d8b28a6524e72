//! Drainage topology queries over a D8 direction grid
//!
//! Receivers, donor tables, flow paths and conversion to and from the
//! ESRI power-of-two direction encoding.

use std::collections::{BTreeMap, HashMap};

use ndarray::Array2;
use digitalrivers_core::raster::{Direction, FlowCode, Raster, NODATA_CODE, SINK_CODE};
use digitalrivers_core::{Error, Result};

/// How a traced flow path ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEnd {
    /// Last cell holds the sink code
    Sink,
    /// Last cell points off the grid
    Outflow,
    /// Last cell points into nodata, or the start cell is nodata
    NoData,
}

/// Cells visited from a start cell down to where flow terminates
#[derive(Debug, Clone, PartialEq)]
pub struct FlowPath {
    pub cells: Vec<(usize, usize)>,
    pub end: PathEnd,
}

/// The cell receiving flow from (row, col).
///
/// `None` for sinks, nodata, and directions leaving the grid or entering
/// nodata.
pub fn downstream_cell(dirs: &Raster<u8>, row: usize, col: usize) -> Result<Option<(usize, usize)>> {
    let code = dirs.get(row, col)?;
    let FlowCode::Flow(dir) = FlowCode::decode_at(code, row, col)? else {
        return Ok(None);
    };
    Ok(dirs
        .neighbor(row, col, dir)
        .filter(|&(r, c)| dirs.data()[(r, c)] != NODATA_CODE))
}

/// [`downstream_cell`] for every cell
pub fn downstream_cells(dirs: &Raster<u8>) -> Result<Array2<Option<(usize, usize)>>> {
    let (rows, cols) = dirs.shape();
    let mut out = Array2::from_elem((rows, cols), None);
    for row in 0..rows {
        for col in 0..cols {
            out[(row, col)] = downstream_cell(dirs, row, col)?;
        }
    }
    Ok(out)
}

/// Donor cells keyed by the cell they drain into.
///
/// Only cells receiving flow appear as keys; donors are listed in
/// row-major order.
pub fn upstream_table(dirs: &Raster<u8>) -> Result<BTreeMap<(usize, usize), Vec<(usize, usize)>>> {
    let mut table: BTreeMap<_, Vec<_>> = BTreeMap::new();
    for (donor, receiver) in downstream_cells(dirs)?.indexed_iter() {
        if let Some(receiver) = receiver {
            table.entry(*receiver).or_default().push(donor);
        }
    }
    Ok(table)
}

/// Follow directions from (row, col) until flow terminates.
///
/// Fails with `CyclicFlowGraph` listing the loop when a cell repeats,
/// which bounds the walk by the number of cells.
pub fn trace_flow_path(dirs: &Raster<u8>, row: usize, col: usize) -> Result<FlowPath> {
    let mut cells = Vec::new();
    let mut seen: HashMap<(usize, usize), usize> = HashMap::new();
    let mut current = (row, col);

    loop {
        let code = dirs.get(current.0, current.1)?;
        let dir = match FlowCode::decode_at(code, current.0, current.1)? {
            FlowCode::NoData => return Ok(FlowPath { cells, end: PathEnd::NoData }),
            FlowCode::Sink => {
                cells.push(current);
                return Ok(FlowPath { cells, end: PathEnd::Sink });
            }
            FlowCode::Flow(dir) => dir,
        };

        if let Some(&first) = seen.get(&current) {
            return Err(Error::CyclicFlowGraph {
                cells: cells[first..].to_vec(),
            });
        }
        seen.insert(current, cells.len());
        cells.push(current);

        match dirs.neighbor(current.0, current.1, dir) {
            None => return Ok(FlowPath { cells, end: PathEnd::Outflow }),
            Some(next) => current = next,
        }
    }
}

/// Convert codes 1-8 to ESRI power-of-two codes (E=1, SE=2, ... NE=128).
/// Sinks stay 0 and nodata stays 255.
pub fn to_esri(dirs: &Raster<u8>) -> Result<Raster<u8>> {
    let mut out = dirs.like(NODATA_CODE).with_nodata(Some(NODATA_CODE));
    for ((row, col), &code) in dirs.data().indexed_iter() {
        out.data_mut()[(row, col)] = match FlowCode::decode_at(code, row, col)? {
            FlowCode::Flow(dir) => dir.esri_code(),
            FlowCode::Sink => SINK_CODE,
            FlowCode::NoData => NODATA_CODE,
        };
    }
    Ok(out)
}

/// Convert an ESRI power-of-two grid to codes 1-8.
///
/// Cells matching the raster's nodata sentinel (and 255) become nodata,
/// 0 becomes a sink; any other value fails with `InvalidDirectionCode`.
pub fn from_esri(esri: &Raster<u8>) -> Result<Raster<u8>> {
    let mut out = esri.like(NODATA_CODE).with_nodata(Some(NODATA_CODE));
    for ((row, col), &value) in esri.data().indexed_iter() {
        out.data_mut()[(row, col)] = if esri.is_nodata(value) || value == NODATA_CODE {
            NODATA_CODE
        } else if value == SINK_CODE {
            SINK_CODE
        } else {
            Direction::from_esri_code(value)
                .map(Direction::code)
                .ok_or(Error::InvalidDirectionCode { row, col, code: value })?
        };
    }
    Ok(out)
}
