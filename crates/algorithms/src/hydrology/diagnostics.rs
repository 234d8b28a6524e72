//! Metadata reported alongside hydrology results
//!
//! Localized defects (closed depressions, cells left without a descent)
//! are collected here instead of aborting the run.

use serde::Serialize;

/// A closed region with no outlet that was left as a designated sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedDepression {
    /// The designated sink cell
    pub sink: (usize, usize),
    /// Number of cells in the region
    pub cells: usize,
    pub elevation: f64,
}

/// Diagnostics of flat resolution and flow direction
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowDiagnostics {
    pub valid_cells: usize,
    /// Every cell was nodata; outputs hold only nodata
    pub all_nodata: bool,
    /// Regions that received a drainage gradient
    pub flats_resolved: usize,
    /// Cells raised by the flat gradient
    pub flat_cells_adjusted: usize,
    /// Regions draining over the raster edge or into nodata
    pub edge_outlets: usize,
    /// Depressions raised by filling
    pub depressions_filled: usize,
    /// Cells raised by filling
    pub cells_raised: usize,
    pub unresolved_depressions: Vec<UnresolvedDepression>,
    /// Regions whose gradient would not fit below the surrounding terrain
    pub unadjusted_flats: usize,
    /// Valid cells without a descent that are not designated sinks
    pub unresolved_cells: Vec<(usize, usize)>,
    pub forced_cells: usize,
    /// Cells on flow loops closed by forced directions
    pub forced_cycles: Vec<(usize, usize)>,
}

impl FlowDiagnostics {
    /// Whether any region or cell was left without a drainage path
    pub fn has_unresolved(&self) -> bool {
        !self.unresolved_depressions.is_empty() || !self.unresolved_cells.is_empty()
    }

    /// Sink cells of unresolved depressions followed by unresolved cells
    pub fn unresolved_sinks(&self) -> Vec<(usize, usize)> {
        self.unresolved_depressions
            .iter()
            .map(|d| d.sink)
            .chain(self.unresolved_cells.iter().copied())
            .collect()
    }
}

/// Diagnostics of flow accumulation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccumulationDiagnostics {
    pub valid_cells: usize,
    pub all_nodata: bool,
    /// Cells holding the sink code
    pub sinks: usize,
    /// Cells draining off the grid or into nodata
    pub outflows: usize,
    pub max_accumulation: f64,
}
