//! Raster grids, cell spacing and D8 neighbourhoods

mod cell_size;
mod direction;
mod element;
mod grid;
mod neighborhood;

pub use cell_size::CellSize;
pub use direction::{Direction, FlowCode, TieBreakOrder, NODATA_CODE, SINK_CODE};
pub use element::RasterElement;
pub use grid::{Raster, RasterStatistics};
pub use neighborhood::{Neighbor, Neighbors};

/// Elevation raster (one `f64` per cell)
pub type ElevationGrid = Raster<f64>;

/// D8 direction codes, see [`Direction`], [`SINK_CODE`] and [`NODATA_CODE`]
pub type DirectionGrid = Raster<u8>;

/// Upstream contributing cell count or weighted area; NaN marks nodata
pub type AccumulationGrid = Raster<f64>;
