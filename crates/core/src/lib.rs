//! # digitalrivers core
//!
//! Core types, traits and raster I/O for the digitalrivers D8 hydrology library.
//!
//! This crate provides:
//! - `Raster<T>`: generic grid with cell size, nodata sentinel and 8-connected neighbour queries
//! - `Direction` / `FlowCode` / `TieBreakOrder`: the D8 direction encoding
//! - `Algorithm`: the trait every hydrology step implements
//! - A thin GeoTIFF adapter for reading elevations and writing derived grids

pub mod error;
pub mod io;
pub mod raster;

pub use error::{Error, Result};
pub use raster::{
    AccumulationGrid, CellSize, Direction, DirectionGrid, ElevationGrid, FlowCode, Raster,
    RasterElement, TieBreakOrder, NODATA_CODE, SINK_CODE,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{
        AccumulationGrid, CellSize, Direction, DirectionGrid, ElevationGrid, FlowCode, Raster,
        RasterElement, TieBreakOrder, NODATA_CODE, SINK_CODE,
    };
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in digitalrivers.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
