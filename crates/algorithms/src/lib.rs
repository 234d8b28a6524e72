//! # digitalrivers algorithms
//!
//! D8 hydrology over elevation rasters.
//!
//! Pipeline: [`hydrology::resolve_flats`] adjusts flats and designates sinks,
//! [`hydrology::flow_direction`] solves one D8 direction per cell and
//! [`hydrology::flow_accumulation`] counts (or weighs) the cells draining
//! through each cell.

pub mod hydrology;
pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        fill_depressions, flow_accumulation, flow_direction, resolve_flats, AccumulationParams,
        FlowAccumulation, FlowConfig, FlowDirection, ResolveFlats, WeightMode,
    };
    pub use digitalrivers_core::prelude::*;
}
