//! Hydrological analysis algorithms
//!
//! D8 routing from Digital Elevation Models:
//! - Fill depressions: Priority-Flood raising of closed depressions
//! - Resolve flats: drainage gradient over flats, designated sinks for depressions
//! - Flow direction: D8 single flow direction
//! - Flow accumulation: upstream contributing cells or weighted area
//! - Topology: receivers, donors, flow paths, ESRI code conversion

mod config;
mod diagnostics;
mod flats;
mod flow_accumulation;
mod flow_direction;
mod priority_flood;
mod topology;

pub use config::{AccumulationParams, FlowConfig, ForcedDirection, WeightMode};
pub use diagnostics::{AccumulationDiagnostics, FlowDiagnostics, UnresolvedDepression};
pub use flats::{resolve_flats, resolve_flats_in_place, FlatResolution, ResolveFlats};
pub use flow_accumulation::{flow_accumulation, AccumulationResult, FlowAccumulation};
pub use flow_direction::{
    d8_directions, flow_direction, max_slope, neighbor_slopes, D8Output, FlowDirection,
    FlowDirectionResult,
};
pub use priority_flood::{fill_depressions, FillDepressions, FillParams, FillResult};
pub use topology::{
    downstream_cell, downstream_cells, from_esri, to_esri, trace_flow_path, upstream_table,
    FlowPath, PathEnd,
};
