//! Error types for digitalrivers

use thiserror::Error;

/// Main error type for digitalrivers operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid grid shape: expected ({}, {}), got ({}, {})", .expected.0, .expected.1, .actual.0, .actual.1)]
    InvalidGridShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Index out of bounds: ({row}, {col}) in grid of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Invalid flow direction code {code} at ({row}, {col})")]
    InvalidDirectionCode { row: usize, col: usize, code: u8 },

    /// Raised only in strict mode; otherwise unresolved flats are diagnostics.
    #[error("{} unresolved flat or depression region(s), first sink at {:?}", .sinks.len(), .sinks.first())]
    UnresolvedFlat { sinks: Vec<(usize, usize)> },

    #[error("Cyclic flow graph: {} cell(s) never drained, first at {:?}", .cells.len(), .cells.first())]
    CyclicFlowGraph { cells: Vec<(usize, usize)> },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for digitalrivers operations
pub type Result<T> = std::result::Result<T, Error>;
