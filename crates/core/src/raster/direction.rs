//! D8 flow direction encoding
//!
//! Direction codes stored in a direction grid:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! `0` marks a sink (terminal cell) and `255` marks nodata.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Code of a terminal cell that receives flow but does not pass it on
pub const SINK_CODE: u8 = 0;

/// Code of a cell excluded from routing
pub const NODATA_CODE: u8 = 255;

/// One of the eight compass neighbours of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    E = 1,
    NE = 2,
    N = 3,
    NW = 4,
    W = 5,
    SW = 6,
    S = 7,
    SE = 8,
}

impl Direction {
    /// All directions in code order, counter-clockwise from East
    pub const ALL: [Direction; 8] = [
        Direction::E,
        Direction::NE,
        Direction::N,
        Direction::NW,
        Direction::W,
        Direction::SW,
        Direction::S,
        Direction::SE,
    ];

    /// Stored direction code (1-8)
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Zero-based index, convenient for `[_; 8]` tables
    pub fn index(self) -> usize {
        self as usize - 1
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1..=8 => Some(Self::ALL[(code - 1) as usize]),
            _ => None,
        }
    }

    /// (row_offset, col_offset); rows grow southwards
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::E => (0, 1),
            Direction::NE => (-1, 1),
            Direction::N => (-1, 0),
            Direction::NW => (-1, -1),
            Direction::W => (0, -1),
            Direction::SW => (1, -1),
            Direction::S => (1, 0),
            Direction::SE => (1, 1),
        }
    }

    pub fn opposite(self) -> Self {
        Self::ALL[(self.index() + 4) % 8]
    }

    pub fn is_diagonal(self) -> bool {
        let (dr, dc) = self.offset();
        dr != 0 && dc != 0
    }

    /// ESRI / ArcGIS power-of-two code (1 = E, clockwise to 128 = NE)
    pub fn esri_code(self) -> u8 {
        match self {
            Direction::E => 1,
            Direction::SE => 2,
            Direction::S => 4,
            Direction::SW => 8,
            Direction::W => 16,
            Direction::NW => 32,
            Direction::N => 64,
            Direction::NE => 128,
        }
    }

    pub fn from_esri_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.esri_code() == code)
    }
}

/// Decoded content of a direction grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowCode {
    Flow(Direction),
    Sink,
    NoData,
}

impl FlowCode {
    pub fn code(self) -> u8 {
        match self {
            FlowCode::Flow(dir) => dir.code(),
            FlowCode::Sink => SINK_CODE,
            FlowCode::NoData => NODATA_CODE,
        }
    }

    /// Decode a stored code; `None` for values outside the encoding
    pub fn decode(code: u8) -> Option<Self> {
        match code {
            SINK_CODE => Some(FlowCode::Sink),
            NODATA_CODE => Some(FlowCode::NoData),
            other => Direction::from_code(other).map(FlowCode::Flow),
        }
    }

    /// Decode the code stored at (row, col), reporting the location on failure
    pub fn decode_at(code: u8, row: usize, col: usize) -> Result<Self> {
        Self::decode(code).ok_or(Error::InvalidDirectionCode { row, col, code })
    }
}

/// Fixed priority list used to break ties between equally steep neighbours.
///
/// Earlier entries win. Any permutation of the eight directions is accepted;
/// the default is code order (E, NE, N, NW, W, SW, S, SE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Direction>", into = "Vec<Direction>")]
pub struct TieBreakOrder([Direction; 8]);

impl TieBreakOrder {
    pub fn new(order: [Direction; 8]) -> Result<Self> {
        let mut seen = [false; 8];
        for dir in order {
            if std::mem::replace(&mut seen[dir.index()], true) {
                return Err(Error::InvalidParameter {
                    name: "tie_break_order",
                    value: format!("{:?}", order),
                    reason: format!("direction {:?} listed twice", dir),
                });
            }
        }
        Ok(Self(order))
    }

    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Direction] {
        &self.0
    }
}

impl Default for TieBreakOrder {
    fn default() -> Self {
        Self(Direction::ALL)
    }
}

impl TryFrom<Vec<Direction>> for TieBreakOrder {
    type Error = Error;

    fn try_from(order: Vec<Direction>) -> Result<Self> {
        let array: [Direction; 8] =
            order
                .clone()
                .try_into()
                .map_err(|_| Error::InvalidParameter {
                    name: "tie_break_order",
                    value: format!("{:?}", order),
                    reason: "exactly 8 directions required".to_string(),
                })?;
        Self::new(array)
    }
}

impl From<TieBreakOrder> for Vec<Direction> {
    fn from(order: TieBreakOrder) -> Self {
        order.0.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite() {
        assert_eq!(Direction::E.opposite(), Direction::W);
        assert_eq!(Direction::N.opposite(), Direction::S);
        assert_eq!(Direction::NE.opposite(), Direction::SW);
        for dir in Direction::ALL {
            let (dr, dc) = dir.offset();
            assert_eq!(dir.opposite().offset(), (-dr, -dc));
        }
    }

    #[test]
    fn test_code_roundtrip() {
        for dir in Direction::ALL {
            assert_eq!(Direction::from_code(dir.code()), Some(dir));
            assert_eq!(Direction::from_esri_code(dir.esri_code()), Some(dir));
        }
        assert_eq!(Direction::from_code(0), None);
        assert_eq!(Direction::from_code(9), None);
        assert_eq!(Direction::from_esri_code(3), None);
    }

    #[test]
    fn test_flow_code_decode() {
        assert_eq!(FlowCode::decode(0), Some(FlowCode::Sink));
        assert_eq!(FlowCode::decode(255), Some(FlowCode::NoData));
        assert_eq!(FlowCode::decode(7), Some(FlowCode::Flow(Direction::S)));
        assert!(matches!(
            FlowCode::decode_at(42, 1, 2),
            Err(Error::InvalidDirectionCode { row: 1, col: 2, code: 42 })
        ));
    }

    #[test]
    fn test_diagonals() {
        let diagonals: Vec<_> = Direction::ALL.into_iter().filter(|d| d.is_diagonal()).collect();
        assert_eq!(
            diagonals,
            vec![Direction::NE, Direction::NW, Direction::SW, Direction::SE]
        );
    }

    #[test]
    fn test_tie_break_order_rejects_duplicates() {
        let mut order = Direction::ALL;
        order[7] = Direction::E;
        assert!(TieBreakOrder::new(order).is_err());
        assert!(TieBreakOrder::try_from(vec![Direction::E]).is_err());

        let reversed: Vec<_> = Direction::ALL.into_iter().rev().collect();
        let order = TieBreakOrder::try_from(reversed).unwrap();
        assert_eq!(order.iter().next(), Some(Direction::SE));
    }
}
