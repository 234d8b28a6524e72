//! Parameters shared by the hydrology pipeline

use digitalrivers_core::raster::{FlowCode, Raster, TieBreakOrder};
use digitalrivers_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// A direction imposed on one cell after solving.
///
/// Used for outfalls: a boundary cell may be forced to drain off the grid
/// even when the solver would have chosen an in-grid neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForcedDirection {
    pub row: usize,
    pub col: usize,
    pub code: FlowCode,
}

/// Parameters for flat resolution and D8 flow direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Priority used when two neighbours are equally steep
    pub tie_break_order: TieBreakOrder,
    /// Raise closed depressions to their pour point before resolving flats
    pub fill_depressions: bool,
    /// Elevation added per filled cell above the spill level.
    /// Only used when `fill_depressions` is set. 0.0 leaves filled areas
    /// flat for the flat resolver to grade.
    pub fill_increment: f64,
    /// Fail with `UnresolvedFlat` instead of reporting unresolved regions
    pub strict: bool,
    /// Directions overriding the solver, applied last
    pub forced: Vec<ForcedDirection>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            tie_break_order: TieBreakOrder::default(),
            fill_depressions: false,
            fill_increment: 0.0,
            strict: false,
            forced: Vec::new(),
        }
    }
}

impl FlowConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.fill_increment.is_finite() || self.fill_increment < 0.0 {
            return Err(Error::InvalidParameter {
                name: "fill_increment",
                value: self.fill_increment.to_string(),
                reason: "must be finite and non-negative".to_string(),
            });
        }
        if let Some(forced) = self.forced.iter().find(|f| f.code == FlowCode::NoData) {
            return Err(Error::InvalidParameter {
                name: "forced",
                value: format!("({}, {})", forced.row, forced.col),
                reason: "a forced direction cannot be nodata".to_string(),
            });
        }
        Ok(())
    }
}

/// How each cell contributes to accumulation
#[derive(Debug, Clone, Default)]
pub enum WeightMode {
    /// Every valid cell contributes 1
    #[default]
    Uniform,
    /// Per-cell contribution (cell area, rainfall, ...); same shape as the directions
    Custom(Raster<f64>),
}

impl WeightMode {
    pub fn as_raster(&self) -> Option<&Raster<f64>> {
        match self {
            WeightMode::Uniform => None,
            WeightMode::Custom(weights) => Some(weights),
        }
    }
}

/// Parameters for flow accumulation
#[derive(Debug, Clone, Default)]
pub struct AccumulationParams {
    pub weights: WeightMode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use digitalrivers_core::Direction;

    #[test]
    fn test_defaults() {
        let config = FlowConfig::default();
        assert!(!config.fill_depressions);
        assert_eq!(config.fill_increment, 0.0);
        assert!(!config.strict);
        assert_eq!(config.tie_break_order.iter().next(), Some(Direction::E));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_increment() {
        for bad in [-0.1, f64::NAN, f64::INFINITY] {
            let config = FlowConfig {
                fill_increment: bad,
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(Error::InvalidParameter { name: "fill_increment", .. })),
                "increment {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_forced_nodata() {
        let config = FlowConfig {
            forced: vec![ForcedDirection { row: 0, col: 0, code: FlowCode::NoData }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_partial_config() {
        let config: FlowConfig = serde_json::from_str(
            r#"{"fill_depressions": true, "tie_break_order": ["S","SE","E","NE","N","NW","W","SW"]}"#,
        )
        .unwrap();
        assert!(config.fill_depressions);
        assert_eq!(config.tie_break_order.iter().next(), Some(Direction::S));
        assert_eq!(config.fill_increment, 0.0);

        let dup = serde_json::from_str::<FlowConfig>(
            r#"{"tie_break_order": ["S","S","E","NE","N","NW","W","SW"]}"#,
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_json_forced_outfall() {
        let config: FlowConfig =
            serde_json::from_str(r#"{"forced": [{"row": 2, "col": 0, "code": {"Flow": "W"}}]}"#)
                .unwrap();
        assert_eq!(
            config.forced,
            vec![ForcedDirection { row: 2, col: 0, code: FlowCode::Flow(Direction::W) }]
        );
    }
}
