//! Flat and depression resolution
//!
//! Prepares an elevation grid for D8 routing so that every valid cell either
//! has a strictly lower neighbour or is a designated sink.
//!
//! Cells without a lower neighbour seed a region: the maximal 8-connected set
//! of valid cells sharing their elevation. Each region drains towards one of
//! three kinds of source:
//!
//! - region cells with a lower neighbour (a drainable flat)
//! - otherwise, region cells on the raster edge or next to nodata, which
//!   become designated sinks (an edge outlet)
//! - otherwise, the first region cell in row-major order, which becomes the
//!   single designated sink of a closed depression
//!
//! A breadth-first search from the sources gives every region cell its step
//! distance `d`, and the cell is raised by `d` representable `f64` values
//! above the flat. Every non-source cell therefore has a strictly lower
//! neighbour one step closer to a source, and the raise never reaches the
//! next higher terrain around the region.

use std::collections::VecDeque;

use ndarray::Array2;
use digitalrivers_core::raster::{Raster, TieBreakOrder};
use digitalrivers_core::{Algorithm, Error, Result};
use tracing::{debug, warn};

use super::config::FlowConfig;
use super::diagnostics::{FlowDiagnostics, UnresolvedDepression};
use super::priority_flood::fill_depressions;

const SIGN_BIT: u64 = 1 << 63;
const UNREACHED: u32 = u32::MAX;

/// Integer key with the same order as the `f64` it encodes.
///
/// Adjacent representable values have adjacent keys; `-0.0` and `0.0`
/// share key 0.
fn ordered_key(z: f64) -> i64 {
    let bits = z.to_bits();
    if bits & SIGN_BIT == 0 {
        bits as i64
    } else {
        -((bits & !SIGN_BIT) as i64)
    }
}

fn from_ordered_key(key: i64) -> f64 {
    if key >= 0 {
        f64::from_bits(key as u64)
    } else {
        f64::from_bits(key.unsigned_abs() | SIGN_BIT)
    }
}

/// `z` raised by `steps` representable values
fn step_up(z: f64, steps: u32) -> f64 {
    from_ordered_key(ordered_key(z) + i64::from(steps))
}

/// Adjusted elevations plus the designated sinks that go with them
#[derive(Debug, Clone)]
pub struct FlatResolution {
    pub elevation: Raster<f64>,
    /// Cells that terminate flow: edge outlets of flat regions and the
    /// sink of each closed depression
    pub sinks: Array2<bool>,
    pub diagnostics: FlowDiagnostics,
}

/// Flat and depression resolution algorithm
#[derive(Debug, Clone, Default)]
pub struct ResolveFlats;

impl Algorithm for ResolveFlats {
    type Input = Raster<f64>;
    type Output = FlatResolution;
    type Params = FlowConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Resolve Flats"
    }

    fn description(&self) -> &'static str {
        "Impose a drainage gradient on flats and designate sinks for depressions"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        resolve_flats(&input, &params)
    }
}

/// Resolve flats on a copy of `dem`; the input is left untouched.
///
/// When `config.fill_depressions` is set, closed depressions are first
/// raised to their pour point with [`fill_depressions`]. Remaining closed
/// depressions are reported in the diagnostics, or fail with
/// `UnresolvedFlat` when `config.strict` is set.
///
/// Running the resolver on its own output changes nothing.
pub fn resolve_flats(dem: &Raster<f64>, config: &FlowConfig) -> Result<FlatResolution> {
    let resolution = resolve_flats_deferred(dem, config)?;
    check_depressions(&resolution.diagnostics, config.strict)?;
    Ok(resolution)
}

/// Same as [`resolve_flats`] but adjusts `dem` itself
pub fn resolve_flats_in_place(dem: &mut Raster<f64>, config: &FlowConfig) -> Result<FlatResolution> {
    let (sinks, diagnostics) = resolve(dem, config)?;
    check_depressions(&diagnostics, config.strict)?;
    Ok(FlatResolution {
        elevation: dem.clone(),
        sinks,
        diagnostics,
    })
}

/// [`resolve_flats`] without the strict-mode check.
///
/// The flow direction pipeline checks strictness only once forced
/// directions have had a chance to drain a depression.
pub(crate) fn resolve_flats_deferred(dem: &Raster<f64>, config: &FlowConfig) -> Result<FlatResolution> {
    let mut elevation = dem.clone();
    let (sinks, diagnostics) = resolve(&mut elevation, config)?;
    Ok(FlatResolution {
        elevation,
        sinks,
        diagnostics,
    })
}

/// Fail with `UnresolvedFlat` in strict mode, otherwise log what is left
pub(crate) fn check_depressions(diagnostics: &FlowDiagnostics, strict: bool) -> Result<()> {
    if !diagnostics.has_unresolved() {
        return Ok(());
    }
    if strict {
        return Err(Error::UnresolvedFlat {
            sinks: diagnostics.unresolved_sinks(),
        });
    }
    if !diagnostics.unresolved_depressions.is_empty() {
        warn!(
            count = diagnostics.unresolved_depressions.len(),
            first = ?diagnostics.unresolved_depressions[0].sink,
            "closed depressions left as sinks"
        );
    }
    Ok(())
}

/// Whether any valid neighbour is strictly lower
pub(crate) fn has_descent(dem: &Raster<f64>, row: usize, col: usize) -> bool {
    let Ok(center) = dem.get(row, col) else {
        return false;
    };
    dem.neighbors(row, col)
        .any(|n| n.value.is_some_and(|v| v < center))
}

enum Outlet {
    Descent,
    Edge,
    Closed,
}

struct Region {
    id: u32,
    elevation: f64,
    cells: Vec<(usize, usize)>,
}

fn resolve(dem: &mut Raster<f64>, config: &FlowConfig) -> Result<(Array2<bool>, FlowDiagnostics)> {
    config.validate()?;

    let shape = dem.shape();
    let mut sinks = Array2::from_elem(shape, false);
    let mut diagnostics = FlowDiagnostics {
        valid_cells: dem.valid_count(),
        ..Default::default()
    };

    if diagnostics.valid_cells == 0 {
        debug!("elevation grid holds no valid cells");
        diagnostics.all_nodata = true;
        return Ok((sinks, diagnostics));
    }

    if config.fill_depressions {
        let filled = fill_depressions(dem, config.fill_increment)?;
        diagnostics.cells_raised = filled.cells_raised;
        diagnostics.depressions_filled = filled.depressions_filled;
        *dem.data_mut() = filled.elevation.into_array();
    }

    let mut region_of = Array2::<u32>::zeros(shape);
    let mut distance = Array2::<u32>::from_elem(shape, UNREACHED);
    let mut next_id = 0u32;

    for row in 0..shape.0 {
        for col in 0..shape.1 {
            if region_of[(row, col)] != 0 || !dem.is_valid(row, col) || has_descent(dem, row, col) {
                continue;
            }
            next_id += 1;
            let region = collect_region(dem, row, col, next_id, &mut region_of);
            drain_region(
                dem,
                &region,
                &region_of,
                &mut distance,
                &mut sinks,
                &config.tie_break_order,
                &mut diagnostics,
            );
        }
    }

    debug!(
        regions = next_id,
        flats_resolved = diagnostics.flats_resolved,
        cells_adjusted = diagnostics.flat_cells_adjusted,
        edge_outlets = diagnostics.edge_outlets,
        depressions = diagnostics.unresolved_depressions.len(),
        "resolved flats"
    );

    Ok((sinks, diagnostics))
}

/// Flood the equal-elevation region containing (row, col)
fn collect_region(
    dem: &Raster<f64>,
    row: usize,
    col: usize,
    id: u32,
    region_of: &mut Array2<u32>,
) -> Region {
    let elevation = dem.data()[(row, col)];
    let mut cells = vec![(row, col)];
    let mut queue = VecDeque::from([(row, col)]);
    region_of[(row, col)] = id;

    while let Some((r, c)) = queue.pop_front() {
        for n in dem.neighbors(r, c) {
            if n.value == Some(elevation) && region_of[(n.row, n.col)] == 0 {
                region_of[(n.row, n.col)] = id;
                cells.push((n.row, n.col));
                queue.push_back((n.row, n.col));
            }
        }
    }

    Region { id, elevation, cells }
}

fn drain_region(
    dem: &mut Raster<f64>,
    region: &Region,
    region_of: &Array2<u32>,
    distance: &mut Array2<u32>,
    sinks: &mut Array2<bool>,
    order: &TieBreakOrder,
    diagnostics: &mut FlowDiagnostics,
) {
    let (outlet, sources) = find_sources(dem, region);
    match outlet {
        Outlet::Descent => {}
        Outlet::Edge => {
            diagnostics.edge_outlets += 1;
        }
        Outlet::Closed => {
            diagnostics.unresolved_depressions.push(UnresolvedDepression {
                sink: sources[0],
                cells: region.cells.len(),
                elevation: region.elevation,
            });
        }
    }
    if !matches!(outlet, Outlet::Descent) {
        for &cell in &sources {
            sinks[cell] = true;
        }
    }

    // Multi-source BFS; distances do not depend on visiting order
    let mut queue: VecDeque<_> = sources.iter().copied().collect();
    for &cell in &sources {
        distance[cell] = 0;
    }
    let mut max_distance = 0;
    while let Some((r, c)) = queue.pop_front() {
        let next = distance[(r, c)] + 1;
        for dir in order.iter() {
            let Some(cell) = dem.neighbor(r, c, dir) else {
                continue;
            };
            if region_of[cell] == region.id && distance[cell] == UNREACHED {
                distance[cell] = next;
                max_distance = max_distance.max(next);
                queue.push_back(cell);
            }
        }
    }

    if max_distance == 0 {
        return;
    }

    let ceiling = region
        .cells
        .iter()
        .flat_map(|&(r, c)| dem.neighbors(r, c))
        .filter_map(|n| n.value)
        .filter(|&v| v > region.elevation)
        .fold(f64::INFINITY, f64::min);

    let headroom = i128::from(ordered_key(ceiling)) - i128::from(ordered_key(region.elevation));
    if headroom <= i128::from(max_distance) {
        warn!(
            cell = ?region.cells[0],
            elevation = region.elevation,
            max_distance,
            "no representable headroom for flat gradient, region left unadjusted"
        );
        diagnostics.unadjusted_flats += 1;
        return;
    }

    let data = dem.data_mut();
    for &cell in &region.cells {
        let steps = distance[cell];
        if steps > 0 {
            data[cell] = step_up(region.elevation, steps);
            diagnostics.flat_cells_adjusted += 1;
        }
    }
    diagnostics.flats_resolved += 1;
}

fn find_sources(dem: &Raster<f64>, region: &Region) -> (Outlet, Vec<(usize, usize)>) {
    let descending: Vec<_> = region
        .cells
        .iter()
        .copied()
        .filter(|&(r, c)| has_descent(dem, r, c))
        .collect();
    if !descending.is_empty() {
        return (Outlet::Descent, descending);
    }

    let edge: Vec<_> = region
        .cells
        .iter()
        .copied()
        .filter(|&(r, c)| dem.is_on_boundary(r, c) || dem.touches_nodata(r, c))
        .collect();
    if !edge.is_empty() {
        return (Outlet::Edge, edge);
    }

    // Closed: first cell in row-major order
    let sink = region.cells.iter().copied().min().unwrap_or(region.cells[0]);
    (Outlet::Closed, vec![sink])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn next_up(z: f64) -> f64 {
        step_up(z, 1)
    }

    /// 5x5 rim at `rim` around a 3x3 interior at `inner`
    fn rimmed(rim: f64, inner: f64) -> Raster<f64> {
        let mut dem = Raster::filled(5, 5, inner);
        for row in 0..5 {
            for col in 0..5 {
                if dem.is_on_boundary(row, col) {
                    dem.set(row, col, rim).unwrap();
                }
            }
        }
        dem
    }

    #[test]
    fn test_ordered_key_is_monotonic() {
        let values = [
            f64::NEG_INFINITY,
            -1.0,
            -f64::MIN_POSITIVE,
            -5e-324,
            0.0,
            5e-324,
            1.0,
            f64::MAX,
            f64::INFINITY,
        ];
        for pair in values.windows(2) {
            assert!(
                ordered_key(pair[0]) < ordered_key(pair[1]),
                "key order broken between {} and {}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(ordered_key(-0.0), ordered_key(0.0));
        for v in values {
            assert_eq!(from_ordered_key(ordered_key(v)), v);
        }
    }

    #[test]
    fn test_step_up_crosses_zero() {
        assert_eq!(step_up(-5e-324, 1), 0.0);
        assert_eq!(step_up(-0.0, 1), 5e-324);
        assert_eq!(next_up(1.0), f64::from_bits(1.0_f64.to_bits() + 1));
        assert!(step_up(1.0, 3) > step_up(1.0, 2));
    }

    #[test]
    fn test_drainable_flat_gets_gradient() {
        let mut dem = rimmed(9.0, 5.0);
        dem.set(2, 4, 1.0).unwrap(); // outlet in the right edge

        let res = resolve_flats(&dem, &FlowConfig::default()).unwrap();
        let z = &res.elevation;

        // Column 3 touches the outlet and keeps its elevation
        for row in 1..4 {
            assert_eq!(z.get(row, 3).unwrap(), 5.0);
            assert_eq!(z.get(row, 2).unwrap(), next_up(5.0));
            assert_eq!(z.get(row, 1).unwrap(), step_up(5.0, 2));
        }
        for row in 1..4 {
            for col in 1..4 {
                assert!(has_descent(z, row, col), "({row}, {col}) has no descent");
            }
        }
        assert_eq!(res.diagnostics.flats_resolved, 1);
        assert_eq!(res.diagnostics.flat_cells_adjusted, 6);
        // The outlet itself is a one-cell edge region
        assert_eq!(res.diagnostics.edge_outlets, 1);
        assert!(res.sinks[(2, 4)]);
        assert!(!res.diagnostics.has_unresolved());
    }

    #[test]
    fn test_edge_outlet_flat() {
        let dem = Raster::filled(3, 3, 5.0);
        let res = resolve_flats(&dem, &FlowConfig::default()).unwrap();

        assert_eq!(res.elevation.get(1, 1).unwrap(), next_up(5.0));
        assert_eq!(res.sinks.iter().filter(|&&s| s).count(), 8);
        assert!(!res.sinks[(1, 1)]);
        assert_eq!(res.diagnostics.edge_outlets, 1);
        assert!(!res.diagnostics.has_unresolved());
    }

    #[test]
    fn test_nodata_neighbour_is_an_outlet() {
        let mut dem = rimmed(9.0, 5.0).with_nodata(Some(-9999.0));
        dem.set(2, 2, -9999.0).unwrap();

        let res = resolve_flats(&dem, &FlowConfig::default()).unwrap();
        // All eight interior cells touch the hole
        assert_eq!(res.diagnostics.edge_outlets, 1);
        assert!(res.sinks[(1, 1)] && res.sinks[(3, 3)]);
        assert_eq!(res.elevation.data(), dem.data());
    }

    #[test]
    fn test_single_pit_is_unresolved_depression() {
        let mut dem = Raster::filled(3, 3, 5.0);
        dem.set(1, 1, 1.0).unwrap();

        let res = resolve_flats(&dem, &FlowConfig::default()).unwrap();
        assert_eq!(
            res.diagnostics.unresolved_depressions,
            vec![UnresolvedDepression { sink: (1, 1), cells: 1, elevation: 1.0 }]
        );
        assert!(res.sinks[(1, 1)]);
        assert_eq!(res.elevation.data(), dem.data());
    }

    #[test]
    fn test_closed_flat_depression_drains_to_one_sink() {
        let dem = rimmed(9.0, 2.0);
        let res = resolve_flats(&dem, &FlowConfig::default()).unwrap();

        let depression = &res.diagnostics.unresolved_depressions[0];
        assert_eq!(depression.sink, (1, 1));
        assert_eq!(depression.cells, 9);
        assert_eq!(res.elevation.get(1, 1).unwrap(), 2.0);
        assert_eq!(res.elevation.get(3, 3).unwrap(), step_up(2.0, 2));
        assert_eq!(res.sinks.iter().filter(|&&s| s).count(), 1);
    }

    #[test]
    fn test_strict_mode_fails_on_depression() {
        let dem = rimmed(9.0, 2.0);
        let config = FlowConfig {
            strict: true,
            ..Default::default()
        };
        match resolve_flats(&dem, &config) {
            Err(Error::UnresolvedFlat { sinks }) => assert_eq!(sinks, vec![(1, 1)]),
            other => panic!("expected UnresolvedFlat, got {other:?}"),
        }
    }

    #[test]
    fn test_fill_removes_depression() {
        let mut dem = Raster::filled(3, 3, 5.0);
        dem.set(1, 1, 1.0).unwrap();
        let config = FlowConfig {
            fill_depressions: true,
            ..Default::default()
        };

        let res = resolve_flats(&dem, &config).unwrap();
        assert_eq!(res.diagnostics.depressions_filled, 1);
        assert_eq!(res.diagnostics.cells_raised, 1);
        assert!(res.diagnostics.unresolved_depressions.is_empty());
        // Filled to the rim, then graded towards the edge
        assert_eq!(res.elevation.get(1, 1).unwrap(), next_up(5.0));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut dem = rimmed(9.0, 2.0);
        dem.set(0, 2, 2.0).unwrap();
        let once = resolve_flats(&dem, &FlowConfig::default()).unwrap();
        let twice = resolve_flats(&once.elevation, &FlowConfig::default()).unwrap();

        let bits = |r: &Raster<f64>| r.data().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&once.elevation), bits(&twice.elevation));
        assert_eq!(once.sinks, twice.sinks);
    }

    #[test]
    fn test_in_place_matches_copy() {
        let dem = rimmed(9.0, 2.0);
        let copy = resolve_flats(&dem, &FlowConfig::default()).unwrap();

        let mut grid = dem.clone();
        let in_place = resolve_flats_in_place(&mut grid, &FlowConfig::default()).unwrap();
        assert_eq!(grid.data(), copy.elevation.data());
        assert_eq!(in_place.elevation.data(), copy.elevation.data());
        assert_eq!(in_place.diagnostics, copy.diagnostics);
        assert_ne!(dem.data(), grid.data());
    }

    #[test]
    fn test_no_headroom_leaves_region_unadjusted() {
        // The ridge is one representable step above the flat
        let dem = Raster::from_vec(vec![next_up(1.0), 1.0, 1.0, 0.0], 1, 4).unwrap();
        let res = resolve_flats(&dem, &FlowConfig::default()).unwrap();

        assert_eq!(res.diagnostics.unadjusted_flats, 1);
        assert_eq!(res.elevation.data(), dem.data());
    }

    #[test]
    fn test_all_nodata() {
        let dem = Raster::filled(2, 2, -9999.0).with_nodata(Some(-9999.0));
        let res = resolve_flats(&dem, &FlowConfig::default()).unwrap();
        assert!(res.diagnostics.all_nodata);
        assert_eq!(res.diagnostics.valid_cells, 0);
    }

    #[test]
    fn test_algorithm_trait() {
        let dem = Raster::filled(3, 3, 5.0);
        let res = ResolveFlats.execute_default(dem).unwrap();
        assert_eq!(res.diagnostics.edge_outlets, 1);
    }
}
