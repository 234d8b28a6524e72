//! digitalrivers CLI - D8 flow routing over elevation rasters

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use digitalrivers_algorithms::hydrology::{
    fill_depressions, flow_accumulation, flow_direction, from_esri, max_slope, resolve_flats,
    to_esri, trace_flow_path, FlowConfig, ForcedDirection, PathEnd,
};
use digitalrivers_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use digitalrivers_core::{Direction, FlowCode, Raster, RasterElement};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "digitalrivers")]
#[command(author, version, about = "D8 flow routing over elevation rasters", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Raise closed depressions to their pour point
    Fill {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Elevation added per filled cell above the spill level
        #[arg(short, long, default_value = "0.0")]
        increment: f64,
    },
    /// Impose a drainage gradient over flats
    ResolveFlats {
        /// Input DEM file
        input: PathBuf,
        /// Output (adjusted DEM) file
        output: PathBuf,
        #[command(flatten)]
        flow: FlowArgs,
    },
    /// Compute D8 flow directions (codes 1-8, 0 = sink, 255 = nodata)
    FlowDirection {
        /// Input DEM file
        input: PathBuf,
        /// Output direction raster
        output: PathBuf,
        #[command(flatten)]
        flow: FlowArgs,
        /// Write ESRI power-of-two codes instead of 1-8
        #[arg(long)]
        esri: bool,
    },
    /// Accumulate cells (or weights) draining through each cell
    FlowAccumulation {
        /// Input direction raster
        input: PathBuf,
        /// Output accumulation raster
        output: PathBuf,
        /// Per-cell weight raster with the same shape as the directions
        #[arg(short, long)]
        weights: Option<PathBuf>,
        /// Input holds ESRI power-of-two codes
        #[arg(long)]
        esri: bool,
        /// Write diagnostics as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Steepest downslope gradient of each cell
    Slope {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Follow the flow path downstream of a cell
    Trace {
        /// Input direction raster
        input: PathBuf,
        /// Start cell as 'row,col'
        #[arg(short, long)]
        start: String,
        /// Input holds ESRI power-of-two codes
        #[arg(long)]
        esri: bool,
    },
}

/// Options shared by flat resolution and flow direction
#[derive(clap::Args)]
struct FlowArgs {
    /// JSON file with a flow configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Fill closed depressions before resolving flats
    #[arg(long)]
    fill: bool,
    /// Elevation added per filled cell (implies --fill)
    #[arg(long)]
    fill_increment: Option<f64>,
    /// Fail when a depression or cell is left without a drainage path
    #[arg(long)]
    strict: bool,
    /// Force a cell's direction as 'row,col,dir' (dir: E, NE, ..., SE or sink)
    #[arg(long)]
    outfall: Vec<String>,
    /// Write diagnostics as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

impl FlowArgs {
    fn to_config(&self) -> Result<FlowConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&text).context("Invalid flow configuration")?
            }
            None => FlowConfig::default(),
        };
        if self.fill {
            config.fill_depressions = true;
        }
        if let Some(increment) = self.fill_increment {
            config.fill_depressions = true;
            config.fill_increment = increment;
        }
        if self.strict {
            config.strict = true;
        }
        for outfall in &self.outfall {
            config.forced.push(parse_outfall(outfall)?);
        }
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid flow configuration: {}", e))?;
        Ok(config)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster<T: RasterElement>(path: &Path) -> Result<Raster<T>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<T> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn read_directions(path: &Path, esri: bool) -> Result<Raster<u8>> {
    let raw = read_raster::<u8>(path)?;
    if esri {
        from_esri(&raw).context("Failed to decode ESRI direction codes")
    } else {
        Ok(raw)
    }
}

fn write_result<T: RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn write_report<S: Serialize>(report: &S, path: Option<&PathBuf>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    println!("  Report: {}", path.display());
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_cell(s: &str) -> Result<(usize, usize)> {
    let parts: Vec<&str> = s.trim().split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("Cell must be 'row,col', got: {}", s);
    }
    let row: usize = parts[0].trim().parse().context("Invalid row")?;
    let col: usize = parts[1].trim().parse().context("Invalid col")?;
    Ok((row, col))
}

fn parse_flow_code(s: &str) -> Result<FlowCode> {
    let dir = match s.trim().to_uppercase().as_str() {
        "SINK" | "0" => return Ok(FlowCode::Sink),
        "E" | "1" => Direction::E,
        "NE" | "2" => Direction::NE,
        "N" | "3" => Direction::N,
        "NW" | "4" => Direction::NW,
        "W" | "5" => Direction::W,
        "SW" | "6" => Direction::SW,
        "S" | "7" => Direction::S,
        "SE" | "8" => Direction::SE,
        _ => anyhow::bail!("Unknown direction: {}. Use E, NE, N, NW, W, SW, S, SE or sink.", s),
    };
    Ok(FlowCode::Flow(dir))
}

fn parse_outfall(s: &str) -> Result<ForcedDirection> {
    let (cell, dir) = s
        .rsplit_once(',')
        .with_context(|| format!("Outfall must be 'row,col,dir', got: {}", s))?;
    let (row, col) = parse_cell(cell)?;
    Ok(ForcedDirection {
        row,
        col,
        code: parse_flow_code(dir)?,
    })
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => {
            let raster = read_raster::<f64>(&input)?;
            let (rows, cols) = raster.shape();
            let cell_size = raster.cell_size();
            let (x, y) = raster.origin();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {} x {}", cell_size.dx, cell_size.dy);
            println!("Origin: ({:.6}, {:.6})", x, y);
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            if !raster.is_empty() {
                println!(
                    "  Valid cells: {} ({:.1}%)",
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / raster.len() as f64
                );
            }
        }

        Commands::Fill {
            input,
            output,
            increment,
        } => {
            let dem = read_raster::<f64>(&input)?;
            let start = Instant::now();
            let result = fill_depressions(&dem, increment).context("Failed to fill depressions")?;
            let elapsed = start.elapsed();
            info!(
                "{} depressions filled, {} cells raised",
                result.depressions_filled, result.cells_raised
            );
            write_result(&result.elevation, &output)?;
            done("Filled DEM", &output, elapsed);
        }

        Commands::ResolveFlats {
            input,
            output,
            flow,
        } => {
            let config = flow.to_config()?;
            let dem = read_raster::<f64>(&input)?;
            let start = Instant::now();
            let result = resolve_flats(&dem, &config).context("Failed to resolve flats")?;
            let elapsed = start.elapsed();
            info!(
                "{} flats resolved, {} cells adjusted",
                result.diagnostics.flats_resolved, result.diagnostics.flat_cells_adjusted
            );
            write_result(&result.elevation, &output)?;
            done("Adjusted DEM", &output, elapsed);
            write_report(&result.diagnostics, flow.report.as_ref())?;
        }

        Commands::FlowDirection {
            input,
            output,
            flow,
            esri,
        } => {
            let config = flow.to_config()?;
            let dem = read_raster::<f64>(&input)?;
            let start = Instant::now();
            let result =
                flow_direction(&dem, &config).context("Failed to calculate flow direction")?;
            let elapsed = start.elapsed();
            let diagnostics = &result.diagnostics;
            if diagnostics.has_unresolved() {
                warn!(
                    "{} cells left without a drainage path",
                    diagnostics.unresolved_sinks().len()
                );
            }
            let directions = if esri {
                to_esri(&result.directions).context("Failed to encode ESRI codes")?
            } else {
                result.directions
            };
            write_result(&directions, &output)?;
            done("Flow direction", &output, elapsed);
            write_report(diagnostics, flow.report.as_ref())?;
        }

        Commands::FlowAccumulation {
            input,
            output,
            weights,
            esri,
            report,
        } => {
            let flow_dir = read_directions(&input, esri)?;
            let weights = weights
                .map(|path| read_raster::<f64>(&path))
                .transpose()?;
            let start = Instant::now();
            let result = flow_accumulation(&flow_dir, weights.as_ref())
                .context("Failed to calculate flow accumulation")?;
            let elapsed = start.elapsed();
            info!(
                "{} sinks, {} outflows, max accumulation {}",
                result.diagnostics.sinks,
                result.diagnostics.outflows,
                result.diagnostics.max_accumulation
            );
            write_result(&result.accumulation, &output)?;
            done("Flow accumulation", &output, elapsed);
            write_report(&result.diagnostics, report.as_ref())?;
        }

        Commands::Slope { input, output } => {
            let dem = read_raster::<f64>(&input)?;
            let start = Instant::now();
            let result = max_slope(&dem).context("Failed to calculate slope")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("Slope", &output, elapsed);
        }

        Commands::Trace { input, start, esri } => {
            let (row, col) = parse_cell(&start)?;
            let flow_dir = read_directions(&input, esri)?;
            let path = trace_flow_path(&flow_dir, row, col).context("Failed to trace flow path")?;
            for (r, c) in &path.cells {
                println!("{},{}", r, c);
            }
            let end = match path.end {
                PathEnd::Sink => "sink",
                PathEnd::Outflow => "outflow",
                PathEnd::NoData => "nodata",
            };
            println!("{} cells, ends at {}", path.cells.len(), end);
        }
    }

    Ok(())
}
