#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI for exporting trip demand aggregates, heatmaps and segments.
//!
//! ```text
//! trip_demand demand   [--role pickup|dropoff] [--format csv|json]
//! trip_demand top      [--role pickup|dropoff] [-n 20]
//! trip_demand heatmap  [--role pickup|dropoff]
//! trip_demand segments [--limit 2000] [--format csv|json]
//! ```
//!
//! `--dataset`, `--resolution` and `--output` apply to every subcommand and
//! override `TRIP_DEMAND_DATASET` / `TRIP_DEMAND_RESOLUTION`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use trip_demand_grid::Resolution;
use trip_demand_pipeline::aggregate::to_row;
use trip_demand_pipeline::config::PipelineConfig;
use trip_demand_pipeline::export::{RowFormat, write_geojson, write_rows};
use trip_demand_pipeline::{Pipeline, PipelineError};
use trip_demand_trace_models::{DemandRow, EndpointRole, SegmentRow};

#[derive(Parser)]
#[command(
    name = "trip_demand",
    about = "Aggregate trip endpoints into hexagonal demand cells"
)]
struct Cli {
    /// Trace dataset (CSV or Parquet)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Grid resolution (0-15)
    #[arg(long, global = true)]
    resolution: Option<u8>,

    /// Write to this file instead of stdout
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-cell pickup or dropoff counts
    Demand {
        /// `pickup` or `dropoff`
        #[arg(long, default_value = "pickup")]
        role: EndpointRole,
        /// Output encoding
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
    /// The busiest cells, highest count first
    Top {
        /// `pickup` or `dropoff`
        #[arg(long, default_value = "pickup")]
        role: EndpointRole,
        /// Number of cells
        #[arg(short, default_value = "20")]
        n: usize,
        /// Output encoding
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
    /// Cell polygons as a GeoJSON FeatureCollection
    Heatmap {
        /// `pickup` or `dropoff`
        #[arg(long, default_value = "pickup")]
        role: EndpointRole,
    },
    /// Start→finish segments, one per trip
    Segments {
        /// Maximum rows; 0 keeps all
        #[arg(long)]
        limit: Option<usize>,
        /// Output encoding
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl From<Format> for RowFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => Self::Csv,
            Format::Json => Self::Json,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env()?;
    if let Some(dataset) = cli.dataset {
        config.dataset_path = dataset;
    }
    if let Some(resolution) = cli.resolution {
        config.resolution = Resolution::new(resolution)?;
    }

    let pipeline = Pipeline::from_global(Duration::ZERO)?;
    let writer: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };

    run(&pipeline, &config, cli.command, writer)?;

    if let Some(path) = cli.output {
        log::info!("Wrote {}", path.display());
    }
    Ok(())
}

fn run(
    pipeline: &Pipeline,
    config: &PipelineConfig,
    command: Commands,
    writer: impl Write,
) -> Result<(), PipelineError> {
    let path = config.dataset_path.as_path();

    match command {
        Commands::Demand { role, format } => {
            let rows = recover_empty(
                pipeline
                    .demand_surface(path, config.resolution)
                    .map(|s| s.for_role(role).to_rows()),
            )?;
            write_rows(&rows, format.into(), writer)
        }
        Commands::Top { role, n, format } => {
            let rows: Vec<DemandRow> = recover_empty(
                pipeline
                    .demand_surface(path, config.resolution)
                    .map(|s| s.for_role(role).top(n).iter().map(to_row).collect()),
            )?;
            write_rows(&rows, format.into(), writer)
        }
        Commands::Heatmap { role } => {
            let features = recover_empty(
                pipeline
                    .heatmap(path, config.resolution, role)
                    .map(|layer| layer.features),
            )?;
            write_geojson(&features, writer)
        }
        Commands::Segments { limit, format } => {
            let limit = limit.map_or(config.segment_limit, NonZeroUsize::new);
            let rows: Vec<SegmentRow> =
                recover_empty(pipeline.segments(path, limit).map(|t| t.to_rows()))?;
            write_rows(&rows, format.into(), writer)
        }
    }
}

/// Turns an empty dataset into empty output.
fn recover_empty<T: Default>(result: Result<T, PipelineError>) -> Result<T, PipelineError> {
    match result {
        Err(e) if e.is_recoverable() => {
            log::warn!("{e}; writing empty output");
            Ok(T::default())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clap::CommandFactory;
    use trip_demand_grid::{GridIndex, H3oBackend};

    use super::*;

    fn fixture(name: &str, contents: &str) -> (PathBuf, PipelineConfig) {
        let dir = std::env::temp_dir().join(format!("trip_demand_cli_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("traces.csv");
        std::fs::write(&path, contents).unwrap();
        let config = PipelineConfig {
            dataset_path: path,
            ..PipelineConfig::default()
        };
        (dir, config)
    }

    fn pipeline() -> Pipeline {
        let grid = GridIndex::bind(Arc::new(H3oBackend::current())).unwrap();
        Pipeline::new(grid, Duration::ZERO)
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_role_aliases() {
        let cli = Cli::try_parse_from(["trip_demand", "heatmap", "--role", "destinations"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Heatmap {
                role: EndpointRole::Dropoff
            }
        ));
    }

    #[test]
    fn segments_limit_parses_as_count() {
        let cli = Cli::try_parse_from(["trip_demand", "segments", "--limit", "0"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Segments { limit: Some(0), .. }
        ));
        assert!(Cli::try_parse_from(["trip_demand", "segments", "--limit", "many"]).is_err());
    }

    #[test]
    fn zero_limit_keeps_every_segment() {
        let (dir, config) = fixture(
            "segments_unlimited",
            "randomized_id,lat,lng\nA,0,0\nA,1,1\nB,2,2\n",
        );
        let config = PipelineConfig {
            segment_limit: NonZeroUsize::new(1),
            ..config
        };
        let mut out = Vec::new();

        run(
            &pipeline(),
            &config,
            Commands::Segments {
                limit: Some(0),
                format: Format::Csv,
            },
            &mut out,
        )
        .unwrap();

        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn segments_csv_export() {
        let (dir, config) = fixture(
            "segments",
            "randomized_id,lat,lng\nA,0,0\nA,1,1\nB,2,2\n",
        );
        let mut out = Vec::new();

        run(
            &pipeline(),
            &config,
            Commands::Segments {
                limit: Some(1),
                format: Format::Csv,
            },
            &mut out,
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "randomized_id,lat_start,lng_start,lat_end,lng_end\nA,0.0,0.0,1.0,1.0\n"
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn empty_dataset_writes_empty_collection() {
        let (dir, config) = fixture("empty", "randomized_id,lat,lng\n");
        let mut out = Vec::new();

        run(
            &pipeline(),
            &config,
            Commands::Heatmap {
                role: EndpointRole::Pickup,
            },
            &mut out,
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"FeatureCollection\""));
        assert!(text.contains("\"features\": []"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
