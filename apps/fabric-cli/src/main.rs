use anyhow::Context;
use clap::{Parser, Subcommand};
use fabric_common::WorkerId;
use fabric_partition::{LoadBalanceStrategy, ShapeStrategy, StrategyConfig};
use fabric_view::{EntityView, RawOp, ViewDelta, normalize};
use glam::Vec3;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fabric-cli", about = "CLI tool for fabric operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info
    Info,
    /// Resolve the owning worker for each position
    Resolve {
        #[command(flatten)]
        workers: WorkerArgs,
        /// Positions as x,y,z
        #[arg(required = true, value_parser = parse_position)]
        positions: Vec<Vec3>,
    },
    /// Print the local worker's interest query and anchor position
    Interest {
        #[command(flatten)]
        workers: WorkerArgs,
    },
    /// Normalize and reduce a JSON op batch, printing the view delta
    Reduce {
        /// JSON file holding an array of raw ops
        #[arg(short, long)]
        ops: PathBuf,
        /// Also print the view after the batch
        #[arg(long)]
        show_view: bool,
    },
}

#[derive(clap::Args)]
struct WorkerArgs {
    /// Strategy configuration (JSON). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// First worker id of the partition range
    #[arg(long, default_value = "1")]
    first: u32,
    /// Local worker id (defaults to the first worker)
    #[arg(long)]
    local: Option<u32>,
}

fn parse_position(s: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y] => Ok(Vec3::new(*x, *y, 0.0)),
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y or x,y,z, got {s:?}")),
    }
}

fn load_strategy(args: &WorkerArgs) -> anyhow::Result<ShapeStrategy> {
    let config = match &args.config {
        Some(path) => StrategyConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StrategyConfig::default(),
    };
    let mut strategy = ShapeStrategy::new(config);
    strategy.init()?;

    let groups = strategy.minimum_required_workers();
    let first = WorkerId(args.first);
    let last = args
        .first
        .checked_add(groups - 1)
        .map(WorkerId)
        .with_context(|| {
            format!(
                "worker range starting at {} overflows for {groups} groups",
                args.first
            )
        })?;
    strategy.set_worker_ids(first, last)?;
    strategy.set_local_worker_id(WorkerId(args.local.unwrap_or(args.first)))?;
    tracing::debug!(
        groups,
        local = ?strategy.local_assignment(),
        "strategy ready"
    );
    Ok(strategy)
}

fn load_ops(path: &Path) -> anyhow::Result<Vec<RawOp>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let ops = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(ops)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("fabric-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", fabric_common::crate_info());
            println!("partition: {}", fabric_partition::crate_info());
            println!("view: {}", fabric_view::crate_info());
        }
        Commands::Resolve { workers, positions } => {
            let strategy = load_strategy(&workers)?;
            println!(
                "Workers: {:?} (minimum {})",
                strategy.virtual_worker_ids(),
                strategy.minimum_required_workers()
            );
            for p in &positions {
                let owner = strategy.who_should_have_authority(p);
                let local = strategy.should_have_authority(p);
                println!("({:.2}, {:.2}, {:.2}) -> {owner} local={local}", p.x, p.y, p.z);
            }
        }
        Commands::Interest { workers } => {
            let strategy = load_strategy(&workers)?;
            let query = strategy.worker_interest_query()?;
            let anchor = strategy.worker_entity_position()?;
            println!("{}", serde_json::to_string_pretty(&query)?);
            println!("Anchor: ({:.2}, {:.2}, {:.2})", anchor.x, anchor.y, anchor.z);
        }
        Commands::Reduce { ops, show_view } => {
            let raw = load_ops(&ops)?;
            let batch = normalize(&raw);
            for (index, err) in &batch.rejected {
                println!("Rejected op {index}: {err}");
            }

            let mut view = EntityView::new();
            let delta = ViewDelta::from_ops(&batch.ops, &mut view);
            println!("{}", serde_json::to_string_pretty(&delta)?);
            println!(
                "Entities touched: {}, discarded: {}",
                delta.entity_deltas().len(),
                delta.discarded_ops()
            );
            if show_view {
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positions() {
        assert_eq!(parse_position("1,2,3"), Ok(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(parse_position("1.5, -2"), Ok(Vec3::new(1.5, -2.0, 0.0)));
        assert!(parse_position("1").is_err());
        assert!(parse_position("a,b").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn worker_range_overflow_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.json");
        std::fs::write(&path, r#"{"tessellation": {"kind": "grid", "rows": 2, "cols": 1}}"#)
            .unwrap();
        let args = WorkerArgs {
            config: Some(path),
            first: u32::MAX,
            local: None,
        };
        let err = load_strategy(&args).unwrap_err();
        assert!(err.to_string().contains("overflows"));

        let single = WorkerArgs {
            config: None,
            first: u32::MAX,
            local: None,
        };
        assert!(load_strategy(&single).is_ok());
    }

    #[test]
    fn default_strategy_owns_everything_locally() {
        let args = WorkerArgs {
            config: None,
            first: 3,
            local: None,
        };
        let strategy = load_strategy(&args).unwrap();
        assert_eq!(
            strategy.who_should_have_authority(&Vec3::new(10.0, -10.0, 0.0)),
            WorkerId(3)
        );
        assert!(strategy.should_have_authority(&Vec3::ZERO));
    }
}
