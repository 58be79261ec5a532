use clap::Parser;
use osm_stream::report::{TagTable, UserTable};
use osm_stream::{BenchConfig, PrefixMode, StoreBuilder, StrategyKind, bench, cursor};
use std::path::PathBuf;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(about = "Node statistics and store write benchmarks for an OSM export")]
struct Args {
    /// OSM XML export
    #[arg()]
    input: PathBuf,
    /// SQLite database the benchmark writes into
    #[arg(long, default_value = "nodes.db")]
    db: PathBuf,
    /// Nodes written per strategy
    #[arg(long, default_value_t = 1000)]
    budget: usize,
    /// Print progress every this many nodes
    #[arg(long, default_value_t = 1000)]
    report_every: usize,
    /// Buffer size for the buffered strategy
    #[arg(long, default_value_t = 500)]
    batch_size: usize,
    #[arg(long, default_value_t = 32)]
    cache_size_mb: usize,
    #[arg(long, value_enum, default_value_t = PrefixMode::SamePrefix)]
    prefix_mode: PrefixMode,
    /// Strategies to run, in order (default: all)
    #[arg(long = "strategy", value_enum)]
    strategies: Vec<StrategyKind>,
    #[arg(long)]
    skip_bench: bool,
    #[arg(long)]
    skip_stats: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    log::info!("start");

    if !args.skip_bench {
        let config = BenchConfig {
            budget: args.budget,
            report_every: args.report_every,
            prefix_mode: args.prefix_mode,
            batch_size: args.batch_size,
            strategies: if args.strategies.is_empty() {
                StrategyKind::ALL.to_vec()
            } else {
                args.strategies.clone()
            },
        };
        let builder = StoreBuilder::new().with_cache_size_mb(args.cache_size_mb);
        let samples = bench::run_all(
            || cursor::open_file(&args.input),
            &builder,
            args.db.clone(),
            &config,
            |sample| println!("{sample}"),
        )
        .await?;
        for sample in samples {
            log::info!("final: {sample:?}");
        }
    }

    if !args.skip_stats {
        let tallies = osm_stream::aggregate_file(&args.input)?;
        println!("{}", UserTable(&tallies));
        println!("{}", TagTable(&tallies));
    }

    log::info!("finish");
    Ok(())
}
