//! Bounded, timed write passes: one per strategy

use crate::cursor::{CursorError, EventCursor};
use crate::section::{SectionError, SectionReader};
use crate::store::{StoreBuilder, StoreError};
use crate::strategy::{PersistStrategy, StrategyKind};
use std::path::PathBuf;
use std::time::Duration;

/// Errors that abort a strategy's pass
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("{strategy}: failed reading the source: {source}")]
    Source {
        strategy: &'static str,
        source: SectionError,
    },
    #[error("{strategy}: store write failed: {source}")]
    Store {
        strategy: &'static str,
        source: StoreError,
    },
}

/// Which part of the stream each strategy pass gets to write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PrefixMode {
    /// Every pass reopens the source and writes the same leading nodes
    #[default]
    #[value(name = "same")]
    SamePrefix,
    /// Passes share one cursor, each continuing where the last one stopped
    Successive,
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Nodes written per strategy pass
    ///
    /// Default: 1000
    pub budget: usize,
    /// Emit a progress sample every this many nodes (0 never reports)
    ///
    /// Default: 1000
    pub report_every: usize,
    pub prefix_mode: PrefixMode,
    /// Buffer threshold for the buffered strategy
    ///
    /// Default: 500
    pub batch_size: usize,
    pub strategies: Vec<StrategyKind>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            budget: 1000,
            report_every: 1000,
            prefix_mode: PrefixMode::SamePrefix,
            batch_size: 500,
            strategies: StrategyKind::ALL.to_vec(),
        }
    }
}

/// Throughput so far for one strategy pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchSample {
    pub strategy: &'static str,
    pub processed: usize,
    /// Total store time, not counting parsing or reporting
    pub elapsed: Duration,
}

impl BenchSample {
    pub fn new(strategy: &'static str) -> Self {
        Self {
            strategy,
            processed: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Mean store time per record, if any were processed
    pub fn mean(&self) -> Option<Duration> {
        u32::try_from(self.processed)
            .ok()
            .filter(|&n| n > 0)
            .map(|n| self.elapsed / n)
    }
}

/// Write up to `config.budget` nodes from `sections` through `strategy`
///
/// Stops as soon as the budget is reached without draining the rest of the
/// stream. Running out of nodes first is not an error; the sample just covers
/// fewer records.
pub fn run_pass<C, S>(
    sections: &mut SectionReader<C>,
    strategy: &mut S,
    config: &BenchConfig,
    mut progress: impl FnMut(&BenchSample),
) -> Result<BenchSample, BenchError>
where
    C: EventCursor,
    S: PersistStrategy + ?Sized,
{
    let name = strategy.name();
    let store_err = |source: StoreError| BenchError::Store {
        strategy: name,
        source,
    };
    log::info!("{name}: writing up to {} nodes", config.budget);

    let mut sample = BenchSample::new(name);
    while sample.processed < config.budget {
        let node = sections.next_node().map_err(|source| BenchError::Source {
            strategy: name,
            source,
        })?;
        let Some(node) = node else {
            log::warn!(
                "{name}: source exhausted after {} of {} nodes",
                sample.processed,
                config.budget
            );
            break;
        };

        sample.elapsed += strategy.write(&node).map_err(store_err)?;
        sample.processed += 1;

        if config.report_every > 0 && sample.processed % config.report_every == 0 {
            progress(&sample);
        }
    }
    sample.elapsed += strategy.finish().map_err(store_err)?;

    log::info!(
        "{name}: done, {} nodes in {:?}",
        sample.processed,
        sample.elapsed
    );
    Ok(sample)
}

/// Run one pass per configured strategy, strictly one after another
///
/// `open_source` is called once per pass in [`PrefixMode::SamePrefix`], and
/// once overall in [`PrefixMode::Successive`]. Each strategy gets its own
/// store connection to `db`, dropped before the next one opens.
pub async fn run_all<C, F>(
    mut open_source: F,
    builder: &StoreBuilder,
    db: PathBuf,
    config: &BenchConfig,
    mut progress: impl FnMut(&BenchSample),
) -> Result<Vec<BenchSample>, BenchError>
where
    C: EventCursor,
    F: FnMut() -> Result<C, CursorError>,
{
    let source_err = |strategy: &'static str| {
        move |e: CursorError| BenchError::Source {
            strategy,
            source: e.into(),
        }
    };

    let mut shared = match config.prefix_mode {
        PrefixMode::Successive => {
            let first = config.strategies.first().map_or("bench", |k| k.name());
            Some(SectionReader::new(open_source().map_err(source_err(first))?))
        }
        PrefixMode::SamePrefix => None,
    };

    let mut samples = Vec::with_capacity(config.strategies.len());
    for kind in &config.strategies {
        let mut strategy = kind
            .open(builder, db.clone(), config.batch_size)
            .await
            .map_err(|source| BenchError::Store {
                strategy: kind.name(),
                source,
            })?;

        let sample = match shared.as_mut() {
            Some(sections) => run_pass(sections, strategy.as_mut(), config, &mut progress)?,
            None => {
                let cursor = open_source().map_err(source_err(kind.name()))?;
                let mut sections = SectionReader::new(cursor);
                run_pass(&mut sections, strategy.as_mut(), config, &mut progress)?
            }
        };
        samples.push(sample);
    }
    Ok(samples)
}
