//! Interchangeable ways of writing nodes into the store
//!
//! Every strategy owns its own [`NodeStore`] connection, and times only its
//! interaction with the store.

use crate::record::NodeRecord;
use crate::store::{NodeStore, StoreBuilder, StoreError};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// One discipline for writing records into the store
pub trait PersistStrategy {
    fn name(&self) -> &'static str;

    /// Write (or accept) one record, returning the store cost of doing so
    fn write(&mut self, node: &NodeRecord) -> Result<Duration, StoreError>;

    /// Push out anything still held back at the end of a pass
    fn finish(&mut self) -> Result<Duration, StoreError> {
        Ok(Duration::ZERO)
    }
}

fn timed(f: impl FnOnce() -> Result<(), StoreError>) -> Result<Duration, StoreError> {
    let t0 = Instant::now();
    f()?;
    Ok(t0.elapsed())
}

/// A complete, freshly parsed statement per record
pub struct DirectStrategy {
    store: NodeStore,
}

impl DirectStrategy {
    pub fn new(store: NodeStore) -> Self {
        Self { store }
    }
}

impl PersistStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        StrategyKind::Direct.name()
    }
    fn write(&mut self, node: &NodeRecord) -> Result<Duration, StoreError> {
        timed(|| self.store.insert_literal(node))
    }
}

/// One compiled statement, re-bound and executed per record
pub struct PreparedStrategy {
    store: NodeStore,
}

impl PreparedStrategy {
    pub fn new(store: NodeStore) -> Self {
        Self { store }
    }
}

impl PersistStrategy for PreparedStrategy {
    fn name(&self) -> &'static str {
        StrategyKind::Prepared.name()
    }
    fn write(&mut self, node: &NodeRecord) -> Result<Duration, StoreError> {
        timed(|| self.store.insert_prepared(node))
    }
}

/// Buffers records and writes them out one transaction per batch
///
/// The whole cost of a flush is charged to the record that filled the buffer;
/// the others only pay for being pushed onto it.
pub struct BufferedStrategy {
    store: NodeStore,
    buffer: Vec<NodeRecord>,
    batch_size: usize,
}

impl BufferedStrategy {
    pub fn new(store: NodeStore, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            buffer: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        log::debug!("flushing {} buffered nodes", self.buffer.len());
        self.store.insert_batch(&self.buffer)?;
        self.buffer.clear();
        Ok(())
    }
}

impl PersistStrategy for BufferedStrategy {
    fn name(&self) -> &'static str {
        StrategyKind::Buffered.name()
    }
    fn write(&mut self, node: &NodeRecord) -> Result<Duration, StoreError> {
        let t0 = Instant::now();
        self.buffer.push(node.clone());
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(t0.elapsed())
    }
    fn finish(&mut self) -> Result<Duration, StoreError> {
        timed(|| self.flush())
    }
}

/// Which strategy to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyKind {
    Direct,
    Prepared,
    Buffered,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Direct,
        StrategyKind::Prepared,
        StrategyKind::Buffered,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Direct => "ExecuteQuery",
            StrategyKind::Prepared => "PreparedStatement",
            StrategyKind::Buffered => "Buffered",
        }
    }

    /// Open a dedicated store connection and wrap it in this strategy
    pub async fn open(
        self,
        builder: &StoreBuilder,
        db: PathBuf,
        batch_size: usize,
    ) -> Result<Box<dyn PersistStrategy>, StoreError> {
        let store = builder.open(db).await?;
        Ok(match self {
            StrategyKind::Direct => Box::new(DirectStrategy::new(store)),
            StrategyKind::Prepared => Box::new(PreparedStrategy::new(store)),
            StrategyKind::Buffered => Box::new(BufferedStrategy::new(store, batch_size)),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn node(id: i64) -> NodeRecord {
        NodeRecord {
            id,
            lat: 1.0,
            lon: 2.0,
            user: "u".into(),
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            version: 1,
            changeset: 1,
        }
    }

    async fn store(dir: &tempfile::TempDir) -> NodeStore {
        StoreBuilder::new()
            .open(dir.path().join("nodes.db"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_buffered_flushes_at_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = BufferedStrategy::new(store(&dir).await, 3);
        for id in 0..4 {
            s.write(&node(id)).unwrap();
        }
        assert_eq!(s.buffered(), 1);
        assert_eq!(s.store.count().unwrap(), 3);
        s.finish().unwrap();
        assert_eq!(s.buffered(), 0);
        assert_eq!(s.store.count().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_buffered_batch_failure_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = BufferedStrategy::new(store(&dir).await, 2);
        s.write(&node(7)).unwrap();
        assert!(s.write(&node(7)).is_err());
    }

    #[tokio::test]
    async fn test_each_kind_opens_its_own_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nodes.db");
        for kind in StrategyKind::ALL {
            let mut s = kind
                .open(&StoreBuilder::new(), db.clone(), 10)
                .await
                .unwrap();
            assert_eq!(s.name(), kind.name());
            // same ids every time: the table must start out empty
            s.write(&node(1)).unwrap();
            s.write(&node(2)).unwrap();
            s.finish().unwrap();
        }
    }
}
