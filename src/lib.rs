//! Streaming statistics and write-strategy benchmarks for OSM node exports
//!
//! The export is never loaded whole: a forward-only [`cursor`] feeds the
//! [`section`] state machine, which hands typed [`record`]s either to the
//! [`aggregate`] tallies or to a [`strategy`] under the [`bench`] harness.

pub mod aggregate;
pub mod bench;
pub mod cursor;
pub mod record;
pub mod report;
pub mod section;
pub mod store;
pub mod strategy;

pub use aggregate::{Aggregator, aggregate, aggregate_file};
pub use bench::{BenchConfig, BenchError, BenchSample, PrefixMode};
pub use cursor::{CursorError, EventCursor, MarkupEvent, XmlCursor};
pub use record::{MalformedRecord, NodeRecord, TagPair};
pub use section::{Section, SectionError, SectionReader};
pub use store::{StoreBuilder, StoreError};
pub use strategy::{PersistStrategy, StrategyKind};
