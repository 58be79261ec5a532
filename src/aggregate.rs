//! Per-contributor and per-tag-key tallies over one unbounded pass

use crate::cursor::{self, EventCursor};
use crate::section::{Section, SectionError, SectionReader};
use indexmap::IndexMap;
use std::path::Path;

/// Running tallies for a single aggregation pass
///
/// Both maps keep first-seen order, which is what the reports fall back on
/// for ties and for the tag listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregator {
    tags: IndexMap<String, u64>,
    users: IndexMap<String, u64>,
}

impl Aggregator {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_tag(&mut self, key: &str) {
        match self.tags.get_mut(key) {
            Some(n) => *n += 1,
            None => {
                self.tags.insert(key.to_string(), 1);
            }
        }
    }

    /// Add a finished burst of edits to a contributor's total
    ///
    /// Bursts of the same contributor separated by other contributors sum up.
    pub fn flush_contributor(&mut self, name: String, count: u64) {
        *self.users.entry(name).or_insert(0) += count;
    }

    pub fn tag_counts(&self) -> &IndexMap<String, u64> {
        &self.tags
    }

    pub fn user_counts(&self) -> &IndexMap<String, u64> {
        &self.users
    }

    /// Contributors by descending edit count, ties in first-seen order
    pub fn users_by_count(&self) -> Vec<(&str, u64)> {
        let mut users: Vec<_> = self.users.iter().map(|(u, n)| (u.as_str(), *n)).collect();
        users.sort_by(|a, b| b.1.cmp(&a.1));
        users
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.users.is_empty()
    }
}

/// The contiguous run of nodes by one contributor currently being counted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorRun {
    pub name: String,
    pub count: u64,
}

/// Folds sections into an [`Aggregator`], tracking contributor bursts
#[derive(Debug, Default)]
pub struct Aggregation {
    aggregator: Aggregator,
    current: Option<ContributorRun>,
}

impl Aggregation {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn observe(&mut self, section: Section) {
        match section {
            Section::Node(node) => self.observe_contributor(node.user),
            Section::Tag(tag) => self.aggregator.record_tag(&tag.key),
        }
    }

    fn observe_contributor(&mut self, user: String) {
        match &mut self.current {
            Some(run) if run.name == user => run.count += 1,
            current => {
                if let Some(done) = current.take() {
                    self.aggregator.flush_contributor(done.name, done.count);
                }
                *current = Some(ContributorRun {
                    name: user,
                    count: 1,
                });
            }
        }
    }

    /// The live contributor run, not yet part of the tallies
    pub fn current(&self) -> Option<&ContributorRun> {
        self.current.as_ref()
    }

    /// Tallies so far, excluding the live contributor run
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// End of stream: flush the last run and hand back the tallies
    pub fn finish(mut self) -> Aggregator {
        if let Some(run) = self.current.take() {
            self.aggregator.flush_contributor(run.name, run.count);
        }
        self.aggregator
    }
}

/// Run a full aggregation pass over a cursor
pub fn aggregate<C: EventCursor>(cursor: C) -> Result<Aggregator, SectionError> {
    let mut sections = SectionReader::new(cursor);
    let mut aggregation = Aggregation::new();
    let mut n = 0_u64;
    while let Some(section) = sections.next_section()? {
        if matches!(section, Section::Node(_)) {
            n += 1;
        }
        aggregation.observe(section);
    }
    log::info!("aggregation pass finished after {n} nodes");
    Ok(aggregation.finish())
}

/// Open `path` and run a full aggregation pass over it
///
/// The file is closed when this returns, error or not.
pub fn aggregate_file(path: impl AsRef<Path>) -> Result<Aggregator, SectionError> {
    let cursor = cursor::open_file(path)?;
    aggregate(cursor)
}
