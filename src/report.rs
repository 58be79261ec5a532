//! Console tables for the aggregation tallies and benchmark progress

use crate::aggregate::Aggregator;
use crate::bench::BenchSample;
use std::fmt;

const RULE: &str = "-----------------------------------";

fn ms(d: std::time::Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for BenchSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Strategy: {}", self.strategy)?;
        writeln!(f, "Current input objects: {}", self.processed)?;
        match self.mean() {
            Some(mean) => writeln!(f, "Current time in ms for 1 object: {:.4}", ms(mean))?,
            None => writeln!(f, "Current time in ms for 1 object: -")?,
        }
        writeln!(f, "Current time: {:.3} ms", ms(self.elapsed))?;
        write!(f, "{RULE}")
    }
}

/// Contributors by edit count, most active first
pub struct UserTable<'a>(pub &'a Aggregator);

impl fmt::Display for UserTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let users = self.0.users_by_count();
        let width = users.iter().map(|(u, _)| u.chars().count()).max().unwrap_or(0);
        writeln!(f, "Edits per user ({} users)", users.len())?;
        for (user, n) in users {
            writeln!(f, "  {user:<width$}  {n}")?;
        }
        write!(f, "{RULE}")
    }
}

/// Tag keys by usage, in first-seen order
pub struct TagTable<'a>(pub &'a Aggregator);

impl fmt::Display for TagTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags = self.0.tag_counts();
        let width = tags.keys().map(|k| k.chars().count()).max().unwrap_or(0);
        writeln!(f, "Tag key usage ({} keys)", tags.len())?;
        for (key, n) in tags {
            writeln!(f, "  {key:<width$}  {n}")?;
        }
        write!(f, "{RULE}")
    }
}
