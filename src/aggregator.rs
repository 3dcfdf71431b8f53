//! Commit aggregation into a day-of-week by hour-of-day matrix

use crate::api::{Commit, CommitSource};
use crate::errors::Result;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Weekday};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

pub const DAYS_PER_WEEK: usize = 7;
pub const HOURS_PER_DAY: usize = 24;

/// Commit counts, rows Monday..Sunday, columns hour 0..23 in the commit's own offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommitMatrix {
    cells: [[u32; HOURS_PER_DAY]; DAYS_PER_WEEK],
}

impl Default for CommitMatrix {
    fn default() -> Self {
        Self {
            cells: [[0; HOURS_PER_DAY]; DAYS_PER_WEEK],
        }
    }
}

impl CommitMatrix {
    /// Build a fresh matrix from every commit that carries a timestamp
    pub fn from_commits<'a, I>(commits: I) -> Self
    where
        I: IntoIterator<Item = &'a Commit>,
    {
        let mut matrix = Self::default();
        for date in commits.into_iter().filter_map(|c| c.date.as_ref()) {
            matrix.record(date);
        }
        matrix
    }

    fn record(&mut self, date: &DateTime<FixedOffset>) {
        let day = date.weekday().number_from_monday() as usize - 1;
        let hour = date.hour() as usize;
        self.cells[day][hour] += 1;
    }

    pub fn get(&self, weekday: Weekday, hour: u32) -> u32 {
        let day = weekday.number_from_monday() as usize - 1;
        self.cells[day].get(hour as usize).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.cells.iter().flatten().sum()
    }

    pub fn rows(&self) -> &[[u32; HOURS_PER_DAY]; DAYS_PER_WEEK] {
        &self.cells
    }
}

/// Polls repositories for commits and keeps the aggregated matrix current
pub struct CommitAggregator {
    source: Arc<dyn CommitSource>,
    repositories: Vec<String>,
    pause: Duration,
    commits: RwLock<HashMap<String, Commit>>,
    matrix: RwLock<Option<CommitMatrix>>,
}

impl CommitAggregator {
    pub fn new(source: Arc<dyn CommitSource>, repositories: Vec<String>, pause: Duration) -> Self {
        Self {
            source,
            repositories,
            pause,
            commits: RwLock::new(HashMap::new()),
            matrix: RwLock::new(None),
        }
    }

    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    /// Poll every repository once, in order.
    ///
    /// The first failure aborts the rest of the cycle; commits and the matrix
    /// computed for earlier repositories are kept.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<()> {
        for repository in &self.repositories {
            let fetched = self.source.fetch_commits(repository).await?;
            let count = fetched.len();

            let mut added = 0;
            for commit in fetched {
                if self.insert(commit).await {
                    added += 1;
                }
            }
            info!("Found {} commits in '{}' repository ({} new)", count, repository, added);

            self.recompute().await;

            // Spread requests out so the remote API is not hit in a burst
            tokio::time::sleep(self.pause).await;
        }

        Ok(())
    }

    /// Store a commit unless its hash is already known. Returns true if stored.
    pub async fn insert(&self, commit: Commit) -> bool {
        let mut commits = self.commits.write().await;
        match commits.entry(commit.hash.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(commit);
                true
            }
        }
    }

    /// Rebuild the matrix from the full commit set
    pub async fn recompute(&self) {
        let matrix = {
            let commits = self.commits.read().await;
            CommitMatrix::from_commits(commits.values())
        };
        debug!("Aggregated {} timestamped commits", matrix.total());
        *self.matrix.write().await = Some(matrix);
    }

    /// Latest matrix, or `None` until the first aggregation completes
    pub async fn matrix(&self) -> Option<CommitMatrix> {
        self.matrix.read().await.clone()
    }

    pub async fn commit(&self, hash: &str) -> Option<Commit> {
        self.commits.read().await.get(hash).cloned()
    }

    pub async fn commit_count(&self) -> usize {
        self.commits.read().await.len()
    }
}
