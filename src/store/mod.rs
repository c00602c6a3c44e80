//! Row persistence.
//!
//! [`RecordStore`] is the write/read boundary between the analysis output
//! and whatever keeps it between runs. [`JsonlStore`] keeps one
//! JSON-lines file per table in a directory. [`sync`] folds one run into
//! a store and rebuilds the run's derived views from everything stored.

use crate::analysis::behavior::aggregate;
use crate::analysis::cohort::Condition;
use crate::analysis::filter::BoundedRange;
use crate::analysis::{build_timeline, Analysis, BatchOptions};
use crate::models::{HandEventRecord, NetResultRecord, PlayerObservation, PlayerStats};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A row type with its own table.
pub trait Table: Serialize + DeserializeOwned {
    /// Table name, also the file stem.
    const NAME: &'static str;

    /// Hand the row was derived from. Appends skip hands already stored.
    fn hand_id(&self) -> Option<u64> {
        None
    }
}

impl Table for PlayerStats {
    const NAME: &'static str = "player_stats";
}

impl Table for HandEventRecord {
    const NAME: &'static str = "hand_events";

    fn hand_id(&self) -> Option<u64> {
        Some(self.hand_id)
    }
}

impl Table for PlayerObservation {
    const NAME: &'static str = "player_observations";

    fn hand_id(&self) -> Option<u64> {
        Some(self.hand_id)
    }
}

impl Table for NetResultRecord {
    const NAME: &'static str = "net_results";

    fn hand_id(&self) -> Option<u64> {
        Some(self.hand_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Drop what the table held.
    Replace,
    /// Add rows, skipping hands already stored.
    Append,
}

/// Behavioral filter over stored observations.
///
/// Conditions test the observed player's stored stats; players without
/// stats never match a non-empty condition list.
#[derive(Debug, Clone, Default)]
pub struct ObservationQuery {
    pub conditions: Vec<Condition>,
    pub active_players: Option<BoundedRange<u32>>,
}

/// Bulk write and filtered read of analysis rows.
pub trait RecordStore {
    /// Write rows to their table. Returns the number of rows written.
    fn write_rows<T: Table>(&self, rows: &[T], mode: WriteMode) -> Result<usize>;

    /// Every row of a table; empty if it was never written.
    fn read_rows<T: Table>(&self) -> Result<Vec<T>>;

    /// Observations whose player and table size match `query`.
    fn fetch_observations(&self, query: &ObservationQuery) -> Result<Vec<PlayerObservation>> {
        let observations: Vec<PlayerObservation> = self.read_rows()?;
        if query.conditions.is_empty() && query.active_players.is_none() {
            return Ok(observations);
        }

        let stats: HashMap<String, PlayerStats> = self
            .read_rows::<PlayerStats>()?
            .into_iter()
            .map(|row| (row.player.clone(), row))
            .collect();

        let total = observations.len();
        let matched: Vec<PlayerObservation> = observations
            .into_iter()
            .filter(|obs| {
                query
                    .active_players
                    .map_or(true, |range| range.contains(obs.active_players))
            })
            .filter(|obs| {
                query.conditions.is_empty()
                    || stats
                        .get(&obs.player)
                        .is_some_and(|row| query.conditions.iter().all(|c| c.matches(row)))
            })
            .collect();

        debug!(total, matched = matched.len(), "Fetched observations");
        Ok(matched)
    }
}

/// One `<table>.jsonl` file per table under a directory.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    /// Open a store, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.jsonl"))
    }

    fn stored_hands<T: Table>(&self) -> Result<HashSet<u64>> {
        Ok(self
            .read_rows::<T>()?
            .iter()
            .filter_map(T::hand_id)
            .collect())
    }
}

impl RecordStore for JsonlStore {
    fn write_rows<T: Table>(&self, rows: &[T], mode: WriteMode) -> Result<usize> {
        let path = self.table_path(T::NAME);

        let (file, stored) = match mode {
            WriteMode::Replace => (fs::File::create(&path), HashSet::new()),
            WriteMode::Append => {
                let stored = self.stored_hands::<T>()?;
                let file = OpenOptions::new().create(true).append(true).open(&path);
                (file, stored)
            }
        };
        let file = file.with_context(|| format!("Failed to open {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        let mut written = 0;
        for row in rows {
            if row.hand_id().is_some_and(|id| stored.contains(&id)) {
                continue;
            }
            serde_json::to_writer(&mut writer, row)
                .with_context(|| format!("Failed to serialize a {} row", T::NAME))?;
            writer.write_all(b"\n")?;
            written += 1;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(
            "Stored {} {} rows ({} already present)",
            written,
            T::NAME,
            rows.len() - written
        );
        Ok(written)
    }

    fn read_rows<T: Table>(&self) -> Result<Vec<T>> {
        let path = self.table_path(T::NAME);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut rows = Vec::new();
        for (no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let row = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid {} row", path.display(), no + 1, T::NAME))?;
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Store one run and rebase `analysis` on the stored history.
///
/// Per-hand rows are appended (hands already stored are skipped). Player
/// stats are recomputed from every stored hand's events and replace the
/// stored table; the cohort views and the time series are then rebuilt
/// from them. Re-running the same records leaves the store unchanged.
pub fn sync(store: &impl RecordStore, analysis: &mut Analysis, opts: &BatchOptions) -> Result<()> {
    store
        .write_rows(&analysis.hand_events, WriteMode::Append)
        .context("Failed to store hand events")?;
    store
        .write_rows(&analysis.observations, WriteMode::Append)
        .context("Failed to store observations")?;
    store
        .write_rows(&analysis.net_results, WriteMode::Append)
        .context("Failed to store net results")?;

    let history: Vec<HandEventRecord> = store.read_rows().context("Failed to read hand events")?;
    let player_stats = aggregate(history.iter().map(|r| &r.events), &opts.cohorts);
    store
        .write_rows(&player_stats, WriteMode::Replace)
        .context("Failed to store player stats")?;
    analysis.apply_player_stats(player_stats, opts);

    let observations = store
        .fetch_observations(&ObservationQuery::default())
        .context("Failed to read observations")?;
    analysis.timeline = build_timeline(&observations, &analysis.cohorts(), opts).rows();

    info!(
        hands = history.len(),
        players = analysis.player_stats.len(),
        observations = observations.len(),
        "Store synced"
    );
    Ok(())
}
