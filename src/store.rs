// 🗄️ Snapshot Archive - Append-only log of period-indexed snapshots
//
// Invariants enforced at the write boundary (SnapshotStore::append):
// 1. Signature gate: identical content to the latest entry is a no-op
// 2. Contiguity: the next entry must be latest.period + 1 (or 0 when empty)
//
// Backends only implement raw reads/writes; the gate lives in the trait.

use crate::error::{LedgerError, LedgerResult};
use crate::snapshot::{missing_periods, Snapshot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// APPEND OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppendOutcome {
    /// A new period was written
    Archived { period: u32 },

    /// Content matched the latest entry; nothing written
    Unchanged { latest_period: u32 },
}

impl AppendOutcome {
    pub fn is_archived(&self) -> bool {
        matches!(self, AppendOutcome::Archived { .. })
    }

    /// Latest archived period after the append
    pub fn period(&self) -> u32 {
        match self {
            AppendOutcome::Archived { period } => *period,
            AppendOutcome::Unchanged { latest_period } => *latest_period,
        }
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

pub trait SnapshotStore {
    /// Sorted period indices present in the archive
    fn periods(&self) -> LedgerResult<Vec<u32>>;

    fn read(&self, period: u32) -> LedgerResult<Option<Snapshot>>;

    /// Raw write. Callers go through `append`.
    fn persist(&mut self, snapshot: &Snapshot) -> LedgerResult<()>;

    /// Hook for backends that keep an audit trail
    fn note_unchanged(&mut self, _latest_period: u32, _signature: &str) -> LedgerResult<()> {
        Ok(())
    }

    fn latest_period(&self) -> LedgerResult<Option<u32>> {
        Ok(self.periods()?.last().copied())
    }

    fn latest(&self) -> LedgerResult<Option<Snapshot>> {
        match self.latest_period()? {
            Some(period) => self.read(period),
            None => Ok(None),
        }
    }

    /// Period the next archived snapshot will receive
    fn next_period(&self) -> LedgerResult<u32> {
        Ok(self.latest_period()?.map_or(0, |p| p + 1))
    }

    /// Append with signature gate and contiguity check
    fn append(&mut self, snapshot: Snapshot) -> LedgerResult<AppendOutcome> {
        let signature = snapshot.recompute_signature();

        if let Some(latest) = self.latest()? {
            if latest.recompute_signature() == signature {
                tracing::info!(
                    latest_period = latest.period,
                    "archive unchanged, no new period written"
                );
                self.note_unchanged(latest.period, &signature)?;
                return Ok(AppendOutcome::Unchanged {
                    latest_period: latest.period,
                });
            }
        }

        let expected = self.next_period()?;
        if snapshot.period != expected {
            return Err(LedgerError::NonContiguousAppend {
                expected,
                found: snapshot.period,
            });
        }

        let mut snapshot = snapshot;
        snapshot.signature = signature;
        self.persist(&snapshot)?;

        tracing::info!(
            period = snapshot.period,
            participants = snapshot.count(),
            "snapshot archived"
        );
        Ok(AppendOutcome::Archived {
            period: snapshot.period,
        })
    }

    /// Inclusive range; fails listing every missing period
    fn read_range(&self, lo: u32, hi: u32) -> LedgerResult<Vec<Snapshot>> {
        if lo > hi {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut missing = Vec::new();
        for period in lo..=hi {
            match self.read(period)? {
                Some(snapshot) => found.push(snapshot),
                None => missing.push(period),
            }
        }

        if !missing.is_empty() {
            tracing::warn!(?missing, lo, hi, "snapshot range incomplete");
            return Err(LedgerError::MissingPeriod { missing });
        }
        Ok(found)
    }

    /// Whole season, 0..=latest
    fn read_all(&self) -> LedgerResult<Vec<Snapshot>> {
        match self.latest_period()? {
            Some(latest) => self.read_range(0, latest),
            None => Ok(Vec::new()),
        }
    }

    /// Periods absent from 0..=latest
    fn gaps(&self) -> LedgerResult<Vec<u32>> {
        Ok(missing_periods(&self.periods()?))
    }
}

// ============================================================================
// ATOMIC WRITES
// ============================================================================

/// Write JSON to `<path>.tmp` then rename over `path`
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> LedgerResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let json = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

// ============================================================================
// FILE STORE
// ============================================================================

/// One JSON artifact per period: `<dir>/snapshot_0000.json`
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> LedgerResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, period: u32) -> PathBuf {
        self.dir.join(format!("snapshot_{:04}.json", period))
    }

    fn parse_period(file_name: &str) -> Option<u32> {
        file_name
            .strip_prefix("snapshot_")?
            .strip_suffix(".json")?
            .parse()
            .ok()
    }
}

impl SnapshotStore for FileStore {
    fn periods(&self) -> LedgerResult<Vec<u32>> {
        let mut periods = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(period) = entry.file_name().to_str().and_then(Self::parse_period) {
                periods.push(period);
            }
        }
        periods.sort_unstable();
        Ok(periods)
    }

    fn read(&self, period: u32) -> LedgerResult<Option<Snapshot>> {
        let path = self.path_for(period);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let snapshot: Snapshot = serde_json::from_str(&text)?;
        Ok(Some(snapshot))
    }

    fn persist(&mut self, snapshot: &Snapshot) -> LedgerResult<()> {
        let path = self.path_for(snapshot.period);
        if path.exists() {
            // Append-only: an existing period is never rewritten
            return Err(LedgerError::NonContiguousAppend {
                expected: self.next_period()?,
                found: snapshot.period,
            });
        }
        write_json_atomic(&path, snapshot)
    }
}

// ============================================================================
// TESTS
// ============================================================================
