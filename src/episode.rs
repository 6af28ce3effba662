// 🎬 Episodes - derived per-period reports
//
// Never a source of truth: every episode is rebuilt from two archived
// snapshots plus the resolved match for its period.

use crate::config::MoverLimits;
use crate::diff::{diff_with, EpisodeSummary};
use crate::error::{LedgerError, LedgerResult};
use crate::matches::MatchResult;
use crate::snapshot::{ensure_contiguous, Snapshot};
use crate::store::{write_json_atomic, SnapshotStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Always >= 1: compares period - 1 with period
    pub period: u32,
    pub summary: EpisodeSummary,
    pub match_result: Option<MatchResult>,
}

pub fn build_episode(
    prev: &Snapshot,
    curr: &Snapshot,
    results: &BTreeMap<u32, MatchResult>,
    limits: &MoverLimits,
) -> Episode {
    Episode {
        period: curr.period,
        summary: diff_with(prev, curr, limits),
        match_result: results.get(&curr.period).cloned(),
    }
}

/// Episodes 1..=N for a contiguous history 0..=N
pub fn build_episodes(
    history: &[Snapshot],
    results: &BTreeMap<u32, MatchResult>,
    limits: &MoverLimits,
) -> LedgerResult<Vec<Episode>> {
    ensure_contiguous(history)?;
    Ok(history
        .windows(2)
        .map(|pair| build_episode(&pair[0], &pair[1], results, limits))
        .collect())
}

/// Rebuild a single episode straight from the archive
pub fn episode_from_store(
    store: &dyn SnapshotStore,
    period: u32,
    results: &BTreeMap<u32, MatchResult>,
    limits: &MoverLimits,
) -> LedgerResult<Episode> {
    if period == 0 {
        return Err(LedgerError::malformed(
            "episode",
            "period 0 has no predecessor to compare against",
        ));
    }
    let pair = store.read_range(period - 1, period)?;
    Ok(build_episode(&pair[0], &pair[1], results, limits))
}

pub fn episode_path(dir: &Path, period: u32) -> std::path::PathBuf {
    dir.join(format!("episode_{:04}.json", period))
}

/// Write each episode to `<dir>/episode_NNNN.json`
pub fn write_episodes(dir: &Path, episodes: &[Episode]) -> LedgerResult<usize> {
    for episode in episodes {
        write_json_atomic(&episode_path(dir, episode.period), episode)?;
    }
    tracing::info!(count = episodes.len(), dir = %dir.display(), "episodes written");
    Ok(episodes.len())
}
