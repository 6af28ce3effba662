// 🧱 Snapshot Builder
// Roster rows → canonical ranking for the next period
//
// Steps:
// 1. Map rows to participants (adjusted power > raw power > 0)
// 2. Freeze eliminated participants to their last archived values
// 3. Hybrid trend: slope when history is long enough, else delta vs prior live
// 4. Sort by power descending (stable on input order)

use crate::analytics::{momentum, power_series};
use crate::config::AnalyticsConfig;
use crate::error::LedgerResult;
use crate::lifecycle::{self, EliminationState};
use crate::parser::RosterRow;
use crate::participant::{Participant, Trend};
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use std::collections::HashSet;

pub struct SnapshotBuilder {
    source: String,
    min_history: usize,
    slope_threshold: f64,
}

impl SnapshotBuilder {
    pub fn new(source: &str, analytics: &AnalyticsConfig) -> Self {
        SnapshotBuilder {
            source: source.to_string(),
            min_history: analytics.min_history,
            slope_threshold: analytics.slope_threshold,
        }
    }

    /// Build the candidate snapshot for the archive
    ///
    /// The rows are first restated at the latest archived period. When that
    /// reproduces the latest signature the restatement is returned, and
    /// `SnapshotStore::append` turns it into a no-op. Otherwise the candidate
    /// targets the next period. Elimination thresholds are therefore judged
    /// against the latest period before the period counter can move.
    ///
    /// Nothing is written; pass the result to `SnapshotStore::append`.
    pub fn build(
        &self,
        rows: &[RosterRow],
        prior_live: Option<&Snapshot>,
        archive: &dyn SnapshotStore,
    ) -> LedgerResult<Snapshot> {
        let history = archive.read_all()?;

        if let Some((latest, earlier)) = history.split_last() {
            let restated = self.build_at(latest.period, rows, prior_live, earlier);
            if restated.signature == latest.recompute_signature() {
                return Ok(restated);
            }
        }

        let period = archive.next_period()?;
        Ok(self.build_at(period, rows, prior_live, &history))
    }

    /// Pure core of `build` over an already-loaded history
    pub fn build_at(
        &self,
        period: u32,
        rows: &[RosterRow],
        prior_live: Option<&Snapshot>,
        history: &[Snapshot],
    ) -> Snapshot {
        let previous = prior_live.or_else(|| history.last());
        let mut seen = HashSet::new();
        let mut participants = Vec::with_capacity(rows.len());

        for row in rows {
            if !seen.insert(row.id.as_str()) {
                tracing::debug!(id = %row.id, line = row.line_number, "duplicate roster id ignored");
                continue;
            }
            participants.push(self.participant_for(period, row, previous, history));
        }

        participants.sort_by(|a, b| b.power.total_cmp(&a.power));
        for (i, p) in participants.iter_mut().enumerate() {
            p.rank = i + 1;
        }

        let active = lifecycle::active_at(&participants, period).count();
        Snapshot::new(period, &self.source, participants).with_metadata(serde_json::json!({
            "rows": rows.len(),
            "active": active,
        }))
    }

    fn participant_for(
        &self,
        period: u32,
        row: &RosterRow,
        previous: Option<&Snapshot>,
        history: &[Snapshot],
    ) -> Participant {
        let observed = row.power();
        let state = lifecycle::state_at(row.elimination_period, period);

        let (power, trend) = match state {
            EliminationState::Eliminated { since } => {
                match lifecycle::frozen_stats(&row.id, since, history) {
                    Some(frozen) => (frozen.power, frozen.trend),
                    // Never archived before elimination: the observed value is the last one
                    None => (observed, self.trend_for(&row.id, observed, previous, history)),
                }
            }
            EliminationState::Active => (observed, self.trend_for(&row.id, observed, previous, history)),
        };

        Participant {
            id: row.id.clone(),
            name: row.name.clone(),
            faction: row.faction.clone(),
            power,
            observed_power: observed,
            trend,
            rank: 0,
            win_rate: row.win_rate,
            elimination_period: row.elimination_period,
            is_eliminated: state.is_eliminated(),
        }
    }

    fn trend_for(
        &self,
        id: &str,
        power: f64,
        previous: Option<&Snapshot>,
        history: &[Snapshot],
    ) -> Trend {
        let mut series = power_series(id, history);
        series.push(power);

        if let Some(slope) = momentum(&series, self.min_history) {
            return Trend::classify(slope, self.slope_threshold);
        }

        match previous.and_then(|s| s.get(id)) {
            Some(prev) => Trend::classify(power - prev.power, self.slope_threshold),
            None => Trend::New,
        }
    }
}
