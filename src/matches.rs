// ⚔️ Match Resolver
// Event log rows → one authoritative result per period
//
// Rows group by period, then by match id. Each row adds its win indicators
// to that match's score. When a period holds several matches, the one with
// the greatest combined score decides the period (first in the log on ties).
// A period with no rows has no result at all, which is not the same as a draw.

use crate::config::MatchConfig;
use crate::parser::MatchRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DRAW: &str = "Draw";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub period: u32,
    pub match_id: String,

    /// Faction → score
    pub scores: BTreeMap<String, u32>,

    /// Winning faction, or "Draw"
    pub winner: String,
    pub margin: u32,

    /// Matches found in the period, including the one selected
    pub matches_in_period: usize,
}

impl MatchResult {
    pub fn is_draw(&self) -> bool {
        self.winner == DRAW
    }
}

/// Running tally for one match id
#[derive(Debug, Clone)]
struct Tally {
    match_id: String,
    side_a: u32,
    side_b: u32,
}

impl Tally {
    fn combined(&self) -> u32 {
        self.side_a + self.side_b
    }
}

pub struct MatchResolver {
    side_a: String,
    side_b: String,
}

impl MatchResolver {
    pub fn new(config: &MatchConfig) -> Self {
        MatchResolver {
            side_a: config.side_a.clone(),
            side_b: config.side_b.clone(),
        }
    }

    /// Per-match tallies for each period, in first-seen order
    fn tally(&self, rows: &[MatchRow]) -> BTreeMap<u32, Vec<Tally>> {
        let mut periods: BTreeMap<u32, Vec<Tally>> = BTreeMap::new();

        for row in rows {
            let matches = periods.entry(row.period).or_default();
            let index = match matches.iter().position(|t| t.match_id == row.match_id) {
                Some(i) => i,
                None => {
                    matches.push(Tally {
                        match_id: row.match_id.clone(),
                        side_a: 0,
                        side_b: 0,
                    });
                    matches.len() - 1
                }
            };
            let tally = &mut matches[index];
            tally.side_a += u32::from(row.side_a_won);
            tally.side_b += u32::from(row.side_b_won);
        }

        periods
    }

    fn decide(&self, period: u32, matches: &[Tally]) -> Option<MatchResult> {
        // First maximum in log order wins
        let chosen = matches.iter().fold(None::<&Tally>, |best, t| match best {
            Some(b) if b.combined() >= t.combined() => Some(b),
            _ => Some(t),
        })?;

        let winner = if chosen.side_a > chosen.side_b {
            self.side_a.clone()
        } else if chosen.side_b > chosen.side_a {
            self.side_b.clone()
        } else {
            DRAW.to_string()
        };

        let mut scores = BTreeMap::new();
        scores.insert(self.side_a.clone(), chosen.side_a);
        scores.insert(self.side_b.clone(), chosen.side_b);

        Some(MatchResult {
            period,
            match_id: chosen.match_id.clone(),
            scores,
            winner,
            margin: chosen.side_a.abs_diff(chosen.side_b),
            matches_in_period: matches.len(),
        })
    }

    /// Results for every period present in the log
    pub fn resolve_all(&self, rows: &[MatchRow]) -> BTreeMap<u32, MatchResult> {
        self.tally(rows)
            .into_iter()
            .filter_map(|(period, matches)| self.decide(period, &matches).map(|r| (period, r)))
            .collect()
    }

    /// Result for one period; None when the log has no rows for it
    pub fn resolve(&self, rows: &[MatchRow], period: u32) -> Option<MatchResult> {
        let in_period: Vec<MatchRow> = rows.iter().filter(|r| r.period == period).cloned().collect();
        let tallies = self.tally(&in_period);
        self.decide(period, tallies.get(&period)?)
    }
}
