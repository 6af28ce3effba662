// 🏆 Standings - active-only aggregates for one snapshot
//
// Eliminated participants stay on the roster but count for nothing here:
// faction averages, leaderboard, team score and danger zone all use the
// active set from the period of elimination onward.
//
// Team score is rank-aggregated: with n active participants, the one at
// active rank r earns n - r + 1 points for their faction.

use crate::lifecycle;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Rank among active participants only
    pub rank: usize,
    pub id: String,
    pub name: String,
    pub faction: String,
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionStanding {
    pub faction: String,
    pub active: usize,
    pub eliminated: usize,
    pub average_power: Option<f64>,
    pub rank_score: usize,
    pub best_rank: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standings {
    pub period: u32,
    pub factions: Vec<FactionStanding>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub danger_zone: Vec<LeaderboardEntry>,
}

pub fn standings(snapshot: &Snapshot, danger_zone_size: usize) -> Standings {
    let period = snapshot.period;

    let leaderboard: Vec<LeaderboardEntry> = lifecycle::active_at(&snapshot.participants, period)
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            rank: i + 1,
            id: p.id.clone(),
            name: p.name.clone(),
            faction: p.faction_key().to_string(),
            power: p.power,
        })
        .collect();
    let n = leaderboard.len();

    let mut factions: BTreeMap<String, FactionStanding> = BTreeMap::new();
    for p in &snapshot.participants {
        let standing = factions
            .entry(p.faction_key().to_string())
            .or_insert_with(|| FactionStanding {
                faction: p.faction_key().to_string(),
                active: 0,
                eliminated: 0,
                average_power: None,
                rank_score: 0,
                best_rank: None,
            });
        if p.is_active_at(period) {
            standing.active += 1;
        } else {
            standing.eliminated += 1;
        }
    }

    let mut power_sums: BTreeMap<&str, f64> = BTreeMap::new();
    for entry in &leaderboard {
        *power_sums.entry(entry.faction.as_str()).or_default() += entry.power;
        if let Some(standing) = factions.get_mut(&entry.faction) {
            standing.rank_score += n - entry.rank + 1;
            standing.best_rank.get_or_insert(entry.rank);
        }
    }
    for standing in factions.values_mut() {
        if standing.active > 0 {
            let sum = power_sums.get(standing.faction.as_str()).copied().unwrap_or_default();
            standing.average_power = Some(sum / standing.active as f64);
        }
    }

    let mut factions: Vec<FactionStanding> = factions.into_values().collect();
    factions.sort_by(|a, b| b.rank_score.cmp(&a.rank_score).then_with(|| a.faction.cmp(&b.faction)));

    let danger_zone = leaderboard
        .iter()
        .rev()
        .take(danger_zone_size)
        .cloned()
        .collect();

    Standings {
        period,
        factions,
        leaderboard,
        danger_zone,
    }
}
