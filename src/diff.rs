// 🔀 Diff & Movers Engine
// Two snapshots in, ranked deltas out. No hidden state: same inputs,
// byte-identical output.
//
// - delta = curr.power - prev.power, rounded to 2 decimals
// - first appearance (id absent in prev) has no delta and is not a mover
// - risers: all deltas descending; fallers: all deltas ascending

use crate::config::MoverLimits;
use crate::participant::Participant;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub id: String,
    pub name: String,
    pub faction: String,
    pub prev_power: f64,
    pub curr_power: f64,
    pub delta: f64,
    pub prev_rank: usize,
    pub curr_rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionMovers {
    pub risers: Vec<Mover>,
    pub fallers: Vec<Mover>,
    pub biggest_rise: Option<Mover>,
    pub biggest_fall: Option<Mover>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub prev_period: u32,
    pub period: u32,

    /// Every entry in the current snapshot, with or without a delta
    pub compared_players: usize,
    pub new_entries: usize,
    pub rose: usize,
    pub fell: usize,
    pub unchanged: usize,

    /// Largest absolute delta
    pub top_mover: Option<Mover>,
    pub top_risers: Vec<Mover>,
    pub top_fallers: Vec<Mover>,
    pub factions: BTreeMap<String, FactionMovers>,
}

fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn mover(prev: &Participant, curr: &Participant) -> Mover {
    Mover {
        id: curr.id.clone(),
        name: curr.name.clone(),
        faction: curr.faction_key().to_string(),
        prev_power: prev.power,
        curr_power: curr.power,
        delta: round2(curr.power - prev.power),
        prev_rank: prev.rank,
        curr_rank: curr.rank,
    }
}

/// Sorted copies of `movers`: (risers, fallers), each truncated to `limit`
fn rank_movers(movers: &[Mover], limit: usize) -> (Vec<Mover>, Vec<Mover>) {
    let mut risers = movers.to_vec();
    risers.sort_by(|a, b| b.delta.total_cmp(&a.delta));
    risers.truncate(limit);

    let mut fallers = movers.to_vec();
    fallers.sort_by(|a, b| a.delta.total_cmp(&b.delta));
    fallers.truncate(limit);

    (risers, fallers)
}

/// Compare two snapshots with the default limits (top 10 / top 5 per faction)
pub fn diff(prev: &Snapshot, curr: &Snapshot) -> EpisodeSummary {
    diff_with(prev, curr, &MoverLimits::default())
}

pub fn diff_with(prev: &Snapshot, curr: &Snapshot, limits: &MoverLimits) -> EpisodeSummary {
    let prev_by_id: HashMap<&str, &Participant> = prev
        .participants
        .iter()
        .map(|p| (p.id.as_str(), p))
        .collect();
    let current = &curr.participants;

    // Movers in current-snapshot order; sorts below are stable on it
    let movers: Vec<Mover> = current
        .iter()
        .filter_map(|c| prev_by_id.get(c.id.as_str()).map(|p| mover(p, c)))
        .collect();

    let rose = movers.iter().filter(|m| m.delta > 0.0).count();
    let fell = movers.iter().filter(|m| m.delta < 0.0).count();

    let top_mover = movers
        .iter()
        .fold(None::<&Mover>, |best, m| match best {
            Some(b) if b.delta.abs() >= m.delta.abs() => Some(b),
            _ => Some(m),
        })
        .cloned();

    let (top_risers, top_fallers) = rank_movers(&movers, limits.global_top_n);

    let mut grouped: BTreeMap<String, Vec<Mover>> = BTreeMap::new();
    for m in &movers {
        grouped.entry(m.faction.clone()).or_default().push(m.clone());
    }
    let factions = grouped
        .into_iter()
        .map(|(faction, group)| {
            let (risers, fallers) = rank_movers(&group, limits.faction_top_n);
            let movers = FactionMovers {
                biggest_rise: risers.first().cloned(),
                biggest_fall: fallers.first().cloned(),
                risers,
                fallers,
            };
            (faction, movers)
        })
        .collect();

    EpisodeSummary {
        prev_period: prev.period,
        period: curr.period,
        compared_players: current.len(),
        new_entries: current.len() - movers.len(),
        rose,
        fell,
        unchanged: movers.len() - rose - fell,
        top_mover,
        top_risers,
        top_fallers,
        factions,
    }
}
