// 🚪 Elimination Lifecycle
//
// Active → Eliminated (terminal, one-way)
// Transition: current_period >= elimination_period (inclusive)
//
// Every component asks this module whether a participant is out; nothing
// re-derives it from roster columns on its own.

use crate::participant::{Participant, Trend};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EliminationState {
    Active,
    Eliminated { since: u32 },
}

impl EliminationState {
    pub fn is_active(&self) -> bool {
        matches!(self, EliminationState::Active)
    }

    pub fn is_eliminated(&self) -> bool {
        !self.is_active()
    }
}

/// State of a participant at `current_period`
pub fn state_at(elimination_period: Option<u32>, current_period: u32) -> EliminationState {
    match elimination_period {
        Some(since) if current_period >= since => EliminationState::Eliminated { since },
        _ => EliminationState::Active,
    }
}

/// Values an eliminated participant keeps for the rest of the season
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenStats {
    /// Period the values were taken from
    pub period: u32,
    pub power: f64,
    pub trend: Trend,
}

/// Last archived values at or before the elimination period
///
/// `history` must be ordered by period. Returns `None` when the participant
/// never appeared in the archive up to that point.
pub fn frozen_stats(id: &str, elimination_period: u32, history: &[Snapshot]) -> Option<FrozenStats> {
    history
        .iter()
        .rev()
        .filter(|s| s.period <= elimination_period)
        .find_map(|s| {
            s.get(id).map(|p| FrozenStats {
                period: s.period,
                power: p.power,
                trend: p.trend,
            })
        })
}

/// Participants counted in active aggregates at `period`
pub fn active_at<'a>(participants: &'a [Participant], period: u32) -> impl Iterator<Item = &'a Participant> {
    participants.iter().filter(move |p| p.is_active_at(period))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, power: f64) -> Participant {
        Participant {
            id: id.to_string(),
            name: id.to_uppercase(),
            faction: "Red".to_string(),
            power,
            observed_power: power,
            trend: Trend::Flat,
            rank: 1,
            win_rate: None,
            elimination_period: None,
            is_eliminated: false,
        }
    }

    fn history(powers: &[f64]) -> Vec<Snapshot> {
        powers
            .iter()
            .enumerate()
            .map(|(i, p)| Snapshot::new(i as u32, "test", vec![entry("p1", *p)]))
            .collect()
    }

    #[test]
    fn test_state_machine_threshold_is_inclusive() {
        assert_eq!(state_at(None, 100), EliminationState::Active);
        assert_eq!(state_at(Some(5), 4), EliminationState::Active);
        assert_eq!(state_at(Some(5), 5), EliminationState::Eliminated { since: 5 });
        assert_eq!(state_at(Some(5), 7), EliminationState::Eliminated { since: 5 });
    }

    #[test]
    fn test_frozen_stats_takes_last_at_or_before() {
        let history = history(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);

        let frozen = frozen_stats("p1", 5, &history).unwrap();
        assert_eq!(frozen.period, 5);
        assert_eq!(frozen.power, 6.0);

        // Elimination period beyond the archive: latest available
        let frozen = frozen_stats("p1", 20, &history).unwrap();
        assert_eq!(frozen.period, 6);
    }

    #[test]
    fn test_frozen_stats_unknown_participant() {
        let history = history(&[1.0, 2.0]);
        assert!(frozen_stats("ghost", 1, &history).is_none());
    }

    #[test]
    fn test_active_at_filters_eliminated() {
        let mut out = entry("p2", 1.0);
        out.elimination_period = Some(3);
        let roster = vec![entry("p1", 2.0), out];

        assert_eq!(active_at(&roster, 2).count(), 2);
        assert_eq!(active_at(&roster, 3).count(), 1);
    }
}
