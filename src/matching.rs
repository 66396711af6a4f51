use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::participant::Participant;
use crate::result::IntegrityViolation;
use crate::round::Round;
use crate::selection::SelectionStatus;

/// A round-scoped mutual pair. `participant_a < participant_b` under id
/// ordering, which is how the detector avoids emitting a pair twice. The
/// attached messages are revealed only here, on a mutual match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPair {
    pub round_id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub message_a_to_b: Option<String>,
    pub message_b_to_a: Option<String>,
}

impl MatchPair {
    pub fn contains(&self, id: Uuid) -> bool {
        self.participant_a == id || self.participant_b == id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStats {
    /// Active roster size at completion time.
    pub total_participants: usize,
    /// Non-passed selections.
    pub total_selections: usize,
    pub total_matches: usize,
    /// round(2 * matches / participants * 100): the share of the roster that
    /// ended up matched.
    pub matching_rate: u32,
    pub passed_participants: usize,
}

/// An active participant who did not end up in a match, annotated for the
/// results screen. Identities of non-mutual admirers are withheld; only the
/// count of incoming selections is exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedEntry {
    pub participant_id: Uuid,
    pub selection_status: SelectionStatus,
    pub selected_someone: bool,
    pub selected_by_count: usize,
}

/// The durable record of a completed round, recomputed on demand from the
/// ledger snapshot rather than persisted as mutable match rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round_id: Uuid,
    pub round_number: u32,
    pub matches: Vec<MatchPair>,
    pub stats: RoundStats,
    pub unmatched: Vec<UnmatchedEntry>,
    /// Times each participant was named in a non-passed selection this round.
    pub selected_counts: HashMap<Uuid, usize>,
}

fn rate(matched: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((matched as f64 / total as f64) * 100.0).round() as u32
    }
}

/// Compute the mutual matches and statistics for a completed round.
///
/// Pure and deterministic given its inputs. `roster` is the room's full
/// participant list, removed participants included, so every historical
/// selection stays resolvable; statistics are computed over the active
/// subset. Malformed input fails loudly, never silently dropped.
pub fn detect_matches(round: &Round, roster: &[Participant]) -> Result<RoundOutcome, IntegrityViolation> {
    let known: HashMap<Uuid, &Participant> = roster.iter().map(|p| (p.id, p)).collect();

    let mut lookup: HashMap<Uuid, Uuid> = HashMap::new();
    let mut seen_selectors: Vec<Uuid> = Vec::new();
    let mut selected_counts: HashMap<Uuid, usize> = HashMap::new();
    let mut passed = 0usize;

    for sel in round.ledger().selections() {
        if !known.contains_key(&sel.selector_id) {
            return Err(IntegrityViolation::UnknownSelector(sel.selector_id));
        }
        if seen_selectors.contains(&sel.selector_id) {
            return Err(IntegrityViolation::DuplicateSelector(sel.selector_id));
        }
        seen_selectors.push(sel.selector_id);

        if sel.is_passed {
            passed += 1;
            continue;
        }
        let target = match sel.selected_id {
            Some(t) => t,
            // Non-passed without a target never passes ledger validation;
            // seeing one here means the snapshot is corrupt.
            None => return Err(IntegrityViolation::UnknownTarget(Uuid::nil())),
        };
        if !known.contains_key(&target) {
            return Err(IntegrityViolation::UnknownTarget(target));
        }
        lookup.insert(sel.selector_id, target);
        *selected_counts.entry(target).or_insert(0) += 1;
    }

    let mut matches: Vec<MatchPair> = Vec::new();
    for (&s, &t) in lookup.iter() {
        // Emit each unordered pair once; id order is dedup only.
        if s < t && lookup.get(&t) == Some(&s) {
            let message_a_to_b = round.ledger().get(s).and_then(|row| row.message.clone());
            let message_b_to_a = round.ledger().get(t).and_then(|row| row.message.clone());
            matches.push(MatchPair {
                round_id: round.id(),
                participant_a: s,
                participant_b: t,
                message_a_to_b,
                message_b_to_a,
            });
        }
    }
    matches.sort_by_key(|m| m.participant_a);

    let active: Vec<&Participant> = roster.iter().filter(|p| p.is_active()).collect();
    let unmatched: Vec<UnmatchedEntry> = active
        .iter()
        .filter(|p| !matches.iter().any(|m| m.contains(p.id)))
        .map(|p| {
            let selection_status = match round.ledger().get(p.id) {
                None => SelectionStatus::NotSelected,
                Some(row) if row.is_passed => SelectionStatus::Passed,
                Some(_) => SelectionStatus::Selected,
            };
            UnmatchedEntry {
                participant_id: p.id,
                selection_status,
                selected_someone: selection_status == SelectionStatus::Selected,
                selected_by_count: selected_counts.get(&p.id).copied().unwrap_or(0),
            }
        })
        .collect();

    // Count matched participants from the active roster, not from the pairs:
    // a matched pair that leaves before completion must not inflate the rate.
    let matched_active = active.len() - unmatched.len();
    let stats = RoundStats {
        total_participants: active.len(),
        total_selections: lookup.len(),
        total_matches: matches.len(),
        matching_rate: rate(matched_active, active.len()),
        passed_participants: passed,
    };

    Ok(RoundOutcome {
        round_id: round.id(),
        round_number: round.round_number(),
        matches,
        stats,
        unmatched,
        selected_counts,
    })
}

/// Cross-round aggregation over every completed round of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub total_rounds: usize,
    pub total_matches: usize,
    pub total_participants: usize,
    pub overall_matching_rate: u32,
    /// Selected most often across rounds; ties broken by earliest join order.
    pub most_popular: Option<Uuid>,
    /// Most mutual matches across rounds; ties broken by earliest join order.
    pub matching_champion: Option<Uuid>,
}

impl GameStats {
    pub fn from_outcomes(outcomes: &[RoundOutcome], roster: &[Participant]) -> GameStats {
        let total_matches: usize = outcomes.iter().map(|o| o.stats.total_matches).sum();
        let total_participants: usize = outcomes.iter().map(|o| o.stats.total_participants).sum();
        let matched_participants: usize = outcomes
            .iter()
            .map(|o| o.stats.total_participants - o.unmatched.len())
            .sum();

        let join_order = |id: Uuid| {
            roster
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.join_order)
                .unwrap_or(u32::MAX)
        };

        let mut popularity: HashMap<Uuid, usize> = HashMap::new();
        for outcome in outcomes {
            for (&id, &count) in outcome.selected_counts.iter() {
                *popularity.entry(id).or_insert(0) += count;
            }
        }

        let mut match_counts: HashMap<Uuid, usize> = HashMap::new();
        for outcome in outcomes {
            for pair in &outcome.matches {
                *match_counts.entry(pair.participant_a).or_insert(0) += 1;
                *match_counts.entry(pair.participant_b).or_insert(0) += 1;
            }
        }

        let best = |counts: &HashMap<Uuid, usize>| {
            counts
                .iter()
                .filter(|&(_, &c)| c > 0)
                .min_by_key(|&(&id, &c)| (std::cmp::Reverse(c), join_order(id)))
                .map(|(&id, _)| id)
        };

        GameStats {
            total_rounds: outcomes.len(),
            total_matches,
            total_participants,
            overall_matching_rate: rate(matched_participants, total_participants),
            most_popular: best(&popularity),
            matching_champion: best(&match_counts),
        }
    }
}
