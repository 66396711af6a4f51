use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::participant::Participant;

/// One participant's single choice for a round: a target participant, or an
/// explicit pass. `selected_id` is `None` iff `is_passed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub id: Uuid,
    pub round_id: Uuid,
    pub selector_id: Uuid,
    pub selected_id: Option<Uuid>,
    /// Delivered to the selected participant only on a mutual match.
    pub message: Option<String>,
    pub is_passed: bool,
    pub submitted_at_ms: u64,
}

/// How a participant shows up on the live status board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    NotSelected,
    Selected,
    Passed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub participant_id: Uuid,
    pub nickname: String,
    pub status: SelectionStatus,
}

/// Live progress of a round's selection phase: the roster joined against the
/// ledger. Does not reveal who selected whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBoard {
    pub entries: Vec<StatusEntry>,
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub percentage: u32,
    pub all_completed: bool,
}

/// Per-round selection ledger. Holds at most one row per selector; repeat
/// submissions replace the row in place (change of mind), keeping the
/// original row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionLedger {
    round_id: Uuid,
    entries: Vec<Selection>,
}

impl SelectionLedger {
    pub fn new(round_id: Uuid) -> SelectionLedger {
        SelectionLedger {
            round_id,
            entries: Vec::new(),
        }
    }

    /// Insert or replace the row for `selector_id`. Validation is the round's
    /// job; the ledger only guarantees the one-row-per-selector invariant.
    pub fn upsert(
        &mut self,
        selector_id: Uuid,
        selected_id: Option<Uuid>,
        message: Option<String>,
        is_passed: bool,
        now_ms: u64,
    ) -> &Selection {
        if let Some(pos) = self.entries.iter().position(|s| s.selector_id == selector_id) {
            let row = &mut self.entries[pos];
            row.selected_id = selected_id;
            row.message = message;
            row.is_passed = is_passed;
            row.submitted_at_ms = now_ms;
            &self.entries[pos]
        } else {
            self.entries.push(Selection {
                id: Uuid::new_v4(),
                round_id: self.round_id,
                selector_id,
                selected_id,
                message,
                is_passed,
                submitted_at_ms: now_ms,
            });
            self.entries.last().unwrap()
        }
    }

    pub fn get(&self, selector_id: Uuid) -> Option<&Selection> {
        self.entries.iter().find(|s| s.selector_id == selector_id)
    }

    pub fn selections(&self) -> &[Selection] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Join the active roster against the ledger and report per-participant
    /// status plus aggregate completion counts.
    pub fn status_board(&self, roster: &[&Participant]) -> StatusBoard {
        let entries: Vec<StatusEntry> = roster
            .iter()
            .map(|p| {
                let status = match self.get(p.id) {
                    None => SelectionStatus::NotSelected,
                    Some(s) if s.is_passed => SelectionStatus::Passed,
                    Some(_) => SelectionStatus::Selected,
                };
                StatusEntry {
                    participant_id: p.id,
                    nickname: p.nickname.clone(),
                    status,
                }
            })
            .collect();

        let total = entries.len();
        let completed = entries
            .iter()
            .filter(|e| e.status != SelectionStatus::NotSelected)
            .count();
        let percentage = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };

        StatusBoard {
            total,
            completed,
            remaining: total - completed,
            percentage,
            all_completed: total > 0 && completed == total,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::{Character, Gender, Mbti};

    fn participant(nickname: &str, join_order: u32) -> Participant {
        Participant::new(
            nickname.to_string(),
            Gender::Other,
            Mbti::Enfp,
            Character::ALL[join_order as usize % Character::ALL.len()],
            join_order,
            0,
        )
    }

    #[test]
    fn test_upsert_inserts_then_replaces() {
        let mut ledger = SelectionLedger::new(Uuid::new_v4());
        let selector = Uuid::new_v4();
        let first_target = Uuid::new_v4();
        let second_target = Uuid::new_v4();

        let first_id = ledger.upsert(selector, Some(first_target), None, false, 10).id;
        assert_eq!(ledger.len(), 1);

        let row = ledger.upsert(selector, Some(second_target), Some("hi".to_string()), false, 20);
        assert_eq!(row.selected_id, Some(second_target));
        assert_eq!(row.message.as_deref(), Some("hi"));
        assert_eq!(row.id, first_id, "row id survives replacement");
        assert_eq!(ledger.len(), 1, "upsert never duplicates a selector row");
    }

    #[test]
    fn test_upsert_can_flip_to_pass() {
        let mut ledger = SelectionLedger::new(Uuid::new_v4());
        let selector = Uuid::new_v4();
        ledger.upsert(selector, Some(Uuid::new_v4()), None, false, 10);
        let row = ledger.upsert(selector, None, None, true, 20);
        assert!(row.is_passed);
        assert_eq!(row.selected_id, None);
    }

    #[test]
    fn test_status_board_classification() {
        let a = participant("aa", 1);
        let b = participant("bb", 2);
        let c = participant("cc", 3);
        let mut ledger = SelectionLedger::new(Uuid::new_v4());
        ledger.upsert(a.id, Some(b.id), None, false, 10);
        ledger.upsert(b.id, None, None, true, 11);

        let board = ledger.status_board(&[&a, &b, &c]);
        assert_eq!(board.total, 3);
        assert_eq!(board.completed, 2);
        assert_eq!(board.remaining, 1);
        assert_eq!(board.percentage, 67);
        assert!(!board.all_completed);

        let status_of = |id: Uuid| board.entries.iter().find(|e| e.participant_id == id).unwrap().status;
        assert_eq!(status_of(a.id), SelectionStatus::Selected);
        assert_eq!(status_of(b.id), SelectionStatus::Passed);
        assert_eq!(status_of(c.id), SelectionStatus::NotSelected);
    }

    #[test]
    fn test_status_board_all_completed() {
        let a = participant("aa", 1);
        let b = participant("bb", 2);
        let mut ledger = SelectionLedger::new(Uuid::new_v4());
        ledger.upsert(a.id, Some(b.id), None, false, 10);
        ledger.upsert(b.id, Some(a.id), None, false, 11);

        let board = ledger.status_board(&[&a, &b]);
        assert_eq!(board.percentage, 100);
        assert!(board.all_completed);
    }

    #[test]
    fn test_status_board_empty_roster() {
        let ledger = SelectionLedger::new(Uuid::new_v4());
        let board = ledger.status_board(&[]);
        assert_eq!(board.total, 0);
        assert_eq!(board.percentage, 0);
        assert!(!board.all_completed);
    }
}
