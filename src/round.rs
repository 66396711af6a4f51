use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::participant::Participant;
use crate::result::{SubmitError, TransitionError, ValidationError};
use crate::selection::{Selection, SelectionLedger};
use crate::validation::validate_message;

/// Lifecycle of a round. Persistence layers that only distinguish
/// pending/active/completed map both `FreeTime` and `SelectionTime` onto
/// "active"; the finer phase is recovered from the tagged variant and the
/// phase timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Pending,
    FreeTime,
    SelectionTime,
    Completed,
}

/// A selection submission as received from a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub selector_id: Uuid,
    pub selected_id: Option<Uuid>,
    pub message: Option<String>,
    pub is_passed: bool,
}

/// One timed cycle of free talk followed by selection, tied to one question.
/// Phase timestamps are stamped exactly once each and are monotonic because
/// each stamp is guarded by the phase it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    id: Uuid,
    round_number: u32,
    question_id: Uuid,
    phase: RoundPhase,
    started_at_ms: Option<u64>,
    free_time_started_at_ms: Option<u64>,
    selection_time_started_at_ms: Option<u64>,
    ended_at_ms: Option<u64>,
    paused_since_ms: Option<u64>,
    paused_total_ms: u64,
    ledger: SelectionLedger,
}

impl Round {
    pub fn new(round_number: u32, question_id: Uuid) -> Round {
        let id = Uuid::new_v4();
        Round {
            id,
            round_number,
            question_id,
            phase: RoundPhase::Pending,
            started_at_ms: None,
            free_time_started_at_ms: None,
            selection_time_started_at_ms: None,
            ended_at_ms: None,
            paused_since_ms: None,
            paused_total_ms: 0,
            ledger: SelectionLedger::new(id),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn question_id(&self) -> Uuid {
        self.question_id
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, RoundPhase::FreeTime | RoundPhase::SelectionTime)
    }

    pub fn is_paused(&self) -> bool {
        self.paused_since_ms.is_some()
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.started_at_ms
    }

    pub fn free_time_started_at_ms(&self) -> Option<u64> {
        self.free_time_started_at_ms
    }

    pub fn selection_time_started_at_ms(&self) -> Option<u64> {
        self.selection_time_started_at_ms
    }

    pub fn ended_at_ms(&self) -> Option<u64> {
        self.ended_at_ms
    }

    pub fn paused_total_ms(&self) -> u64 {
        self.paused_total_ms
    }

    /// Timestamp at which the current phase began, if the round is active.
    pub fn phase_started_at_ms(&self) -> Option<u64> {
        match self.phase {
            RoundPhase::FreeTime => self.free_time_started_at_ms,
            RoundPhase::SelectionTime => self.selection_time_started_at_ms,
            _ => None,
        }
    }

    pub fn ledger(&self) -> &SelectionLedger {
        &self.ledger
    }

    fn invalid(&self, requested: RoundPhase) -> TransitionError {
        TransitionError::InvalidPhase {
            current: self.phase,
            requested,
        }
    }

    /// Fold an open pause interval into the accumulated total.
    fn fold_pause(&mut self, now_ms: u64) {
        if let Some(since) = self.paused_since_ms.take() {
            self.paused_total_ms += now_ms.saturating_sub(since);
        }
    }

    /// Pending -> FreeTime. Stamps `started_at` and `free_time_started_at`.
    pub fn start(&mut self, now_ms: u64) -> Result<(), TransitionError> {
        if self.phase != RoundPhase::Pending {
            return Err(self.invalid(RoundPhase::FreeTime));
        }
        self.started_at_ms = Some(now_ms);
        self.free_time_started_at_ms = Some(now_ms);
        self.phase = RoundPhase::FreeTime;
        Ok(())
    }

    /// FreeTime -> SelectionTime. Stamps `selection_time_started_at`.
    pub fn advance_to_selection(&mut self, now_ms: u64) -> Result<(), TransitionError> {
        if self.phase != RoundPhase::FreeTime {
            return Err(self.invalid(RoundPhase::SelectionTime));
        }
        self.fold_pause(now_ms);
        self.selection_time_started_at_ms = Some(now_ms);
        self.phase = RoundPhase::SelectionTime;
        Ok(())
    }

    /// SelectionTime -> Completed, or FreeTime -> Completed when the host
    /// force-ends the round early. Stamps `ended_at`; the round is immutable
    /// afterwards.
    pub fn complete(&mut self, now_ms: u64) -> Result<(), TransitionError> {
        if !self.is_active() {
            return Err(self.invalid(RoundPhase::Completed));
        }
        self.fold_pause(now_ms);
        self.ended_at_ms = Some(now_ms);
        self.phase = RoundPhase::Completed;
        Ok(())
    }

    /// Freeze the active timer without altering phase.
    pub fn pause(&mut self, now_ms: u64) -> Result<(), TransitionError> {
        if !self.is_active() {
            return Err(self.invalid(self.phase));
        }
        if self.paused_since_ms.is_some() {
            return Err(TransitionError::AlreadyPaused);
        }
        self.paused_since_ms = Some(now_ms);
        Ok(())
    }

    pub fn resume(&mut self, now_ms: u64) -> Result<(), TransitionError> {
        if !self.is_active() {
            return Err(self.invalid(self.phase));
        }
        if self.paused_since_ms.is_none() {
            return Err(TransitionError::NotPaused);
        }
        self.fold_pause(now_ms);
        Ok(())
    }

    /// Record or replace the selector's choice for this round.
    ///
    /// Validation short-circuits in order: phase, pass/target consistency,
    /// target membership, message length. Submissions are accepted during
    /// free talk as well as selection time; the phase is re-checked here, at
    /// write time, so a submission racing `complete()` fails `RoundClosed`
    /// instead of landing late.
    pub fn submit_selection(
        &mut self,
        req: SelectionRequest,
        roster: &[Participant],
        now_ms: u64,
    ) -> Result<Selection, SubmitError> {
        match self.phase {
            RoundPhase::Pending => return Err(SubmitError::RoundNotOpen),
            RoundPhase::Completed => return Err(SubmitError::RoundClosed),
            RoundPhase::FreeTime | RoundPhase::SelectionTime => {}
        }

        if req.is_passed && req.selected_id.is_some() {
            return Err(ValidationError::PassWithTarget.into());
        }
        if !req.is_passed && req.selected_id.is_none() {
            return Err(ValidationError::TargetRequired.into());
        }

        let selector_ok = roster
            .iter()
            .any(|p| p.id == req.selector_id && p.is_active());
        if !selector_ok {
            return Err(ValidationError::SelectorNotInRoom.into());
        }

        if let Some(target) = req.selected_id {
            if target == req.selector_id {
                return Err(ValidationError::SelfSelection.into());
            }
            match roster.iter().find(|p| p.id == target) {
                None => return Err(ValidationError::TargetNotInRoom.into()),
                Some(p) if !p.is_selectable() => {
                    return Err(ValidationError::TargetUnavailable.into())
                }
                Some(_) => {}
            }
        }

        let message = match req.message.as_deref() {
            Some(raw) => {
                let trimmed = validate_message(raw)?;
                if trimmed.is_empty() { None } else { Some(trimmed) }
            }
            None => None,
        };

        let row = self
            .ledger
            .upsert(req.selector_id, req.selected_id, message, req.is_passed, now_ms);
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::{Character, Gender, Mbti, ParticipantStatus};

    fn roster(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| {
                Participant::new(
                    format!("p{}", i),
                    Gender::Other,
                    Mbti::Enfp,
                    Character::ALL[i % Character::ALL.len()],
                    i as u32 + 1,
                    0,
                )
            })
            .collect()
    }

    fn active_round() -> Round {
        let mut round = Round::new(1, Uuid::new_v4());
        round.start(1_000).unwrap();
        round
    }

    fn select(selector: Uuid, target: Uuid) -> SelectionRequest {
        SelectionRequest {
            selector_id: selector,
            selected_id: Some(target),
            message: None,
            is_passed: false,
        }
    }

    fn pass(selector: Uuid) -> SelectionRequest {
        SelectionRequest {
            selector_id: selector,
            selected_id: None,
            message: None,
            is_passed: true,
        }
    }

    #[test]
    fn test_full_lifecycle_stamps_monotonic_timestamps() {
        let mut round = Round::new(1, Uuid::new_v4());
        assert_eq!(round.phase(), RoundPhase::Pending);

        round.start(1_000).unwrap();
        assert_eq!(round.phase(), RoundPhase::FreeTime);
        round.advance_to_selection(2_000).unwrap();
        assert_eq!(round.phase(), RoundPhase::SelectionTime);
        round.complete(3_000).unwrap();
        assert_eq!(round.phase(), RoundPhase::Completed);

        let free = round.free_time_started_at_ms().unwrap();
        let sel = round.selection_time_started_at_ms().unwrap();
        let end = round.ended_at_ms().unwrap();
        assert!(free <= sel && sel <= end);
        assert_eq!(round.started_at_ms().unwrap(), free);
    }

    #[test]
    fn test_start_twice_is_invalid() {
        let mut round = active_round();
        assert_eq!(
            round.start(2_000),
            Err(TransitionError::InvalidPhase {
                current: RoundPhase::FreeTime,
                requested: RoundPhase::FreeTime,
            })
        );
    }

    #[test]
    fn test_advance_from_pending_is_invalid() {
        let mut round = Round::new(1, Uuid::new_v4());
        assert!(matches!(
            round.advance_to_selection(1_000),
            Err(TransitionError::InvalidPhase { current: RoundPhase::Pending, .. })
        ));
    }

    #[test]
    fn test_complete_from_pending_is_invalid() {
        let mut round = Round::new(1, Uuid::new_v4());
        assert!(round.complete(1_000).is_err());
    }

    #[test]
    fn test_host_can_force_end_from_free_time() {
        let mut round = active_round();
        round.complete(5_000).unwrap();
        assert_eq!(round.phase(), RoundPhase::Completed);
        assert_eq!(round.selection_time_started_at_ms(), None);
    }

    #[test]
    fn test_second_complete_is_invalid() {
        // Two timer expiries racing: the loser must observe InvalidPhase.
        let mut round = active_round();
        round.advance_to_selection(2_000).unwrap();
        round.complete(3_000).unwrap();
        assert_eq!(
            round.complete(3_001),
            Err(TransitionError::InvalidPhase {
                current: RoundPhase::Completed,
                requested: RoundPhase::Completed,
            })
        );
    }

    #[test]
    fn test_pause_resume_accumulates_duration() {
        let mut round = active_round();
        round.pause(2_000).unwrap();
        assert!(round.is_paused());
        round.resume(2_700).unwrap();
        assert!(!round.is_paused());
        round.pause(3_000).unwrap();
        round.resume(3_300).unwrap();
        assert_eq!(round.paused_total_ms(), 1_000);
    }

    #[test]
    fn test_double_pause_and_stray_resume() {
        let mut round = active_round();
        assert_eq!(round.resume(1_500), Err(TransitionError::NotPaused));
        round.pause(2_000).unwrap();
        assert_eq!(round.pause(2_100), Err(TransitionError::AlreadyPaused));
    }

    #[test]
    fn test_pause_requires_active_round() {
        let mut round = Round::new(1, Uuid::new_v4());
        assert!(round.pause(1_000).is_err());
        round.start(1_000).unwrap();
        round.complete(2_000).unwrap();
        assert!(round.pause(3_000).is_err());
    }

    #[test]
    fn test_complete_while_paused_folds_open_interval() {
        let mut round = active_round();
        round.advance_to_selection(2_000).unwrap();
        round.pause(2_500).unwrap();
        round.complete(3_000).unwrap();
        assert_eq!(round.paused_total_ms(), 500);
        assert_eq!(round.phase(), RoundPhase::Completed);
    }

    #[test]
    fn test_submit_before_start_rejected() {
        let roster = roster(2);
        let mut round = Round::new(1, Uuid::new_v4());
        let req = select(roster[0].id, roster[1].id);
        assert_eq!(
            round.submit_selection(req, &roster, 1_000),
            Err(SubmitError::RoundNotOpen)
        );
    }

    #[test]
    fn test_submit_after_complete_rejected() {
        let roster = roster(2);
        let mut round = active_round();
        round.complete(2_000).unwrap();
        let req = select(roster[0].id, roster[1].id);
        assert_eq!(
            round.submit_selection(req, &roster, 3_000),
            Err(SubmitError::RoundClosed)
        );
    }

    #[test]
    fn test_submit_during_free_time_accepted() {
        let roster = roster(2);
        let mut round = active_round();
        let req = select(roster[0].id, roster[1].id);
        assert!(round.submit_selection(req, &roster, 1_500).is_ok());
    }

    #[test]
    fn test_pass_with_target_always_rejected() {
        let roster = roster(2);
        let mut round = active_round();
        let req = SelectionRequest {
            selector_id: roster[0].id,
            selected_id: Some(roster[1].id),
            message: None,
            is_passed: true,
        };
        assert_eq!(
            round.submit_selection(req, &roster, 1_500),
            Err(SubmitError::Validation(ValidationError::PassWithTarget))
        );
    }

    #[test]
    fn test_non_pass_requires_target() {
        let roster = roster(2);
        let mut round = active_round();
        let req = SelectionRequest {
            selector_id: roster[0].id,
            selected_id: None,
            message: None,
            is_passed: false,
        };
        assert_eq!(
            round.submit_selection(req, &roster, 1_500),
            Err(SubmitError::Validation(ValidationError::TargetRequired))
        );
    }

    #[test]
    fn test_self_selection_always_rejected() {
        let roster = roster(2);
        let mut round = active_round();
        let req = select(roster[0].id, roster[0].id);
        assert_eq!(
            round.submit_selection(req, &roster, 1_500),
            Err(SubmitError::Validation(ValidationError::SelfSelection))
        );
    }

    #[test]
    fn test_target_outside_room_rejected() {
        let roster = roster(2);
        let mut round = active_round();
        let req = select(roster[0].id, Uuid::new_v4());
        assert_eq!(
            round.submit_selection(req, &roster, 1_500),
            Err(SubmitError::Validation(ValidationError::TargetNotInRoom))
        );
    }

    #[test]
    fn test_removed_or_finished_target_rejected() {
        let mut roster = roster(3);
        roster[1].removed = true;
        roster[2].status = ParticipantStatus::Finished;
        let mut round = active_round();

        let req = select(roster[0].id, roster[1].id);
        assert_eq!(
            round.submit_selection(req, &roster, 1_500),
            Err(SubmitError::Validation(ValidationError::TargetUnavailable))
        );
        let req = select(roster[0].id, roster[2].id);
        assert_eq!(
            round.submit_selection(req, &roster, 1_500),
            Err(SubmitError::Validation(ValidationError::TargetUnavailable))
        );
    }

    #[test]
    fn test_unknown_selector_rejected() {
        let roster = roster(2);
        let mut round = active_round();
        let req = select(Uuid::new_v4(), roster[1].id);
        assert_eq!(
            round.submit_selection(req, &roster, 1_500),
            Err(SubmitError::Validation(ValidationError::SelectorNotInRoom))
        );
    }

    #[test]
    fn test_long_message_rejected() {
        let roster = roster(2);
        let mut round = active_round();
        let req = SelectionRequest {
            selector_id: roster[0].id,
            selected_id: Some(roster[1].id),
            message: Some("x".repeat(51)),
            is_passed: false,
        };
        assert_eq!(
            round.submit_selection(req, &roster, 1_500),
            Err(SubmitError::Validation(ValidationError::MessageTooLong))
        );
    }

    #[test]
    fn test_blank_message_stored_as_none() {
        let roster = roster(2);
        let mut round = active_round();
        let req = SelectionRequest {
            selector_id: roster[0].id,
            selected_id: Some(roster[1].id),
            message: Some("   ".to_string()),
            is_passed: false,
        };
        let row = round.submit_selection(req, &roster, 1_500).unwrap();
        assert_eq!(row.message, None);
    }

    #[test]
    fn test_resubmission_upserts_single_row() {
        let roster = roster(3);
        let mut round = active_round();
        round.advance_to_selection(2_000).unwrap();

        round
            .submit_selection(select(roster[0].id, roster[1].id), &roster, 2_100)
            .unwrap();
        round
            .submit_selection(select(roster[0].id, roster[2].id), &roster, 2_200)
            .unwrap();
        round
            .submit_selection(pass(roster[0].id), &roster, 2_300)
            .unwrap();

        assert_eq!(round.ledger().len(), 1);
        let row = round.ledger().get(roster[0].id).unwrap();
        assert!(row.is_passed);
        assert_eq!(row.selected_id, None);
    }
}
