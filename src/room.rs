use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::matching::{detect_matches, GameStats, RoundOutcome};
use crate::participant::{Character, Participant, ParticipantStatus, Profile};
use crate::registry::{self, UniqueField};
use crate::result::{
    CompleteError, JoinError, SettingsError, SubmitError, TransitionError, TransitionSuccess,
    ValidationError,
};
use crate::round::{Round, RoundPhase, SelectionRequest};
use crate::selection::{Selection, StatusBoard};
use crate::validation::validate_nickname;

pub const MIN_PARTICIPANTS: u8 = 2;
pub const MAX_PARTICIPANTS: u8 = 8;
pub const MIN_ROUNDS: u8 = 3;
pub const MAX_ROUNDS: u8 = 10;

/// Overall game status. Transitions are monotonic forward, except that
/// cancellation is reachable from any pre-completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub max_participants: u8,
    pub total_rounds: u8,
}

impl RoomSettings {
    pub fn new(max_participants: u8, total_rounds: u8) -> Result<RoomSettings, ValidationError> {
        let settings = RoomSettings { max_participants, total_rounds };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_participants < MIN_PARTICIPANTS || self.max_participants > MAX_PARTICIPANTS {
            return Err(ValidationError::BadSettings(
                "max participants must be between 2 and 8".to_string(),
            ));
        }
        if self.total_rounds < MIN_ROUNDS || self.total_rounds > MAX_ROUNDS {
            return Err(ValidationError::BadSettings(
                "total rounds must be between 3 and 10".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial settings update; `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RoomSettingsPatch {
    pub max_participants: Option<u8>,
    pub total_rounds: Option<u8>,
}

/// Round phase durations driven by the manager's timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundTimerConfig {
    pub free_time_secs: u64,
    pub selection_time_secs: u64,
}

/// One game instance: the coordinating aggregate that owns participants,
/// rounds, and completed-round outcomes. Every mutation goes through here,
/// which is what keeps the uniqueness and single-active-round invariants
/// checkable at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    id: Uuid,
    /// 6-char `[A-Z0-9]` code, immutable for the room's lifetime.
    code: String,
    settings: RoomSettings,
    status: RoomStatus,
    host_id: Uuid,
    participants: Vec<Participant>,
    rounds: Vec<Round>,
    outcomes: Vec<RoundOutcome>,
    used_question_ids: Vec<Uuid>,
    timer: Option<RoundTimerConfig>,
    join_seq: u32,
    created_at_ms: u64,
}

impl Room {
    /// Create a room with the host as participant #1.
    pub fn create(
        settings: RoomSettings,
        host_profile: Profile,
        code: String,
        timer: Option<RoundTimerConfig>,
        now_ms: u64,
    ) -> Result<Room, JoinError> {
        settings.validate()?;
        let nickname = validate_nickname(&host_profile.nickname)?;
        let host = Participant::new(
            nickname,
            host_profile.gender,
            host_profile.mbti,
            host_profile.character,
            1,
            now_ms,
        );
        let host_id = host.id;
        Ok(Room {
            id: Uuid::new_v4(),
            code,
            settings,
            status: RoomStatus::Waiting,
            host_id,
            participants: vec![host],
            rounds: Vec::new(),
            outcomes: Vec::new(),
            used_question_ids: Vec::new(),
            timer,
            join_seq: 1,
            created_at_ms: now_ms,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn settings(&self) -> RoomSettings {
        self.settings
    }

    pub fn host_id(&self) -> Uuid {
        self.host_id
    }

    pub fn timer(&self) -> Option<RoundTimerConfig> {
        self.timer
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, RoomStatus::Completed | RoomStatus::Cancelled)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn active_participants(&self) -> Vec<&Participant> {
        self.participants.iter().filter(|p| p.is_active()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_active()).count()
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn round(&self, round_number: u32) -> Option<&Round> {
        self.rounds.iter().find(|r| r.round_number() == round_number)
    }

    pub fn outcomes(&self) -> &[RoundOutcome] {
        &self.outcomes
    }

    /// The earliest round that has not completed. `None` once every round is
    /// completed (or none has started) — a completed round is never
    /// "current".
    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.iter().find(|r| r.phase() != RoundPhase::Completed)
    }

    fn current_round_mut(&mut self) -> Option<&mut Round> {
        self.rounds.iter_mut().find(|r| r.phase() != RoundPhase::Completed)
    }

    /// Join an anonymous participant through the room code.
    ///
    /// Uniqueness is re-checked here, at write time; callers serialize joins
    /// per room (the manager holds the room's write lock), which closes the
    /// race between two joiners claiming the same character.
    pub fn join(&mut self, profile: Profile, now_ms: u64) -> Result<Uuid, JoinError> {
        if self.status != RoomStatus::Waiting {
            return Err(JoinError::RoomClosed);
        }
        if self.active_count() >= self.settings.max_participants as usize {
            return Err(JoinError::RoomFull);
        }
        let nickname = validate_nickname(&profile.nickname)?;
        registry::reserve(&self.participants, UniqueField::Nickname, &nickname, None)?;
        registry::reserve(
            &self.participants,
            UniqueField::Character,
            profile.character.label(),
            None,
        )?;

        self.join_seq += 1;
        let participant = Participant::new(
            nickname,
            profile.gender,
            profile.mbti,
            profile.character,
            self.join_seq,
            now_ms,
        );
        let id = participant.id;
        self.participants.push(participant);
        Ok(id)
    }

    /// Update a participant's nickname and/or character, re-checking
    /// uniqueness against everyone else.
    pub fn update_profile(
        &mut self,
        participant_id: Uuid,
        nickname: Option<&str>,
        character: Option<Character>,
    ) -> Result<(), JoinError> {
        if !self.participants.iter().any(|p| p.id == participant_id && p.is_active()) {
            return Err(JoinError::Validation(ValidationError::SelectorNotInRoom));
        }
        let nickname = match nickname {
            Some(raw) => {
                let valid = validate_nickname(raw)?;
                registry::reserve(
                    &self.participants,
                    UniqueField::Nickname,
                    &valid,
                    Some(participant_id),
                )?;
                Some(valid)
            }
            None => None,
        };
        if let Some(character) = character {
            registry::reserve(
                &self.participants,
                UniqueField::Character,
                character.label(),
                Some(participant_id),
            )?;
        }

        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.id == participant_id)
            .unwrap();
        if let Some(nickname) = nickname {
            participant.nickname = nickname;
        }
        if let Some(character) = character {
            participant.character = character;
        }
        Ok(())
    }

    pub fn set_participant_status(
        &mut self,
        participant_id: Uuid,
        status: ParticipantStatus,
    ) -> Result<(), ValidationError> {
        match self.participants.iter_mut().find(|p| p.id == participant_id && p.is_active()) {
            Some(p) => {
                p.status = status;
                Ok(())
            }
            None => Err(ValidationError::SelectorNotInRoom),
        }
    }

    /// Flag a participant as removed, freeing their nickname and character.
    /// If the host leaves, hosting moves to the earliest joined active
    /// participant.
    pub fn remove_participant(&mut self, participant_id: Uuid) -> Result<(), ValidationError> {
        match self.participants.iter_mut().find(|p| p.id == participant_id && !p.removed) {
            Some(p) => p.removed = true,
            None => return Err(ValidationError::SelectorNotInRoom),
        }
        if self.host_id == participant_id {
            if let Some(next) = self
                .participants
                .iter()
                .filter(|p| p.is_active())
                .min_by_key(|p| p.join_order)
            {
                self.host_id = next.id;
            }
        }
        Ok(())
    }

    pub fn transfer_host(&mut self, new_host_id: Uuid) -> Result<(), ValidationError> {
        if !self.participants.iter().any(|p| p.id == new_host_id && p.is_active()) {
            return Err(ValidationError::SelectorNotInRoom);
        }
        self.host_id = new_host_id;
        Ok(())
    }

    /// Cancel the room. Reachable from any pre-completed state; no further
    /// rounds may start and in-flight submissions fail `RoundClosed`.
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        if self.is_closed() {
            return Err(TransitionError::RoomClosed { status: self.status });
        }
        self.status = RoomStatus::Cancelled;
        Ok(())
    }

    /// Settings may only change while the room is still waiting, and the cap
    /// may not drop below the current active participant count.
    pub fn update_settings(&mut self, patch: RoomSettingsPatch) -> Result<(), SettingsError> {
        if self.status != RoomStatus::Waiting {
            return Err(SettingsError::Locked);
        }
        let updated = RoomSettings {
            max_participants: patch.max_participants.unwrap_or(self.settings.max_participants),
            total_rounds: patch.total_rounds.unwrap_or(self.settings.total_rounds),
        };
        updated.validate()?;
        if (updated.max_participants as usize) < self.active_count() {
            return Err(ValidationError::BadSettings(
                "max participants below current count".to_string(),
            )
            .into());
        }
        self.settings = updated;
        Ok(())
    }

    /// Start round `round_number` with the given question.
    ///
    /// Guards: the game is not over, the room is open, no other round is
    /// active, the number is the next in sequence, and the question has not
    /// been used in this game. The first round flips the room to `InProgress`
    /// and the roster to `Playing`.
    pub fn start_round(
        &mut self,
        round_number: u32,
        question_id: Uuid,
        now_ms: u64,
    ) -> Result<&Round, TransitionError> {
        // A completed game reports the specific reason a round cannot start.
        if self.status == RoomStatus::Completed {
            return Err(TransitionError::AllRoundsPlayed);
        }
        if self.is_closed() {
            return Err(TransitionError::RoomClosed { status: self.status });
        }
        if self.current_round().is_some() {
            return Err(TransitionError::ActiveRoundExists);
        }
        let expected = self.rounds.len() as u32 + 1;
        if round_number != expected {
            return Err(TransitionError::BadRoundNumber {
                requested: round_number,
                expected,
            });
        }
        if self.used_question_ids.contains(&question_id) {
            return Err(TransitionError::QuestionRepeated);
        }

        let mut round = Round::new(round_number, question_id);
        round.start(now_ms)?;
        self.used_question_ids.push(question_id);
        self.rounds.push(round);

        if self.status == RoomStatus::Waiting {
            self.status = RoomStatus::InProgress;
        }
        for p in self.participants.iter_mut().filter(|p| p.is_active()) {
            p.status = ParticipantStatus::Playing;
        }
        Ok(self.rounds.last().unwrap())
    }

    pub fn advance_to_selection(&mut self, now_ms: u64) -> Result<TransitionSuccess, TransitionError> {
        if self.is_closed() {
            return Err(TransitionError::RoomClosed { status: self.status });
        }
        match self.current_round_mut() {
            Some(round) => {
                round.advance_to_selection(now_ms)?;
                Ok(TransitionSuccess::SelectionTimeStarted)
            }
            None => Err(TransitionError::NoCurrentRound),
        }
    }

    /// Complete the current round and synchronously run the match detector
    /// over its ledger snapshot. The detector's output becomes the round's
    /// durable record. Completing the final round completes the game.
    pub fn complete_round(
        &mut self,
        now_ms: u64,
    ) -> Result<(TransitionSuccess, RoundOutcome), CompleteError> {
        if self.is_closed() {
            return Err(TransitionError::RoomClosed { status: self.status }.into());
        }
        let total_rounds = self.settings.total_rounds as u32;
        let round = match self.current_round_mut() {
            Some(round) => round,
            None => return Err(TransitionError::NoCurrentRound.into()),
        };
        round.complete(now_ms)?;
        let finished_number = round.round_number();

        let round = self.rounds.iter().find(|r| r.round_number() == finished_number).unwrap();
        let outcome = match detect_matches(round, &self.participants) {
            Ok(outcome) => outcome,
            Err(violation) => {
                log::error!(
                    "Round {} of room {} produced an inconsistent ledger: {}",
                    finished_number, self.code, violation
                );
                return Err(violation.into());
            }
        };
        self.outcomes.push(outcome.clone());

        if finished_number >= total_rounds {
            self.status = RoomStatus::Completed;
            for p in self.participants.iter_mut().filter(|p| p.is_active()) {
                p.status = ParticipantStatus::Finished;
            }
            Ok((TransitionSuccess::GameCompleted, outcome))
        } else {
            Ok((TransitionSuccess::RoundCompleted, outcome))
        }
    }

    pub fn pause_round(&mut self, now_ms: u64) -> Result<TransitionSuccess, TransitionError> {
        if self.is_closed() {
            return Err(TransitionError::RoomClosed { status: self.status });
        }
        match self.current_round_mut() {
            Some(round) => {
                round.pause(now_ms)?;
                Ok(TransitionSuccess::Paused)
            }
            None => Err(TransitionError::NoCurrentRound),
        }
    }

    pub fn resume_round(&mut self, now_ms: u64) -> Result<TransitionSuccess, TransitionError> {
        if self.is_closed() {
            return Err(TransitionError::RoomClosed { status: self.status });
        }
        match self.current_round_mut() {
            Some(round) => {
                round.resume(now_ms)?;
                Ok(TransitionSuccess::Resumed)
            }
            None => Err(TransitionError::NoCurrentRound),
        }
    }

    /// Record a participant's selection for the current round. The room
    /// status and round phase are both re-checked here so a submission racing
    /// cancellation or completion fails `RoundClosed` rather than landing
    /// after the fact.
    pub fn submit_selection(
        &mut self,
        req: SelectionRequest,
        now_ms: u64,
    ) -> Result<Selection, SubmitError> {
        if self.is_closed() {
            return Err(SubmitError::RoundClosed);
        }
        let no_rounds = self.rounds.is_empty();
        // Split borrow: the round needs &mut, the roster is read-only.
        let participants = std::mem::take(&mut self.participants);
        let result = match self.rounds.iter_mut().find(|r| r.phase() != RoundPhase::Completed) {
            Some(round) => round.submit_selection(req, &participants, now_ms),
            None if no_rounds => Err(SubmitError::RoundNotOpen),
            None => Err(SubmitError::RoundClosed),
        };
        self.participants = participants;
        result
    }

    /// Live selection progress for the current round.
    pub fn status_board(&self) -> Result<StatusBoard, TransitionError> {
        match self.current_round() {
            Some(round) => Ok(round.ledger().status_board(&self.active_participants())),
            None => Err(TransitionError::NoCurrentRound),
        }
    }

    /// Every selection this participant has submitted, across all rounds.
    pub fn selections_by_participant(&self, participant_id: Uuid) -> Vec<&Selection> {
        self.rounds
            .iter()
            .filter_map(|r| r.ledger().get(participant_id))
            .collect()
    }

    /// Aggregate statistics over all completed rounds.
    pub fn game_stats(&self) -> GameStats {
        GameStats::from_outcomes(&self.outcomes, &self.participants)
    }
}
