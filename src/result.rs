use std::error::Error;
use std::fmt;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::room::RoomStatus;
use crate::round::RoundPhase;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum TransitionSuccess {
    RoundStarted,
    SelectionTimeStarted,
    RoundCompleted,
    GameCompleted,
    Paused,
    Resumed
}

/// Malformed input. Always recoverable; surfaced verbatim so the caller can
/// re-prompt the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationError {
    Nickname(String),
    MessageTooLong,
    PassWithTarget,
    TargetRequired,
    SelfSelection,
    SelectorNotInRoom,
    TargetNotInRoom,
    TargetUnavailable,
    BadSettings(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            ValidationError::Nickname(reason) => {
                write!(f, "Error: Invalid nickname: {}", reason)},
            ValidationError::MessageTooLong => {
                write!(f, "Error: Selection message must be 50 characters or fewer.")},
            ValidationError::PassWithTarget => {
                write!(f, "Error: A pass cannot name a selected participant.")},
            ValidationError::TargetRequired => {
                write!(f, "Error: A non-pass selection must name a participant.")},
            ValidationError::SelfSelection => {
                write!(f, "Error: Attempted to select yourself.")},
            ValidationError::SelectorNotInRoom => {
                write!(f, "Error: Submitting participant is not active in this room.")},
            ValidationError::TargetNotInRoom => {
                write!(f, "Error: Selected participant is not in this room.")},
            ValidationError::TargetUnavailable => {
                write!(f, "Error: Selected participant has left or finished.")},
            ValidationError::BadSettings(reason) => {
                write!(f, "Error: Invalid room settings: {}", reason)},
        }
    }
}

impl Error for ValidationError {}

/// Field whose per-room uniqueness constraint was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictField {
    Nickname,
    Character,
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            ConflictField::Nickname => {
                write!(f, "Error: Nickname is already taken in this room.")},
            ConflictField::Character => {
                write!(f, "Error: Character is already taken in this room.")},
        }
    }
}

impl Error for ConflictField {}

/// A state-machine guard failed. Indicates caller/UI desync; never retried
/// automatically.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum TransitionError {
    InvalidPhase { current: RoundPhase, requested: RoundPhase },
    RoomClosed { status: RoomStatus },
    ActiveRoundExists,
    BadRoundNumber { requested: u32, expected: u32 },
    AllRoundsPlayed,
    QuestionRepeated,
    NoCurrentRound,
    AlreadyPaused,
    NotPaused,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            TransitionError::InvalidPhase { current, requested } => {
                write!(f, "Error: Attempted {:?} transition while round is in {:?} phase.", requested, current)},
            TransitionError::RoomClosed { status } => {
                write!(f, "Error: Attempted a transition in a {:?} room.", status)},
            TransitionError::ActiveRoundExists => {
                write!(f, "Error: Attempted to start a round while another round is active.")},
            TransitionError::BadRoundNumber { requested, expected } => {
                write!(f, "Error: Attempted to start round {} (expected round {}).", requested, expected)},
            TransitionError::AllRoundsPlayed => {
                write!(f, "Error: Attempted to start a round past the configured total.")},
            TransitionError::QuestionRepeated => {
                write!(f, "Error: Attempted to reuse a question within the same game.")},
            TransitionError::NoCurrentRound => {
                write!(f, "Error: No current round to act on.")},
            TransitionError::AlreadyPaused => {
                write!(f, "Error: Attempted to pause a round already paused.")},
            TransitionError::NotPaused => {
                write!(f, "Error: Attempted to resume a round that is not paused.")},
        }
    }
}

impl Error for TransitionError {}

/// Rejection of a selection submission.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum SubmitError {
    RoundNotOpen,
    RoundClosed,
    Validation(ValidationError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            SubmitError::RoundNotOpen => {
                write!(f, "Error: Attempted to submit a selection before the round opened.")},
            SubmitError::RoundClosed => {
                write!(f, "Error: Attempted to submit a selection to a completed round.")},
            SubmitError::Validation(e) => e.fmt(f),
        }
    }
}

impl Error for SubmitError {}

impl From<ValidationError> for SubmitError {
    fn from(e: ValidationError) -> Self {
        SubmitError::Validation(e)
    }
}

/// Rejection of a join attempt.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum JoinError {
    RoomFull,
    RoomClosed,
    Conflict(ConflictField),
    Validation(ValidationError),
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            JoinError::RoomFull => {
                write!(f, "Error: Attempted to join a full room.")},
            JoinError::RoomClosed => {
                write!(f, "Error: Attempted to join a room that is no longer waiting.")},
            JoinError::Conflict(field) => field.fmt(f),
            JoinError::Validation(e) => e.fmt(f),
        }
    }
}

impl Error for JoinError {}

impl From<ConflictField> for JoinError {
    fn from(field: ConflictField) -> Self {
        JoinError::Conflict(field)
    }
}

impl From<ValidationError> for JoinError {
    fn from(e: ValidationError) -> Self {
        JoinError::Validation(e)
    }
}

/// Rejection of a room-settings update.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum SettingsError {
    Locked,
    Validation(ValidationError),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            SettingsError::Locked => {
                write!(f, "Error: Attempted to change settings after the game started.")},
            SettingsError::Validation(e) => e.fmt(f),
        }
    }
}

impl Error for SettingsError {}

impl From<ValidationError> for SettingsError {
    fn from(e: ValidationError) -> Self {
        SettingsError::Validation(e)
    }
}

/// Failure to complete a round: either the transition guard fired, or the
/// detector refused an inconsistent ledger snapshot.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum CompleteError {
    Transition(TransitionError),
    Integrity(IntegrityViolation),
}

impl fmt::Display for CompleteError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            CompleteError::Transition(e) => e.fmt(f),
            CompleteError::Integrity(e) => e.fmt(f),
        }
    }
}

impl Error for CompleteError {}

impl From<TransitionError> for CompleteError {
    fn from(e: TransitionError) -> Self {
        CompleteError::Transition(e)
    }
}

impl From<IntegrityViolation> for CompleteError {
    fn from(e: IntegrityViolation) -> Self {
        CompleteError::Integrity(e)
    }
}

/// The match detector saw data inconsistent with the room's invariants.
/// Fatal for that round's result; logged and surfaced, never repaired.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub enum IntegrityViolation {
    UnknownSelector(Uuid),
    UnknownTarget(Uuid),
    DuplicateSelector(Uuid),
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            IntegrityViolation::UnknownSelector(id) => {
                write!(f, "Error: Selection by unknown participant {}.", id)},
            IntegrityViolation::UnknownTarget(id) => {
                write!(f, "Error: Selection names unknown participant {}.", id)},
            IntegrityViolation::DuplicateSelector(id) => {
                write!(f, "Error: Multiple selections by participant {}.", id)},
        }
    }
}

impl Error for IntegrityViolation {}
