use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// The 16 canonical MBTI codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mbti {
    Intj, Intp, Entj, Entp,
    Infj, Infp, Enfj, Enfp,
    Istj, Isfj, Estj, Esfj,
    Istp, Isfp, Estp, Esfp,
}

impl Mbti {
    pub const ALL: [Mbti; 16] = [
        Mbti::Intj, Mbti::Intp, Mbti::Entj, Mbti::Entp,
        Mbti::Infj, Mbti::Infp, Mbti::Enfj, Mbti::Enfp,
        Mbti::Istj, Mbti::Isfj, Mbti::Estj, Mbti::Esfj,
        Mbti::Istp, Mbti::Isfp, Mbti::Estp, Mbti::Esfp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mbti::Intj => "INTJ", Mbti::Intp => "INTP", Mbti::Entj => "ENTJ", Mbti::Entp => "ENTP",
            Mbti::Infj => "INFJ", Mbti::Infp => "INFP", Mbti::Enfj => "ENFJ", Mbti::Enfp => "ENFP",
            Mbti::Istj => "ISTJ", Mbti::Isfj => "ISFJ", Mbti::Estj => "ESTJ", Mbti::Esfj => "ESFJ",
            Mbti::Istp => "ISTP", Mbti::Isfp => "ISFP", Mbti::Estp => "ESTP", Mbti::Esfp => "ESFP",
        }
    }
}

impl fmt::Display for Mbti {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mbti {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Mbti::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| format!("unknown MBTI code: {}", s))
    }
}

/// Fixed emoji-labelled avatar enumeration. Unique per active participant
/// within a room, so there are more variants than the 8-seat maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Character {
    Fox,
    Rabbit,
    Bear,
    Cat,
    Dog,
    Panda,
    Tiger,
    Wolf,
    Lion,
    Frog,
    Chick,
    Hamster,
}

impl Character {
    pub const ALL: [Character; 12] = [
        Character::Fox, Character::Rabbit, Character::Bear, Character::Cat,
        Character::Dog, Character::Panda, Character::Tiger, Character::Wolf,
        Character::Lion, Character::Frog, Character::Chick, Character::Hamster,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            Character::Fox => "\u{1F98A}",
            Character::Rabbit => "\u{1F430}",
            Character::Bear => "\u{1F43B}",
            Character::Cat => "\u{1F431}",
            Character::Dog => "\u{1F436}",
            Character::Panda => "\u{1F43C}",
            Character::Tiger => "\u{1F42F}",
            Character::Wolf => "\u{1F43A}",
            Character::Lion => "\u{1F981}",
            Character::Frog => "\u{1F438}",
            Character::Chick => "\u{1F424}",
            Character::Hamster => "\u{1F439}",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Character::Fox => "Fox",
            Character::Rabbit => "Rabbit",
            Character::Bear => "Bear",
            Character::Cat => "Cat",
            Character::Dog => "Dog",
            Character::Panda => "Panda",
            Character::Tiger => "Tiger",
            Character::Wolf => "Wolf",
            Character::Lion => "Lion",
            Character::Frog => "Frog",
            Character::Chick => "Chick",
            Character::Hamster => "Hamster",
        }
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.emoji(), self.label())
    }
}

/// Presence/activity state, separate from whether a selection was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Joined,
    Ready,
    Playing,
    Finished,
}

/// Profile supplied when creating or joining a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub nickname: String,
    pub gender: Gender,
    pub mbti: Mbti,
    pub character: Character,
}

/// A participant belongs to exactly one room for its lifetime. Leaving sets
/// the `removed` flag; rows are never reassigned or deleted, so completed
/// round outcomes stay resolvable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub nickname: String,
    pub gender: Gender,
    pub mbti: Mbti,
    pub character: Character,
    pub status: ParticipantStatus,
    /// Room-scoped creation sequence, used for deterministic tie-breaks.
    pub join_order: u32,
    pub joined_at_ms: u64,
    pub removed: bool,
}

impl Participant {
    pub fn new(nickname: String, gender: Gender, mbti: Mbti, character: Character, join_order: u32, now_ms: u64) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            nickname,
            gender,
            mbti,
            character,
            status: ParticipantStatus::Joined,
            join_order,
            joined_at_ms: now_ms,
            removed: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.removed
    }

    /// An active participant that can still be named as a selection target.
    pub fn is_selectable(&self) -> bool {
        !self.removed && self.status != ParticipantStatus::Finished
    }
}
