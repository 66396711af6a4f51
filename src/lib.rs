//! This crate implements the engine for a party icebreaker game: anonymous
//! participants join a room through a short code, play timed rounds of
//! conversation and secret selection, and find out at the end of each round
//! who picked each other.
//!
//! [`Room`] is the single-game state machine; [`RoomManager`] runs many rooms
//! concurrently with phase timers, event broadcasting, and optional SQLite
//! persistence.
//!
//! ## Example usage
//! ```
//! use loveline::{Character, Gender, Mbti, Profile, Room, RoomSettings, SelectionRequest};
//! use uuid::Uuid;
//!
//! let settings = RoomSettings::new(4, 3).unwrap();
//! let host = Profile {
//!     nickname: "Alice".to_string(),
//!     gender: Gender::Female,
//!     mbti: Mbti::Enfp,
//!     character: Character::Fox,
//! };
//! let mut room = Room::create(settings, host, "QK3X9Z".to_string(), None, 0).unwrap();
//! let host_id = room.host_id();
//!
//! let guest = Profile {
//!     nickname: "Bob".to_string(),
//!     gender: Gender::Male,
//!     mbti: Mbti::Intj,
//!     character: Character::Cat,
//! };
//! let guest_id = room.join(guest, 1).unwrap();
//!
//! room.start_round(1, Uuid::new_v4(), 10).unwrap();
//! room.advance_to_selection(20).unwrap();
//!
//! room.submit_selection(SelectionRequest {
//!     selector_id: host_id,
//!     selected_id: Some(guest_id),
//!     message: Some("nice talking to you".to_string()),
//!     is_passed: false,
//! }, 30).unwrap();
//! room.submit_selection(SelectionRequest {
//!     selector_id: guest_id,
//!     selected_id: Some(host_id),
//!     message: None,
//!     is_passed: false,
//! }, 40).unwrap();
//!
//! let (_, outcome) = room.complete_round(50).unwrap();
//! assert_eq!(outcome.matches.len(), 1);
//! assert!(outcome.matches[0].contains(host_id));
//! ```

mod matching;
mod participant;
mod registry;
pub mod room_code;
mod result;
mod room;
mod room_manager;
mod round;
mod selection;
mod sqlite_store;
mod validation;

pub use matching::*;
pub use participant::*;
pub use result::*;
pub use room::*;
pub use room_manager::*;
pub use round::*;
pub use selection::*;
pub use sqlite_store::SqliteStore;
pub use validation::{
    validate_message, validate_nickname, MESSAGE_MAX_CHARS, NICKNAME_MAX_CHARS, NICKNAME_MIN_CHARS,
};
