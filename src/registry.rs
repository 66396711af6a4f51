use uuid::Uuid;

use crate::participant::Participant;
use crate::result::ConflictField;

/// A per-room unique field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Nickname,
    Character,
}

/// Check a nickname or character value against every active (non-removed)
/// participant of a room, excluding the participant being updated.
///
/// Comparison is case-sensitive exact match. Callers must hold the room's
/// write lock across this check and the following write so two concurrent
/// claimants cannot both pass.
pub fn reserve(
    participants: &[Participant],
    field: UniqueField,
    value: &str,
    excluding: Option<Uuid>,
) -> Result<(), ConflictField> {
    let taken = participants
        .iter()
        .filter(|p| p.is_active())
        .filter(|p| Some(p.id) != excluding)
        .any(|p| match field {
            UniqueField::Nickname => p.nickname == value,
            UniqueField::Character => p.character.label() == value,
        });

    if taken {
        Err(match field {
            UniqueField::Nickname => ConflictField::Nickname,
            UniqueField::Character => ConflictField::Character,
        })
    } else {
        Ok(())
    }
}
