use rustrict::CensorStr;

use crate::result::ValidationError;

pub const NICKNAME_MIN_CHARS: usize = 2;
pub const NICKNAME_MAX_CHARS: usize = 8;
pub const MESSAGE_MAX_CHARS: usize = 50;

/// Validate and sanitize a participant nickname.
/// Returns the trimmed nickname on success.
pub fn validate_nickname(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let count = trimmed.chars().count();
    if count < NICKNAME_MIN_CHARS {
        return Err(ValidationError::Nickname("must be at least 2 characters".to_string()));
    }
    if count > NICKNAME_MAX_CHARS {
        return Err(ValidationError::Nickname("must be 8 characters or fewer".to_string()));
    }
    // Alphanumeric covers local scripts (e.g. Hangul); spaces are allowed inside.
    if !trimmed.chars().all(|c| c.is_alphanumeric() || c == ' ') {
        return Err(ValidationError::Nickname("only letters, digits, and spaces".to_string()));
    }
    if trimmed.is_inappropriate() {
        return Err(ValidationError::Nickname("contains inappropriate language".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Validate a selection message. Returns the trimmed message.
pub fn validate_message(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.chars().count() > MESSAGE_MAX_CHARS {
        return Err(ValidationError::MessageTooLong);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nickname_trimmed() {
        assert_eq!(validate_nickname("  mina  ").unwrap(), "mina");
    }

    #[test]
    fn test_nickname_too_short() {
        assert!(matches!(validate_nickname("a"), Err(ValidationError::Nickname(_))));
        assert!(matches!(validate_nickname("   "), Err(ValidationError::Nickname(_))));
    }

    #[test]
    fn test_nickname_too_long() {
        assert!(matches!(validate_nickname("ninecharss"), Err(ValidationError::Nickname(_))));
    }

    #[test]
    fn test_nickname_length_counts_chars_not_bytes() {
        // 3 Hangul syllables, 9 bytes
        assert_eq!(validate_nickname("김철수").unwrap(), "김철수");
    }

    #[test]
    fn test_nickname_rejects_punctuation() {
        assert!(matches!(validate_nickname("a!b"), Err(ValidationError::Nickname(_))));
        assert!(matches!(validate_nickname("a_b"), Err(ValidationError::Nickname(_))));
    }

    #[test]
    fn test_nickname_allows_inner_space() {
        assert_eq!(validate_nickname("Jo Min").unwrap(), "Jo Min");
    }

    #[test]
    fn test_nickname_profanity() {
        assert!(matches!(validate_nickname("fuck"), Err(ValidationError::Nickname(_))));
    }

    #[test]
    fn test_message_limit() {
        let at_limit: String = "a".repeat(50);
        assert_eq!(validate_message(&at_limit).unwrap(), at_limit);
        let over: String = "a".repeat(51);
        assert_eq!(validate_message(&over), Err(ValidationError::MessageTooLong));
    }

    #[test]
    fn test_message_counts_chars_not_bytes() {
        // 50 Hangul syllables is within the limit even at 150 bytes
        let hangul: String = "하".repeat(50);
        assert!(validate_message(&hangul).is_ok());
    }
}
