use rand::Rng;

pub const CODE_LEN: usize = 6;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a 6-character room code, uniform per character over `[A-Z0-9]`.
/// Collisions are not checked here; the caller retries on conflict.
pub fn generate<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are case-insensitive at lookup but stored uppercase.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn is_valid_format(code: &str) -> bool {
    code.len() == CODE_LEN
        && code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_valid() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let code = generate(&mut rng);
            assert!(is_valid_format(&code), "bad code: {}", code);
        }
    }

    #[test]
    fn test_normalize_uppercases_and_trims() {
        assert_eq!(normalize(" ab12cd "), "AB12CD");
    }

    #[test]
    fn test_format_rejects_wrong_length_and_chars() {
        assert!(!is_valid_format("ABC12"));
        assert!(!is_valid_format("ABC1234"));
        assert!(!is_valid_format("abc123"));
        assert!(!is_valid_format("ABC-12"));
        assert!(is_valid_format("ABC123"));
    }
}
