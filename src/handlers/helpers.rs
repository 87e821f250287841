//! Helper functions shared by handlers.
//!
//! - [`fanout`]: relaying a participant's message to the rest of the room

pub mod fanout;

use crate::error::InvalidInput;

/// Check a requested room username and return it trimmed.
///
/// Usernames are a single line, non-empty, and at most `max_len` characters.
pub fn validate_username(raw: &str, max_len: usize) -> Result<&str, InvalidInput> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(InvalidInput::EmptyUsername);
    }
    if name.chars().count() > max_len || name.contains(['\n', '\r']) {
        return Err(InvalidInput::UsernameTooLong { max: max_len });
    }
    Ok(name)
}

/// Check an admin-chosen room code: one word, no spaces.
pub fn validate_room_code(raw: &str) -> Result<&str, InvalidInput> {
    let code = raw.trim();
    if code.is_empty() || code.len() > 64 || code.chars().any(char::is_whitespace) {
        return Err(InvalidInput::MalformedCode);
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert_eq!(validate_username("  alice ", 32), Ok("alice"));
        assert_eq!(validate_username("   ", 32), Err(InvalidInput::EmptyUsername));
        assert_eq!(
            validate_username("abcdef", 5),
            Err(InvalidInput::UsernameTooLong { max: 5 })
        );
        // Counted in characters, not bytes.
        assert_eq!(validate_username("ёжик", 4), Ok("ёжик"));
    }

    #[test]
    fn room_code_rules() {
        assert_eq!(validate_room_code(" ABC123 "), Ok("ABC123"));
        assert_eq!(validate_room_code("two words"), Err(InvalidInput::MalformedCode));
        assert_eq!(validate_room_code(""), Err(InvalidInput::MalformedCode));
    }
}
