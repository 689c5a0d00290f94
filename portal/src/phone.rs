//! US phone number handling. Numbers are stored as raw digits and rendered as `(XXX) XXX-XXXX`.

use crate::errors::Error;

pub const INVALID_PHONE_MESSAGE: &str = "Please enter a valid 10-digit US phone number";

/// Strip every non-digit character.
pub fn digits(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Format a (possibly partial) number as the user types it.
pub fn format(input: &str) -> String {
    let digits: String = digits(input).chars().take(10).collect();

    match digits.len() {
        0..=3 => digits,
        4..=6 => format!("({}) {}", &digits[..3], &digits[3..]),
        _ => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    }
}

/// Validate an input and return the digits to store.
///
/// Empty input is allowed and stores nothing.
pub fn validate(input: &str) -> Result<Option<String>, Error> {
    let digits = digits(input);
    match digits.len() {
        0 if input.trim().is_empty() => Ok(None),
        10 => Ok(Some(digits)),
        _ => Err(Error::BadRequest {
            message: INVALID_PHONE_MESSAGE.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_number_formats() {
        assert_eq!(format("5551234567"), "(555) 123-4567");
        assert_eq!(format("+1 (555) 123-4567 ext"), "(155) 512-3456");
    }

    #[test]
    fn test_partial_numbers() {
        assert_eq!(format(""), "");
        assert_eq!(format("55"), "55");
        assert_eq!(format("555"), "555");
        assert_eq!(format("5551"), "(555) 1");
        assert_eq!(format("555123"), "(555) 123");
        assert_eq!(format("5551234"), "(555) 123-4");
    }

    #[test]
    fn test_truncates_to_ten_digits() {
        assert_eq!(format("555123456789"), "(555) 123-4567");
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate("").unwrap(), None);
        assert_eq!(validate("   ").unwrap(), None);
        assert_eq!(validate("(555) 123-4567").unwrap(), Some("5551234567".to_string()));

        for bad in ["555", "55512345678", "phone"] {
            let err = validate(bad).unwrap_err();
            assert_eq!(err.user_message(), INVALID_PHONE_MESSAGE, "input {bad}");
        }
    }
}
