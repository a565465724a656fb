//! Secret Numbers
//!
//! Rules shared by secrets and guesses: a fixed number of ASCII digits,
//! no leading zero, no digit used twice.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

/// Smallest supported digit count.
pub const MIN_DIGITS: usize = 1;

/// Largest supported digit count (every decimal digit once).
pub const MAX_DIGITS: usize = 10;

/// Why a digit string is not a valid secret or guess.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    /// Length differs from the game's digit count.
    #[error("Length of input number is not {expected} digits")]
    WrongLength {
        /// Required digit count.
        expected: usize,
        /// Length of the rejected input.
        actual: usize,
    },

    /// Contains something other than ASCII digits.
    #[error("All values input should be numbers")]
    NotDigits,

    /// First digit is zero.
    #[error("The first value shouldn't be zero")]
    LeadingZero,

    /// Same digit appears more than once.
    #[error("There shouldn't be a number that occurs twice (digit {0})")]
    RepeatedDigit(char),

    /// Digit count outside `MIN_DIGITS..=MAX_DIGITS`.
    #[error("Unsupported digit count {0}")]
    UnsupportedDigitCount(usize),
}

/// Check that `input` is a valid `digit_count`-digit secret or guess.
pub fn check_digits(input: &str, digit_count: usize) -> Result<(), SecretError> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digit_count) {
        return Err(SecretError::UnsupportedDigitCount(digit_count));
    }

    let len = input.chars().count();
    if len != digit_count {
        return Err(SecretError::WrongLength {
            expected: digit_count,
            actual: len,
        });
    }

    if !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SecretError::NotDigits);
    }

    let bytes = input.as_bytes();
    if bytes[0] == b'0' {
        return Err(SecretError::LeadingZero);
    }

    let mut seen = [false; 10];
    for &b in bytes {
        let d = (b - b'0') as usize;
        if seen[d] {
            return Err(SecretError::RepeatedDigit(b as char));
        }
        seen[d] = true;
    }

    Ok(())
}

/// A validated secret. Never sent to the opponent.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Validate and wrap a digit string.
    pub fn parse(input: &str, digit_count: usize) -> Result<Self, SecretError> {
        check_digits(input, digit_count)?;
        Ok(Self(input.to_string()))
    }

    /// Draw a random valid secret: a shuffle of 0-9 with a non-zero lead.
    pub fn random<R: Rng>(rng: &mut R, digit_count: usize) -> Result<Self, SecretError> {
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digit_count) {
            return Err(SecretError::UnsupportedDigitCount(digit_count));
        }

        let mut digits: [u8; 10] = *b"0123456789";
        digits.shuffle(rng);
        if digits[0] == b'0' {
            let j = rng.gen_range(1..digits.len());
            digits.swap(0, j);
        }

        let text: String = digits[..digit_count].iter().map(|&b| b as char).collect();
        Self::parse(&text, digit_count)
    }

    /// Digits of the secret.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Number of digits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a parsed secret.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Digit at `position`, if in range.
    pub fn digit_at(&self, position: usize) -> Option<char> {
        self.0.as_bytes().get(position).map(|&b| b as char)
    }
}

// Keep the digits out of logs.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({} digits)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_valid_input() {
        assert!(check_digits("12345", 5).is_ok());
        assert!(check_digits("9876543210", 10).is_ok());
    }

    #[test]
    fn test_wrong_length() {
        let err = check_digits("1234", 5).unwrap_err();
        assert_eq!(err, SecretError::WrongLength { expected: 5, actual: 4 });
        assert!(err.to_string().contains("not 5 digits"));
    }

    #[test]
    fn test_non_numeric() {
        assert_eq!(check_digits("1234a", 5), Err(SecretError::NotDigits));
        assert_eq!(check_digits("12 45", 5), Err(SecretError::NotDigits));
    }

    #[test]
    fn test_leading_zero() {
        assert_eq!(check_digits("01234", 5), Err(SecretError::LeadingZero));
    }

    #[test]
    fn test_duplicate_digits() {
        assert_eq!(check_digits("11234", 5), Err(SecretError::RepeatedDigit('1')));
        assert_eq!(check_digits("12343", 5), Err(SecretError::RepeatedDigit('3')));
    }

    #[test]
    fn test_unsupported_digit_count() {
        assert_eq!(check_digits("", 0), Err(SecretError::UnsupportedDigitCount(0)));
        assert_eq!(
            check_digits("12345678901", 11),
            Err(SecretError::UnsupportedDigitCount(11))
        );
    }

    #[test]
    fn test_secret_debug_hides_digits() {
        let secret = Secret::parse("28461", 5).unwrap();
        let shown = format!("{:?}", secret);
        assert!(!shown.contains("28461"));
        assert_eq!(secret.digits(), "28461");
        assert_eq!(secret.digit_at(2), Some('4'));
        assert_eq!(secret.digit_at(5), None);
    }

    #[test]
    fn test_random_secrets_are_valid() {
        let mut rng = StdRng::seed_from_u64(42);

        for digits in MIN_DIGITS..=MAX_DIGITS {
            for _ in 0..200 {
                let secret = Secret::random(&mut rng, digits).unwrap();
                assert!(check_digits(secret.digits(), digits).is_ok());
                assert_ne!(secret.digit_at(0), Some('0'));
            }
        }
    }

    #[test]
    fn test_random_secret_rejects_bad_count() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(
            Secret::random(&mut rng, 0).unwrap_err(),
            SecretError::UnsupportedDigitCount(0)
        );
        assert_eq!(
            Secret::random(&mut rng, 11).unwrap_err(),
            SecretError::UnsupportedDigitCount(11)
        );
    }

    #[test]
    fn test_seed_pins_secret() {
        let a = Secret::random(&mut StdRng::seed_from_u64(99), 5).unwrap();
        let b = Secret::random(&mut StdRng::seed_from_u64(99), 5).unwrap();
        assert_eq!(a, b);
    }
}
