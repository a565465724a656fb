//! Guess Feedback
//!
//! Scores a guess against a secret. Shared by the offline game loop and the
//! online session controller; pure and safe to call from any thread.

/// Feedback for one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Score {
    /// Digits of the guess found anywhere in the secret.
    pub match_count: u32,
    /// Digits of the guess found at the same index in the secret.
    pub position_count: u32,
}

impl Score {
    /// Create a score from raw counts.
    pub const fn new(match_count: u32, position_count: u32) -> Self {
        Self {
            match_count,
            position_count,
        }
    }

    /// A guess wins when every position matches.
    #[inline]
    pub fn is_win(&self, digit_count: usize) -> bool {
        self.position_count as usize == digit_count
    }
}

/// Score `guess` against `secret`.
///
/// Every `(i, j)` pair with `secret[i] == guess[j]` adds one to
/// `match_count`; pairs with `i == j` also add one to `position_count`.
/// For digit-unique inputs this is "digits in common", but repeated digits
/// from a misbehaving peer are counted once per pair rather than collapsed
/// into a set.
///
/// # Example
///
/// ```
/// use numbers_duel::core::feedback::{score, Score};
///
/// assert_eq!(score("28461", "26798"), Score::new(3, 1));
/// ```
pub fn score(secret: &str, guess: &str) -> Score {
    let secret = secret.as_bytes();
    let guess = guess.as_bytes();

    let mut result = Score::default();
    for (i, s) in secret.iter().enumerate() {
        for (j, g) in guess.iter().enumerate() {
            if s == g {
                result.match_count += 1;
                if i == j {
                    result.position_count += 1;
                }
            }
        }
    }
    result
}
