//! Offline Game
//!
//! Single-player loop against a generated secret. The UI falls back to this
//! whenever an online session ends in a disconnect.

use rand::Rng;

use crate::core::feedback::{score, Score};
use crate::core::secret::{check_digits, Secret, SecretError};

/// Points removed per hint.
pub const HINT_PENALTY: u32 = 5;

/// Best possible score.
pub const MAX_SCORE: u32 = 100;

/// Result of one offline guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessOutcome {
    /// Feedback for the guess.
    pub score: Score,
    /// Whether the secret was cracked.
    pub solved: bool,
    /// Tries so far, including this one.
    pub tries: u32,
}

/// A revealed digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    /// Index into the secret.
    pub position: usize,
    /// Digit at that index.
    pub digit: char,
}

/// One offline game.
#[derive(Debug)]
pub struct OfflineGame {
    digit_count: usize,
    secret: Secret,
    tries: u32,
    hints_used: u32,
    solved: bool,
}

impl OfflineGame {
    /// Start a game with a freshly drawn secret.
    pub fn new<R: Rng>(digit_count: usize, rng: &mut R) -> Result<Self, SecretError> {
        let secret = Secret::random(rng, digit_count)?;
        Ok(Self::with_secret(secret))
    }

    /// Start a game with a known secret.
    pub fn with_secret(secret: Secret) -> Self {
        Self {
            digit_count: secret.len(),
            secret,
            tries: 0,
            hints_used: 0,
            solved: false,
        }
    }

    /// Score a guess. Invalid guesses do not count as tries.
    pub fn guess(&mut self, input: &str) -> Result<GuessOutcome, SecretError> {
        check_digits(input, self.digit_count)?;

        self.tries += 1;
        let score = score(self.secret.digits(), input);
        if score.is_win(self.digit_count) {
            self.solved = true;
        }

        Ok(GuessOutcome {
            score,
            solved: self.solved,
            tries: self.tries,
        })
    }

    /// Reveal one digit. Positions rotate through the secret.
    pub fn hint(&mut self) -> Hint {
        let position = self.hints_used as usize % self.digit_count;
        self.hints_used += 1;
        Hint {
            position,
            // position < digit_count == secret.len()
            digit: self.secret.digit_at(position).unwrap_or('?'),
        }
    }

    /// Final score: one point lost per try after the first and
    /// `HINT_PENALTY` per hint, floored at 1.
    pub fn score(&self) -> u32 {
        let penalty = self.tries.saturating_sub(1) + self.hints_used * HINT_PENALTY;
        MAX_SCORE.saturating_sub(penalty).max(1)
    }

    /// Digit count in play.
    pub fn digit_count(&self) -> usize {
        self.digit_count
    }

    /// Valid guesses made so far.
    pub fn tries(&self) -> u32 {
        self.tries
    }

    /// Hints revealed so far.
    pub fn hints_used(&self) -> u32 {
        self.hints_used
    }

    /// Whether the secret has been cracked.
    pub fn is_solved(&self) -> bool {
        self.solved
    }

    /// Reveal the secret (after the game is over).
    pub fn secret(&self) -> &Secret {
        &self.secret
    }
}
