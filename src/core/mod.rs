//! Core game primitives.
//!
//! Pure functions and value types with no I/O. Used identically by the
//! offline game and the online session.

pub mod feedback;
pub mod secret;

// Re-export core types
pub use feedback::{score, Score};
pub use secret::{check_digits, Secret, SecretError};
