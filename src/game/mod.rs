//! Game Logic Module
//!
//! Local game rules built on the `core` primitives.

pub mod offline;

pub use offline::{GuessOutcome, Hint, OfflineGame};
