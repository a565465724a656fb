//! # Numbers Duel
//!
//! Secret-number guessing game for one player against the computer, or two
//! players over a LAN.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       NUMBERS DUEL                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Pure game primitives                     │
//! │  ├── feedback.rs  - Guess scoring                            │
//! │  └── secret.rs    - Digit rules and random secrets           │
//! │                                                              │
//! │  game/            - Local play                               │
//! │  └── offline.rs   - Single-player game with hints            │
//! │                                                              │
//! │  network/         - Two-peer play                            │
//! │  ├── protocol.rs  - Message envelope                         │
//! │  ├── codec.rs     - Newline-delimited JSON frames            │
//! │  ├── transport.rs - TCP host/join, reader and writer tasks   │
//! │  ├── session.rs   - Duel state machine                       │
//! │  └── driver.rs    - Runs a session on one task               │
//! │                                                              │
//! │  config.rs        - Network settings and env overrides       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fairness
//!
//! Online guessing is not turn-based. When one player cracks the other's
//! secret, the other player still gets one final guess; cracking back
//! within that window ends the game in a draw.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::config::{NetConfig, DEFAULT_DIGIT_COUNT, DEFAULT_PORT};
pub use crate::core::feedback::{score, Score};
pub use crate::core::secret::{Secret, SecretError};
pub use crate::game::offline::OfflineGame;
pub use crate::network::driver::{host_session, join_session, SessionCommand, SessionHandle};
pub use crate::network::session::{Outcome, SessionEvent};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
