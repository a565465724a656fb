//! Network Configuration
//!
//! Defaults suit LAN play; every field can be overridden from the
//! environment or the command line.

use std::time::Duration;

use crate::network::codec::DEFAULT_MAX_FRAME_LEN;

/// Well-known listening port.
pub const DEFAULT_PORT: u16 = 5555;

/// Digits per secret unless the host picks otherwise.
pub const DEFAULT_DIGIT_COUNT: usize = 5;

/// Transport and session settings.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Port the host listens on and the joiner dials when none is given.
    pub port: u16,
    /// Upper bound on an outbound connect.
    pub connect_timeout: Duration,
    /// Poll interval for accept/read; bounds shutdown latency.
    pub poll_interval: Duration,
    /// Size of each socket read.
    pub read_buffer_size: usize,
    /// Largest accepted frame.
    pub max_frame_len: usize,
    /// Digit count the host requests.
    pub digit_count: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            read_buffer_size: 4096,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            digit_count: DEFAULT_DIGIT_COUNT,
        }
    }
}

impl NetConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parse("NUMBERS_DUEL_PORT").unwrap_or(defaults.port),
            connect_timeout: env_parse("NUMBERS_DUEL_CONNECT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            poll_interval: env_parse("NUMBERS_DUEL_POLL_MS")
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            digit_count: env_parse("NUMBERS_DUEL_DIGITS").unwrap_or(defaults.digit_count),
            ..defaults
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}
