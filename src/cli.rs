//! Command-line interface for numbers-duel.

use clap::{Parser, Subcommand};

/// Numbers Duel - crack the secret number, alone or against a friend on the LAN
#[derive(Parser, Debug)]
#[command(name = "numbers-duel")]
#[command(about = "Secret-number guessing game with LAN duels", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play against the computer
    Offline {
        /// Digits in the secret (1-10)
        #[arg(short, long)]
        digits: Option<usize>,
    },

    /// Host a duel and wait for one opponent
    Host {
        /// Display name sent to the opponent
        #[arg(short, long, default_value = "Host")]
        name: String,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Digits in each secret (1-10)
        #[arg(short, long)]
        digits: Option<usize>,
    },

    /// Join a duel hosted at ADDRESS (ip or ip:port)
    Join {
        /// Host address; the default port is used when none is given
        address: String,

        /// Display name sent to the opponent
        #[arg(short, long, default_value = "Guest")]
        name: String,

        /// Port to dial when ADDRESS has none
        #[arg(short, long)]
        port: Option<u16>,
    },
}
