//! Numbers Duel
//!
//! Line-based terminal front end. Online games fall back to offline play once
//! the connection ends.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use numbers_duel::core::secret::{MAX_DIGITS, MIN_DIGITS};
use numbers_duel::{
    host_session, join_session, NetConfig, OfflineGame, Outcome, SessionEvent, SessionHandle,
    DEFAULT_DIGIT_COUNT, VERSION,
};

type Input = Lines<BufReader<Stdin>>;

const QUIT: &str = "/quit";
const HINT: &str = "/hint";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with prompts
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Numbers Duel v{}", VERSION);

    let cli = Cli::parse();
    let mut config = NetConfig::from_env();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    match cli.command {
        Command::Offline { digits } => {
            let digits = digits.unwrap_or(config.digit_count);
            run_offline(digits, &mut input).await
        }
        Command::Host { name, port, digits } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(digits) = digits {
                config.digit_count = digits;
            }
            let fallback_digits = config.digit_count;

            match host_session(config, &name).await {
                Ok((address, handle)) => {
                    println!("Hosting on {}. Waiting for an opponent...", address);
                    println!("Type {} to stop.", QUIT);
                    run_online(handle, &mut input).await?;
                }
                Err(e) => {
                    warn!("Hosting failed: {}", e);
                    println!("Could not host: {}", e);
                }
            }
            fall_back(fallback_digits, &mut input).await
        }
        Command::Join {
            address,
            name,
            port,
        } => {
            if let Some(port) = port {
                config.port = port;
            }
            let fallback_digits = config.digit_count;

            match join_session(config, &name, &address).await {
                Ok(handle) => run_online(handle, &mut input).await?,
                Err(e) => {
                    warn!("Join failed: {}", e);
                    println!("Could not join {}: {}", address, e);
                }
            }
            fall_back(fallback_digits, &mut input).await
        }
    }
}

/// What the next line of input means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    Waiting,
    Secret,
    Guess,
    Done,
}

async fn run_online(mut handle: SessionHandle, input: &mut Input) -> Result<()> {
    let mut prompt = Prompt::Waiting;
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = handle.next_event() => {
                let Some(event) = event else { break };
                let finished = matches!(event, SessionEvent::Disconnected { .. });
                prompt = show_event(event, prompt);
                if finished {
                    break;
                }
            }
            line = input.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    if let Err(e) = handle.leave() {
                        warn!("Leave failed: {}", e);
                    }
                    continue;
                };
                let line = line.trim();
                let sent = match (line, prompt) {
                    (QUIT, _) => handle.leave(),
                    (_, Prompt::Secret) => handle.set_secret(line),
                    (_, Prompt::Guess) => handle.guess(line),
                    (_, Prompt::Waiting) => {
                        println!("Still waiting for the opponent.");
                        Ok(())
                    }
                    (_, Prompt::Done) => {
                        println!("Game over. Type {} to leave.", QUIT);
                        Ok(())
                    }
                };
                // A closed driver reports its Disconnected next
                if let Err(e) = sent {
                    warn!("Command not delivered: {}", e);
                }
            }
        }
    }

    Ok(())
}

fn show_event(event: SessionEvent, prompt: Prompt) -> Prompt {
    match event {
        SessionEvent::Connected { info } => println!("{}", info),
        SessionEvent::OpponentNamed { name } => println!("Playing against {}", name),
        SessionEvent::SecretRequested { description, .. } => {
            println!("{}:", description);
            return Prompt::Secret;
        }
        SessionEvent::OpponentReady => println!("Opponent has chosen a secret."),
        SessionEvent::Started { digit_count } => {
            println!("Game on! Guess the opponent's {}-digit number.", digit_count);
            return Prompt::Guess;
        }
        SessionEvent::OpponentGuessed { guess, score } => println!(
            "Opponent guessed {}: {} matched, {} in place",
            guess, score.match_count, score.position_count
        ),
        SessionEvent::GuessScored { guess, score } => println!(
            "{}: {} matched, {} in place",
            guess, score.match_count, score.position_count
        ),
        SessionEvent::OpponentCracked => {
            println!("The opponent cracked your number! One last guess to tie.")
        }
        SessionEvent::Resolved { outcome, guesses } => {
            match outcome {
                Outcome::Won => println!(
                    "You won in {} guesses! The opponent gets one last try.",
                    guesses
                ),
                Outcome::Lost => println!("You lost after {} guesses.", guesses),
                Outcome::Draw => println!("Draw! Both numbers cracked."),
            }
            println!("Type {} to leave.", QUIT);
            return Prompt::Done;
        }
        SessionEvent::CommandRejected { error } => println!("{}", error),
        SessionEvent::Disconnected { reason } => {
            println!("{}", reason);
            return Prompt::Done;
        }
    }
    prompt
}

async fn fall_back(digits: usize, input: &mut Input) -> Result<()> {
    println!("Switching to offline play.");
    run_offline(offline_digits(digits), input).await
}

/// Digit count for the fallback game; a rejected online setting gets the default.
fn offline_digits(requested: usize) -> usize {
    if (MIN_DIGITS..=MAX_DIGITS).contains(&requested) {
        requested
    } else {
        DEFAULT_DIGIT_COUNT
    }
}

async fn run_offline(digits: usize, input: &mut Input) -> Result<()> {
    let mut game = OfflineGame::new(digits, &mut rand::thread_rng())?;

    println!(
        "Guess my {}-digit number. {} for a hint, {} to stop.",
        game.digit_count(),
        HINT,
        QUIT
    );

    while let Some(line) = input.next_line().await? {
        let line = line.trim();
        match line {
            QUIT => break,
            HINT => {
                let hint = game.hint();
                println!("Digit {} is {}", hint.position + 1, hint.digit);
            }
            guess => match game.guess(guess) {
                Ok(outcome) if outcome.solved => {
                    println!(
                        "Correct! {} tries, {} hints, score {}",
                        outcome.tries,
                        game.hints_used(),
                        game.score()
                    );
                    break;
                }
                Ok(outcome) => println!(
                    "{} matched, {} in place",
                    outcome.score.match_count, outcome.score.position_count
                ),
                Err(e) => println!("{}", e),
            },
        }
    }

    Ok(())
}
