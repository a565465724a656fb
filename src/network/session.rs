//! Duel Session
//!
//! State machine for one online game. Pure: it consumes decoded messages and
//! UI commands, and answers with a [`Step`] listing the messages to send and
//! the events to show. The driver owns the only instance and feeds it from a
//! single task, so nothing here needs locking.
//!
//! ```text
//! Idle -> AwaitingPeer -> NameExchanged -> AwaitingSecrets -> Ready -> Playing
//!                                                                        |
//!                                              Resolved(Won|Lost|Draw) <-+
//! any phase -> Closed
//! ```
//!
//! Guesses are not turn-based: either side may guess at any time. Fairness
//! comes from result handling. Once one side cracks the other's secret, the
//! other side gets exactly one more guess; a second win inside that window
//! is a draw.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::feedback::{score, Score};
use crate::core::secret::{check_digits, Secret, SecretError, MAX_DIGITS, MIN_DIGITS};
use crate::network::protocol::{GuessReport, Message, MessageKind};
use crate::network::transport::{DisconnectReason, Role};

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created, no connection attempt yet.
    Idle,
    /// Hosting or joining; opponent name not yet known.
    AwaitingPeer,
    /// Both names known.
    NameExchanged,
    /// Collecting secrets.
    AwaitingSecrets,
    /// Both secrets locked in.
    Ready,
    /// Guessing.
    Playing,
    /// Game decided. Local `Won` still answers one final opponent guess.
    Resolved(Outcome),
    /// Connection gone. Terminal.
    Closed,
}

/// How a game ended for the local player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Cracked the opponent's secret first.
    Won,
    /// Opponent cracked ours and the final guess missed.
    Lost,
    /// Both cracked within the fairness window.
    Draw,
}

/// Notifications for the UI, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Stream established.
    Connected {
        /// Human-readable description of the peer.
        info: String,
    },
    /// Opponent introduced itself.
    OpponentNamed {
        /// Opponent display name.
        name: String,
    },
    /// UI must supply a secret via `SessionCommand::SetSecret`.
    SecretRequested {
        /// Required digit count.
        digit_count: usize,
        /// Prompt to show.
        description: String,
    },
    /// Opponent locked in its secret.
    OpponentReady,
    /// Guessing may begin.
    Started {
        /// Digit count in play.
        digit_count: usize,
    },
    /// Opponent guessed at our secret; the score has been sent back.
    OpponentGuessed {
        /// Opponent's guess.
        guess: String,
        /// Score it earned.
        score: Score,
    },
    /// Opponent scored one of our guesses.
    GuessScored {
        /// Our guess.
        guess: String,
        /// Score it earned.
        score: Score,
    },
    /// Opponent cracked our secret; one final guess remains.
    OpponentCracked,
    /// Game decided.
    Resolved {
        /// Result for the local player.
        outcome: Outcome,
        /// Guesses the local player made.
        guesses: u32,
    },
    /// A UI command was refused.
    CommandRejected {
        /// Why.
        error: SessionError,
    },
    /// Session over; the UI should fall back to offline play.
    Disconnected {
        /// Why.
        reason: DisconnectReason,
    },
}

/// Output of one state-machine step.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// Messages for the opponent, in order.
    pub outbound: Vec<Message>,
    /// Events for the UI, in order.
    pub events: Vec<SessionEvent>,
    /// Transport should be closed after sending `outbound`.
    pub close: bool,
}

impl Step {
    fn send(&mut self, msg: Message) {
        self.outbound.push(msg);
    }

    fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Command not valid in the current phase.
    #[error("Cannot {action} while {phase:?}")]
    WrongPhase {
        /// Attempted action.
        action: &'static str,
        /// Phase at the time.
        phase: Phase,
    },

    /// Secret breaks the digit rules.
    #[error("Invalid secret: {0}")]
    InvalidSecret(SecretError),

    /// Guess breaks the digit rules.
    #[error("Invalid guess: {0}")]
    InvalidGuess(SecretError),

    /// Secret is set once per session.
    #[error("Secret already set")]
    SecretAlreadySet,

    /// The one guess after the opponent's win is used up.
    #[error("Final guess already made")]
    FinalGuessSpent,

    /// Message arrived in a phase that does not accept it.
    #[error("Unexpected {kind} while {phase:?}")]
    UnexpectedMessage {
        /// Message tag.
        kind: MessageKind,
        /// Phase at the time.
        phase: Phase,
    },
}

/// One online game from the local player's point of view.
#[derive(Debug)]
pub struct Session {
    role: Role,
    local_name: String,
    opponent_name: Option<String>,
    digit_count: usize,
    local_secret: Option<Secret>,
    phase: Phase,
    connected: bool,
    local_ready: bool,
    remote_ready: bool,
    /// We cracked the opponent's secret.
    local_won: bool,
    /// Opponent cracked ours.
    remote_won: bool,
    /// Guess sent after `remote_won`; its result settles the game.
    final_guess_sent: bool,
    /// Guesses sent whose RESULT has not arrived yet.
    awaiting_results: u32,
    /// Opponent's last guess after our win has been answered.
    final_guess_answered: bool,
    guesses_made: u32,
}

impl Session {
    /// Create an idle session.
    ///
    /// `digit_count` is what the host will request; a joiner adopts the
    /// host's value from SETUP_REQUEST.
    pub fn new(role: Role, local_name: impl Into<String>, digit_count: usize) -> Self {
        Self {
            role,
            local_name: local_name.into(),
            opponent_name: None,
            digit_count,
            local_secret: None,
            phase: Phase::Idle,
            connected: false,
            local_ready: false,
            remote_ready: false,
            local_won: false,
            remote_won: false,
            final_guess_sent: false,
            awaiting_results: 0,
            final_guess_answered: false,
            guesses_made: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Local role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Local display name.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Opponent display name, once received.
    pub fn opponent_name(&self) -> Option<&str> {
        self.opponent_name.as_deref()
    }

    /// Digit count in play.
    pub fn digit_count(&self) -> usize {
        self.digit_count
    }

    /// Whether we cracked the opponent's secret.
    pub fn local_won(&self) -> bool {
        self.local_won
    }

    /// Whether the opponent cracked ours.
    pub fn remote_won(&self) -> bool {
        self.remote_won
    }

    /// Guesses made by the local player.
    pub fn guesses_made(&self) -> u32 {
        self.guesses_made
    }

    /// Whether the session is resolved or closed.
    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::Resolved(_) | Phase::Closed)
    }

    /// Host or join was requested.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Idle {
            return Err(self.wrong_phase("connect"));
        }
        self.transition(Phase::AwaitingPeer);
        Ok(())
    }

    /// Stream established: introduce ourselves.
    pub fn on_connected(&mut self) -> Step {
        let mut step = Step::default();
        if self.phase != Phase::AwaitingPeer || self.connected {
            warn!(phase = ?self.phase, "Connection event out of phase");
            return step;
        }

        self.connected = true;
        step.send(Message::Name(self.local_name.clone()));
        if self.opponent_name.is_some() {
            self.names_known(&mut step);
        }
        step
    }

    /// Transport is gone.
    pub fn on_disconnected(&mut self) {
        self.transition(Phase::Closed);
    }

    /// Handle one inbound message. Messages the phase does not accept are
    /// logged and dropped.
    pub fn handle_message(&mut self, msg: Message) -> Step {
        match self.dispatch(msg) {
            Ok(step) => step,
            Err(e) => {
                warn!("Dropping message: {}", e);
                Step::default()
            }
        }
    }

    /// Lock in the local secret.
    pub fn set_secret(&mut self, input: &str) -> Result<Step, SessionError> {
        if self.phase != Phase::AwaitingSecrets {
            return Err(self.wrong_phase("set secret"));
        }
        if self.local_secret.is_some() {
            return Err(SessionError::SecretAlreadySet);
        }

        let secret =
            Secret::parse(input.trim(), self.digit_count).map_err(SessionError::InvalidSecret)?;
        self.local_secret = Some(secret);
        self.local_ready = true;
        info!("Secret locked in");

        let mut step = Step::default();
        step.send(Message::SecretReady(true));
        self.try_start(&mut step);
        Ok(step)
    }

    /// Guess at the opponent's secret.
    pub fn guess(&mut self, input: &str) -> Result<Step, SessionError> {
        if !matches!(self.phase, Phase::Ready | Phase::Playing) {
            return Err(self.wrong_phase("guess"));
        }
        if self.final_guess_sent {
            return Err(SessionError::FinalGuessSpent);
        }

        let guess = input.trim();
        check_digits(guess, self.digit_count).map_err(SessionError::InvalidGuess)?;

        if self.remote_won {
            self.final_guess_sent = true;
        }
        self.guesses_made += 1;
        self.awaiting_results += 1;
        if self.phase == Phase::Ready {
            self.transition(Phase::Playing);
        }

        let mut step = Step::default();
        step.send(Message::Guess(guess.to_string()));
        Ok(step)
    }

    /// Leave the game: tell the opponent, then close.
    pub fn leave(&mut self) -> Step {
        let mut step = Step::default();
        if self.phase == Phase::Closed {
            return step;
        }
        if self.connected {
            step.send(Message::Disconnect);
        }
        step.close = true;
        self.transition(Phase::Closed);
        step
    }

    fn dispatch(&mut self, msg: Message) -> Result<Step, SessionError> {
        let mut step = Step::default();
        let kind = msg.kind();

        match (self.phase, msg) {
            (Phase::Closed, _) => return Err(self.unexpected(kind)),

            (_, Message::Disconnect) => {
                info!("Opponent left");
                self.transition(Phase::Closed);
                step.close = true;
            }

            (Phase::AwaitingPeer, Message::Name(name)) if self.opponent_name.is_none() => {
                info!(opponent = %name, "Opponent named");
                self.opponent_name = Some(name.clone());
                step.emit(SessionEvent::OpponentNamed { name });
                if self.connected {
                    self.names_known(&mut step);
                }
            }

            (Phase::NameExchanged, Message::SetupRequest(count)) if self.role == Role::Joiner => {
                let count = count as usize;
                if !(MIN_DIGITS..=MAX_DIGITS).contains(&count) {
                    return Err(self.unexpected(kind));
                }
                self.digit_count = count;
                self.request_secret(&mut step);
            }

            (Phase::AwaitingSecrets, Message::SecretReady(ready)) => {
                self.remote_ready = ready;
                if ready {
                    step.emit(SessionEvent::OpponentReady);
                    self.try_start(&mut step);
                }
            }

            (Phase::AwaitingSecrets, Message::Start(count))
                if self.role == Role::Joiner
                    && self.local_ready
                    && count as usize == self.digit_count =>
            {
                self.transition(Phase::Ready);
                self.transition(Phase::Playing);
                step.emit(SessionEvent::Started {
                    digit_count: self.digit_count,
                });
            }

            (Phase::Ready | Phase::Playing, Message::Guess(guess)) => {
                self.answer_guess(guess, &mut step);
            }

            (Phase::Resolved(Outcome::Won), Message::Guess(guess)) if !self.final_guess_answered => {
                self.final_guess_answered = true;
                self.answer_guess(guess, &mut step);
            }

            (Phase::Ready | Phase::Playing, Message::Result(report)) => {
                self.take_result(report, &mut step);
            }

            (_, msg) => return Err(self.unexpected(msg.kind())),
        }

        Ok(step)
    }

    /// Score the opponent's guess against our secret and reply.
    fn answer_guess(&mut self, guess: String, step: &mut Step) {
        let Some(secret) = self.local_secret.as_ref() else {
            warn!("Guess received without a local secret");
            return;
        };

        let result = score(secret.digits(), &guess);
        debug!(%guess, ?result, "Scored opponent guess");
        step.send(Message::Result(GuessReport::new(guess.clone(), result)));
        step.emit(SessionEvent::OpponentGuessed {
            guess,
            score: result,
        });

        if !result.is_win(self.digit_count) || self.remote_won {
            return;
        }

        self.remote_won = true;
        if self.local_won {
            self.resolve(Outcome::Draw, step);
        } else {
            info!("Opponent cracked the secret");
            step.emit(SessionEvent::OpponentCracked);
        }
    }

    /// Apply the opponent's score for one of our guesses.
    fn take_result(&mut self, report: GuessReport, step: &mut Step) {
        let result = report.score();
        self.awaiting_results = self.awaiting_results.saturating_sub(1);
        step.emit(SessionEvent::GuessScored {
            guess: report.guess,
            score: result,
        });

        if result.is_win(self.digit_count) {
            self.local_won = true;
            let outcome = if self.remote_won {
                Outcome::Draw
            } else {
                Outcome::Won
            };
            self.resolve(outcome, step);
        } else if self.final_guess_sent && self.awaiting_results == 0 {
            // Results come back in guess order, so the last one outstanding
            // answers the final guess. Earlier misses keep the window open.
            self.resolve(Outcome::Lost, step);
        }
    }

    fn names_known(&mut self, step: &mut Step) {
        self.transition(Phase::NameExchanged);
        if self.role == Role::Host {
            // usize -> u32 cannot truncate: digit counts are at most MAX_DIGITS
            step.send(Message::SetupRequest(self.digit_count as u32));
            self.request_secret(step);
        }
    }

    fn request_secret(&mut self, step: &mut Step) {
        self.transition(Phase::AwaitingSecrets);
        step.emit(SessionEvent::SecretRequested {
            digit_count: self.digit_count,
            description: format!(
                "Choose your secret {}-digit number (no repeated digits, no leading zero)",
                self.digit_count
            ),
        });
    }

    /// Host starts play once both secrets are in.
    fn try_start(&mut self, step: &mut Step) {
        if self.role != Role::Host || !(self.local_ready && self.remote_ready) {
            return;
        }
        self.transition(Phase::Ready);
        step.send(Message::Start(self.digit_count as u32));
        self.transition(Phase::Playing);
        step.emit(SessionEvent::Started {
            digit_count: self.digit_count,
        });
    }

    fn resolve(&mut self, outcome: Outcome, step: &mut Step) {
        info!(?outcome, guesses = self.guesses_made, "Game resolved");
        self.transition(Phase::Resolved(outcome));
        step.emit(SessionEvent::Resolved {
            outcome,
            guesses: self.guesses_made,
        });
    }

    fn transition(&mut self, next: Phase) {
        if self.phase != next {
            debug!(from = ?self.phase, to = ?next, "Phase change");
            self.phase = next;
        }
    }

    fn wrong_phase(&self, action: &'static str) -> SessionError {
        SessionError::WrongPhase {
            action,
            phase: self.phase,
        }
    }

    fn unexpected(&self, kind: MessageKind) -> SessionError {
        SessionError::UnexpectedMessage {
            kind,
            phase: self.phase,
        }
    }
}
