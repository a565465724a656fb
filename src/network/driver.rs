//! Session Driver
//!
//! Runs a [`Session`] against a live [`Transport`] on one tokio task. The
//! task is the only place session state changes: transport events and UI
//! commands are both funnelled into it through ordered channels, and every
//! resulting [`SessionEvent`] goes back out through a third.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session::{Session, SessionError, SessionEvent, Step};
use super::transport::{
    DisconnectReason, ListenAddress, Role, Transport, TransportError, TransportEvent,
};
use crate::config::NetConfig;
use crate::core::secret::{MAX_DIGITS, MIN_DIGITS};

/// Requests from the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Lock in the local secret.
    SetSecret(String),
    /// Guess at the opponent's secret.
    Guess(String),
    /// Tell the opponent we are leaving and close.
    Leave,
}

/// Driver errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Transport could not start.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Session could not start.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Host asked for a digit count outside the supported range.
    #[error("Digit count must be between {MIN_DIGITS} and {MAX_DIGITS}, got {0}")]
    UnsupportedDigitCount(usize),

    /// Driver task has finished.
    #[error("Session is closed")]
    Closed,
}

/// UI side of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Send a command to the driver.
    pub fn command(&self, cmd: SessionCommand) -> Result<(), DriverError> {
        self.commands.send(cmd).map_err(|_| DriverError::Closed)
    }

    /// Lock in the local secret. Rejections arrive as
    /// [`SessionEvent::CommandRejected`].
    pub fn set_secret(&self, secret: impl Into<String>) -> Result<(), DriverError> {
        self.command(SessionCommand::SetSecret(secret.into()))
    }

    /// Guess at the opponent's secret.
    pub fn guess(&self, guess: impl Into<String>) -> Result<(), DriverError> {
        self.command(SessionCommand::Guess(guess.into()))
    }

    /// Leave the game.
    pub fn leave(&self) -> Result<(), DriverError> {
        self.command(SessionCommand::Leave)
    }

    /// Wait for the next event. `None` once the driver has finished and
    /// every event has been taken.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Take an event if one is waiting.
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Whether the driver task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Host a session: bind the port and wait for one opponent in the background.
pub async fn host_session(
    config: NetConfig,
    name: &str,
) -> Result<(ListenAddress, SessionHandle), DriverError> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&config.digit_count) {
        return Err(DriverError::UnsupportedDigitCount(config.digit_count));
    }

    let mut session = Session::new(Role::Host, name, config.digit_count);
    session.begin()?;

    let (mut transport, transport_rx) = Transport::new(config);
    let address = transport.host().await?;
    Ok((address, spawn_driver(session, transport, transport_rx)))
}

/// Join a hosted session. `address` may omit the port.
pub async fn join_session(
    config: NetConfig,
    name: &str,
    address: &str,
) -> Result<SessionHandle, DriverError> {
    let mut session = Session::new(Role::Joiner, name, config.digit_count);
    session.begin()?;

    let (mut transport, transport_rx) = Transport::new(config);
    transport.join(address).await?;
    Ok(spawn_driver(session, transport, transport_rx))
}

fn spawn_driver(
    session: Session,
    transport: Transport,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
) -> SessionHandle {
    let (commands, commands_rx) = mpsc::unbounded_channel();
    let (events_tx, events) = mpsc::unbounded_channel();

    let driver = Driver {
        session,
        transport,
        transport_rx,
        commands_rx,
        events_tx,
    };
    let task = tokio::spawn(driver.run());

    SessionHandle {
        commands,
        events,
        task,
    }
}

struct Driver {
    session: Session,
    transport: Transport,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    commands_rx: mpsc::UnboundedReceiver<SessionCommand>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl Driver {
    async fn run(mut self) {
        let mut ui_attached = true;

        loop {
            tokio::select! {
                event = self.transport_rx.recv() => match event {
                    Some(TransportEvent::Disconnected(reason)) => {
                        self.session.on_disconnected();
                        self.emit(SessionEvent::Disconnected { reason });
                        break;
                    }
                    Some(event) => self.on_transport(event),
                    None => break,
                },
                cmd = self.commands_rx.recv(), if ui_attached => match cmd {
                    Some(cmd) => self.on_command(cmd),
                    None => {
                        debug!("Session handle dropped, leaving");
                        ui_attached = false;
                        let step = self.session.leave();
                        self.apply(step, DisconnectReason::LocalClose);
                    }
                },
            }
        }

        info!(phase = ?self.session.phase(), "Session driver finished");
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { peer, info } => {
                debug!(%peer, "Peer connected");
                self.emit(SessionEvent::Connected { info });
                let step = self.session.on_connected();
                self.apply(step, DisconnectReason::LocalClose);
            }
            TransportEvent::Message(msg) => {
                let step = self.session.handle_message(msg);
                // Only a DISCONNECT from the peer closes from this path.
                self.apply(step, DisconnectReason::PeerLeft);
            }
            TransportEvent::Disconnected(_) => {}
        }
    }

    fn on_command(&mut self, cmd: SessionCommand) {
        let result = match cmd {
            SessionCommand::SetSecret(secret) => self.session.set_secret(&secret),
            SessionCommand::Guess(guess) => self.session.guess(&guess),
            SessionCommand::Leave => Ok(self.session.leave()),
        };

        match result {
            Ok(step) => self.apply(step, DisconnectReason::LocalClose),
            Err(error) => {
                debug!(%error, "Command rejected");
                self.emit(SessionEvent::CommandRejected { error });
            }
        }
    }

    fn apply(&mut self, step: Step, close_reason: DisconnectReason) {
        for msg in &step.outbound {
            if let Err(e) = self.transport.send(msg) {
                warn!(kind = %msg.kind(), "Failed to queue message: {}", e);
            }
        }
        for event in step.events {
            self.emit(event);
        }
        if step.close {
            self.transport.close_with(close_reason);
        }
    }

    fn emit(&self, event: SessionEvent) {
        // The UI may already be gone; the session still winds down.
        let _ = self.events_tx.send(event);
    }
}
