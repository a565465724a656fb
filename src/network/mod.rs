//! Network Layer
//!
//! Two-peer play over a single TCP stream. `transport` moves frames,
//! `session` decides what they mean, and `driver` runs the two together on
//! one task.

pub mod codec;
pub mod driver;
pub mod protocol;
pub mod session;
pub mod transport;

pub use codec::{encode_frame, CodecError, FrameDecoder};
pub use driver::{host_session, join_session, DriverError, SessionCommand, SessionHandle};
pub use protocol::{GuessReport, Message, MessageKind};
pub use session::{Outcome, Phase, Session, SessionError, SessionEvent, Step};
pub use transport::{
    peer_address, ConnectionState, DisconnectReason, ListenAddress, Role, Transport,
    TransportError, TransportEvent,
};
