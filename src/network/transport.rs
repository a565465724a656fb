//! TCP Transport
//!
//! Owns the one stream connection of a session. The host listens on the
//! well-known port and accepts a single opponent; the joiner dials an
//! address with a bounded timeout. Once connected, a reader task decodes
//! frames and a writer task drains the outbound queue, so `send` never
//! blocks the caller.
//!
//! Everything the background tasks observe travels to the owner over one
//! ordered channel of [`TransportEvent`]s. `Disconnected` is emitted at most
//! once per transport, whichever path closes it first.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use super::codec::{encode_frame, FrameDecoder};
use super::protocol::Message;
use crate::config::NetConfig;

/// Which side of the connection this peer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Listens and accepts the opponent.
    Host,
    /// Dials the host.
    Joiner,
}

/// Lifecycle of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No role chosen yet.
    Idle,
    /// Host waiting for the opponent.
    Listening,
    /// Joiner dialing.
    Connecting,
    /// Stream live.
    Established,
    /// Torn down; terminal.
    Closed,
}

/// Address the host can share out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenAddress {
    /// Best-guess LAN address of this machine.
    pub ip: IpAddr,
    /// Bound port.
    pub port: u16,
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddr::new(self.ip, self.port))
    }
}

/// Why the connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Closed by this side.
    LocalClose,
    /// Opponent sent DISCONNECT.
    PeerLeft,
    /// Opponent closed the stream.
    PeerClosed,
    /// Socket read failed.
    ReadFailed(String),
    /// Socket write failed.
    SendFailed(String),
    /// Listener failed before anyone joined.
    AcceptFailed(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::LocalClose => write!(f, "Connection closed"),
            DisconnectReason::PeerLeft => write!(f, "Opponent left the game"),
            DisconnectReason::PeerClosed => write!(f, "Connection lost"),
            DisconnectReason::ReadFailed(e) => write!(f, "Connection lost: {}", e),
            DisconnectReason::SendFailed(e) => write!(f, "Send failed: {}", e),
            DisconnectReason::AcceptFailed(e) => write!(f, "Hosting failed: {}", e),
        }
    }
}

/// Events delivered to the transport owner, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Stream established.
    Connected {
        /// Remote address.
        peer: SocketAddr,
        /// Human-readable description.
        info: String,
    },
    /// A decoded message.
    Message(Message),
    /// Stream gone. Sent once.
    Disconnected(DisconnectReason),
}

/// Transport errors returned synchronously.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Listening port unavailable.
    #[error("Failed to start server on {addr}: {source}")]
    BindFailed {
        /// Requested bind address.
        addr: SocketAddr,
        /// Underlying error.
        source: std::io::Error,
    },

    /// No answer within the connect timeout.
    #[error("Connection to {addr} timed out after {after:?}")]
    ConnectTimeout {
        /// Dialed address.
        addr: String,
        /// Configured timeout.
        after: Duration,
    },

    /// Nobody listening at the address.
    #[error("Connection refused by {addr} - is the host running?")]
    ConnectionRefused {
        /// Dialed address.
        addr: String,
    },

    /// Any other connect failure.
    #[error("Connection to {addr} failed: {source}")]
    ConnectFailed {
        /// Dialed address.
        addr: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Writer is gone; the disconnect notification carries the cause.
    #[error("Send failed: connection is closing")]
    SendFailed,

    /// No live connection.
    #[error("Not connected")]
    NotConnected,

    /// Host or join already called on this transport.
    #[error("Transport already active as {0:?}")]
    AlreadyActive(Role),

    /// Message could not be serialized.
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// State shared with the background tasks.
struct Shared {
    running: AtomicBool,
    notified: AtomicBool,
    state: Mutex<ConnectionState>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Closed)
    }

    fn set_state(&self, next: ConnectionState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Stop background work and notify the owner once.
    fn close(&self, reason: DisconnectReason) {
        self.running.store(false, Ordering::SeqCst);
        // Dropping the queue lets the writer flush what is queued, then exit.
        if let Ok(mut outbound) = self.outbound.lock() {
            outbound.take();
        }
        self.set_state(ConnectionState::Closed);

        if !self.notified.swap(true, Ordering::SeqCst) {
            info!(%reason, "Disconnected");
            let _ = self.events.send(TransportEvent::Disconnected(reason));
        }
    }
}

/// One peer-to-peer connection.
pub struct Transport {
    config: NetConfig,
    role: Option<Role>,
    shared: Arc<Shared>,
}

impl Transport {
    /// Create an idle transport and the receiver for its events.
    pub fn new(config: NetConfig) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            notified: AtomicBool::new(false),
            state: Mutex::new(ConnectionState::Idle),
            outbound: Mutex::new(None),
            events,
        });

        let transport = Self {
            config,
            role: None,
            shared,
        };
        (transport, events_rx)
    }

    /// Role chosen by `host` or `join`.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Listen for one opponent.
    ///
    /// Returns once the port is bound; the accept happens in the background
    /// and is reported as [`TransportEvent::Connected`].
    #[instrument(skip(self))]
    pub async fn host(&mut self) -> Result<ListenAddress, TransportError> {
        self.claim(Role::Host)?;

        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.port));
        let bound = match TcpListener::bind(bind_addr).await {
            Ok(listener) => listener.local_addr().map(|addr| (listener, addr)),
            Err(e) => Err(e),
        };
        let (listener, local) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                self.release();
                return Err(TransportError::BindFailed {
                    addr: bind_addr,
                    source,
                });
            }
        };

        self.shared.set_state(ConnectionState::Listening);
        let address = ListenAddress {
            ip: local_lan_ip().await,
            port: local.port(),
        };
        info!(%address, "Hosting game");

        tokio::spawn(accept_loop(listener, self.shared.clone(), self.config.clone()));
        Ok(address)
    }

    /// Connect to a host.
    ///
    /// `address` may omit the port, in which case the configured port is used.
    #[instrument(skip(self))]
    pub async fn join(&mut self, address: &str) -> Result<(), TransportError> {
        self.claim(Role::Joiner)?;
        self.shared.set_state(ConnectionState::Connecting);

        let target = peer_address(address, self.config.port);
        let after = self.config.connect_timeout;

        let stream = match timeout(after, TcpStream::connect(target.as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                self.release();
                return Err(TransportError::ConnectionRefused { addr: target });
            }
            Ok(Err(source)) => {
                self.release();
                return Err(TransportError::ConnectFailed {
                    addr: target,
                    source,
                });
            }
            Err(_) => {
                self.release();
                return Err(TransportError::ConnectTimeout {
                    addr: target,
                    after,
                });
            }
        };

        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(source) => {
                self.release();
                return Err(TransportError::ConnectFailed {
                    addr: target,
                    source,
                });
            }
        };

        info!(%peer, "Connected to host");
        establish(
            stream,
            peer,
            "Connected to host".to_string(),
            self.shared.clone(),
            &self.config,
        );
        Ok(())
    }

    /// Queue a message for the peer.
    ///
    /// Returns as soon as the frame is queued. A write that later fails
    /// closes the transport and surfaces as `Disconnected(SendFailed)`.
    pub fn send(&self, msg: &Message) -> Result<(), TransportError> {
        let frame = encode_frame(msg)?;

        let outbound = self
            .shared
            .outbound
            .lock()
            .map_err(|_| TransportError::NotConnected)?;
        let queue = outbound.as_ref().ok_or(TransportError::NotConnected)?;
        queue.send(frame).map_err(|_| TransportError::SendFailed)?;

        debug!(kind = %msg.kind(), "Queued message");
        Ok(())
    }

    /// Close everything. Safe to call repeatedly.
    pub fn disconnect(&self) {
        self.close_with(DisconnectReason::LocalClose);
    }

    /// Close with an explicit reason. Only the first close is reported.
    pub fn close_with(&self, reason: DisconnectReason) {
        if self.shared.state() == ConnectionState::Idle {
            return;
        }
        self.shared.close(reason);
    }

    fn claim(&mut self, role: Role) -> Result<(), TransportError> {
        if let Some(active) = self.role {
            return Err(TransportError::AlreadyActive(active));
        }
        if self.shared.notified.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.role = Some(role);
        self.shared.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Undo `claim` after a failed setup so the caller may retry.
    fn release(&mut self) {
        self.role = None;
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Idle);
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Accept exactly one opponent, then stop listening.
async fn accept_loop(listener: TcpListener, shared: Arc<Shared>, config: NetConfig) {
    while shared.is_running() {
        match timeout(config.poll_interval, listener.accept()).await {
            Err(_) => continue,
            Ok(Ok((stream, peer))) => {
                drop(listener);
                if !shared.is_running() {
                    debug!(%peer, "Dropping late connection");
                    return;
                }
                info!(%peer, "Player joined");
                establish(
                    stream,
                    peer,
                    format!("Player joined from {}", peer.ip()),
                    shared,
                    &config,
                );
                return;
            }
            Ok(Err(e)) => {
                error!("Accept error: {}", e);
                shared.close(DisconnectReason::AcceptFailed(e.to_string()));
                return;
            }
        }
    }
    debug!("Accept loop stopped");
}

/// Wire up reader and writer tasks for a live stream.
fn establish(
    stream: TcpStream,
    peer: SocketAddr,
    info: String,
    shared: Arc<Shared>,
    config: &NetConfig,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("set_nodelay failed: {}", e);
    }
    let (reader, writer) = stream.into_split();
    let (queue, queue_rx) = mpsc::unbounded_channel();

    if let Ok(mut outbound) = shared.outbound.lock() {
        *outbound = Some(queue);
    }
    shared.set_state(ConnectionState::Established);

    if !shared.emit(TransportEvent::Connected { peer, info }) {
        shared.close(DisconnectReason::LocalClose);
        return;
    }

    tokio::spawn(write_loop(writer, queue_rx, shared.clone()));
    tokio::spawn(read_loop(reader, shared, config.clone()));
}

/// Drain the outbound queue onto the socket. Sole writer.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
    shared: Arc<Shared>,
) {
    while let Some(frame) = queue.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            warn!("Send error: {}", e);
            shared.close(DisconnectReason::SendFailed(e.to_string()));
            return;
        }
    }
    let _ = writer.shutdown().await;
    debug!("Writer stopped");
}

/// Read, decode and forward frames until the stream ends or shutdown.
async fn read_loop(mut reader: OwnedReadHalf, shared: Arc<Shared>, config: NetConfig) {
    let mut decoder = FrameDecoder::new(config.max_frame_len);
    let mut buf = vec![0u8; config.read_buffer_size.max(1)];

    let reason = 'read: loop {
        if !shared.is_running() {
            break DisconnectReason::LocalClose;
        }

        match timeout(config.poll_interval, reader.read(&mut buf)).await {
            Err(_) => continue,
            Ok(Ok(0)) => break DisconnectReason::PeerClosed,
            Ok(Ok(n)) => {
                for msg in decoder.decode(&buf[..n]) {
                    debug!(kind = %msg.kind(), "Received message");
                    let leaving = msg == Message::Disconnect;
                    if !shared.emit(TransportEvent::Message(msg)) {
                        break 'read DisconnectReason::LocalClose;
                    }
                    if leaving {
                        break 'read DisconnectReason::PeerLeft;
                    }
                }
            }
            Ok(Err(e)) => break DisconnectReason::ReadFailed(e.to_string()),
        }
    };

    shared.close(reason);
    debug!("Reader stopped");
}

/// Normalize a user-supplied peer address, appending `default_port` when
/// none is given.
pub fn peer_address(address: &str, default_port: u16) -> String {
    let address = address.trim();
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return SocketAddr::new(ip, default_port).to_string();
    }
    if address.contains(':') {
        address.to_string()
    } else {
        format!("{}:{}", address, default_port)
    }
}

/// Outbound LAN address of this machine, or loopback if there is none.
///
/// Connecting a UDP socket picks a route without sending anything.
async fn local_lan_ip() -> IpAddr {
    async fn probe() -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).await?;
        Ok(socket.local_addr()?.ip())
    }

    match probe().await {
        Ok(ip) if !ip.is_unspecified() => ip,
        _ => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::codec::encode_frame;

    fn test_config() -> NetConfig {
        NetConfig {
            port: 0,
            poll_interval: Duration::from_millis(20),
            connect_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("event channel closed")
    }

    async fn connected_pair() -> (
        Transport,
        mpsc::UnboundedReceiver<TransportEvent>,
        Transport,
        mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let (mut host, mut host_rx) = Transport::new(test_config());
        let address = host.host().await.unwrap();

        let (mut joiner, mut joiner_rx) = Transport::new(test_config());
        joiner
            .join(&format!("127.0.0.1:{}", address.port))
            .await
            .unwrap();

        assert!(matches!(next_event(&mut host_rx).await, TransportEvent::Connected { .. }));
        assert!(matches!(next_event(&mut joiner_rx).await, TransportEvent::Connected { .. }));
        (host, host_rx, joiner, joiner_rx)
    }

    #[test]
    fn test_peer_address() {
        assert_eq!(peer_address("192.168.1.5", 5555), "192.168.1.5:5555");
        assert_eq!(peer_address(" 10.0.0.2:6000 ", 5555), "10.0.0.2:6000");
        assert_eq!(peer_address("::1", 5555), "[::1]:5555");
        assert_eq!(peer_address("localhost", 5555), "localhost:5555");
        assert_eq!(peer_address("localhost:7000", 5555), "localhost:7000");
    }

    #[test]
    fn test_listen_address_display() {
        let address = ListenAddress {
            ip: IpAddr::V4(Ipv4Addr::new(192, 168, 0, 10)),
            port: 5555,
        };
        assert_eq!(address.to_string(), "192.168.0.10:5555");
    }

    #[tokio::test]
    async fn test_host_and_join_exchange_messages() {
        let (host, mut host_rx, joiner, mut joiner_rx) = connected_pair().await;

        assert_eq!(host.state(), ConnectionState::Established);
        assert_eq!(joiner.role(), Some(Role::Joiner));

        host.send(&Message::Name("Host".into())).unwrap();
        host.send(&Message::SetupRequest(5)).unwrap();
        joiner.send(&Message::Name("Joiner".into())).unwrap();

        assert_eq!(
            next_event(&mut joiner_rx).await,
            TransportEvent::Message(Message::Name("Host".into()))
        );
        assert_eq!(
            next_event(&mut joiner_rx).await,
            TransportEvent::Message(Message::SetupRequest(5))
        );
        assert_eq!(
            next_event(&mut host_rx).await,
            TransportEvent::Message(Message::Name("Joiner".into()))
        );
    }

    #[tokio::test]
    async fn test_disconnect_notifies_once() {
        let (host, mut host_rx, _joiner, mut joiner_rx) = connected_pair().await;

        host.disconnect();
        host.disconnect();
        host.close_with(DisconnectReason::ReadFailed("late".into()));

        assert_eq!(
            next_event(&mut host_rx).await,
            TransportEvent::Disconnected(DisconnectReason::LocalClose)
        );
        assert_eq!(host.state(), ConnectionState::Closed);
        assert!(matches!(host.send(&Message::Disconnect), Err(TransportError::NotConnected)));

        // Opponent sees the stream end.
        assert_eq!(
            next_event(&mut joiner_rx).await,
            TransportEvent::Disconnected(DisconnectReason::PeerClosed)
        );

        // Let the background tasks wind down, then check nothing else arrived.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(host_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_peer_disconnect_message() {
        let (host, mut host_rx, joiner, mut joiner_rx) = connected_pair().await;

        joiner.send(&Message::Disconnect).unwrap();
        joiner.disconnect();

        assert_eq!(
            next_event(&mut host_rx).await,
            TransportEvent::Message(Message::Disconnect)
        );
        assert_eq!(
            next_event(&mut host_rx).await,
            TransportEvent::Disconnected(DisconnectReason::PeerLeft)
        );
        assert_eq!(
            next_event(&mut joiner_rx).await,
            TransportEvent::Disconnected(DisconnectReason::LocalClose)
        );
        drop(host);
    }

    #[tokio::test]
    async fn test_malformed_frame_mid_stream() {
        let (mut host, mut host_rx) = Transport::new(test_config());
        let address = host.host().await.unwrap();

        let mut raw = TcpStream::connect(("127.0.0.1", address.port)).await.unwrap();
        assert!(matches!(next_event(&mut host_rx).await, TransportEvent::Connected { .. }));

        let mut bytes = encode_frame(&Message::Name("raw".into())).unwrap();
        bytes.extend_from_slice(b"{\"type\":\"RESULT\",\"data\":{\"gue\n");
        bytes.extend(encode_frame(&Message::Guess("1234".into())).unwrap());
        raw.write_all(&bytes).await.unwrap();

        assert_eq!(
            next_event(&mut host_rx).await,
            TransportEvent::Message(Message::Name("raw".into()))
        );
        assert_eq!(
            next_event(&mut host_rx).await,
            TransportEvent::Message(Message::Guess("1234".into()))
        );

        drop(raw);
        assert_eq!(
            next_event(&mut host_rx).await,
            TransportEvent::Disconnected(DisconnectReason::PeerClosed)
        );
    }

    #[tokio::test]
    async fn test_frames_split_across_writes() {
        let (mut host, mut host_rx) = Transport::new(test_config());
        let address = host.host().await.unwrap();

        let mut raw = TcpStream::connect(("127.0.0.1", address.port)).await.unwrap();
        raw.set_nodelay(true).unwrap();
        assert!(matches!(next_event(&mut host_rx).await, TransportEvent::Connected { .. }));

        let frame = encode_frame(&Message::SecretReady(true)).unwrap();
        let (head, tail) = frame.split_at(5);
        raw.write_all(head).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        raw.write_all(tail).await.unwrap();

        assert_eq!(
            next_event(&mut host_rx).await,
            TransportEvent::Message(Message::SecretReady(true))
        );
    }

    #[tokio::test]
    async fn test_send_before_connect() {
        let (transport, _rx) = Transport::new(test_config());
        assert!(matches!(
            transport.send(&Message::Name("x".into())),
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_role_is_exclusive() {
        let (mut host, _rx) = Transport::new(test_config());
        host.host().await.unwrap();
        assert!(matches!(
            host.join("127.0.0.1").await,
            Err(TransportError::AlreadyActive(Role::Host))
        ));
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let config = NetConfig { port, ..test_config() };
        let (mut host, _rx) = Transport::new(config);
        assert!(matches!(host.host().await, Err(TransportError::BindFailed { .. })));
        assert_eq!(host.role(), None);
        assert_eq!(host.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_join_refused() {
        let port = {
            let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
            probe.local_addr().unwrap().port()
        };

        let (mut joiner, _rx) = Transport::new(test_config());
        let err = joiner
            .join(&format!("127.0.0.1:{}", port))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectionRefused { .. }));
        assert_eq!(joiner.role(), None);
    }

    #[tokio::test]
    async fn test_write_failure_notifies_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ours = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (theirs, _) = listener.accept().await.unwrap();

        let (events, mut rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            running: AtomicBool::new(true),
            notified: AtomicBool::new(false),
            state: Mutex::new(ConnectionState::Established),
            outbound: Mutex::new(None),
            events,
        });

        // No reader runs, so only the writer can notice the dead peer.
        let (_reader, writer) = ours.into_split();
        let (queue, queue_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(writer, queue_rx, shared.clone()));
        drop(theirs);

        let frame = encode_frame(&Message::Guess("1234".into())).unwrap();
        let event = timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(event) = rx.try_recv() {
                    return event;
                }
                let _ = queue.send(frame.clone());
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("write never failed");

        assert!(matches!(
            event,
            TransportEvent::Disconnected(DisconnectReason::SendFailed(_))
        ));
        assert_eq!(shared.state(), ConnectionState::Closed);

        // A later read failure on the same connection stays silent.
        shared.close(DisconnectReason::ReadFailed("reset".into()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_times_out() {
        // Backlog of one and nobody accepting: once the queue is full the
        // listener drops further SYNs and connects hang.
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut fillers = Vec::new();
        for _ in 0..16 {
            match timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => fillers.push(stream),
                _ => break,
            }
        }

        let config = NetConfig {
            connect_timeout: Duration::from_millis(200),
            ..test_config()
        };
        let (mut joiner, _rx) = Transport::new(config);
        let err = joiner.join(&addr.to_string()).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::ConnectTimeout { after, .. } if after == Duration::from_millis(200)
        ));
        assert_eq!(joiner.role(), None);
        assert_eq!(joiner.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_hosting_notifies_once() {
        let (mut host, mut rx) = Transport::new(test_config());
        host.host().await.unwrap();
        host.disconnect();
        host.disconnect();

        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::Disconnected(DisconnectReason::LocalClose)
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
