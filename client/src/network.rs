//! Connection lifecycle, join handshake and the WebSocket transport

use crate::config::{Endpoint, ReconnectPolicy};
use crate::error::ClientError;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, PlayerId, RaceSnapshot, ServerMessage};
use std::collections::HashMap;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Joined,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Joined => "Joined",
        }
    }
}

/// Generation number of one transport connection. Events from an older
/// generation than the current one are ignored.
pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Closed,
    Error(String),
}

/// A message-oriented, full-duplex transport.
///
/// `open` only starts the attempt; completion, inbound frames and closure are
/// reported asynchronously as [`TransportEvent`]s tagged with the returned id.
/// Every opened connection reports exactly one `Closed`, unless it was closed
/// locally through [`Transport::close`].
pub trait Transport {
    fn open(&mut self, url: &str) -> Result<ConnectionId, ClientError>;
    fn send(&mut self, conn: ConnectionId, text: String) -> Result<(), ClientError>;
    fn close(&mut self, conn: ConnectionId);
}

/// What an inbound transport event meant for the rest of the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Nothing,
    Snapshot(RaceSnapshot),
    Joined(String),
    Rejected(String),
    Disconnected,
}

/// Owns the transport and walks `disconnected → connecting → connected → joined`.
pub struct ConnectionChannel<T: Transport> {
    transport: T,
    endpoint: Endpoint,
    reconnect: ReconnectPolicy,
    state: ConnectionState,
    connection: Option<ConnectionId>,
    player_id: Option<PlayerId>,
    last_error: Option<String>,
    reconnect_at: Option<Instant>,
    attempts: u32,
}

impl<T: Transport> ConnectionChannel<T> {
    pub fn new(transport: T, endpoint: Endpoint, reconnect: ReconnectPolicy) -> Self {
        Self {
            transport,
            endpoint,
            reconnect,
            state: ConnectionState::Disconnected,
            connection: None,
            player_id: None,
            last_error: None,
            reconnect_at: None,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn player_id(&self) -> Option<&PlayerId> {
        self.player_id.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_at.is_some()
    }

    /// Number of times a connection was opened, reconnects included.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Opens a new connection that will identify as `player_id` once open.
    ///
    /// Any previous connection is closed first and its late events ignored.
    pub fn connect(&mut self, player_id: PlayerId, now: Instant) -> Result<(), ClientError> {
        if let Some(old) = self.connection.take() {
            debug!("Closing connection {} before reconnecting", old);
            self.transport.close(old);
        }
        self.player_id = Some(player_id);
        self.reconnect_at = None;
        self.last_error = None;
        self.open(now)
    }

    fn open(&mut self, now: Instant) -> Result<(), ClientError> {
        let url = self.endpoint.url();
        info!("Connecting to {}", url);
        self.attempts += 1;
        self.state = ConnectionState::Connecting;

        match self.transport.open(&url) {
            Ok(conn) => {
                self.connection = Some(conn);
                Ok(())
            }
            Err(e) => {
                error!("Failed to open connection: {}", e);
                self.state = ConnectionState::Disconnected;
                self.last_error = Some(e.to_string());
                self.schedule_reconnect(now);
                Err(e)
            }
        }
    }

    /// Sends a gameplay message. Only allowed once joined.
    pub fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        if self.state != ConnectionState::Joined {
            return Err(ClientError::NotJoined);
        }
        let conn = self.connection.ok_or(ClientError::NotJoined)?;
        self.transport.send(conn, message.encode()?)
    }

    /// Feeds one transport event through the state machine.
    pub fn handle(&mut self, conn: ConnectionId, event: TransportEvent, now: Instant) -> Delivery {
        if self.connection != Some(conn) {
            debug!("Ignoring {:?} from stale connection {}", event, conn);
            return Delivery::Nothing;
        }

        match event {
            TransportEvent::Opened => self.on_open(conn),
            TransportEvent::Message(text) => self.on_message(conn, &text),
            TransportEvent::Error(reason) => {
                warn!("Transport error: {}", reason);
                self.state = ConnectionState::Disconnected;
                self.last_error = Some(reason);
                Delivery::Disconnected
            }
            TransportEvent::Closed => {
                info!("Disconnected from server");
                if let Some(conn) = self.connection.take() {
                    self.transport.close(conn);
                }
                self.state = ConnectionState::Disconnected;
                self.schedule_reconnect(now);
                Delivery::Disconnected
            }
        }
    }

    fn on_open(&mut self, conn: ConnectionId) -> Delivery {
        info!("Connected to server");
        self.state = ConnectionState::Connected;

        let Some(player_id) = self.player_id.clone() else {
            return Delivery::Nothing;
        };
        info!("Identifying as player {}", player_id);

        let hello = ClientMessage::PlayerId { player_id };
        let sent = hello
            .encode()
            .map_err(ClientError::from)
            .and_then(|text| self.transport.send(conn, text));
        if let Err(e) = sent {
            error!("Failed to send identification: {}", e);
            self.state = ConnectionState::Disconnected;
            self.last_error = Some(e.to_string());
            return Delivery::Disconnected;
        }
        Delivery::Nothing
    }

    fn on_message(&mut self, conn: ConnectionId, text: &str) -> Delivery {
        let message = match ServerMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping inbound message: {}", e);
                return Delivery::Nothing;
            }
        };

        match message {
            ServerMessage::GameState { state } => Delivery::Snapshot(state),
            ServerMessage::JoinSuccess { message } => {
                info!("Join successful: {}", message);
                self.state = ConnectionState::Joined;
                self.last_error = None;
                Delivery::Joined(message)
            }
            ServerMessage::JoinError { error } => {
                error!("Join rejected: {}", error);
                // Closed locally: the close event is never delivered, so no
                // reconnect retries the rejected id.
                self.transport.close(conn);
                self.connection = None;
                self.reconnect_at = None;
                self.state = ConnectionState::Disconnected;
                self.last_error = Some(error.clone());
                Delivery::Rejected(error)
            }
        }
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        let Some(delay) = self.reconnect.delay() else {
            return;
        };
        if self.player_id.is_none() || self.reconnect_at.is_some() {
            return;
        }
        info!("Reconnecting in {:.1}s", delay.as_secs_f32());
        self.reconnect_at = Some(now + delay);
    }

    /// Fires a due reconnect. Returns true if a new attempt was started.
    pub fn poll_reconnect(&mut self, now: Instant) -> bool {
        match self.reconnect_at {
            Some(at) if now >= at => {
                self.reconnect_at = None;
                if let Err(e) = self.open(now) {
                    warn!("Reconnect attempt failed: {}", e);
                }
                true
            }
            _ => false,
        }
    }

    /// Closes the connection for good; no reconnect follows.
    pub fn disconnect(&mut self) {
        self.reconnect_at = None;
        if let Some(conn) = self.connection.take() {
            info!("Closing connection");
            self.transport.close(conn);
        }
        self.state = ConnectionState::Disconnected;
    }
}

/// WebSocket transport running its connections as tasks on a tokio runtime.
///
/// Inbound events are forwarded on `events`; the owner drains that channel
/// from its single thread of control.
pub struct WsTransport {
    runtime: Handle,
    events: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
    outbound: HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    next_id: ConnectionId,
}

impl WsTransport {
    pub fn new(
        runtime: Handle,
        events: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
    ) -> Self {
        Self {
            runtime,
            events,
            outbound: HashMap::new(),
            next_id: 0,
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self, url: &str) -> Result<ConnectionId, ClientError> {
        self.next_id += 1;
        let id = self.next_id;

        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound.insert(id, tx);
        self.runtime
            .spawn(run_connection(id, url.to_string(), rx, self.events.clone()));

        Ok(id)
    }

    fn send(&mut self, conn: ConnectionId, text: String) -> Result<(), ClientError> {
        let tx = self
            .outbound
            .get(&conn)
            .ok_or_else(|| ClientError::Transport(format!("connection {} is closed", conn)))?;
        tx.send(Message::Text(text))
            .map_err(|_| ClientError::Transport(format!("connection {} has shut down", conn)))
    }

    fn close(&mut self, conn: ConnectionId) {
        if let Some(tx) = self.outbound.remove(&conn) {
            let _ = tx.send(Message::Close(None));
        }
    }
}

async fn run_connection(
    id: ConnectionId,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let _ = events.send((id, TransportEvent::Error(e.to_string())));
            let _ = events.send((id, TransportEvent::Closed));
            return;
        }
    };
    let _ = events.send((id, TransportEvent::Opened));

    let (mut sink, mut stream) = stream.split();

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send((id, TransportEvent::Message(text)));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        let _ = events.send((id, TransportEvent::Message(text)));
                    }
                    Err(_) => warn!("Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send((id, TransportEvent::Error(e.to_string())));
                    break;
                }
            },

            outgoing = outbound.recv() => match outgoing {
                Some(Message::Close(frame)) => {
                    let _ = sink.send(Message::Close(frame)).await;
                    break;
                }
                Some(message) => {
                    if let Err(e) = sink.send(message).await {
                        let _ = events.send((id, TransportEvent::Error(e.to_string())));
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
        }
    }

    let _ = events.send((id, TransportEvent::Closed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Default)]
    struct MockTransport {
        opened: Vec<String>,
        sent: Vec<(ConnectionId, String)>,
        closed: Vec<ConnectionId>,
        fail_open: bool,
    }

    impl Transport for MockTransport {
        fn open(&mut self, url: &str) -> Result<ConnectionId, ClientError> {
            if self.fail_open {
                return Err(ClientError::Transport("refused".to_string()));
            }
            self.opened.push(url.to_string());
            Ok(self.opened.len() as ConnectionId)
        }

        fn send(&mut self, conn: ConnectionId, text: String) -> Result<(), ClientError> {
            self.sent.push((conn, text));
            Ok(())
        }

        fn close(&mut self, conn: ConnectionId) {
            self.closed.push(conn);
        }
    }

    fn channel(policy: ReconnectPolicy) -> ConnectionChannel<MockTransport> {
        ConnectionChannel::new(
            MockTransport::default(),
            Endpoint::new("localhost:8080"),
            policy,
        )
    }

    fn text(message: &ServerMessage) -> TransportEvent {
        TransportEvent::Message(message.encode().unwrap())
    }

    #[test]
    fn test_handshake_reaches_joined() {
        let now = Instant::now();
        let mut channel = channel(ReconnectPolicy::Disabled);
        assert_eq!(channel.state(), ConnectionState::Disconnected);

        channel.connect(PlayerId::from(7), now).unwrap();
        assert_eq!(channel.state(), ConnectionState::Connecting);
        assert_eq!(channel.transport().opened, vec!["ws://localhost:8080/ws"]);

        assert_eq!(channel.handle(1, TransportEvent::Opened, now), Delivery::Nothing);
        assert_eq!(channel.state(), ConnectionState::Connected);
        assert_eq!(
            channel.transport().sent,
            vec![(1, r#"{"type":"player-id","playerId":"7"}"#.to_string())]
        );

        let joined = channel.handle(
            1,
            text(&ServerMessage::JoinSuccess {
                message: "welcome".to_string(),
            }),
            now,
        );
        assert_eq!(joined, Delivery::Joined("welcome".to_string()));
        assert_eq!(channel.state(), ConnectionState::Joined);
    }

    #[test]
    fn test_join_error_closes_without_retry() {
        let now = Instant::now();
        let mut channel = channel(ReconnectPolicy::After(Duration::from_secs(3)));
        channel.connect(PlayerId::from(7), now).unwrap();
        channel.handle(1, TransportEvent::Opened, now);

        let rejected = channel.handle(
            1,
            text(&ServerMessage::JoinError {
                error: "id taken".to_string(),
            }),
            now,
        );
        assert_eq!(rejected, Delivery::Rejected("id taken".to_string()));
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert_eq!(channel.transport().closed, vec![1]);
        assert_eq!(channel.last_error(), Some("id taken"));

        // A late close from the rejected connection must not trigger a retry.
        assert_eq!(channel.handle(1, TransportEvent::Closed, now), Delivery::Nothing);
        assert!(!channel.reconnect_pending());
        assert!(!channel.poll_reconnect(now + Duration::from_secs(10)));
        assert_eq!(channel.attempts(), 1);
    }

    #[test]
    fn test_send_requires_joined() {
        let now = Instant::now();
        let mut channel = channel(ReconnectPolicy::Disabled);
        let message = ClientMessage::ChangeCar {
            player_id: PlayerId::from(1),
        };
        assert!(matches!(channel.send(&message), Err(ClientError::NotJoined)));

        channel.connect(PlayerId::from(1), now).unwrap();
        channel.handle(1, TransportEvent::Opened, now);
        assert!(matches!(channel.send(&message), Err(ClientError::NotJoined)));

        channel.handle(1, text(&ServerMessage::JoinSuccess { message: String::new() }), now);
        assert!(channel.send(&message).is_ok());
        assert_eq!(channel.transport().sent.len(), 2);
    }

    #[test]
    fn test_close_without_reconnect_policy() {
        let now = Instant::now();
        let mut channel = channel(ReconnectPolicy::Disabled);
        channel.connect(PlayerId::from(3), now).unwrap();
        channel.handle(1, TransportEvent::Opened, now);
        channel.handle(1, text(&ServerMessage::JoinSuccess { message: String::new() }), now);

        assert_eq!(channel.handle(1, TransportEvent::Closed, now), Delivery::Disconnected);
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert_eq!(channel.transport().closed, vec![1]);
        assert!(!channel.reconnect_pending());
        assert!(!channel.poll_reconnect(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_reconnect_fires_once_after_delay() {
        let now = Instant::now();
        let delay = Duration::from_secs(3);
        let mut channel = channel(ReconnectPolicy::After(delay));
        channel.connect(PlayerId::from(3), now).unwrap();
        channel.handle(1, TransportEvent::Opened, now);

        channel.handle(1, TransportEvent::Error("reset".to_string()), now);
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(!channel.reconnect_pending());

        channel.handle(1, TransportEvent::Closed, now);
        assert!(channel.reconnect_pending());

        assert!(!channel.poll_reconnect(now + delay - Duration::from_millis(1)));
        assert!(channel.poll_reconnect(now + delay));
        assert!(!channel.poll_reconnect(now + delay * 5));

        assert_eq!(channel.attempts(), 2);
        assert_eq!(channel.transport().opened.len(), 2);
        assert_eq!(channel.state(), ConnectionState::Connecting);

        // The new connection identifies again with the same id.
        channel.handle(2, TransportEvent::Opened, now + delay);
        assert_eq!(channel.transport().sent.last().unwrap().0, 2);
    }

    #[test]
    fn test_stale_and_malformed_events_change_nothing() {
        let now = Instant::now();
        let mut channel = channel(ReconnectPolicy::Disabled);
        channel.connect(PlayerId::from(3), now).unwrap();
        channel.handle(1, TransportEvent::Opened, now);
        channel.handle(1, text(&ServerMessage::JoinSuccess { message: String::new() }), now);

        let delivery = channel.handle(1, TransportEvent::Message("{oops".to_string()), now);
        assert_eq!(delivery, Delivery::Nothing);
        assert_eq!(channel.state(), ConnectionState::Joined);

        let delivery = channel.handle(1, TransportEvent::Message(r#"{"type":"mystery"}"#.to_string()), now);
        assert_eq!(delivery, Delivery::Nothing);

        assert_eq!(channel.handle(42, TransportEvent::Closed, now), Delivery::Nothing);
        assert_eq!(channel.state(), ConnectionState::Joined);
    }

    #[test]
    fn test_open_failure_is_not_fatal() {
        let now = Instant::now();
        let mut channel = channel(ReconnectPolicy::After(Duration::from_secs(1)));
        channel.transport_mut().fail_open = true;

        assert!(channel.connect(PlayerId::from(9), now).is_err());
        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(channel.reconnect_pending());

        channel.transport_mut().fail_open = false;
        assert!(channel.poll_reconnect(now + Duration::from_secs(1)));
        assert_eq!(channel.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_disconnect_cancels_reconnect() {
        let now = Instant::now();
        let mut channel = channel(ReconnectPolicy::After(Duration::from_secs(1)));
        channel.connect(PlayerId::from(9), now).unwrap();
        channel.disconnect();
        assert_eq!(channel.transport().closed, vec![1]);
        assert!(!channel.poll_reconnect(now + Duration::from_secs(5)));
    }

    async fn recv(
        rx: &mut mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>,
    ) -> Option<(ConnectionId, TransportEvent)> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for transport event")
    }

    #[tokio::test]
    async fn test_ws_transport_roundtrip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Echo server
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if message.is_text() {
                    ws.send(message).await.unwrap();
                } else if message.is_close() {
                    break;
                }
            }
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut transport = WsTransport::new(Handle::current(), events_tx);
        let conn = transport.open(&format!("ws://{}/ws", addr)).unwrap();

        assert_eq!(
            recv(&mut events_rx).await,
            Some((conn, TransportEvent::Opened))
        );

        transport.send(conn, "hello".to_string()).unwrap();
        assert_eq!(
            recv(&mut events_rx).await,
            Some((conn, TransportEvent::Message("hello".to_string())))
        );

        transport.close(conn);
        assert_eq!(
            recv(&mut events_rx).await,
            Some((conn, TransportEvent::Closed))
        );
        assert!(transport.send(conn, "late".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_ws_transport_reports_refused_connection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut transport = WsTransport::new(Handle::current(), events_tx);
        let conn = transport.open(&format!("ws://{}/ws", addr)).unwrap();

        let first = events_rx.recv().await.unwrap();
        assert!(matches!(first, (id, TransportEvent::Error(_)) if id == conn));
        assert_eq!(events_rx.recv().await, Some((conn, TransportEvent::Closed)));
    }

    #[tokio::test]
    async fn test_refused_reconnects_release_their_senders() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let transport = WsTransport::new(Handle::current(), events_tx);
        let delay = Duration::from_millis(1);
        let mut channel = ConnectionChannel::new(
            transport,
            Endpoint::new(addr.to_string()),
            ReconnectPolicy::After(delay),
        );

        let mut now = Instant::now();
        channel.connect(PlayerId::from(5), now).unwrap();

        for _ in 0..5 {
            loop {
                let (conn, event) = recv(&mut events_rx).await.unwrap();
                let closed = event == TransportEvent::Closed;
                channel.handle(conn, event, now);
                if closed {
                    break;
                }
            }
            assert!(channel.transport().outbound.is_empty());

            now += delay;
            assert!(channel.poll_reconnect(now));
            assert_eq!(channel.transport().outbound.len(), 1);
        }

        assert_eq!(channel.attempts(), 6);
    }
}
