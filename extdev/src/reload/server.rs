//! Reload Server: the per-instance WebSocket endpoint the companion
//! extension connects to.
//!
//! Each connection gets `serverReady` immediately and is then bound to this
//! server's instance by the `clientReady` handshake. Any message naming a
//! different instance closes the connection with 1008. Peers that miss two
//! consecutive heartbeat pongs are dropped without a close handshake.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use extdev_core::{
    ChangedFile, ClientEnvelope, ClientMessage, ClientReady, InstanceUpdate, ServerMessage,
};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use super::filter::LogFilter;
use super::notice::{NoticeKey, NoticeState};
use super::reporter::{ReadySummary, Reporter};
use crate::registry::InstanceRegistry;
use crate::shutdown::Shutdown;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Consecutive unanswered pings after which a peer is presumed dead.
const MAX_MISSED_PONGS: u32 = 2;

const MISMATCH_REASON: &str = "Instance ID mismatch";

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("Failed to bind reload server on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode reload message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReloadError>;

#[derive(Debug, Clone)]
pub struct ReloadConfig {
    pub instance_id: String,
    /// Loopback port to bind. 0 picks an ephemeral port.
    pub port: u16,
    pub heartbeat_interval: Duration,
    pub log_filter: LogFilter,
    /// Identifies the first-run notice for this run, if one should be shown.
    pub notice_key: Option<NoticeKey>,
}

impl ReloadConfig {
    pub fn new(instance_id: impl Into<String>, port: u16) -> Self {
        Self {
            instance_id: instance_id.into(),
            port,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            log_filter: LogFilter::default(),
            notice_key: None,
        }
    }
}

/// Handshake state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    AwaitingHandshake,
    Ready,
    Closed,
}

struct Peer {
    tx: mpsc::UnboundedSender<Message>,
    state: ConnectionState,
}

enum Flow {
    Continue,
    Close,
}

pub struct ReloadServer {
    config: ReloadConfig,
    registry: Option<Arc<InstanceRegistry>>,
    reporter: Arc<dyn Reporter>,
    notices: NoticeState,
    peers: Mutex<HashMap<u64, Peer>>,
    next_peer: AtomicU64,
    bound_port: AtomicU16,
    shutdown_tx: watch::Sender<bool>,
}

/// A bound, running server.
pub struct ReloadHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ReloadHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Wait for the accept loop to exit.
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

impl ReloadServer {
    pub fn new(
        config: ReloadConfig,
        registry: Option<Arc<InstanceRegistry>>,
        reporter: Arc<dyn Reporter>,
        notices: NoticeState,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            bound_port: AtomicU16::new(config.port),
            config,
            registry,
            reporter,
            notices,
            peers: Mutex::new(HashMap::new()),
            next_peer: AtomicU64::new(1),
            shutdown_tx,
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    /// Bind the loopback listener and start accepting connections.
    pub async fn bind(self: &Arc<Self>) -> Result<ReloadHandle> {
        let port = self.config.port;
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|source| ReloadError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ReloadError::Bind { port, source })?;
        self.bound_port.store(local_addr.port(), Ordering::Relaxed);

        tracing::debug!(instance = %self.config.instance_id, addr = %local_addr, "reload server listening");

        let server = self.clone();
        let task = tokio::spawn(async move { server.accept_loop(listener).await });
        Ok(ReloadHandle { local_addr, task })
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let server = self.clone();
                        tokio::spawn(async move { server.handle_connection(stream, addr).await });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "reload server accept failed");
                    }
                },
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Send a file-change classification to every connected peer. Returns the
    /// number of peers it was queued for.
    pub fn notify_change(&self, changed: ChangedFile) -> Result<usize> {
        let text = serde_json::to_string(&ServerMessage::change(changed))?;
        let Ok(peers) = self.peers.lock() else {
            return Ok(0);
        };
        let sent = peers
            .values()
            .filter(|peer| peer.state != ConnectionState::Closed)
            .filter(|peer| peer.tx.send(Message::text(text.clone())).is_ok())
            .count();
        tracing::debug!(changed = %changed, peers = sent, "dispatched change");
        Ok(sent)
    }

    pub fn connection_count(&self) -> usize {
        self.peers.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Connections that completed the handshake.
    pub fn ready_count(&self) -> usize {
        self.peers
            .lock()
            .map(|p| {
                p.values()
                    .filter(|peer| peer.state == ConnectionState::Ready)
                    .count()
            })
            .unwrap_or(0)
    }

    fn set_state(&self, peer_id: u64, state: ConnectionState) {
        if let Ok(mut peers) = self.peers.lock()
            && let Some(peer) = peers.get_mut(&peer_id)
        {
            peer.state = state;
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::debug!(peer = %addr, error = %e, "websocket handshake failed");
                return;
            }
        };
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if sink.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        let peer_id = self.next_peer.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut peers) = self.peers.lock() {
            peers.insert(
                peer_id,
                Peer {
                    tx: tx.clone(),
                    state: ConnectionState::Connected,
                },
            );
        }
        tracing::debug!(peer = %addr, id = peer_id, "reload client connected");

        let mut state = ConnectionState::Connected;
        match serde_json::to_string(&ServerMessage::server_ready(&self.config.instance_id)) {
            Ok(text) => {
                let _ = tx.send(Message::text(text));
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode serverReady"),
        }
        state = self.transition(peer_id, state, ConnectionState::AwaitingHandshake);

        let interval = self.config.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + interval, interval);
        let mut awaiting_pong = false;
        let mut missed = 0u32;
        let mut terminated = false;

        loop {
            tokio::select! {
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Flow::Close = self.handle_text(peer_id, &tx, &mut state, text.as_str()).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                        missed = 0;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(id = peer_id, error = %e, "reload connection error");
                        break;
                    }
                    Some(Ok(_)) => {}
                },
                _ = heartbeat.tick() => {
                    if awaiting_pong {
                        missed += 1;
                        if missed >= MAX_MISSED_PONGS {
                            tracing::warn!(id = peer_id, "reload client missed heartbeats; terminating");
                            terminated = true;
                            break;
                        }
                    }
                    awaiting_pong = true;
                    let _ = tx.send(Message::Ping(Default::default()));
                }
            }
        }

        self.transition(peer_id, state, ConnectionState::Closed);
        if let Ok(mut peers) = self.peers.lock() {
            peers.remove(&peer_id);
        }
        drop(tx);

        if terminated {
            writer.abort();
        } else {
            let _ = tokio::time::timeout(Duration::from_secs(1), writer).await;
        }
        tracing::debug!(peer = %addr, id = peer_id, "reload client disconnected");
    }

    fn transition(
        &self,
        peer_id: u64,
        from: ConnectionState,
        to: ConnectionState,
    ) -> ConnectionState {
        if from != to {
            tracing::trace!(id = peer_id, ?from, ?to, "connection state");
            self.set_state(peer_id, to);
        }
        to
    }

    async fn handle_text(
        &self,
        peer_id: u64,
        tx: &mpsc::UnboundedSender<Message>,
        state: &mut ConnectionState,
        text: &str,
    ) -> Flow {
        let envelope: ClientEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(id = peer_id, error = %e, "ignoring non-protocol message");
                return Flow::Continue;
            }
        };

        let expected = self.config.instance_id.as_str();
        let matches = envelope.instance_id.as_deref() == Some(expected);
        let mismatched = envelope.instance_id.is_some() && !matches;
        let unbound_ready = envelope.status == "clientReady" && !matches;
        if mismatched || unbound_ready {
            tracing::warn!(
                id = peer_id,
                expected,
                got = ?envelope.instance_id,
                status = %envelope.status,
                "instance id mismatch on reload channel; closing"
            );
            let _ = tx.send(Message::Close(Some(CloseFrame {
                code: CloseCode::Policy,
                reason: String::from(MISMATCH_REASON).into(),
            })));
            *state = self.transition(peer_id, *state, ConnectionState::Closed);
            return Flow::Close;
        }

        match envelope.into_message() {
            Ok(ClientMessage::ClientReady(ready)) => {
                if *state == ConnectionState::Ready {
                    tracing::debug!(id = peer_id, "duplicate clientReady ignored");
                    return Flow::Continue;
                }
                *state = self.transition(peer_id, *state, ConnectionState::Ready);
                self.on_client_ready(ready).await;
            }
            Ok(ClientMessage::Log(event)) => {
                if self.config.log_filter.accepts(&event) {
                    self.reporter.log_event(&event);
                }
            }
            Ok(ClientMessage::Other(status)) => {
                tracing::debug!(id = peer_id, status = %status, "unhandled reload message");
            }
            Err(e) => {
                tracing::warn!(id = peer_id, error = %e, "malformed reload message payload");
            }
        }
        Flow::Continue
    }

    async fn on_client_ready(&self, ready: ClientReady) {
        if let Some(registry) = &self.registry {
            let registry = registry.clone();
            let instance_id = self.config.instance_id.clone();
            let extension_id = ready.id.clone();
            let result = tokio::task::spawn_blocking(move || {
                registry.update_instance(&instance_id, InstanceUpdate::extension_id(extension_id))
            })
            .await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(instance = %self.config.instance_id, error = %e, "failed to record extension id")
                }
                Err(e) => {
                    tracing::warn!(instance = %self.config.instance_id, error = %e, "extension id update task failed")
                }
            }
        }

        self.reporter.client_ready(&ReadySummary {
            instance_id: self.config.instance_id.clone(),
            extension_id: ready.id,
            management: ready.management,
            web_socket_port: self.bound_port.load(Ordering::Relaxed),
        });

        if let Some(key) = &self.config.notice_key
            && self.notices.should_show(key)
        {
            self.reporter.first_run_notice(key);
        }
    }

    /// Stop accepting and ask every peer to close.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Ok(peers) = self.peers.lock() {
            for peer in peers.values() {
                let _ = peer.tx.send(Message::Close(Some(CloseFrame {
                    code: CloseCode::Away,
                    reason: String::from("server shutting down").into(),
                })));
            }
        }
    }
}

impl Shutdown for ReloadServer {
    fn name(&self) -> &str {
        "reload-server"
    }

    fn shutdown(&self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PortProbe;
    use extdev_core::{Browser, LogEvent, LogLevel, ManagementInfo};
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    #[derive(Default)]
    struct Recording {
        ready: Mutex<Vec<ReadySummary>>,
        notices: Mutex<Vec<NoticeKey>>,
        logs: Mutex<Vec<LogEvent>>,
    }

    impl Reporter for Recording {
        fn client_ready(&self, summary: &ReadySummary) {
            self.ready.lock().unwrap().push(summary.clone());
        }

        fn first_run_notice(&self, key: &NoticeKey) {
            self.notices.lock().unwrap().push(key.clone());
        }

        fn log_event(&self, event: &LogEvent) {
            self.logs.lock().unwrap().push(event.clone());
        }
    }

    struct AllFree;

    impl PortProbe for AllFree {
        fn is_available(&self, _port: u16) -> bool {
            true
        }
    }

    async fn start(config: ReloadConfig) -> (Arc<ReloadServer>, Arc<Recording>, ReloadHandle) {
        let reporter = Arc::new(Recording::default());
        let server = ReloadServer::new(config, None, reporter.clone(), NoticeState::in_memory());
        let handle = server.bind().await.unwrap();
        (server, reporter, handle)
    }

    async fn connect(handle: &ReloadHandle) -> Client {
        let (ws, _) = connect_async(format!("ws://{}", handle.local_addr()))
            .await
            .unwrap();
        ws
    }

    async fn next_text(ws: &mut Client) -> serde_json::Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("timed out")
                .expect("stream ended")
                .unwrap();
            if let Message::Text(text) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    async fn send(ws: &mut Client, value: serde_json::Value) {
        ws.send(Message::text(value.to_string())).await.unwrap();
    }

    async fn eventually(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    fn ready_msg(instance_id: &str) -> serde_json::Value {
        json!({
            "status": "clientReady",
            "instanceId": instance_id,
            "data": {"id": "user-ext-id", "management": {"name": "My Ext", "version": "1.2.3"}}
        })
    }

    fn log_msg(level: &str) -> serde_json::Value {
        json!({
            "status": "log",
            "data": {"level": level, "context": "background", "timestamp": 1, "messageParts": ["hi", 2]}
        })
    }

    #[tokio::test]
    async fn sends_server_ready_on_connect() {
        let (_server, _reporter, handle) = start(ReloadConfig::new("inst-1", 0)).await;
        let mut ws = connect(&handle).await;
        assert_eq!(
            next_text(&mut ws).await,
            json!({"status": "serverReady", "instanceId": "inst-1"})
        );
    }

    #[tokio::test]
    async fn matching_client_ready_prints_one_summary() {
        let (server, reporter, handle) = start(ReloadConfig::new("inst-1", 0)).await;
        let mut ws = connect(&handle).await;
        next_text(&mut ws).await;

        send(&mut ws, ready_msg("inst-1")).await;
        send(&mut ws, ready_msg("inst-1")).await;
        send(&mut ws, log_msg("info")).await;

        eventually(|| reporter.logs.lock().unwrap().len() == 1).await;
        let ready = reporter.ready.lock().unwrap().clone();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].extension_id, "user-ext-id");
        assert_eq!(ready[0].management.name, "My Ext");
        assert_eq!(ready[0].web_socket_port, handle.port());
        assert_eq!(server.ready_count(), 1);
    }

    #[tokio::test]
    async fn mismatched_instance_closes_with_policy_code() {
        let (server, reporter, handle) = start(ReloadConfig::new("inst-1", 0)).await;
        let mut ws = connect(&handle).await;
        next_text(&mut ws).await;

        send(&mut ws, ready_msg("someone-else")).await;

        let frame = loop {
            match tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .unwrap()
            {
                Some(Ok(Message::Close(frame))) => break frame,
                Some(Ok(_)) => continue,
                other => panic!("expected close frame, got {other:?}"),
            }
        };
        let frame = frame.expect("close frame");
        assert_eq!(frame.code, CloseCode::Policy);
        assert_eq!(u16::from(frame.code), extdev_core::POLICY_VIOLATION_CLOSE_CODE);
        assert_eq!(frame.reason.as_str(), MISMATCH_REASON);

        eventually(|| server.connection_count() == 0).await;
        assert!(reporter.ready.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mismatched_log_message_is_rejected() {
        let (_server, reporter, handle) = start(ReloadConfig::new("inst-1", 0)).await;
        let mut ws = connect(&handle).await;
        next_text(&mut ws).await;

        let mut msg = log_msg("error");
        msg["instanceId"] = json!("other");
        send(&mut ws, msg).await;

        loop {
            match tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .unwrap()
            {
                Some(Ok(Message::Close(Some(frame)))) => {
                    assert_eq!(frame.code, CloseCode::Policy);
                    break;
                }
                Some(Ok(_)) => continue,
                other => panic!("expected close frame, got {other:?}"),
            }
        }
        assert!(reporter.logs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn log_level_filter_is_applied() {
        let mut config = ReloadConfig::new("inst-1", 0);
        config.log_filter.min_level = Some(LogLevel::Info);
        let (_server, reporter, handle) = start(config).await;
        let mut ws = connect(&handle).await;
        next_text(&mut ws).await;

        send(&mut ws, log_msg("debug")).await;
        send(&mut ws, log_msg("warn")).await;

        eventually(|| !reporter.logs.lock().unwrap().is_empty()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let logs = reporter.logs.lock().unwrap().clone();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, LogLevel::Warn);
        assert_eq!(logs[0].message(), "hi 2");
    }

    #[tokio::test]
    async fn debug_logs_forwarded_at_debug_level() {
        let mut config = ReloadConfig::new("inst-1", 0);
        config.log_filter.min_level = Some(LogLevel::Debug);
        let (_server, reporter, handle) = start(config).await;
        let mut ws = connect(&handle).await;
        next_text(&mut ws).await;

        send(&mut ws, log_msg("debug")).await;

        eventually(|| reporter.logs.lock().unwrap().len() == 1).await;
    }

    #[tokio::test]
    async fn notify_change_reaches_every_peer() {
        let (server, _reporter, handle) = start(ReloadConfig::new("inst-1", 0)).await;
        let mut a = connect(&handle).await;
        let mut b = connect(&handle).await;
        next_text(&mut a).await;
        next_text(&mut b).await;
        eventually(|| server.connection_count() == 2).await;

        assert_eq!(server.notify_change(ChangedFile::ServiceWorker).unwrap(), 2);

        let expected = json!({"changedFile": "service_worker"});
        assert_eq!(next_text(&mut a).await, expected);
        assert_eq!(next_text(&mut b).await, expected);
    }

    #[tokio::test]
    async fn first_run_notice_shown_once() {
        let mut config = ReloadConfig::new("inst-1", 0);
        config.notice_key = Some(NoticeKey {
            output_path: PathBuf::from("/out"),
            browser: Browser::Chrome,
            project_path: PathBuf::from("/proj"),
        });
        let (_server, reporter, handle) = start(config).await;

        for _ in 0..2 {
            let mut ws = connect(&handle).await;
            next_text(&mut ws).await;
            send(&mut ws, ready_msg("inst-1")).await;
            let before = reporter.ready.lock().unwrap().len();
            eventually(|| reporter.ready.lock().unwrap().len() == before + 1).await;
            ws.close(None).await.unwrap();
        }

        assert_eq!(reporter.ready.lock().unwrap().len(), 2);
        assert_eq!(reporter.notices.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn client_ready_records_extension_id() {
        let temp = tempfile::TempDir::new().unwrap();
        let registry =
            Arc::new(InstanceRegistry::open(temp.path()).with_port_probe(Arc::new(AllFree)));
        let instance = registry
            .create_instance(Browser::Chrome, Path::new("/proj"), None)
            .unwrap();

        let reporter = Arc::new(Recording::default());
        let server = ReloadServer::new(
            ReloadConfig::new(&instance.instance_id, 0),
            Some(registry.clone()),
            reporter.clone(),
            NoticeState::in_memory(),
        );
        let handle = server.bind().await.unwrap();
        let mut ws = connect(&handle).await;
        next_text(&mut ws).await;

        send(&mut ws, ready_msg(&instance.instance_id)).await;

        eventually(|| reporter.ready.lock().unwrap().len() == 1).await;
        let stored = registry.get_instance(&instance.instance_id).unwrap();
        assert_eq!(stored.extension_id.as_deref(), Some("user-ext-id"));
    }

    #[tokio::test]
    async fn unresponsive_peer_is_terminated() {
        let mut config = ReloadConfig::new("inst-1", 0);
        config.heartbeat_interval = Duration::from_millis(40);
        let (server, _reporter, handle) = start(config).await;

        // Never polled, so pings are never answered.
        let _ws = connect(&handle).await;
        eventually(|| server.connection_count() == 1).await;
        eventually(|| server.connection_count() == 0).await;
    }

    #[tokio::test]
    async fn responsive_peer_survives_heartbeats() {
        let mut config = ReloadConfig::new("inst-1", 0);
        config.heartbeat_interval = Duration::from_millis(40);
        let (server, _reporter, handle) = start(config).await;

        let mut ws = connect(&handle).await;
        let reader = tokio::spawn(async move { while let Some(Ok(_)) = ws.next().await {} });

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(server.connection_count(), 1);
        reader.abort();
    }

    #[tokio::test]
    async fn close_stops_accepting() {
        let (server, _reporter, handle) = start(ReloadConfig::new("inst-1", 0)).await;
        let addr = handle.local_addr();
        server.close();
        handle.wait().await;
        assert!(connect_async(format!("ws://{addr}")).await.is_err());
    }

    #[test]
    fn management_info_keeps_extra_fields() {
        let info: ManagementInfo =
            serde_json::from_value(json!({"name": "x", "version": "1", "enabled": true})).unwrap();
        assert_eq!(info.extra["enabled"], json!(true));
    }
}
