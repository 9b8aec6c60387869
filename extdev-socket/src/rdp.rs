//! Remote debugging protocol client.
//!
//! Requests are `{to: actor, type, ...}` frames; replies come back as
//! `{from: actor, ...}`. An actor answers requests strictly in order and
//! only one request per actor may be outstanding, so extra requests to a busy
//! actor wait in a per-actor FIFO and are written when the previous reply
//! arrives. Requests to different actors proceed concurrently.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};

use crate::{Decoded, FrameDecoder, encode_frame};

const READ_CHUNK_BYTES: usize = 16 * 1024;
const GREETING_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RdpError {
    #[error("could not connect to remote debugging port {port} after {attempts} attempts")]
    ConnectExhausted { port: u16, attempts: u32 },

    #[error("could not connect to remote debugging port {port}: {source}")]
    Connect {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("remote debugging server did not greet within {0:?}")]
    Greeting(Duration),

    #[error("remote debugging connection closed: {0}")]
    Disconnected(String),

    #[error("{actor} replied with {error}: {message}")]
    Remote {
        actor: String,
        error: String,
        message: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Non-fatal conditions reported while the connection stays up.
#[derive(Debug, Clone, PartialEq)]
pub enum RdpEvent {
    /// A message without `from`, or from an actor with nothing in flight.
    ProtocolError { message: String, payload: Value },
    /// A complete frame whose payload was not JSON.
    MalformedFrame { error: String },
}

/// Connection retry policy. Only `ECONNREFUSED` is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            max_attempts: 40,
        }
    }
}

pub async fn connect_with_retry(port: u16, policy: RetryPolicy) -> Result<TcpStream, RdpError> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(stream) => return Ok(stream),
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                tracing::debug!(port, attempt, "remote debugging port refused connection");
                if attempt < attempts {
                    tokio::time::sleep(policy.interval).await;
                }
            }
            Err(source) => return Err(RdpError::Connect { port, source }),
        }
    }
    Err(RdpError::ConnectExhausted { port, attempts })
}

type Reply = oneshot::Sender<Result<Value, RdpError>>;

struct Queued {
    frame: Vec<u8>,
    reply: Reply,
}

#[derive(Default)]
struct ActorChannel {
    in_flight: Option<Reply>,
    queued: VecDeque<Queued>,
}

#[derive(Default)]
struct State {
    actors: HashMap<String, ActorChannel>,
    greeting: Option<oneshot::Sender<Value>>,
    closed: Option<String>,
}

struct Shared {
    state: Mutex<State>,
    writer_tx: mpsc::UnboundedSender<Vec<u8>>,
    event_tx: mpsc::UnboundedSender<RdpEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn dispatch(&self, message: Value) {
        let Some(actor) = message.get("from").and_then(Value::as_str).map(str::to_string) else {
            let _ = self.event_tx.send(RdpEvent::ProtocolError {
                message: "message has no 'from' actor".to_string(),
                payload: message,
            });
            return;
        };

        let mut state = self.lock();
        if actor == "root"
            && let Some(greeting) = state.greeting.take()
        {
            let _ = greeting.send(message);
            return;
        }

        let Some(channel) = state.actors.get_mut(&actor) else {
            drop(state);
            self.unexpected(&actor, message);
            return;
        };
        let Some(reply) = channel.in_flight.take() else {
            drop(state);
            self.unexpected(&actor, message);
            return;
        };

        if let Some(next) = channel.queued.pop_front() {
            channel.in_flight = Some(next.reply);
            if self.writer_tx.send(next.frame).is_err()
                && let Some(reply) = channel.in_flight.take()
            {
                let _ = reply.send(Err(RdpError::Disconnected("writer stopped".to_string())));
            }
        } else {
            state.actors.remove(&actor);
        }
        drop(state);

        let _ = reply.send(into_result(&actor, message));
    }

    fn unexpected(&self, actor: &str, message: Value) {
        tracing::debug!(actor, "message from actor with no pending request");
        let _ = self.event_tx.send(RdpEvent::ProtocolError {
            message: format!("unexpected message from actor '{actor}'"),
            payload: message,
        });
    }

    /// Reject every in-flight and queued request with the same reason.
    fn fail_all(&self, reason: &str) {
        let mut state = self.lock();
        if state.closed.is_none() {
            state.closed = Some(reason.to_string());
        }
        state.greeting = None;
        let actors = std::mem::take(&mut state.actors);
        drop(state);

        for (_, channel) in actors {
            let replies = channel
                .in_flight
                .into_iter()
                .chain(channel.queued.into_iter().map(|q| q.reply));
            for reply in replies {
                let _ = reply.send(Err(RdpError::Disconnected(reason.to_string())));
            }
        }
    }
}

fn into_result(actor: &str, message: Value) -> Result<Value, RdpError> {
    match message.get("error").and_then(Value::as_str) {
        Some(error) => Err(RdpError::Remote {
            actor: actor.to_string(),
            error: error.to_string(),
            message: message
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        None => Ok(message),
    }
}

/// Multiplexed client for one remote debugging connection.
pub struct RdpClient {
    shared: Arc<Shared>,
    greeting: Value,
    event_rx: mpsc::UnboundedReceiver<RdpEvent>,
    reader: tokio::task::JoinHandle<()>,
    writer: tokio::task::JoinHandle<()>,
}

impl RdpClient {
    /// Connect to `127.0.0.1:{port}`, retrying refused connections, and
    /// wait for the root actor's greeting.
    pub async fn connect(port: u16, policy: RetryPolicy) -> Result<Self, RdpError> {
        let stream = connect_with_retry(port, policy).await?;
        tracing::debug!(port, "connected to remote debugging server");
        Self::from_stream(stream).await
    }

    pub async fn from_stream(stream: TcpStream) -> Result<Self, RdpError> {
        let (read_half, write_half) = stream.into_split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (greeting_tx, greeting_rx) = oneshot::channel();

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                greeting: Some(greeting_tx),
                ..State::default()
            }),
            writer_tx,
            event_tx,
        });

        let writer = tokio::spawn(write_loop(write_half, writer_rx, shared.clone()));
        let reader = tokio::spawn(read_loop(read_half, shared.clone()));

        let greeting = match tokio::time::timeout(GREETING_TIMEOUT, greeting_rx).await {
            Ok(Ok(greeting)) => greeting,
            Ok(Err(_)) => {
                reader.abort();
                writer.abort();
                let reason = shared
                    .lock()
                    .closed
                    .clone()
                    .unwrap_or_else(|| "closed before greeting".to_string());
                return Err(RdpError::Disconnected(reason));
            }
            Err(_) => {
                reader.abort();
                writer.abort();
                return Err(RdpError::Greeting(GREETING_TIMEOUT));
            }
        };

        Ok(Self {
            shared,
            greeting,
            event_rx,
            reader,
            writer,
        })
    }

    /// The root actor's initial message.
    pub fn greeting(&self) -> &Value {
        &self.greeting
    }

    /// Send `{to, type, ...params}` and wait for the actor's reply.
    ///
    /// `params` must be a JSON object (or null).
    pub async fn request(&self, to: &str, kind: &str, params: Value) -> Result<Value, RdpError> {
        let mut body = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(RdpError::Protocol(format!(
                    "request params must be an object, got {other}"
                )));
            }
        };
        body.insert("to".to_string(), Value::String(to.to_string()));
        body.insert("type".to_string(), Value::String(kind.to_string()));
        let frame = encode_frame(&Value::Object(body))?;

        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.shared.lock();
            if let Some(reason) = &state.closed {
                return Err(RdpError::Disconnected(reason.clone()));
            }
            let channel = state.actors.entry(to.to_string()).or_default();
            if channel.in_flight.is_some() {
                tracing::trace!(actor = to, kind, "actor busy, queueing request");
                channel.queued.push_back(Queued { frame, reply: tx });
            } else {
                channel.in_flight = Some(tx);
                if self.shared.writer_tx.send(frame).is_err() {
                    channel.in_flight = None;
                    return Err(RdpError::Disconnected("writer stopped".to_string()));
                }
            }
        }

        rx.await
            .unwrap_or_else(|_| Err(RdpError::Disconnected("request dropped".to_string())))
    }

    /// Number of requests to `actor` that are in flight or queued.
    pub fn pending_for(&self, actor: &str) -> usize {
        self.shared
            .lock()
            .actors
            .get(actor)
            .map(|c| usize::from(c.in_flight.is_some()) + c.queued.len())
            .unwrap_or(0)
    }

    /// Next non-fatal protocol event, if the connection is still open.
    pub async fn next_event(&mut self) -> Option<RdpEvent> {
        self.event_rx.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<RdpEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn close(&self) {
        self.reader.abort();
        self.writer.abort();
        self.shared.fail_all("client closed");
    }
}

impl Drop for RdpClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut frames: mpsc::UnboundedReceiver<Vec<u8>>,
    shared: Arc<Shared>,
) {
    use tokio::io::AsyncWriteExt;

    while let Some(frame) = frames.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            tracing::warn!(error = %e, "remote debugging write failed");
            shared.fail_all(&format!("write failed: {e}"));
            return;
        }
    }
}

async fn read_loop(mut reader: OwnedReadHalf, shared: Arc<Shared>) {
    let mut decoder = FrameDecoder::default();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => {
                shared.fail_all("connection closed by peer");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                shared.fail_all(&format!("read failed: {e}"));
                return;
            }
        };
        decoder.push(&chunk[..n]);

        loop {
            match decoder.next_frame() {
                Ok(Some(Decoded::Message(message))) => shared.dispatch(message),
                Ok(Some(Decoded::Malformed { error, .. })) => {
                    tracing::warn!(error = %error, "malformed remote debugging frame");
                    let _ = shared.event_tx.send(RdpEvent::MalformedFrame {
                        error: error.to_string(),
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "fatal remote debugging framing error");
                    shared.fail_all(&e.to_string());
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn read_frame(stream: &mut TcpStream, decoder: &mut FrameDecoder) -> Value {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(Decoded::Message(v)) = decoder.next_frame().unwrap() {
                return v;
            }
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed unexpectedly");
            decoder.push(&chunk[..n]);
        }
    }

    async fn send(stream: &mut TcpStream, value: Value) {
        stream
            .write_all(&encode_frame(&value).unwrap())
            .await
            .unwrap();
    }

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    async fn connected_pair() -> (RdpClient, TcpStream) {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            send(&mut stream, json!({"from": "root", "applicationType": "browser"})).await;
            stream
        });
        let client = RdpClient::connect(port, RetryPolicy::default())
            .await
            .unwrap();
        (client, server.await.unwrap())
    }

    #[tokio::test]
    async fn connect_waits_for_root_greeting() {
        let (client, _server) = connected_pair().await;
        assert_eq!(client.greeting()["applicationType"], "browser");
    }

    #[tokio::test]
    async fn request_round_trips_through_actor() {
        let (client, mut server) = connected_pair().await;
        let client = Arc::new(client);

        let req = tokio::spawn({
            let client = client.clone();
            async move { client.request("root", "getRoot", Value::Null).await }
        });

        let mut decoder = FrameDecoder::default();
        let got = read_frame(&mut server, &mut decoder).await;
        assert_eq!(got, json!({"to": "root", "type": "getRoot"}));
        send(&mut server, json!({"from": "root", "addonsActor": "addons1"})).await;

        let reply = req.await.unwrap().unwrap();
        assert_eq!(reply["addonsActor"], "addons1");
    }

    #[tokio::test]
    async fn second_request_to_same_actor_waits_for_first_reply() {
        let (client, mut server) = connected_pair().await;
        let client = Arc::new(client);

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.request("tab1", "first", Value::Null).await }
        });
        let mut decoder = FrameDecoder::default();
        let got = read_frame(&mut server, &mut decoder).await;
        assert_eq!(got["type"], "first");

        let second = tokio::spawn({
            let client = client.clone();
            async move { client.request("tab1", "second", Value::Null).await }
        });
        for _ in 0..100 {
            if client.pending_for("tab1") == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(client.pending_for("tab1"), 2);

        // Nothing else may be on the wire until the first reply is sent.
        let mut probe = [0u8; 64];
        let early = tokio::time::timeout(Duration::from_millis(100), server.read(&mut probe)).await;
        assert!(early.is_err(), "second request was written early");

        send(&mut server, json!({"from": "tab1", "n": 1})).await;
        assert_eq!(first.await.unwrap().unwrap()["n"], 1);

        let got = read_frame(&mut server, &mut decoder).await;
        assert_eq!(got["type"], "second");
        send(&mut server, json!({"from": "tab1", "n": 2})).await;
        assert_eq!(second.await.unwrap().unwrap()["n"], 2);
        assert_eq!(client.pending_for("tab1"), 0);
    }

    #[tokio::test]
    async fn requests_to_different_actors_are_both_in_flight() {
        let (client, mut server) = connected_pair().await;
        let client = Arc::new(client);

        let a = tokio::spawn({
            let client = client.clone();
            async move { client.request("a", "ping", Value::Null).await }
        });
        let b = tokio::spawn({
            let client = client.clone();
            async move { client.request("b", "ping", Value::Null).await }
        });

        let mut decoder = FrameDecoder::default();
        let mut seen = vec![
            read_frame(&mut server, &mut decoder).await["to"].clone(),
            read_frame(&mut server, &mut decoder).await["to"].clone(),
        ];
        seen.sort_by_key(|v| v.as_str().unwrap_or_default().to_string());
        assert_eq!(seen, vec![json!("a"), json!("b")]);

        send(&mut server, json!({"from": "b", "who": "b"})).await;
        send(&mut server, json!({"from": "a", "who": "a"})).await;
        assert_eq!(a.await.unwrap().unwrap()["who"], "a");
        assert_eq!(b.await.unwrap().unwrap()["who"], "b");
    }

    #[tokio::test]
    async fn remote_error_reply_is_returned_as_error() {
        let (client, mut server) = connected_pair().await;
        let client = Arc::new(client);
        let req = tokio::spawn({
            let client = client.clone();
            async move {
                client
                    .request("addons", "installTemporaryAddon", json!({"addonPath": "/x"}))
                    .await
            }
        });

        let mut decoder = FrameDecoder::default();
        let got = read_frame(&mut server, &mut decoder).await;
        assert_eq!(got["addonPath"], "/x");
        send(
            &mut server,
            json!({"from": "addons", "error": "installFailed", "message": "bad manifest"}),
        )
        .await;

        match req.await.unwrap() {
            Err(RdpError::Remote { error, message, .. }) => {
                assert_eq!(error, "installFailed");
                assert_eq!(message, "bad manifest");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_from_and_unexpected_actor_become_events() {
        let (mut client, mut server) = connected_pair().await;

        send(&mut server, json!({"type": "tabNavigated"})).await;
        send(&mut server, json!({"from": "ghost", "x": 1})).await;
        server.write_all(b"4:nope").await.unwrap();

        let first = client.next_event().await.unwrap();
        assert!(matches!(first, RdpEvent::ProtocolError { ref message, .. } if message.contains("'from'")));
        let second = client.next_event().await.unwrap();
        assert!(matches!(second, RdpEvent::ProtocolError { ref message, .. } if message.contains("ghost")));
        let third = client.next_event().await.unwrap();
        assert!(matches!(third, RdpEvent::MalformedFrame { .. }));
    }

    #[tokio::test]
    async fn fatal_prefix_rejects_in_flight_and_queued_requests() {
        let (client, mut server) = connected_pair().await;
        let client = Arc::new(client);

        let first = tokio::spawn({
            let client = client.clone();
            async move { client.request("tab", "one", Value::Null).await }
        });
        let mut decoder = FrameDecoder::default();
        read_frame(&mut server, &mut decoder).await;
        let second = tokio::spawn({
            let client = client.clone();
            async move { client.request("tab", "two", Value::Null).await }
        });
        for _ in 0..100 {
            if client.pending_for("tab") == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        server.write_all(b"xx:{}").await.unwrap();

        assert!(matches!(first.await.unwrap(), Err(RdpError::Disconnected(_))));
        assert!(matches!(second.await.unwrap(), Err(RdpError::Disconnected(_))));
        assert!(matches!(
            client.request("tab", "three", Value::Null).await,
            Err(RdpError::Disconnected(_))
        ));
    }

    #[tokio::test]
    async fn disconnect_rejects_outstanding_requests() {
        let (client, mut server) = connected_pair().await;
        let client = Arc::new(client);
        let req = tokio::spawn({
            let client = client.clone();
            async move { client.request("root", "getRoot", Value::Null).await }
        });
        let mut decoder = FrameDecoder::default();
        read_frame(&mut server, &mut decoder).await;
        drop(server);

        assert!(matches!(req.await.unwrap(), Err(RdpError::Disconnected(_))));
    }

    #[tokio::test]
    async fn refused_connections_are_retried_until_exhausted() {
        let (listener, port) = listener().await;
        drop(listener);

        let policy = RetryPolicy {
            interval: Duration::from_millis(5),
            max_attempts: 3,
        };
        match connect_with_retry(port, policy).await {
            Err(RdpError::ConnectExhausted { port: p, attempts }) => {
                assert_eq!(p, port);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_succeeds_once_server_appears() {
        let (listener, port) = listener().await;
        drop(listener);

        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            let (mut stream, _) = listener.accept().await.unwrap();
            send(&mut stream, json!({"from": "root"})).await;
            stream
        });

        let policy = RetryPolicy {
            interval: Duration::from_millis(20),
            max_attempts: 50,
        };
        let client = RdpClient::connect(port, policy).await.unwrap();
        assert_eq!(client.greeting()["from"], "root");
        drop(server.await.unwrap());
    }
}
