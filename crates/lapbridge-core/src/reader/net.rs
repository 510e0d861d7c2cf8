// ── Networked reader ──
//
// Talks to a reader module (or the gateway in front of it) over TCP with
// newline-delimited JSON. Requests carry an `id` and are answered by a
// `response` frame with the same id; `inventory` frames arrive
// unsolicited whenever the module has a batch of observations.
//
//   → {"id":7,"cmd":"setOpFlags","flags":131072}
//   ← {"event":"response","id":7,"ok":true}
//   ← {"event":"inventory","stopped":false,"tags":[{"epc":"E200..","antenna":0,"rssi":-58,"phase":12}]}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ReaderEvent, ReaderTransport, TagBuffer};
use crate::config::ReaderEndpoint;
use crate::error::ReaderError;
use crate::model::{ReaderInfo, TagRead};

/// Upper bound on a single frame.
const MAX_FRAME_LENGTH: usize = 1024 * 1024;

type LineSink = SplitSink<Framed<TcpStream, LinesCodec>, String>;
type LineStream = SplitStream<Framed<TcpStream, LinesCodec>>;
type PendingMap = Arc<DashMap<u64, oneshot::Sender<Response>>>;

// ── Wire frames ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum Inbound {
    Response(Response),
    Inventory {
        #[serde(default)]
        stopped: bool,
        /// Decoded one entry at a time by `decode_read`.
        #[serde(default)]
        tags: Vec<Value>,
    },
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

// ── Link ─────────────────────────────────────────────────────────────

/// One established TCP session.
struct Link {
    sink: Mutex<LineSink>,
    pending: PendingMap,
    /// Cancelled on explicit disconnect and by the read loop when the
    /// socket goes away, so a dead link is never reused.
    cancel: CancellationToken,
}

impl Link {
    fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

// ── NetReader ────────────────────────────────────────────────────────

/// Reader module reachable over TCP.
pub struct NetReader {
    endpoint: ReaderEndpoint,
    events: mpsc::Sender<ReaderEvent>,
    buffer: Arc<TagBuffer>,
    link: Mutex<Option<Arc<Link>>>,
    next_id: AtomicU64,
}

impl NetReader {
    pub fn new(endpoint: ReaderEndpoint, events: mpsc::Sender<ReaderEvent>) -> Self {
        Self {
            endpoint,
            events,
            buffer: Arc::new(TagBuffer::new()),
            link: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &ReaderEndpoint {
        &self.endpoint
    }

    async fn live_link(&self) -> Result<Arc<Link>, ReaderError> {
        match &*self.link.lock().await {
            Some(link) if link.is_alive() => Ok(Arc::clone(link)),
            _ => Err(ReaderError::NotConnected),
        }
    }

    /// Send `cmd` with extra `args` fields and wait for the matching response.
    async fn request(&self, cmd: &str, args: Value) -> Result<Option<Value>, ReaderError> {
        let link = self.live_link().await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut frame = json!({ "id": id, "cmd": cmd });
        if let (Some(fields), Value::Object(extra)) = (frame.as_object_mut(), args) {
            fields.extend(extra);
        }
        let line = serde_json::to_string(&frame)
            .map_err(|e| ReaderError::Protocol(format!("encode {cmd}: {e}")))?;

        let (tx, rx) = oneshot::channel();
        link.pending.insert(id, tx);

        if let Err(e) = link.sink.lock().await.send(line).await {
            link.pending.remove(&id);
            return Err(codec_error(e));
        }

        let timeout = self.endpoint.request_timeout;
        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(ReaderError::Closed),
            Err(_) => {
                link.pending.remove(&id);
                return Err(ReaderError::Timeout {
                    command: cmd.to_owned(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        if response.ok {
            Ok(response.result)
        } else {
            Err(ReaderError::Rejected {
                command: cmd.to_owned(),
                message: response.error.unwrap_or_else(|| "unspecified error".into()),
            })
        }
    }

    async fn command(&self, cmd: &str) -> Result<(), ReaderError> {
        self.request(cmd, Value::Null).await.map(|_| ())
    }
}

impl std::fmt::Debug for NetReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetReader")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ReaderTransport for NetReader {
    async fn connect(&self) -> Result<(), ReaderError> {
        let mut slot = self.link.lock().await;
        if slot.as_ref().is_some_and(|link| link.is_alive()) {
            debug!(endpoint = %self.endpoint, "reader already connected");
            return Ok(());
        }

        let addr = (self.endpoint.host.as_str(), self.endpoint.port);
        let stream = tokio::time::timeout(self.endpoint.request_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ReaderError::Connect {
                endpoint: self.endpoint.to_string(),
                reason: "connection timed out".into(),
            })?
            .map_err(|e| ReaderError::Connect {
                endpoint: self.endpoint.to_string(),
                reason: e.to_string(),
            })?;
        stream.set_nodelay(true)?;

        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_LENGTH));
        let (sink, lines) = framed.split();

        let link = Arc::new(Link {
            sink: Mutex::new(sink),
            pending: Arc::new(DashMap::new()),
            cancel: CancellationToken::new(),
        });
        let pending = Arc::clone(&link.pending);
        let cancel = link.cancel.clone();
        *slot = Some(link);
        drop(slot);

        info!(endpoint = %self.endpoint, "reader link established");
        // Connected must be queued before anything the read loop raises.
        let _ = self.events.send(ReaderEvent::Connected).await;
        tokio::spawn(read_loop(
            lines,
            pending,
            Arc::clone(&self.buffer),
            self.events.clone(),
            cancel,
        ));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ReaderError> {
        let link = self.link.lock().await.take();
        match link {
            Some(link) if link.is_alive() => {
                let _ = link.sink.lock().await.close().await;
                link.cancel.cancel();
                Ok(())
            }
            _ => Err(ReaderError::NotConnected),
        }
    }

    async fn reader_info(&self) -> Result<ReaderInfo, ReaderError> {
        let result = self
            .request("readerInfo", Value::Null)
            .await?
            .ok_or_else(|| ReaderError::Protocol("readerInfo returned no result".into()))?;
        serde_json::from_value(result)
            .map_err(|e| ReaderError::Protocol(format!("readerInfo result: {e}")))
    }

    async fn clear_tags(&self) -> Result<(), ReaderError> {
        self.buffer.clear();
        self.command("clearTags").await
    }

    async fn op_flags(&self) -> Result<u32, ReaderError> {
        let result = self.request("getOpFlags", Value::Null).await?;
        result
            .as_ref()
            .and_then(|v| v.get("flags").or(Some(v)))
            .and_then(Value::as_u64)
            .and_then(|flags| u32::try_from(flags).ok())
            .ok_or_else(|| ReaderError::Protocol("getOpFlags returned no flags".into()))
    }

    async fn set_op_flags(&self, flags: u32) -> Result<(), ReaderError> {
        self.request("setOpFlags", json!({ "flags": flags }))
            .await
            .map(|_| ())
    }

    async fn start_streaming(&self) -> Result<(), ReaderError> {
        self.command("startInventoryStream").await
    }

    async fn stop_streaming(&self) -> Result<(), ReaderError> {
        self.command("stopInventoryStream").await
    }

    fn tag_buffer(&self) -> &TagBuffer {
        &self.buffer
    }
}

// ── Read loop ────────────────────────────────────────────────────────

async fn read_loop(
    mut lines: LineStream,
    pending: PendingMap,
    buffer: Arc<TagBuffer>,
    events: mpsc::Sender<ReaderEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("reader link closed locally");
                break;
            }
            line = lines.next() => {
                match line {
                    Some(Ok(text)) => handle_frame(&text, &pending, &buffer, &events),
                    Some(Err(e)) => {
                        warn!(error = %e, "reader link read failed");
                        break;
                    }
                    None => {
                        info!("reader closed the link");
                        break;
                    }
                }
            }
        }
    }

    cancel.cancel();
    // Dropping the senders wakes every waiter with `Closed`.
    pending.clear();
    let _ = events.send(ReaderEvent::Disconnected).await;
}

/// Route one inbound frame. Never blocks: a response waiter may be the
/// task that is holding up the event consumer.
fn handle_frame(
    text: &str,
    pending: &PendingMap,
    buffer: &TagBuffer,
    events: &mpsc::Sender<ReaderEvent>,
) {
    let frame: Inbound = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "ignoring unrecognised reader frame");
            return;
        }
    };

    match frame {
        Inbound::Response(response) => {
            match pending.remove(&response.id) {
                Some((_, waiter)) => {
                    let _ = waiter.send(response);
                }
                None => debug!(id = response.id, "response for unknown request"),
            }
        }
        Inbound::Inventory { stopped, tags } => {
            debug!(count = tags.len(), stopped, "inventory frame");
            buffer.extend(tags.into_iter().filter_map(decode_read));
            match events.try_send(ReaderEvent::InventoryFlush { stopped }) {
                Ok(()) => {}
                // The buffered reads are picked up by the next flush.
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("reader event queue full, flush coalesced");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }
}

fn decode_read(raw: Value) -> Option<TagRead> {
    match serde_json::from_value(raw) {
        Ok(read) => Some(read),
        Err(e) => {
            warn!(error = %e, "skipping malformed tag read");
            None
        }
    }
}

fn codec_error(err: tokio_util::codec::LinesCodecError) -> ReaderError {
    match err {
        tokio_util::codec::LinesCodecError::Io(e) => ReaderError::Io(e),
        tokio_util::codec::LinesCodecError::MaxLineLengthExceeded => {
            ReaderError::Protocol("frame too long".into())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::reader::event_channel;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Scripted module: answers every request with `ok`, reporting
    /// `flags` for `getOpFlags`, and pushes one inventory frame after
    /// `startInventoryStream`.
    async fn fake_module() -> (ReaderEndpoint, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            let mut seen = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                let req: Value = serde_json::from_str(&line).unwrap();
                let id = req["id"].as_u64().unwrap();
                let cmd = req["cmd"].as_str().unwrap().to_owned();
                let reply = match cmd.as_str() {
                    "getOpFlags" => json!({"event":"response","id":id,"ok":true,"result":{"flags":5}}),
                    "readerInfo" => json!({"event":"response","id":id,"ok":true,
                        "result":{"serial":"NUR-42","name":"Sampo","numAntennas":2}}),
                    "stopInventoryStream" => json!({"event":"response","id":id,"ok":false,"error":"not streaming"}),
                    _ => json!({"event":"response","id":id,"ok":true}),
                };
                write.write_all(format!("{reply}\n").as_bytes()).await.unwrap();
                if cmd == "startInventoryStream" {
                    let inv = json!({"event":"inventory","stopped":true,
                        "tags":[{"epc":"E2001234","antenna":1,"rssi":-58,"phase":12}]});
                    write.write_all(format!("{inv}\n").as_bytes()).await.unwrap();
                }
                seen.push(line);
            }
            seen
        });
        let endpoint = ReaderEndpoint {
            host: "127.0.0.1".into(),
            port,
            request_timeout: Duration::from_secs(2),
        };
        (endpoint, handle)
    }

    #[tokio::test]
    async fn request_response_and_inventory() {
        let (endpoint, module) = fake_module().await;
        let (tx, mut rx) = event_channel();
        let reader = NetReader::new(endpoint, tx);

        reader.connect().await.unwrap();
        assert_eq!(rx.recv().await, Some(ReaderEvent::Connected));

        assert_eq!(reader.op_flags().await.unwrap(), 5);
        reader.set_op_flags(5 | (1 << 17)).await.unwrap();
        let info = reader.reader_info().await.unwrap();
        assert_eq!(info.serial, "NUR-42");
        assert_eq!(info.num_antennas, 2);

        reader.start_streaming().await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(ReaderEvent::InventoryFlush { stopped: true })
        );
        let reads = reader.tag_buffer().drain();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].epc.to_string(), "E2001234");
        assert_eq!(reads[0].antenna_id, 1);

        let err = reader.stop_streaming().await.unwrap_err();
        assert!(matches!(err, ReaderError::Rejected { ref message, .. } if message == "not streaming"));

        reader.disconnect().await.unwrap();
        assert_eq!(rx.recv().await, Some(ReaderEvent::Disconnected));

        let seen = module.await.unwrap();
        let set: Value = serde_json::from_str(&seen[1]).unwrap();
        assert_eq!(set["cmd"], "setOpFlags");
        assert_eq!(set["flags"], 131_077);
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, _rx) = event_channel();
        let reader = NetReader::new(
            ReaderEndpoint {
                host: "127.0.0.1".into(),
                port,
                request_timeout: Duration::from_secs(1),
            },
            tx,
        );
        let err = reader.connect().await.unwrap_err();
        assert!(matches!(err, ReaderError::Connect { .. }));
    }

    #[tokio::test]
    async fn peer_close_raises_disconnected_and_stales_link() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let (tx, mut rx) = event_channel();
        let reader = NetReader::new(
            ReaderEndpoint {
                host: "127.0.0.1".into(),
                port,
                request_timeout: Duration::from_secs(1),
            },
            tx,
        );
        reader.connect().await.unwrap();
        assert_eq!(rx.recv().await, Some(ReaderEvent::Connected));
        assert_eq!(rx.recv().await, Some(ReaderEvent::Disconnected));

        assert!(matches!(
            reader.start_streaming().await,
            Err(ReaderError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let (tx, _rx) = event_channel();
        let reader = NetReader::new(
            ReaderEndpoint {
                host: "127.0.0.1".into(),
                port,
                request_timeout: Duration::from_millis(100),
            },
            tx,
        );
        reader.connect().await.unwrap();
        let err = reader.clear_tags().await.unwrap_err();
        assert!(matches!(err, ReaderError::Timeout { ref command, timeout_ms: 100 } if command == "clearTags"));
    }

    #[test]
    fn unknown_frames_are_ignored() {
        let pending: PendingMap = Arc::new(DashMap::new());
        let buffer = TagBuffer::new();
        let (tx, mut rx) = event_channel();
        handle_frame(r#"{"event":"hello"}"#, &pending, &buffer, &tx);
        handle_frame("not json", &pending, &buffer, &tx);
        assert!(buffer.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_tag_does_not_drop_the_batch() {
        let pending: PendingMap = Arc::new(DashMap::new());
        let buffer = TagBuffer::new();
        let (tx, mut rx) = event_channel();
        handle_frame(
            r#"{"event":"inventory","stopped":false,"tags":[
                {"epc":"E1","antenna":1,"rssi":-50},
                {"epc":"E2","antenna":1,"rssi":-200},
                {"epc":"zz","antenna":1,"rssi":-40}
            ]}"#,
            &pending,
            &buffer,
            &tx,
        );
        let reads = buffer.drain();
        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].epc.to_hex(), "E1");
        assert_eq!(
            rx.try_recv().unwrap(),
            ReaderEvent::InventoryFlush { stopped: false }
        );
    }

    #[test]
    fn response_wakes_its_waiter() {
        let pending: PendingMap = Arc::new(DashMap::new());
        let buffer = TagBuffer::new();
        let (tx, _rx) = event_channel();
        let (waiter, mut reply) = oneshot::channel();
        pending.insert(9, waiter);
        handle_frame(r#"{"event":"response","id":9,"ok":true}"#, &pending, &buffer, &tx);
        assert!(pending.is_empty());
        assert!(reply.try_recv().unwrap().ok);
    }
}
