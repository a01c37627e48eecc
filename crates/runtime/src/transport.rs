//! C4: a multiplexed request/response channel over the browser's WebSocket
//! debug endpoint, routing responses and events to the right tab.
//!
//! CDP multiplexes every tab's commands and events over one WebSocket
//! connection; frames carry an optional `sessionId` naming which tab they
//! belong to. `Connection` demultiplexes that stream: one background reader
//! task owns the socket and fans frames out to whichever caller is waiting
//! on a given request id, or to whichever subscribers registered for a
//! given `(sessionId, event method)` pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use openchrome_protocol::cdp::{Event, IdGenerator, Message, Request, Response};
use openchrome_protocol::{Error, Result};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

/// Default per-command deadline (§4.4); individual calls may shorten it.
pub const DEFAULT_CDP_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingCallbacks = DashMap<u64, oneshot::Sender<Message>>;
type EventSubscribers = Mutex<HashMap<(String, String), Vec<mpsc::UnboundedSender<serde_json::Value>>>>;

/// An open subscription to a `(tab session, CDP event)` pair (§4.4 `on`).
///
/// Dropping this drops the receiving half; the sender side is pruned lazily
/// the next time a matching event arrives and delivery fails.
pub struct EventSubscription {
	rx: mpsc::UnboundedReceiver<serde_json::Value>,
}

impl EventSubscription {
	pub async fn recv(&mut self) -> Option<serde_json::Value> {
		self.rx.recv().await
	}
}

/// A tab is marked suspect after a command on it times out (§4.4); the next
/// command targeting it may trigger a reconnect at the caller's discretion.
#[derive(Default)]
struct TabHealth(DashMap<String, Arc<AtomicBool>>);

impl TabHealth {
	fn mark_suspect(&self, session_id: &str) {
		self.0.entry(session_id.to_string()).or_insert_with(|| Arc::new(AtomicBool::new(false))).store(true, Ordering::SeqCst);
	}

	fn is_suspect(&self, session_id: &str) -> bool {
		self.0.get(session_id).map(|flag| flag.load(Ordering::SeqCst)).unwrap_or(false)
	}

	fn clear(&self, session_id: &str) {
		self.0.remove(session_id);
	}
}

/// A live connection to Chrome's debug WebSocket endpoint.
///
/// Cheap to clone (an `Arc` internally); shared by every session per §5
/// ("Components C4 ... are shared among all sessions and must be safe for
/// concurrent use").
pub struct Connection {
	ids: IdGenerator,
	outbound: mpsc::UnboundedSender<WsMessage>,
	callbacks: PendingCallbacks,
	subscribers: EventSubscribers,
	health: TabHealth,
	ws_url: String,
}

impl Connection {
	/// Connects to `ws_url` (the browser's top-level debug endpoint) and
	/// spawns the reader/writer tasks that service it for the lifetime of
	/// the returned `Connection`.
	pub async fn connect(ws_url: impl Into<String>) -> Result<Arc<Self>> {
		let ws_url = ws_url.into();
		debug!(%ws_url, "connecting to CDP debug endpoint");
		let (stream, _) = connect_async(&ws_url).await.map_err(|e| Error::CdpProtocol(format!("websocket connect failed: {e}")))?;
		let (mut sink, mut source) = stream.split();

		let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();

		let conn = Arc::new(Self {
			ids: IdGenerator::default(),
			outbound: outbound_tx,
			callbacks: DashMap::new(),
			subscribers: Mutex::new(HashMap::new()),
			health: TabHealth::default(),
			ws_url,
		});

		tokio::spawn(async move {
			while let Some(msg) = outbound_rx.recv().await {
				if sink.send(msg).await.is_err() {
					break;
				}
			}
		});

		let reader_conn = conn.clone();
		tokio::spawn(async move {
			while let Some(frame) = source.next().await {
				let frame = match frame {
					Ok(f) => f,
					Err(e) => {
						warn!(error = %e, "CDP websocket read error");
						break;
					}
				};
				let text = match frame {
					WsMessage::Text(t) => t.to_string(),
					WsMessage::Close(_) => break,
					_ => continue,
				};
				trace!(frame = %text, "CDP frame received");
				match serde_json::from_str::<Message>(&text) {
					Ok(message) => reader_conn.dispatch(message),
					Err(e) => warn!(error = %e, raw = %text, "failed to parse CDP frame"),
				}
			}
			debug!("CDP reader task exiting, websocket closed");
		});

		Ok(conn)
	}

	fn dispatch(&self, message: Message) {
		match message {
			Message::Response(ref r) => {
				if let Some((_, tx)) = self.callbacks.remove(&r.id) {
					let _ = tx.send(message);
				}
			}
			Message::Event(ref e) => self.dispatch_event(e),
		}
	}

	fn dispatch_event(&self, event: &Event) {
		let session_key = event.session_id.clone().unwrap_or_default();
		let key = (session_key, event.method.clone());
		let mut subs = self.subscribers.lock();
		if let Some(list) = subs.get_mut(&key) {
			list.retain(|tx| tx.send(event.params.clone()).is_ok());
			if list.is_empty() {
				subs.remove(&key);
			}
		}
	}

	/// Sends a CDP command scoped to `session_id` (the tab's CDP session,
	/// not an automation `Session`) and awaits the matching response, or a
	/// `cdp.timeout`/`cdp.protocol` error.
	pub async fn send(&self, session_id: Option<&str>, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
		self.send_with_timeout(session_id, method, params, DEFAULT_CDP_TIMEOUT).await
	}

	pub async fn send_with_timeout(&self, session_id: Option<&str>, method: &str, params: serde_json::Value, timeout: Duration) -> Result<serde_json::Value> {
		let id = self.ids.next();
		let (tx, rx) = oneshot::channel();
		self.callbacks.insert(id, tx);

		let request = Request { id, method: method.to_string(), params, session_id: session_id.map(str::to_string) };
		let payload = serde_json::to_string(&request)?;
		if self.outbound.send(WsMessage::Text(payload.into())).is_err() {
			self.callbacks.remove(&id);
			return Err(Error::CdpProtocol("websocket writer closed".into()));
		}

		let outcome = tokio::time::timeout(timeout, rx).await;
		match outcome {
			Ok(Ok(Message::Response(resp))) => Self::resolve(resp, method),
			Ok(Ok(Message::Event(_))) => unreachable!("oneshot only ever receives Message::Response"),
			Ok(Err(_)) => Err(Error::CdpProtocol(format!("{method} dropped: connection closed"))),
			Err(_) => {
				self.callbacks.remove(&id);
				if let Some(sid) = session_id {
					self.health.mark_suspect(sid);
				}
				Err(Error::CdpTimeout { method: method.to_string(), ms: timeout.as_millis() as u64 })
			}
		}
	}

	fn resolve(resp: Response, method: &str) -> Result<serde_json::Value> {
		if let Some(err) = resp.error {
			return Err(Error::CdpProtocol(format!("{method}: {err}")));
		}
		Ok(resp.result.unwrap_or(serde_json::Value::Null))
	}

	/// Subscribes to `event` scoped to `session_id` (§4.4 `on`). Events
	/// arrive in the order the transport received them.
	pub fn on(&self, session_id: &str, event: &str) -> EventSubscription {
		let (tx, rx) = mpsc::unbounded_channel();
		let key = (session_id.to_string(), event.to_string());
		self.subscribers.lock().entry(key).or_default().push(tx);
		EventSubscription { rx }
	}

	/// Whether a prior command on this tab's CDP session timed out without
	/// a subsequent successful call clearing the flag.
	pub fn is_suspect(&self, session_id: &str) -> bool {
		self.health.is_suspect(session_id)
	}

	/// Clears a tab's suspect flag, e.g. after a successful reconnect probe.
	pub fn clear_suspect(&self, session_id: &str) {
		self.health.clear(session_id);
	}

	pub fn ws_url(&self) -> &str {
		&self.ws_url
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tab_health_tracks_suspect_flag_independently_per_session() {
		let health = TabHealth::default();
		assert!(!health.is_suspect("s1"));
		health.mark_suspect("s1");
		assert!(health.is_suspect("s1"));
		assert!(!health.is_suspect("s2"));
		health.clear("s1");
		assert!(!health.is_suspect("s1"));
	}

	#[test]
	fn resolve_surfaces_protocol_error_verbatim() {
		let resp = Response {
			id: 1,
			result: None,
			error: Some(openchrome_protocol::cdp::ProtocolError { code: -32000, message: "No node with given id found".into(), data: None }),
			session_id: None,
		};
		let err = Connection::resolve(resp, "DOM.describeNode").unwrap_err();
		match err {
			Error::CdpProtocol(msg) => assert!(msg.contains("No node with given id found")),
			other => panic!("expected CdpProtocol, got {other:?}"),
		}
	}

	#[test]
	fn resolve_passes_through_result_payload() {
		let resp = Response { id: 2, result: Some(serde_json::json!({"nodeId": 7})), error: None, session_id: None };
		let value = Connection::resolve(resp, "DOM.getDocument").unwrap();
		assert_eq!(value["nodeId"], 7);
	}
}
