//! Wire types for the Chrome DevTools Protocol debug endpoint (C4).
//!
//! CDP multiplexes many targets over one WebSocket: every frame carries an
//! optional `sessionId` identifying which tab/target it belongs to, and
//! responses are correlated to requests by a client-assigned integer `id`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A command sent to the browser's debug endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
	pub id: u64,
	pub method: String,
	pub params: serde_json::Value,
	#[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Monotonic request id generator, one per `Connection`.
#[derive(Debug, Default)]
pub struct IdGenerator(AtomicU64);

impl IdGenerator {
	pub fn next(&self) -> u64 {
		self.0.fetch_add(1, Ordering::SeqCst)
	}
}

/// A frame received from the debug endpoint: either a response to a
/// previously-sent request, or an unsolicited event.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Message {
	Response(Response),
	Event(Event),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Response {
	pub id: u64,
	#[serde(default)]
	pub result: Option<serde_json::Value>,
	#[serde(default)]
	pub error: Option<ProtocolError>,
	#[serde(rename = "sessionId", default)]
	pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: serde_json::Value,
	#[serde(rename = "sessionId", default)]
	pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolError {
	pub code: i64,
	pub message: String,
	#[serde(default)]
	pub data: Option<String>,
}

impl std::fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} (code {})", self.message, self.code)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn id_generator_increments_from_zero() {
		let gen = IdGenerator::default();
		assert_eq!(gen.next(), 0);
		assert_eq!(gen.next(), 1);
		assert_eq!(gen.next(), 2);
	}

	#[test]
	fn message_deserializes_response() {
		let json = r#"{"id": 42, "result": {"status": "ok"}}"#;
		let msg: Message = serde_json::from_str(json).unwrap();
		match msg {
			Message::Response(r) => {
				assert_eq!(r.id, 42);
				assert!(r.result.is_some());
				assert!(r.error.is_none());
			}
			Message::Event(_) => panic!("expected response"),
		}
	}

	#[test]
	fn message_deserializes_event() {
		let json = r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.0}, "sessionId": "abc"}"#;
		let msg: Message = serde_json::from_str(json).unwrap();
		match msg {
			Message::Event(e) => {
				assert_eq!(e.method, "Page.loadEventFired");
				assert_eq!(e.session_id.as_deref(), Some("abc"));
			}
			Message::Response(_) => panic!("expected event"),
		}
	}

	#[test]
	fn message_deserializes_error_response() {
		let json = r#"{"id": 7, "error": {"code": -32000, "message": "No node with given id found"}}"#;
		let msg: Message = serde_json::from_str(json).unwrap();
		match msg {
			Message::Response(r) => {
				assert_eq!(r.id, 7);
				let err = r.error.unwrap();
				assert_eq!(err.code, -32000);
			}
			Message::Event(_) => panic!("expected response"),
		}
	}

	#[test]
	fn request_serializes_with_session_id() {
		let req = Request {
			id: 1,
			method: "DOM.getDocument".into(),
			params: serde_json::json!({}),
			session_id: Some("session-1".into()),
		};
		let json = serde_json::to_string(&req).unwrap();
		assert!(json.contains("\"sessionId\":\"session-1\""));
	}

	#[test]
	fn request_omits_session_id_when_absent() {
		let req = Request {
			id: 1,
			method: "Target.getTargets".into(),
			params: serde_json::json!({}),
			session_id: None,
		};
		let json = serde_json::to_string(&req).unwrap();
		assert!(!json.contains("sessionId"));
	}
}
