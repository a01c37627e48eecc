//! Exercises a full session lifecycle — pool acquire, session/tab creation,
//! an evaluate round trip, and cascading teardown — against a fake CDP
//! WebSocket endpoint instead of a real Chrome process (SPEC_FULL §4.16:
//! "a minimal in-process fake CDP transport ... is the standard fixture for
//! exercising C4 through C11 without a real Chrome process").

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use openchrome_core::config::{PoolConfig, QueueConfig, SessionConfig};
use openchrome_core::pool::TabPool;
use openchrome_core::queue::QueueManager;
use openchrome_core::ref_table::RefTable;
use openchrome_core::session::SessionManager;
use openchrome_runtime::Connection;

/// Spawns a fake debug endpoint answering just the CDP methods a tab-pool
/// acquire/reset/evaluate/close cycle sends, then hands back its `ws://` URL.
async fn spawn_fake_cdp() -> String {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake CDP listener");
	let addr = listener.local_addr().expect("local addr");

	tokio::spawn(async move {
		let (stream, _) = listener.accept().await.expect("accept fake CDP client");
		let ws = tokio_tungstenite::accept_async(stream).await.expect("fake CDP handshake");
		let (mut sink, mut source) = ws.split();
		let target_counter = AtomicU64::new(0);

		while let Some(Ok(WsMessage::Text(text))) = source.next().await {
			let req: serde_json::Value = serde_json::from_str(&text).expect("valid CDP request frame");
			let id = req["id"].as_u64().expect("request carries an id");
			let method = req["method"].as_str().unwrap_or_default();
			let session_id = req.get("sessionId").and_then(|v| v.as_str()).map(str::to_string);

			let result = match method {
				"Target.createTarget" => {
					let n = target_counter.fetch_add(1, Ordering::SeqCst);
					serde_json::json!({ "targetId": format!("target-{n}") })
				}
				"Target.attachToTarget" => {
					let target_id = req["params"]["targetId"].as_str().unwrap_or_default();
					serde_json::json!({ "sessionId": format!("cdpsession-{target_id}") })
				}
				"Runtime.evaluate" => serde_json::json!({ "result": { "value": 42 } }),
				// Page.navigate, Network.clearBrowserCookies,
				// Storage.clearDataForOrigin, Target.closeTarget: an empty
				// success result is all the caller inspects.
				_ => serde_json::json!({}),
			};

			let mut response = serde_json::json!({ "id": id, "result": result });
			if let Some(sid) = session_id {
				response["sessionId"] = serde_json::json!(sid);
			}
			let payload = serde_json::to_string(&response).expect("serialize fake CDP response");
			if sink.send(WsMessage::Text(payload.into())).await.is_err() {
				break;
			}
		}
	});

	format!("ws://{addr}")
}

#[tokio::test]
async fn full_session_lifecycle_acquires_navigates_and_tears_down() {
	let ws_url = spawn_fake_cdp().await;
	let connection = Connection::connect(ws_url).await.expect("connect to fake CDP endpoint");

	let pool = TabPool::new(connection.clone(), PoolConfig { pre_warm: false, ..PoolConfig::default() });
	let queues = Arc::new(QueueManager::new(QueueConfig::default().item_timeout));
	let ref_table = Arc::new(RefTable::new());
	let sessions = SessionManager::new(pool.clone(), ref_table.clone(), queues.clone(), SessionConfig::default());

	let session_id = sessions.create_session();
	let created = sessions.create_tab(&session_id, None).await.expect("create tab through the pool");
	let tab_id = created.tab_id;
	assert_eq!(created.worker_id, "default");

	let tab = sessions.get_tab(&session_id, &tab_id).expect("look up the owned tab");
	assert_eq!(tab.session_id, session_id);

	let value = connection.send(Some(&tab.cdp_session_id), "Runtime.evaluate", serde_json::json!({ "expression": "1 + 1" })).await.expect("evaluate round trip");
	assert_eq!(value["result"]["value"], 42);

	// A second session must never see the first session's tab (§4.11 cross-
	// session isolation), even against the shared fake transport.
	let other_session = sessions.create_session();
	let isolation_err = sessions.get_tab(&other_session, &tab_id).unwrap_err();
	assert_eq!(isolation_err.kind(), "session.isolation");

	sessions.close_tab(&session_id, &tab_id).await.expect("close tab");
	assert!(sessions.get_tab(&session_id, &tab_id).is_err(), "closed tab id must no longer resolve");

	sessions.destroy_session(&session_id).await.expect("destroy session");
	sessions.destroy_session(&other_session).await.expect("destroy the second session");

	// The reset-on-release path (Page.navigate/clearBrowserCookies/
	// clearDataForOrigin, all answered with an empty success above) recycles
	// the tab back into the pool rather than closing it outright.
	let stats = pool.stats();
	assert_eq!(stats.in_use, 0);
	assert_eq!(stats.available, 1);
	assert_eq!(stats.total_created, 1);
}

#[tokio::test]
async fn session_not_found_is_reported_for_an_unknown_session() {
	let ws_url = spawn_fake_cdp().await;
	let connection = Connection::connect(ws_url).await.expect("connect to fake CDP endpoint");

	let pool = TabPool::new(connection, PoolConfig { pre_warm: false, ..PoolConfig::default() });
	let queues = Arc::new(QueueManager::new(QueueConfig::default().item_timeout));
	let ref_table = Arc::new(RefTable::new());
	let sessions = SessionManager::new(pool, ref_table, queues, SessionConfig::default());

	let err = sessions.create_tab("never-created", None).await.unwrap_err();
	assert_eq!(err.kind(), "session.not-found");
}
