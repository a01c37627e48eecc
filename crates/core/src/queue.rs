//! C7: a per-session FIFO request queue. One worker task per session
//! dequeues and runs one item at a time; the next item starts only after
//! the current one's future has settled (§4.7, §5 ordering guarantees).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use openchrome_protocol::{Error, Result};
use tokio::sync::{mpsc, oneshot};

type BoxedOp = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>;

struct Item {
	op: BoxedOp,
	reply: oneshot::Sender<Result<serde_json::Value>>,
	generation: u64,
}

/// One FIFO queue for a single session. Cheap to clone; a single
/// long-lived worker task holds the receiving half for the queue's entire
/// lifetime — `clear` never tears it down, it just bumps `generation` so
/// the worker rejects whatever was already buffered instead of running it.
#[derive(Clone)]
pub struct RequestQueue {
	tx: mpsc::UnboundedSender<Item>,
	generation: Arc<AtomicU64>,
}

impl RequestQueue {
	fn new(item_timeout: Duration) -> Self {
		let (tx, rx) = mpsc::unbounded_channel::<Item>();
		let generation = Arc::new(AtomicU64::new(0));
		let queue = Self { tx, generation };
		queue.spawn_worker(rx, item_timeout);
		queue
	}

	fn spawn_worker(&self, mut rx: mpsc::UnboundedReceiver<Item>, timeout: Duration) {
		let generation = self.generation.clone();
		tokio::spawn(async move {
			while let Some(item) = rx.recv().await {
				// §4.7 `clear`: an item enqueued before the most recent `clear()`
				// call is rejected instead of run, even if it was still sitting
				// in the channel buffer when `clear` bumped the generation.
				if item.generation != generation.load(Ordering::SeqCst) {
					let _ = item.reply.send(Err(Error::QueueCancelled));
					continue;
				}
				let outcome = tokio::time::timeout(timeout, item.op).await;
				let result = match outcome {
					Ok(r) => r,
					Err(_) => Err(Error::QueueTimeout { ms: timeout.as_millis() as u64 }),
				};
				let _ = item.reply.send(result);
			}
		});
	}

	/// Enqueues `op`; it runs only after every previously-enqueued op on
	/// this session has settled (§5 FIFO ordering guarantee).
	pub async fn enqueue<F>(&self, op: F) -> Result<serde_json::Value>
	where
		F: Future<Output = Result<serde_json::Value>> + Send + 'static,
	{
		let (reply_tx, reply_rx) = oneshot::channel();
		let generation = self.generation.load(Ordering::SeqCst);
		let item = Item { op: Box::pin(op), reply: reply_tx, generation };
		if self.tx.send(item).is_err() {
			return Err(Error::QueueCancelled);
		}
		reply_rx.await.unwrap_or(Err(Error::QueueCancelled))
	}

	/// §4.7 `clear`: rejects every item enqueued up to this point with
	/// `queue.cancelled`, whether it is still buffered or about to be
	/// dequeued; the worker keeps running so the queue is immediately
	/// reusable for items enqueued afterward.
	pub async fn clear(&mut self) {
		self.generation.fetch_add(1, Ordering::SeqCst);
	}
}

/// Holds one `RequestQueue` per session, created lazily (§4.7).
#[derive(Default)]
pub struct QueueManager {
	queues: DashMap<String, RequestQueue>,
	item_timeout: Duration,
}

impl QueueManager {
	pub fn new(item_timeout: Duration) -> Self {
		Self { queues: DashMap::new(), item_timeout }
	}

	pub fn get_or_create(&self, session: &str) -> RequestQueue {
		self.queues.entry(session.to_string()).or_insert_with(|| RequestQueue::new(self.item_timeout)).clone()
	}

	/// Cancels and removes a session's queue (used during session teardown,
	/// §4.7, §4.11).
	pub async fn remove(&self, session: &str) {
		if let Some((_, mut queue)) = self.queues.remove(session) {
			queue.clear().await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use tokio::sync::Mutex;

	#[tokio::test]
	async fn fifo_ordering_is_preserved() {
		let manager = QueueManager::new(Duration::from_secs(5));
		let queue = manager.get_or_create("s1");
		let order = Arc::new(Mutex::new(Vec::new()));

		let mut handles = Vec::new();
		for i in 0..5u32 {
			let q = queue.clone();
			let order = order.clone();
			handles.push(tokio::spawn(async move {
				q.enqueue(async move {
					order.lock().await.push(i);
					Ok(serde_json::json!(i))
				})
				.await
			}));
		}
		for h in handles {
			h.await.unwrap().unwrap();
		}
		assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
	}

	#[tokio::test]
	async fn timeout_on_one_item_lets_the_queue_continue() {
		let manager = QueueManager::new(Duration::from_millis(50));
		let queue = manager.get_or_create("s1");

		let slow = queue.clone();
		let slow_handle = tokio::spawn(async move { slow.enqueue(async { tokio::time::sleep(Duration::from_secs(5)).await; Ok(serde_json::json!("never")) }).await });

		tokio::time::sleep(Duration::from_millis(10)).await;
		let a = queue.enqueue(async { Ok(serde_json::json!("A")) }).await.unwrap();
		let b = queue.enqueue(async { Ok(serde_json::json!("B")) }).await.unwrap();

		assert_eq!(a, serde_json::json!("A"));
		assert_eq!(b, serde_json::json!("B"));
		let slow_result = slow_handle.await.unwrap();
		assert!(matches!(slow_result, Err(Error::QueueTimeout { .. })));
	}

	#[tokio::test]
	async fn remove_on_an_unknown_session_is_a_harmless_no_op() {
		let manager = QueueManager::new(Duration::from_secs(5));
		manager.remove("nonexistent").await;
	}

	#[tokio::test]
	async fn clear_rejects_items_still_buffered_behind_a_running_one() {
		// §5 "Session clear cancels all pending items": an item already
		// sitting in the channel, behind one that's mid-execution, must be
		// rejected with queue.cancelled rather than silently run once the
		// queue's worker gets to it.
		let manager = QueueManager::new(Duration::from_secs(5));
		let counter = Arc::new(AtomicU32::new(0));

		let mut queue = manager.get_or_create("s1");
		let running = queue.clone();
		let running_handle = tokio::spawn(async move { running.enqueue(async { tokio::time::sleep(Duration::from_millis(200)).await; Ok(serde_json::json!("ran")) }).await });
		tokio::time::sleep(Duration::from_millis(20)).await;

		let c = counter.clone();
		let pending = queue.clone();
		let pending_handle = tokio::spawn(async move { pending.enqueue(async move { c.fetch_add(1, Ordering::SeqCst); Ok(serde_json::json!("should not run")) }).await });
		tokio::time::sleep(Duration::from_millis(5)).await;

		queue.clear().await;

		let running_result = running_handle.await.unwrap();
		assert_eq!(running_result.unwrap(), serde_json::json!("ran"), "already-executing item is not interrupted");

		let pending_result = pending_handle.await.unwrap();
		assert!(matches!(pending_result, Err(Error::QueueCancelled)), "buffered item must be cancelled, got {pending_result:?}");
		assert_eq!(counter.load(Ordering::SeqCst), 0, "cancelled item's op body must never run");

		let after = queue.enqueue(async { Ok(serde_json::json!("still works")) }).await.unwrap();
		assert_eq!(after, serde_json::json!("still works"), "queue remains usable after clear");
	}
}
