//! Connection Registry — the process-wide map from `(user_uuid, device_id)` to live WebSocket
//! clients (§4.5).
//!
//! One `Arc<RwLock<HashMap<K, Arc<V>>>>` protects both indices, and the hot send path only holds
//! the read lock long enough to clone an `Arc` pointer before releasing it for the actual I/O.

// std
use std::collections::HashMap;
// crates.io
use tokio::sync::{mpsc, RwLock};
// self
use crate::_prelude::*;

/// Default bound on a [`Client`]'s outbound send queue (§3 "Client").
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 64;

/// A live WebSocket connection.
///
/// Exclusively owns the underlying socket from the write loop's perspective; other code only
/// ever touches it through [`Client::enqueue`]/[`Client::close`]. `done` is monotonic: once
/// raised it never resets, and `close` is therefore idempotent.
pub struct Client {
	user_uuid: String,
	device_id: String,
	tx: mpsc::Sender<String>,
	done: Arc<tokio::sync::Notify>,
	closed: Arc<std::sync::atomic::AtomicBool>,
}
impl Client {
	/// Build a client and the paired receiver the write loop drains.
	pub fn new(user_uuid: impl Into<String>, device_id: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<String>) {
		let (tx, rx) = mpsc::channel(capacity.max(1));

		(
			Self {
				user_uuid: user_uuid.into(),
				device_id: device_id.into(),
				tx,
				done: Arc::new(tokio::sync::Notify::new()),
				closed: Arc::new(std::sync::atomic::AtomicBool::new(false)),
			},
			rx,
		)
	}

	/// Owning user.
	pub fn user_uuid(&self) -> &str {
		&self.user_uuid
	}

	/// Owning device.
	pub fn device_id(&self) -> &str {
		&self.device_id
	}

	/// Non-blocking send-queue enqueue (§4.6 "Send-queue overflow policy").
	///
	/// Returns `false` if the queue is full or the client is already closed; the caller then
	/// treats the client as dead and calls [`Client::close`].
	pub fn enqueue(&self, message: String) -> bool {
		if self.is_closed() {
			return false;
		}

		self.tx.try_send(message).is_ok()
	}

	/// Raise the done signal. Idempotent.
	pub fn close(&self) {
		if !self.closed.swap(true, std::sync::atomic::Ordering::SeqCst) {
			self.done.notify_waiters();
		}
	}

	/// Whether `close` has already been called.
	pub fn is_closed(&self) -> bool {
		self.closed.load(std::sync::atomic::Ordering::SeqCst)
	}

	/// Await the done signal, for the write loop's `tokio::select!` arm.
	pub async fn closed(&self) {
		if self.is_closed() {
			return;
		}

		self.done.notified().await;
	}
}

fn device_key(user_uuid: &str, device_id: &str) -> String {
	format!("{user_uuid}:{device_id}")
}

struct Indices {
	by_device_key: HashMap<String, Arc<Client>>,
	by_user: HashMap<String, HashMap<String, Arc<Client>>>,
	shutdown: bool,
}

/// Dual-indexed connection table (§4.5).
#[derive(Clone)]
pub struct ConnectionRegistry {
	inner: Arc<RwLock<Indices>>,
}
impl Default for ConnectionRegistry {
	fn default() -> Self {
		Self::new()
	}
}
impl ConnectionRegistry {
	/// Build an empty registry.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(RwLock::new(Indices {
				by_device_key: HashMap::new(),
				by_user: HashMap::new(),
				shutdown: false,
			})),
		}
	}

	/// Register `client`, returning the client it displaced, if any. The caller must `close` the
	/// displaced client (§4.6 step 2, "the old device connection is displaced").
	///
	/// Refuses and returns `None` after [`ConnectionRegistry::shutdown`] — a registry accepting
	/// new connections after shutdown would leak clients the shutdown sweep already missed.
	#[tracing::instrument(skip(self, client), fields(user_uuid = %client.user_uuid(), device_id = %client.device_id()))]
	pub async fn register(&self, client: Arc<Client>) -> Option<Arc<Client>> {
		let mut indices = self.inner.write().await;

		if indices.shutdown {
			return None;
		}

		let key = device_key(client.user_uuid(), client.device_id());
		let previous = indices.by_device_key.insert(key, client.clone());

		indices
			.by_user
			.entry(client.user_uuid().to_owned())
			.or_default()
			.insert(client.device_id().to_owned(), client);

		previous
	}

	/// Remove `client` from both indices, but only if it is still the current occupant of its
	/// key (pointer equality) — a concurrent `register` replacing it first must not be clobbered.
	pub async fn unregister(&self, client: &Arc<Client>) {
		let mut indices = self.inner.write().await;
		let key = device_key(client.user_uuid(), client.device_id());

		if let Some(current) = indices.by_device_key.get(&key) {
			if !Arc::ptr_eq(current, client) {
				return;
			}
		} else {
			return;
		}

		indices.by_device_key.remove(&key);

		if let Some(devices) = indices.by_user.get_mut(client.user_uuid()) {
			devices.remove(client.device_id());

			if devices.is_empty() {
				indices.by_user.remove(client.user_uuid());
			}
		}
	}

	/// Close and remove a device's live connection, if one exists. Used by `KickDevice` to force
	/// the displaced device offline immediately rather than waiting for its next failed write.
	pub async fn disconnect_device(&self, user_uuid: &str, device_id: &str) -> bool {
		let client = {
			let mut indices = self.inner.write().await;
			let key = device_key(user_uuid, device_id);
			let removed = indices.by_device_key.remove(&key);

			if removed.is_some() {
				if let Some(devices) = indices.by_user.get_mut(user_uuid) {
					devices.remove(device_id);

					if devices.is_empty() {
						indices.by_user.remove(user_uuid);
					}
				}
			}

			removed
		};

		match client {
			Some(client) => {
				client.close();

				true
			},
			None => false,
		}
	}

	/// Targeted enqueue. The read lock is held only long enough to clone the `Arc`.
	pub async fn send_to_device(&self, user_uuid: &str, device_id: &str, message: String) -> bool {
		let client = {
			let indices = self.inner.read().await;

			indices.by_device_key.get(&device_key(user_uuid, device_id)).cloned()
		};

		match client {
			Some(client) => client.enqueue(message),
			None => false,
		}
	}

	/// Fan-out enqueue to every device of `user_uuid`. The device list is snapshotted under the
	/// read lock and released before any enqueue runs, so no lock is held during I/O.
	pub async fn send_to_user(&self, user_uuid: &str, message: &str) -> usize {
		let clients: Vec<Arc<Client>> = {
			let indices = self.inner.read().await;

			indices
				.by_user
				.get(user_uuid)
				.map(|devices| devices.values().cloned().collect())
				.unwrap_or_default()
		};

		clients.iter().filter(|client| client.enqueue(message.to_owned())).count()
	}

	/// Number of `(user, device)` entries currently registered.
	pub async fn count(&self) -> usize {
		self.inner.read().await.by_device_key.len()
	}

	/// Flip the shutdown latch, snapshot every client, clear both indices, then close each
	/// client outside the lock.
	pub async fn shutdown(&self) {
		let clients: Vec<Arc<Client>> = {
			let mut indices = self.inner.write().await;

			indices.shutdown = true;

			let clients = indices.by_device_key.values().cloned().collect();

			indices.by_device_key.clear();
			indices.by_user.clear();
			clients
		};

		for client in clients {
			client.close();
		}
	}
}
