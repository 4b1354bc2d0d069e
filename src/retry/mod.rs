//! Durable retry bus for best-effort cache writes (§4.2).
//!
//! The producer side follows a fire-and-forget background-task shape: it spawns via
//! `tokio::spawn` and only logs failures rather than propagating them to the caller. `publish`
//! never blocks or fails the business flow that triggered it.

mod consumer;

// crates.io
use async_trait::async_trait;
use tokio::sync::mpsc;
// self
use crate::_prelude::*;

pub use consumer::RetryConsumer;

/// Default replay budget for a [`RetryTask`] when the caller does not specify one.
pub const fn default_max_retries() -> u32 {
	3
}

/// Discriminates the three shapes of replayable cache command (§3 `RetryTask`).
#[derive(Clone, Debug, PartialEq)]
pub enum RetryKind {
	/// A single cache command, e.g. `SET key value EX ttl`.
	Simple,
	/// An ordered list of commands executed atomically.
	Pipeline,
	/// A server-side Lua script evaluation.
	Lua,
}

/// A best-effort cache write that failed and is queued for replay.
///
/// `command`/`args` are opaque to the bus; only [`consumer::RetryConsumer`] interprets them,
/// dispatching on `kind`.
#[derive(Clone, Debug)]
pub struct RetryTask {
	/// Which replay strategy applies.
	pub kind: RetryKind,
	/// The command name (`"SET"`, `"HSET"`, a script body for `Lua`, ...).
	pub command: String,
	/// Positional arguments for the command, or `[keys..., argv...]` for `Lua`.
	pub args: Vec<String>,
	/// Trace id carried from the originating request, preserved across the async boundary.
	pub trace_id: String,
	/// User the originating request acted on behalf of.
	pub user_uuid: String,
	/// Device the originating request came from, if any.
	pub device_id: Option<String>,
	/// When the task was created.
	pub timestamp: DateTime<Utc>,
	/// How many times this task has already been replayed.
	pub retry_count: u32,
	/// Replay budget; the task is dropped once `retry_count` reaches this.
	pub max_retries: u32,
	/// The error that caused the original synchronous write to fail, for diagnostics.
	pub original_error: String,
	/// Free-form origin tag (e.g. `"user_info_refresh"`), used only for logging.
	pub source: String,
}
impl RetryTask {
	/// Whether this task has exhausted its replay budget and should be dropped.
	pub fn exhausted(&self) -> bool {
		self.retry_count >= self.max_retries
	}
}

/// Transport abstraction for the retry bus (§6 "retry queue brokers, topic, consumer group").
///
/// The default implementation is an in-process `tokio::sync::mpsc` channel, sufficient for
/// single-node deployments and for tests. A production multi-node deployment wires in an
/// implementation backed by a durable log (Kafka, Redis Streams) with consumer-group semantics;
/// that implementation lives outside this crate and is not shipped here.
#[async_trait]
pub trait RetryTransport: Send + Sync {
	/// Durably hand off a task to the consumer side. Implementations should not block long;
	/// [`RetryBus::publish`] already runs this off the caller's critical path.
	async fn send(&self, task: RetryTask) -> crate::Result<()>;
}

/// In-process [`RetryTransport`] backed by an unbounded `mpsc` channel.
///
/// Unbounded because a bounded channel would let a slow consumer apply backpressure to business
/// writers, which §4.2 explicitly rules out ("the caller does not block business flow on it").
pub struct InProcessTransport {
	tx: mpsc::UnboundedSender<RetryTask>,
}
impl InProcessTransport {
	/// Build a connected transport/receiver pair. The receiver feeds a [`RetryConsumer`].
	pub fn channel() -> (Self, mpsc::UnboundedReceiver<RetryTask>) {
		let (tx, rx) = mpsc::unbounded_channel();

		(Self { tx }, rx)
	}
}
#[async_trait]
impl RetryTransport for InProcessTransport {
	async fn send(&self, task: RetryTask) -> crate::Result<()> {
		self.tx
			.send(task)
			.map_err(|_| Error::Internal("retry bus receiver has been dropped".into()))
	}
}

/// Producer-side handle used by repository and service code to enqueue a failed cache write.
#[derive(Clone)]
pub struct RetryBus {
	transport: Arc<dyn RetryTransport>,
}
impl RetryBus {
	/// Build a bus over the given transport.
	pub fn new(transport: Arc<dyn RetryTransport>) -> Self {
		Self { transport }
	}

	/// Build a bus backed by an in-process channel, returning the bus and the receiver the
	/// consumer should drain.
	pub fn in_process() -> (Self, mpsc::UnboundedReceiver<RetryTask>) {
		let (transport, rx) = InProcessTransport::channel();

		(Self::new(Arc::new(transport)), rx)
	}

	/// Publish a task without blocking the caller's business flow.
	///
	/// A publish failure is logged and swallowed: the caller has already committed its write to
	/// the store, so business success never depends on retry durability.
	#[tracing::instrument(skip(self, task), fields(user_uuid = %task.user_uuid, source = %task.source))]
	pub async fn publish(&self, task: RetryTask) {
		if let Err(err) = self.transport.send(task).await {
			tracing::warn!(error = %err, "failed to publish retry task; dropping");
		}
	}
}
