//! Process-wide bounded async worker pool (§4.3).
//!
//! A semaphore-bounded pool instrumented with `tracing`, panic-isolated via `catch_unwind`, with
//! connection tagging and workload partitioning traded for a flat task queue since nothing here
//! needs either.

// std
use std::{future::Future, panic::AssertUnwindSafe};
// crates.io
use futures::FutureExt;
use tokio::sync::Semaphore;
// self
use crate::_prelude::*;

/// Fields copied through a background task when the caller that spawned it is about to return
/// (§8 "Context propagation across background tasks").
///
/// Carried by value, never by reference: the handler's own cancellation must not reach the
/// detached task, so there is nothing here that borrows from the handler's scope.
#[derive(Clone, Debug, Default)]
pub struct TraceContext {
	/// Correlates log lines for one inbound request across every task it fans out to.
	pub trace_id: String,
	/// Acting user, if the originating request was authenticated.
	pub user_uuid: Option<String>,
	/// Acting device, if known.
	pub device_id: Option<String>,
	/// Client IP of the originating request.
	pub client_ip: Option<String>,
}

/// Bounded pool of detached async contexts.
///
/// Every inbound WebSocket connection's read/write loops, every RPC handler, and the retry
/// consumer run inside a context this pool hands out; `AsyncPool` itself holds no state beyond
/// the concurrency permit, so handles are cheap to clone and share.
#[derive(Clone)]
pub struct AsyncPool {
	semaphore: Arc<Semaphore>,
}
impl AsyncPool {
	/// Build a pool that admits at most `capacity` concurrently-running tasks.
	pub fn new(capacity: usize) -> Self {
		Self { semaphore: Arc::new(Semaphore::new(capacity.max(1))) }
	}

	/// Number of permits currently available.
	pub fn available(&self) -> usize {
		self.semaphore.available_permits()
	}

	/// Detach `task` onto the pool, dropping its result. Panics are caught and logged, never
	/// propagated to the caller.
	pub fn submit<F>(&self, ctx: TraceContext, task: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let pool = self.clone();

		tokio::spawn(async move {
			let _permit = pool.semaphore.acquire().await;

			run_guarded(ctx, task).await;
		});
	}

	/// Run `task` to completion with a deadline, panic isolation, and context-scoped logging.
	///
	/// Returns `Err` on timeout or panic; a panic is logged with the captured payload before the
	/// error is returned so the caller sees a normal [`Error`] rather than an aborted task.
	#[tracing::instrument(skip(self, task), fields(trace_id = %ctx.trace_id, user_uuid = ctx.user_uuid.as_deref().unwrap_or("-")))]
	pub async fn run_safe<F, T>(&self, ctx: TraceContext, task: F, timeout: Duration) -> crate::Result<T>
	where
		F: Future<Output = crate::Result<T>> + Send + 'static,
		T: Send + 'static,
	{
		let _permit = self
			.semaphore
			.acquire()
			.await
			.map_err(|_| Error::Internal("async pool semaphore closed".into()))?;

		match tokio::time::timeout(timeout, AssertUnwindSafe(task).catch_unwind()).await {
			Ok(Ok(result)) => result,
			Ok(Err(panic)) => {
				let message = panic_message(&panic);

				tracing::error!(panic = %message, "pooled task panicked");

				Err(Error::Internal(format!("pooled task panicked: {message}")))
			},
			Err(_) => {
				tracing::warn!(timeout_secs = timeout.as_secs_f64(), "pooled task timed out");

				Err(Error::Internal("pooled task timed out".into()))
			},
		}
	}
}

async fn run_guarded<F>(ctx: TraceContext, task: F)
where
	F: Future<Output = ()> + Send + 'static,
{
	let outcome = AssertUnwindSafe(task).catch_unwind().await;

	if let Err(panic) = outcome {
		tracing::error!(
			trace_id = %ctx.trace_id,
			panic = %panic_message(&panic),
			"detached pooled task panicked"
		);
	}
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
	if let Some(message) = panic.downcast_ref::<&str>() {
		(*message).to_owned()
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message.clone()
	} else {
		"non-string panic payload".to_owned()
	}
}
