//! Consumer side of the retry bus: drains queued tasks and replays them against the cache.

// crates.io
use tokio::sync::mpsc;
// self
use super::{RetryBus, RetryKind, RetryTask};
use crate::{_prelude::*, cache::CacheClient};

/// Long-running loop that drains a retry-task receiver and replays each task against a
/// [`CacheClient`] (§4.2 "consumer side").
///
/// Intended to run inside a pool-managed context (§4.3); `run` does not return until the channel
/// is closed, so callers spawn it and hold the `JoinHandle` for shutdown.
pub struct RetryConsumer {
	cache: Arc<dyn CacheClient>,
	bus: RetryBus,
}
impl RetryConsumer {
	/// Build a consumer that replays failed writes against `cache`, re-publishing through `bus`
	/// on further failure.
	pub fn new(cache: Arc<dyn CacheClient>, bus: RetryBus) -> Self {
		Self { cache, bus }
	}

	/// Drain `rx` until the channel closes, replaying each task in turn.
	pub async fn run(self, mut rx: mpsc::UnboundedReceiver<RetryTask>) {
		while let Some(task) = rx.recv().await {
			self.replay_one(task).await;
		}
	}

	#[tracing::instrument(skip(self, task), fields(
		user_uuid = %task.user_uuid,
		source = %task.source,
		retry_count = task.retry_count,
	))]
	async fn replay_one(&self, task: RetryTask) {
		if task.exhausted() {
			tracing::warn!(error = %task.original_error, "retry task exhausted its budget; dropping");

			return;
		}

		match self.apply(&task).await {
			Ok(()) => tracing::debug!("retry task replayed successfully"),
			Err(err) => {
				tracing::warn!(error = %err, "retry task replay failed; re-publishing");

				let mut retried = task;

				retried.retry_count += 1;
				self.bus.publish(retried).await;
			},
		}
	}

	async fn apply(&self, task: &RetryTask) -> crate::Result<()> {
		match task.kind {
			RetryKind::Simple => self.apply_simple(task).await,
			RetryKind::Pipeline => self.apply_pipeline(task).await,
			RetryKind::Lua => self.apply_lua(task).await,
		}
	}

	async fn apply_simple(&self, task: &RetryTask) -> crate::Result<()> {
		match task.command.as_str() {
			"SET" => {
				let [key, value] = take2(&task.args)?;

				self.cache.set_ex(&key, &value, crate::keys::jittered(crate::keys::USER_INFO_TTL)).await
			},
			"DEL" => {
				let key = task.args.first().cloned().ok_or_else(missing_args)?;

				self.cache.del(&key).await
			},
			"HSET" => {
				let [key, field, value] = take3(&task.args)?;

				self.cache.hset_ex(&key, &field, &value, crate::keys::jittered(crate::keys::RELATION_TTL)).await
			},
			other => Err(Error::Internal(format!("unknown simple retry command: {other}"))),
		}
	}

	/// Executes each command in the pipeline sequentially against the cache-aside contract.
	///
	/// A true multi-command atomic pipeline is a thin layer over the same per-command methods;
	/// ordering is preserved because each command awaits the previous one's completion.
	async fn apply_pipeline(&self, task: &RetryTask) -> crate::Result<()> {
		for chunk in task.args.chunks(3) {
			if let [key, field, value] = chunk {
				self.cache
					.hset_ex(key, field, value, crate::keys::jittered(crate::keys::RELATION_TTL))
					.await?;
			}
		}

		Ok(())
	}

	async fn apply_lua(&self, task: &RetryTask) -> crate::Result<()> {
		let [key, field, value] = take3(&task.args)?;
		let applied = self
			.cache
			.hset_if_exists(&key, &field, &value, crate::keys::jittered(crate::keys::RELATION_TTL))
			.await?;

		if !applied {
			tracing::debug!(%key, "retry lua replay found no existing entry; skipping rebuild");
		}

		Ok(())
	}
}

fn missing_args() -> Error {
	Error::Internal("retry task missing required arguments".into())
}

fn take2(args: &[String]) -> crate::Result<[String; 2]> {
	match args {
		[a, b] => Ok([a.clone(), b.clone()]),
		_ => Err(missing_args()),
	}
}

fn take3(args: &[String]) -> crate::Result<[String; 3]> {
	match args {
		[a, b, c] => Ok([a.clone(), b.clone(), c.clone()]),
		_ => Err(missing_args()),
	}
}
