//! Repository layer — the only component that talks to the store and the cache (§4.4).
//!
//! Each aggregate is a small async trait so services depend on `dyn UserRepository` etc. and
//! tests substitute in-memory fakes: one side owns policy (which row, which precondition), the
//! other owns mechanism (store plus cache behind a single seam), each with a real second
//! implementation — store+cache versus an in-memory fake.

pub mod apply;
pub mod device;
pub mod relation;
pub mod user;

pub use apply::{ApplyRepository, PgApplyRepository};
pub use device::{DeviceRepository, PgDeviceRepository};
pub use relation::{PgRelationRepository, RelationRepository};
pub use user::{PgUserRepository, UserRepository};

// self
use crate::{
	_prelude::*,
	cache::CacheClient,
	retry::{RetryBus, RetryKind, RetryTask},
	store::Store,
};

/// Shared plumbing every `Pg*Repository` embeds: the store, the cache, the retry bus, and the
/// replay budget handed to escalated [`RetryTask`]s.
///
/// Not a trait itself — each repository's trait only exposes the aggregate-specific operations;
/// this struct just avoids repeating the four-field constructor boilerplate four times.
#[derive(Clone)]
pub(crate) struct RepoContext {
	pub store: Store,
	pub cache: Arc<dyn CacheClient>,
	pub retry: RetryBus,
	pub max_retries: u32,
}
impl RepoContext {
	pub fn new(store: Store, cache: Arc<dyn CacheClient>, retry: RetryBus, max_retries: u32) -> Self {
		Self { store, cache, retry, max_retries }
	}

	/// Publish a best-effort cache mutation's failure as a [`RetryTask`] (§4.4 write protocol
	/// step 3). `trace_id`/`device_id` are best-effort context; pass `"-"` / `None` when the
	/// caller has none to offer.
	pub async fn escalate(
		&self,
		kind: RetryKind,
		command: &str,
		args: Vec<String>,
		trace_id: &str,
		user_uuid: &str,
		device_id: Option<&str>,
		source: &str,
		error: &Error,
	) {
		self.retry
			.publish(RetryTask {
				kind,
				command: command.to_owned(),
				args,
				trace_id: trace_id.to_owned(),
				user_uuid: user_uuid.to_owned(),
				device_id: device_id.map(str::to_owned),
				timestamp: Utc::now(),
				retry_count: 0,
				max_retries: self.max_retries,
				original_error: error.to_string(),
				source: source.to_owned(),
			})
			.await;
	}
}
