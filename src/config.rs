//! Runtime configuration (§6 "Configuration").
//!
//! A `serde`-deserializable struct with per-field defaults and a `validate()` pass that turns
//! bad values into [`Error::InvalidArgument`] before anything downstream has a chance to
//! misbehave on them.

// std
use std::time::Duration;
// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::Error;

fn default_bind_addr() -> String {
	"0.0.0.0:8080".to_owned()
}

fn default_store_max_connections() -> u32 {
	10
}

fn default_cache_url() -> String {
	"redis://127.0.0.1:6379".to_owned()
}

fn default_cache_connect_timeout() -> Duration {
	Duration::from_secs(5)
}

fn default_retry_consumer_group() -> String {
	"imcore-retry-consumer".to_owned()
}

fn default_async_pool_capacity() -> usize {
	256
}

fn default_async_pool_task_timeout() -> Duration {
	Duration::from_secs(10)
}

fn default_send_queue_capacity() -> usize {
	crate::registry::DEFAULT_SEND_QUEUE_CAPACITY
}

fn default_write_deadline() -> Duration {
	Duration::from_secs(5)
}

fn default_shutdown_drain_deadline() -> Duration {
	Duration::from_secs(15)
}

fn default_access_token_ttl() -> Duration {
	crate::keys::ACCESS_TOKEN_TTL
}

fn default_refresh_token_ttl() -> Duration {
	crate::keys::REFRESH_TOKEN_TTL
}

fn default_online_window() -> Duration {
	crate::keys::DEFAULT_ONLINE_WINDOW
}

fn default_apply_pending_ttl() -> Duration {
	crate::keys::APPLY_PENDING_TTL
}

fn default_device_active_ttl() -> Duration {
	crate::keys::DEVICE_ACTIVE_TTL
}

fn default_user_info_ttl() -> Duration {
	crate::keys::USER_INFO_TTL
}

/// Top-level process configuration, assembled from environment variables via
/// [`AppConfig::from_env`] or constructed directly for tests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
	/// Address the WebSocket gateway's HTTP listener binds to.
	#[serde(default = "default_bind_addr")]
	pub bind_addr: String,

	/// Postgres connection string backing the account/social-graph store.
	pub store_database_url: String,
	/// Maximum size of the Postgres connection pool.
	#[serde(default = "default_store_max_connections")]
	pub store_max_connections: u32,

	/// Redis connection URL for the cache-aside layer.
	#[serde(default = "default_cache_url")]
	pub cache_url: String,
	/// Timeout applied to establishing the initial cache connection.
	#[serde(default = "default_cache_connect_timeout")]
	pub cache_connect_timeout: Duration,

	/// Consumer group name the retry bus's durable consumer joins (§4.2).
	#[serde(default = "default_retry_consumer_group")]
	pub retry_consumer_group: String,
	/// Maximum replay attempts before a retry task is dropped and logged.
	#[serde(default = "crate::retry::default_max_retries")]
	pub retry_max_retries: u32,

	/// Bound on concurrently running tasks in the shared [`crate::pool::AsyncPool`].
	#[serde(default = "default_async_pool_capacity")]
	pub async_pool_capacity: usize,
	/// Per-task timeout enforced by [`crate::pool::AsyncPool::run_safe`].
	#[serde(default = "default_async_pool_task_timeout")]
	pub async_pool_task_timeout: Duration,

	/// Bound on a connection's outbound send queue (§3 "Client").
	#[serde(default = "default_send_queue_capacity")]
	pub send_queue_capacity: usize,
	/// Deadline for a single WebSocket frame write before the connection is dropped.
	#[serde(default = "default_write_deadline")]
	pub write_deadline: Duration,
	/// Bounded drain window for graceful shutdown (§5 "Deadlines").
	#[serde(default = "default_shutdown_drain_deadline")]
	pub shutdown_drain_deadline: Duration,

	/// HMAC/RSA secret or key material passed to `jsonwebtoken` for access-token verification.
	pub jwt_secret: String,
	/// Access token lifetime.
	#[serde(default = "default_access_token_ttl")]
	pub access_token_ttl: Duration,
	/// Refresh token lifetime.
	#[serde(default = "default_refresh_token_ttl")]
	pub refresh_token_ttl: Duration,

	/// Window after which a device with no heartbeat is considered offline (§4.6).
	#[serde(default = "default_online_window")]
	pub online_window: Duration,
	/// TTL applied to the pending-apply ZSet cache entry.
	#[serde(default = "default_apply_pending_ttl")]
	pub apply_pending_ttl: Duration,
	/// TTL applied to the device-active cache entry.
	#[serde(default = "default_device_active_ttl")]
	pub device_active_ttl: Duration,
	/// TTL applied to cached user profile rows.
	#[serde(default = "default_user_info_ttl")]
	pub user_info_ttl: Duration,
}
impl AppConfig {
	/// Load configuration from process environment variables, applying a `.env` file first if
	/// present. Required fields (`store_database_url`, `jwt_secret`) have no default and this
	/// call fails if they are unset.
	pub fn from_env() -> crate::Result<Self> {
		let _ = dotenvy::dotenv();

		let config = Self {
			bind_addr: env_or("IMCORE_BIND_ADDR", default_bind_addr()),
			store_database_url: require_env("IMCORE_DATABASE_URL")?,
			store_max_connections: env_or_parse("IMCORE_DB_MAX_CONNECTIONS", default_store_max_connections())?,
			cache_url: env_or("IMCORE_CACHE_URL", default_cache_url()),
			cache_connect_timeout: default_cache_connect_timeout(),
			retry_consumer_group: env_or("IMCORE_RETRY_CONSUMER_GROUP", default_retry_consumer_group()),
			retry_max_retries: env_or_parse("IMCORE_RETRY_MAX_RETRIES", crate::retry::default_max_retries())?,
			async_pool_capacity: env_or_parse("IMCORE_ASYNC_POOL_CAPACITY", default_async_pool_capacity())?,
			async_pool_task_timeout: default_async_pool_task_timeout(),
			send_queue_capacity: env_or_parse("IMCORE_SEND_QUEUE_CAPACITY", default_send_queue_capacity())?,
			write_deadline: default_write_deadline(),
			shutdown_drain_deadline: default_shutdown_drain_deadline(),
			jwt_secret: require_env("IMCORE_JWT_SECRET")?,
			access_token_ttl: default_access_token_ttl(),
			refresh_token_ttl: default_refresh_token_ttl(),
			online_window: default_online_window(),
			apply_pending_ttl: default_apply_pending_ttl(),
			device_active_ttl: default_device_active_ttl(),
			user_info_ttl: default_user_info_ttl(),
		};

		config.validate()?;

		Ok(config)
	}

	/// Validate cross-field invariants not expressible through `serde` defaults alone.
	pub fn validate(&self) -> crate::Result<()> {
		if self.store_max_connections == 0 {
			return invalid("store_max_connections", "must be greater than zero");
		}
		if self.async_pool_capacity == 0 {
			return invalid("async_pool_capacity", "must be greater than zero");
		}
		if self.send_queue_capacity == 0 {
			return invalid("send_queue_capacity", "must be greater than zero");
		}
		if self.jwt_secret.trim().is_empty() {
			return invalid("jwt_secret", "must not be empty");
		}
		if self.refresh_token_ttl <= self.access_token_ttl {
			return invalid("refresh_token_ttl", "must be greater than access_token_ttl");
		}
		if self.online_window.is_zero() {
			return invalid("online_window", "must be greater than zero");
		}

		Ok(())
	}
}

fn invalid(field: &'static str, reason: &str) -> crate::Result<()> {
	Err(Error::InvalidArgument { field, reason: reason.to_owned() })
}

fn env_or(key: &str, default: String) -> String {
	std::env::var(key).unwrap_or(default)
}

fn require_env(key: &str) -> crate::Result<String> {
	std::env::var(key).map_err(|_| Error::InvalidArgument { field: "env", reason: format!("{key} is required") })
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> crate::Result<T> {
	match std::env::var(key) {
		Ok(raw) => raw.parse().map_err(|_| Error::InvalidArgument { field: "env", reason: format!("{key} is not valid") }),
		Err(_) => Ok(default),
	}
}
