//! Device-session lookups, access/refresh token storage, and active-timestamp heartbeats (§4.4,
//! §4.7 "KickDevice"/"GetOnlineStatus").

// crates.io
use async_trait::async_trait;
use md5::{Digest, Md5};
// self
use super::RepoContext;
use crate::{
	_prelude::*,
	cache::CacheClient,
	keys,
	retry::RetryKind,
	store::{models::DeviceSession, Store},
};

/// Device-session repository: sessions, access/refresh token material, and the active-timestamp
/// heartbeat hash.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
	/// Fetch a device session by its natural key.
	async fn get_session(&self, user_uuid: &str, device_id: &str) -> crate::Result<Option<DeviceSession>>;

	/// List every session for a user (used by `KickDevice`/`GetOnlineStatus`).
	async fn list_sessions(&self, user_uuid: &str) -> crate::Result<Vec<DeviceSession>>;

	/// Insert or refresh a session row on successful authentication/reconnect.
	async fn upsert_session(&self, session: &DeviceSession) -> crate::Result<()>;

	/// Store the MD5 of the current access token, keyed by `(user_uuid, device_id)`.
	async fn store_access_token(&self, user_uuid: &str, device_id: &str, token: &str) -> crate::Result<()>;

	/// Compare the MD5 of `presented_token` against the stored hash. `Ok(None)` means the cache
	/// had no entry (token never issued through this path, or already expired/deleted).
	async fn verify_access_token(
		&self,
		user_uuid: &str,
		device_id: &str,
		presented_token: &str,
	) -> crate::Result<Option<bool>>;

	/// Store the raw refresh token for a device.
	async fn store_refresh_token(&self, user_uuid: &str, device_id: &str, token: &str) -> crate::Result<()>;

	/// Delete both token entries for a device (idempotent).
	async fn delete_tokens(&self, user_uuid: &str, device_id: &str) -> crate::Result<()>;

	/// Stamp "now" into the device-active hash.
	async fn touch_active(&self, user_uuid: &str, device_id: &str) -> crate::Result<()>;

	/// Read the last-active unix-second timestamp for a device, if recorded.
	async fn get_active(&self, user_uuid: &str, device_id: &str) -> crate::Result<Option<i64>>;

	/// Transition a session's stored status, applying the dominance rule that `LoggedOut`/`Kicked`
	/// outrank `Online`/`Offline` (§4.7 "KickDevice").
	async fn set_status(&self, user_uuid: &str, device_id: &str, status: i16) -> crate::Result<()>;
}

/// `sqlx`/Postgres + Redis implementation of [`DeviceRepository`].
pub struct PgDeviceRepository {
	ctx: RepoContext,
}
impl PgDeviceRepository {
	/// Build a repository over `store`/`cache`, escalating failed cache writes through `retry`
	/// with a replay budget of `max_retries`.
	pub fn new(store: Store, cache: Arc<dyn CacheClient>, retry: crate::retry::RetryBus, max_retries: u32) -> Self {
		Self { ctx: RepoContext::new(store, cache, retry, max_retries) }
	}
}
#[async_trait]
impl DeviceRepository for PgDeviceRepository {
	async fn get_session(&self, user_uuid: &str, device_id: &str) -> crate::Result<Option<DeviceSession>> {
		let user: uuid::Uuid =
			user_uuid.parse().map_err(|_| invalid_uuid())?;
		let row = sqlx::query_as::<_, DeviceSession>(
			"SELECT user_uuid, device_id, device_name, platform, app_version, ip, user_agent, \
			 status, expire_at, created_at, updated_at \
			 FROM device_session WHERE user_uuid = $1 AND device_id = $2",
		)
		.bind(user)
		.bind(device_id)
		.fetch_optional(self.ctx.store.pool())
		.await?;

		Ok(row)
	}

	async fn list_sessions(&self, user_uuid: &str) -> crate::Result<Vec<DeviceSession>> {
		let user: uuid::Uuid = user_uuid.parse().map_err(|_| invalid_uuid())?;
		let rows = sqlx::query_as::<_, DeviceSession>(
			"SELECT user_uuid, device_id, device_name, platform, app_version, ip, user_agent, \
			 status, expire_at, created_at, updated_at \
			 FROM device_session WHERE user_uuid = $1",
		)
		.bind(user)
		.fetch_all(self.ctx.store.pool())
		.await?;

		Ok(rows)
	}

	async fn upsert_session(&self, session: &DeviceSession) -> crate::Result<()> {
		sqlx::query(
			"INSERT INTO device_session \
			 (user_uuid, device_id, device_name, platform, app_version, ip, user_agent, status, expire_at, created_at, updated_at) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now()) \
			 ON CONFLICT (user_uuid, device_id) DO UPDATE SET \
			 device_name = EXCLUDED.device_name, platform = EXCLUDED.platform, \
			 app_version = EXCLUDED.app_version, ip = EXCLUDED.ip, user_agent = EXCLUDED.user_agent, \
			 status = EXCLUDED.status, expire_at = EXCLUDED.expire_at, updated_at = now()",
		)
		.bind(session.user_uuid)
		.bind(&session.device_id)
		.bind(&session.device_name)
		.bind(&session.platform)
		.bind(&session.app_version)
		.bind(&session.ip)
		.bind(&session.user_agent)
		.bind(session.status)
		.bind(session.expire_at)
		.execute(self.ctx.store.pool())
		.await?;

		let key = keys::user_devices(&session.user_uuid.to_string());

		if let Err(err) = self.ctx.cache.del(&key).await {
			self.ctx
				.escalate(
					RetryKind::Simple,
					"DEL",
					vec![key],
					"-",
					&session.user_uuid.to_string(),
					Some(&session.device_id),
					"device_session_upsert",
					&err,
				)
				.await;
		}

		Ok(())
	}

	async fn store_access_token(&self, user_uuid: &str, device_id: &str, token: &str) -> crate::Result<()> {
		let key = keys::auth_access_token(user_uuid, device_id);
		let hash = md5_hex(token);

		self.ctx.cache.set_ex(&key, &hash, keys::ACCESS_TOKEN_TTL).await
	}

	async fn verify_access_token(
		&self,
		user_uuid: &str,
		device_id: &str,
		presented_token: &str,
	) -> crate::Result<Option<bool>> {
		let key = keys::auth_access_token(user_uuid, device_id);

		match self.ctx.cache.get(&key).await {
			Ok(Some(stored_hash)) => Ok(Some(stored_hash == md5_hex(presented_token))),
			Ok(None) => Ok(None),
			Err(err) => {
				tracing::warn!(error = %err, %user_uuid, %device_id, "cache unreachable during handshake token check; failing open");

				Ok(None)
			},
		}
	}

	async fn store_refresh_token(&self, user_uuid: &str, device_id: &str, token: &str) -> crate::Result<()> {
		let key = keys::auth_refresh_token(user_uuid, device_id);

		self.ctx.cache.set_ex(&key, token, keys::REFRESH_TOKEN_TTL).await
	}

	async fn delete_tokens(&self, user_uuid: &str, device_id: &str) -> crate::Result<()> {
		self.ctx.cache.del(&keys::auth_access_token(user_uuid, device_id)).await?;
		self.ctx.cache.del(&keys::auth_refresh_token(user_uuid, device_id)).await?;

		Ok(())
	}

	async fn touch_active(&self, user_uuid: &str, device_id: &str) -> crate::Result<()> {
		let key = keys::user_devices_active(user_uuid);
		let now = Utc::now().timestamp().to_string();

		self.ctx.cache.hset_ex(&key, device_id, &now, keys::DEVICE_ACTIVE_TTL).await
	}

	async fn get_active(&self, user_uuid: &str, device_id: &str) -> crate::Result<Option<i64>> {
		let key = keys::user_devices_active(user_uuid);
		let raw = self.ctx.cache.hget(&key, device_id).await?;

		Ok(raw.and_then(|v| v.parse().ok()))
	}

	async fn set_status(&self, user_uuid: &str, device_id: &str, status: i16) -> crate::Result<()> {
		let user: uuid::Uuid = user_uuid.parse().map_err(|_| invalid_uuid())?;

		sqlx::query(
			"UPDATE device_session SET status = $3, updated_at = now() \
			 WHERE user_uuid = $1 AND device_id = $2",
		)
		.bind(user)
		.bind(device_id)
		.bind(status)
		.execute(self.ctx.store.pool())
		.await?;

		let key = keys::user_devices(user_uuid);

		if let Err(err) = self.ctx.cache.del(&key).await {
			self.ctx
				.escalate(
					RetryKind::Simple,
					"DEL",
					vec![key],
					"-",
					user_uuid,
					Some(device_id),
					"device_status_update",
					&err,
				)
				.await;
		}

		Ok(())
	}
}

fn invalid_uuid() -> Error {
	Error::InvalidArgument { field: "user_uuid", reason: "not a uuid".into() }
}

fn md5_hex(input: &str) -> String {
	let digest = Md5::digest(input.as_bytes());

	format!("{digest:x}")
}
