//! Account lookups, cache-aside over `user:info:*` (§4.4).

// crates.io
use async_trait::async_trait;
// self
use super::RepoContext;
use crate::{
	_prelude::*,
	cache::CacheClient,
	keys,
	retry::RetryKind,
	store::{
		models::{UserInfo, UserStatus},
		Store,
	},
};

/// Account repository: the only path to `UserInfo` rows and their cache entries.
#[async_trait]
pub trait UserRepository: Send + Sync {
	/// Cache-aside lookup by uuid (§4.4 "Common read protocol").
	async fn get_by_uuid(&self, uuid: &str) -> crate::Result<Option<UserInfo>>;

	/// Multi-get, preserving request order (§4.4 "Batch read protocol").
	async fn batch_get_by_uuids(&self, uuids: &[String]) -> crate::Result<Vec<Option<UserInfo>>>;

	/// Update the mutable profile fields of a user, invalidating its cache entry on success.
	async fn update_profile(
		&self,
		uuid: &str,
		nickname: Option<&str>,
		avatar: Option<&str>,
		signature: Option<&str>,
	) -> crate::Result<()>;

	/// Disable or re-enable an account.
	async fn set_status(&self, uuid: &str, status: UserStatus) -> crate::Result<()>;
}

/// `sqlx`/Postgres + Redis implementation of [`UserRepository`].
pub struct PgUserRepository {
	ctx: RepoContext,
}
impl PgUserRepository {
	/// Build a repository over `store`/`cache`, escalating failed cache writes through `retry`
	/// with a replay budget of `max_retries`.
	pub fn new(store: Store, cache: Arc<dyn CacheClient>, retry: crate::retry::RetryBus, max_retries: u32) -> Self {
		Self { ctx: RepoContext::new(store, cache, retry, max_retries) }
	}

	async fn load_from_store(&self, uuid: &str) -> crate::Result<Option<UserInfo>> {
		let parsed: uuid::Uuid =
			uuid.parse().map_err(|_| Error::InvalidArgument { field: "uuid", reason: "not a uuid".into() })?;
		let row = sqlx::query_as::<_, UserInfo>(
			"SELECT uuid, email, telephone, nickname, avatar, password_hash, status, gender, \
			 signature, birthday, is_admin, created_at, updated_at, deleted_at \
			 FROM users WHERE uuid = $1 AND deleted_at IS NULL",
		)
		.bind(parsed)
		.fetch_optional(self.ctx.store.pool())
		.await?;

		Ok(row)
	}

	async fn backfill_cache(&self, uuid: &str, found: Option<&UserInfo>) {
		let key = keys::user_info(uuid);
		let result = match found {
			Some(user) => match serde_json::to_string(user) {
				Ok(json) => self.ctx.cache.set_ex(&key, &json, keys::jittered(keys::USER_INFO_TTL)).await,
				Err(err) => Err(Error::Serde(err)),
			},
			None => self.ctx.cache.set_ex(&key, keys::EMPTY_SCALAR_VALUE, keys::USER_INFO_PLACEHOLDER_TTL).await,
		};

		if let Err(err) = result {
			self.ctx
				.escalate(
					RetryKind::Simple,
					"SET",
					vec![key, found.and_then(|u| serde_json::to_string(u).ok()).unwrap_or_default()],
					"-",
					uuid,
					None,
					"user_info_backfill",
					&err,
				)
				.await;
		}
	}
}
#[async_trait]
impl UserRepository for PgUserRepository {
	#[tracing::instrument(skip(self), fields(uuid = %uuid))]
	async fn get_by_uuid(&self, uuid: &str) -> crate::Result<Option<UserInfo>> {
		let key = keys::user_info(uuid);

		if let Some(raw) = self.ctx.cache.get(&key).await? {
			if crate::cache::is_empty_scalar(&raw) {
				return Ok(None);
			}

			if let Ok(user) = serde_json::from_str::<UserInfo>(&raw) {
				if keys::should_renew_ttl() {
					let _ = self.ctx.cache.expire(&key, keys::jittered(keys::USER_INFO_TTL)).await;
				}

				return Ok(Some(user));
			}
			// Deserialization failure falls through to the store, per §4.4 step 3.
		}

		let found = self.load_from_store(uuid).await?;

		self.backfill_cache(uuid, found.as_ref()).await;

		Ok(found)
	}

	#[tracing::instrument(skip(self, uuids), fields(count = uuids.len()))]
	async fn batch_get_by_uuids(&self, uuids: &[String]) -> crate::Result<Vec<Option<UserInfo>>> {
		let mut results: Vec<Option<UserInfo>> = Vec::with_capacity(uuids.len());
		let mut misses = Vec::new();

		for uuid in uuids {
			let key = keys::user_info(uuid);

			match self.ctx.cache.get(&key).await? {
				Some(raw) if crate::cache::is_empty_scalar(&raw) => results.push(None),
				Some(raw) => match serde_json::from_str::<UserInfo>(&raw) {
					Ok(user) => results.push(Some(user)),
					Err(_) => {
						misses.push((results.len(), uuid.clone()));
						results.push(None);
					},
				},
				None => {
					misses.push((results.len(), uuid.clone()));
					results.push(None);
				},
			}
		}

		if misses.is_empty() {
			return Ok(results);
		}

		let miss_uuids: Vec<uuid::Uuid> = misses
			.iter()
			.filter_map(|(_, u)| u.parse().ok())
			.collect();
		let rows = sqlx::query_as::<_, UserInfo>(
			"SELECT uuid, email, telephone, nickname, avatar, password_hash, status, gender, \
			 signature, birthday, is_admin, created_at, updated_at, deleted_at \
			 FROM users WHERE uuid = ANY($1) AND deleted_at IS NULL",
		)
		.bind(&miss_uuids[..])
		.fetch_all(self.ctx.store.pool())
		.await?;

		for (index, uuid) in &misses {
			let found = rows.iter().find(|r| r.uuid.to_string() == *uuid).cloned();

			self.backfill_cache(uuid, found.as_ref()).await;
			results[*index] = found;
		}

		Ok(results)
	}

	async fn update_profile(
		&self,
		uuid: &str,
		nickname: Option<&str>,
		avatar: Option<&str>,
		signature: Option<&str>,
	) -> crate::Result<()> {
		let parsed: uuid::Uuid =
			uuid.parse().map_err(|_| Error::InvalidArgument { field: "uuid", reason: "not a uuid".into() })?;

		sqlx::query(
			"UPDATE users SET \
			 nickname = COALESCE($2, nickname), \
			 avatar = COALESCE($3, avatar), \
			 signature = COALESCE($4, signature), \
			 updated_at = now() \
			 WHERE uuid = $1 AND deleted_at IS NULL",
		)
		.bind(parsed)
		.bind(nickname)
		.bind(avatar)
		.bind(signature)
		.execute(self.ctx.store.pool())
		.await?;

		let key = keys::user_info(uuid);

		if let Err(err) = self.ctx.cache.del(&key).await {
			self.ctx
				.escalate(RetryKind::Simple, "DEL", vec![key], "-", uuid, None, "user_profile_update", &err)
				.await;
		}

		Ok(())
	}

	async fn set_status(&self, uuid: &str, status: UserStatus) -> crate::Result<()> {
		let parsed: uuid::Uuid =
			uuid.parse().map_err(|_| Error::InvalidArgument { field: "uuid", reason: "not a uuid".into() })?;

		sqlx::query("UPDATE users SET status = $2, updated_at = now() WHERE uuid = $1")
			.bind(parsed)
			.bind(status.as_str())
			.execute(self.ctx.store.pool())
			.await?;

		let key = keys::user_info(uuid);

		if let Err(err) = self.ctx.cache.del(&key).await {
			self.ctx
				.escalate(RetryKind::Simple, "DEL", vec![key], "-", uuid, None, "user_status_update", &err)
				.await;
		}

		Ok(())
	}
}
