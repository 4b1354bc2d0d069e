//! Social-graph edges: friend hash cache-aside, blacklist-with-memory, and incremental sync
//! (§4.4).

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
		models::{RelationStatus, UserRelation},
		Store,
	},
};

/// Result of [`RelationRepository::sync_friend_list`] (§4.4 "Incremental friend sync").
#[derive(Clone, Debug)]
pub struct SyncPage {
	/// Relations changed since the requested version, ascending by `updated_at`.
	pub relations: Vec<UserRelation>,
	/// Whether a further page remains.
	pub has_more: bool,
	/// Cursor to pass as `since_version_ms` on the next call.
	pub next_version: DateTime<Utc>,
}

/// Social-graph repository.
#[async_trait]
pub trait RelationRepository: Send + Sync {
	/// Fetch one directional relation, excluding soft-deleted rows.
	async fn get_relation(&self, user_uuid: &str, peer_uuid: &str) -> crate::Result<Option<UserRelation>>;

	/// List a user's `Normal` (friend) relations via the cache-aside hash.
	async fn list_friends(&self, user_uuid: &str) -> crate::Result<Vec<UserRelation>>;

	/// Add `target` to `user`'s blacklist, remembering whether they were previously friends
	/// (§4.4 "Blacklist with memory").
	async fn add_blacklist(&self, user_uuid: &str, target_uuid: &str) -> crate::Result<()>;

	/// Remove `target` from `user`'s blacklist, restoring the remembered prior state.
	async fn remove_blacklist(&self, user_uuid: &str, target_uuid: &str) -> crate::Result<()>;

	/// Incremental sync cursor (§4.4 "Incremental friend sync").
	async fn sync_friend_list(
		&self,
		user_uuid: &str,
		since_version_ms: i64,
		limit: i64,
	) -> crate::Result<SyncPage>;
}

/// `sqlx`/Postgres + Redis implementation of [`RelationRepository`].
pub struct PgRelationRepository {
	ctx: RepoContext,
}
impl PgRelationRepository {
	/// Build a repository over `store`/`cache`, escalating failed cache writes through `retry`
	/// with a replay budget of `max_retries`.
	pub fn new(store: Store, cache: Arc<dyn CacheClient>, retry: crate::retry::RetryBus, max_retries: u32) -> Self {
		Self { ctx: RepoContext::new(store, cache, retry, max_retries) }
	}

	async fn load_relation(&self, user_uuid: &str, peer_uuid: &str) -> crate::Result<Option<UserRelation>> {
		let user: uuid::Uuid = user_uuid.parse().map_err(|_| invalid_uuid())?;
		let peer: uuid::Uuid = peer_uuid.parse().map_err(|_| invalid_uuid())?;

		let row = sqlx::query_as::<_, UserRelation>(
			"SELECT user_uuid, peer_uuid, status, remark, group_tag, source, created_at, updated_at, deleted_at \
			 FROM user_relation WHERE user_uuid = $1 AND peer_uuid = $2",
		)
		.bind(user)
		.bind(peer)
		.fetch_optional(self.ctx.store.pool())
		.await?;

		Ok(row)
	}

	/// Upsert a relation row to the given status, optionally clearing `deleted_at` and setting
	/// `remark` (leaving it untouched when `remark` is `None`, per the accept-apply algorithm's
	/// "preserve whatever the other side already had").
	async fn upsert_relation(
		&self,
		user_uuid: uuid::Uuid,
		peer_uuid: uuid::Uuid,
		status: RelationStatus,
		remark: Option<&str>,
		clear_deleted: bool,
	) -> crate::Result<()> {
		sqlx::query(
			"INSERT INTO user_relation (user_uuid, peer_uuid, status, remark, created_at, updated_at, deleted_at) \
			 VALUES ($1, $2, $3, $4, now(), now(), NULL) \
			 ON CONFLICT (user_uuid, peer_uuid) DO UPDATE SET \
			 status = $3, \
			 remark = COALESCE($4, user_relation.remark), \
			 deleted_at = CASE WHEN $5 THEN NULL ELSE user_relation.deleted_at END, \
			 updated_at = now()",
		)
		.bind(user_uuid)
		.bind(peer_uuid)
		.bind(status as i16)
		.bind(remark)
		.bind(clear_deleted)
		.execute(self.ctx.store.pool())
		.await?;

		Ok(())
	}
}
#[async_trait]
impl RelationRepository for PgRelationRepository {
	async fn get_relation(&self, user_uuid: &str, peer_uuid: &str) -> crate::Result<Option<UserRelation>> {
		let row = self.load_relation(user_uuid, peer_uuid).await?;

		Ok(row.filter(|r| r.deleted_at.is_none()))
	}

	#[tracing::instrument(skip(self), fields(user_uuid = %user_uuid))]
	async fn list_friends(&self, user_uuid: &str) -> crate::Result<Vec<UserRelation>> {
		let key = keys::user_relation_friend(user_uuid);
		let cached = self.ctx.cache.hgetall(&key).await?;

		if !cached.is_empty() {
			if crate::cache::is_empty_collection(&cached) {
				return Ok(Vec::new());
			}

			let mut friends = Vec::with_capacity(cached.len());

			for (_peer_uuid, json) in &cached {
				match serde_json::from_str::<UserRelation>(json) {
					Ok(relation) => friends.push(relation),
					Err(_) => return self.rebuild_friend_cache(user_uuid).await,
				}
			}

			return Ok(friends);
		}

		self.rebuild_friend_cache(user_uuid).await
	}

	#[tracing::instrument(skip(self), fields(user_uuid = %user_uuid, target_uuid = %target_uuid))]
	async fn add_blacklist(&self, user_uuid: &str, target_uuid: &str) -> crate::Result<()> {
		let user: uuid::Uuid = user_uuid.parse().map_err(|_| invalid_uuid())?;
		let target: uuid::Uuid = target_uuid.parse().map_err(|_| invalid_uuid())?;
		let existing = self.load_relation(user_uuid, target_uuid).await?;

		let new_status = match existing.as_ref().map(|r| r.status) {
			None => RelationStatus::BlacklistWasStranger,
			Some(raw) => match RelationStatus::try_from(raw)? {
				RelationStatus::Normal | RelationStatus::BlacklistWasFriend | RelationStatus::Deleted =>
					RelationStatus::BlacklistWasFriend,
				RelationStatus::BlacklistWasStranger => RelationStatus::BlacklistWasStranger,
			},
		};

		self.upsert_relation(user, target, new_status, None, true).await?;
		self.invalidate_blacklist_and_friends(user_uuid).await;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_uuid = %user_uuid, target_uuid = %target_uuid))]
	async fn remove_blacklist(&self, user_uuid: &str, target_uuid: &str) -> crate::Result<()> {
		let user: uuid::Uuid = user_uuid.parse().map_err(|_| invalid_uuid())?;
		let target: uuid::Uuid = target_uuid.parse().map_err(|_| invalid_uuid())?;
		let existing = self.load_relation(user_uuid, target_uuid).await?;
		let current = existing
			.as_ref()
			.map(|r| RelationStatus::try_from(r.status))
			.transpose()?;

		let (new_status, clear_deleted) = match current {
			Some(RelationStatus::BlacklistWasFriend) => (RelationStatus::Normal, true),
			Some(RelationStatus::BlacklistWasStranger) => (RelationStatus::Deleted, false),
			_ => return Ok(()),
		};

		self.upsert_relation(user, target, new_status, None, clear_deleted).await?;
		self.invalidate_blacklist_and_friends(user_uuid).await;

		Ok(())
	}

	#[tracing::instrument(skip(self), fields(user_uuid = %user_uuid, since_version_ms, limit))]
	async fn sync_friend_list(
		&self,
		user_uuid: &str,
		since_version_ms: i64,
		limit: i64,
	) -> crate::Result<SyncPage> {
		let user: uuid::Uuid = user_uuid.parse().map_err(|_| invalid_uuid())?;
		let since = DateTime::<Utc>::from_timestamp_millis(since_version_ms)
			.unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap());
		let take = limit.max(1) + 1;

		let mut rows = sqlx::query_as::<_, UserRelation>(
			"SELECT user_uuid, peer_uuid, status, remark, group_tag, source, created_at, updated_at, deleted_at \
			 FROM user_relation WHERE user_uuid = $1 AND updated_at > $2 \
			 ORDER BY updated_at ASC LIMIT $3",
		)
		.bind(user)
		.bind(since)
		.bind(take)
		.fetch_all(self.ctx.store.pool())
		.await?;

		let has_more = rows.len() as i64 > limit;

		if has_more {
			rows.truncate(limit as usize);
		}

		let next_version = if has_more {
			rows.last().map(|r| r.updated_at).unwrap_or(since)
		} else {
			let retreat = Utc::now() - chrono::Duration::seconds(5);
			rows.last().map(|r| r.updated_at.max(retreat)).unwrap_or(retreat)
		};

		Ok(SyncPage { relations: rows, has_more, next_version })
	}
}
impl PgRelationRepository {
	async fn rebuild_friend_cache(&self, user_uuid: &str) -> crate::Result<Vec<UserRelation>> {
		let user: uuid::Uuid = user_uuid.parse().map_err(|_| invalid_uuid())?;
		let rows = sqlx::query_as::<_, UserRelation>(
			"SELECT user_uuid, peer_uuid, status, remark, group_tag, source, created_at, updated_at, deleted_at \
			 FROM user_relation WHERE user_uuid = $1 AND status = $2 AND deleted_at IS NULL",
		)
		.bind(user)
		.bind(RelationStatus::Normal as i16)
		.fetch_all(self.ctx.store.pool())
		.await?;

		let key = keys::user_relation_friend(user_uuid);
		let ttl = keys::jittered(keys::RELATION_TTL);

		if rows.is_empty() {
			let _ = self.ctx.cache.hset_ex(&key, keys::EMPTY_SET_MEMBER, "1", ttl).await;
		} else {
			for relation in &rows {
				if let Ok(json) = serde_json::to_string(relation) {
					let _ = self.ctx.cache.hset_ex(&key, &relation.peer_uuid.to_string(), &json, ttl).await;
				}
			}
		}

		Ok(rows)
	}

	async fn invalidate_blacklist_and_friends(&self, user_uuid: &str) {
		let friend_key = keys::user_relation_friend(user_uuid);
		let blacklist_key = keys::user_relation_blacklist(user_uuid);

		if let Err(err) = self.ctx.cache.del(&friend_key).await {
			self.ctx
				.escalate(RetryKind::Simple, "DEL", vec![friend_key], "-", user_uuid, None, "relation_invalidate", &err)
				.await;
		}
		let _ = self.ctx.cache.del(&blacklist_key).await;
	}
}

fn invalid_uuid() -> Error {
	Error::InvalidArgument { field: "uuid", reason: "not a uuid".into() }
}
