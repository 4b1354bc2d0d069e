//! Friend-apply requests: creation, the transactional accept, and the pending-apply ZSet
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
		models::{ApplyRequest, RelationStatus},
		Store,
	},
};

/// Outcome of [`ApplyRepository::accept_apply_and_create_relation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceptOutcome {
	/// `true` if the apply was already in a terminal state when this call ran (§8 "Idempotent
	/// accept") — no additional relation rows were created.
	pub already_processed: bool,
}

/// Friend-apply repository.
#[async_trait]
pub trait ApplyRepository: Send + Sync {
	/// Insert a new pending apply, returning its id.
	async fn create_apply(
		&self,
		applicant_uuid: &str,
		target_uuid: &str,
		reason: Option<&str>,
		source: Option<&str>,
	) -> crate::Result<i64>;

	/// Fetch an apply by id, excluding soft-deleted rows.
	async fn get_apply(&self, apply_id: i64) -> crate::Result<Option<ApplyRequest>>;

	/// Whether a pending apply already exists from `applicant` to `target`.
	async fn has_pending(&self, applicant_uuid: &str, target_uuid: &str) -> crate::Result<bool>;

	/// The transactional accept from §4.4 "Friend-apply accept as one transaction".
	async fn accept_apply_and_create_relation(
		&self,
		apply_id: i64,
		me: &str,
		applicant: &str,
		remark: Option<&str>,
	) -> crate::Result<AcceptOutcome>;

	/// Mark an apply rejected. Idempotent: a row count of zero is not an error.
	async fn reject_apply(&self, apply_id: i64) -> crate::Result<()>;

	/// Page through a user's pending applies, newest first, via the cache-aside ZSet.
	async fn get_pending_list(&self, target_uuid: &str, offset: isize, count: isize) -> crate::Result<Vec<String>>;
}

/// `sqlx`/Postgres + Redis implementation of [`ApplyRepository`].
pub struct PgApplyRepository {
	ctx: RepoContext,
}
impl PgApplyRepository {
	/// Build a repository over `store`/`cache`, escalating failed cache writes through `retry`
	/// with a replay budget of `max_retries`.
	pub fn new(store: Store, cache: Arc<dyn CacheClient>, retry: crate::retry::RetryBus, max_retries: u32) -> Self {
		Self { ctx: RepoContext::new(store, cache, retry, max_retries) }
	}

	async fn invalidate_pending(&self, target_uuid: &str) {
		let key = keys::user_apply_pending(target_uuid);

		if let Err(err) = self.ctx.cache.del(&key).await {
			self.ctx
				.escalate(RetryKind::Simple, "DEL", vec![key], "-", target_uuid, None, "apply_pending_invalidate", &err)
				.await;
		}
	}

	async fn inject_friend_edge(&self, owner: uuid::Uuid, peer: uuid::Uuid, remark: Option<&str>) {
		let key = keys::user_relation_friend(&owner.to_string());
		let payload = serde_json::json!({
			"user_uuid": owner,
			"peer_uuid": peer,
			"status": RelationStatus::Normal as i16,
			"remark": remark,
		})
		.to_string();
		let applied = self
			.ctx
			.cache
			.hset_if_exists(&key, &peer.to_string(), &payload, keys::jittered(keys::RELATION_TTL))
			.await;

		if matches!(applied, Ok(false) | Err(_)) {
			tracing::debug!(%owner, %peer, "friend-hash cache miss on accept; read path will rebuild");
		}
	}
}
#[async_trait]
impl ApplyRepository for PgApplyRepository {
	async fn create_apply(
		&self,
		applicant_uuid: &str,
		target_uuid: &str,
		reason: Option<&str>,
		source: Option<&str>,
	) -> crate::Result<i64> {
		let applicant: uuid::Uuid = applicant_uuid.parse().map_err(|_| invalid_uuid())?;
		let target: uuid::Uuid = target_uuid.parse().map_err(|_| invalid_uuid())?;

		let (id,): (i64,) = sqlx::query_as(
			"INSERT INTO apply_request (apply_type, applicant_uuid, target_uuid, status, is_read, reason, source, created_at) \
			 VALUES (0, $1, $2, 0, false, $3, $4, now()) RETURNING id",
		)
		.bind(applicant)
		.bind(target)
		.bind(reason)
		.bind(source)
		.fetch_one(self.ctx.store.pool())
		.await?;

		let key = keys::user_apply_pending(target_uuid);
		let score = Utc::now().timestamp() as f64;

		if let Err(err) = self.ctx.cache.zadd_ex(&key, applicant_uuid, score, keys::jittered(keys::APPLY_PENDING_TTL)).await {
			self.ctx
				.escalate(
					RetryKind::Simple,
					"ZADD",
					vec![key, applicant_uuid.to_owned()],
					"-",
					target_uuid,
					None,
					"apply_create",
					&err,
				)
				.await;
		}
		let _ = self.ctx.cache.zrem(&keys::user_apply_pending(target_uuid), keys::EMPTY_SET_MEMBER).await;

		Ok(id)
	}

	async fn get_apply(&self, apply_id: i64) -> crate::Result<Option<ApplyRequest>> {
		let row = sqlx::query_as::<_, ApplyRequest>(
			"SELECT id, apply_type, applicant_uuid, target_uuid, status, is_read, reason, source, handle_remark, created_at, deleted_at \
			 FROM apply_request WHERE id = $1 AND deleted_at IS NULL",
		)
		.bind(apply_id)
		.fetch_optional(self.ctx.store.pool())
		.await?;

		Ok(row)
	}

	async fn has_pending(&self, applicant_uuid: &str, target_uuid: &str) -> crate::Result<bool> {
		let applicant: uuid::Uuid = applicant_uuid.parse().map_err(|_| invalid_uuid())?;
		let target: uuid::Uuid = target_uuid.parse().map_err(|_| invalid_uuid())?;

		let row: Option<(i64,)> = sqlx::query_as(
			"SELECT id FROM apply_request \
			 WHERE applicant_uuid = $1 AND target_uuid = $2 AND status = 0 AND deleted_at IS NULL",
		)
		.bind(applicant)
		.bind(target)
		.fetch_optional(self.ctx.store.pool())
		.await?;

		Ok(row.is_some())
	}

	#[tracing::instrument(skip(self, remark), fields(apply_id, me = %me))]
	async fn accept_apply_and_create_relation(
		&self,
		apply_id: i64,
		me: &str,
		applicant: &str,
		remark: Option<&str>,
	) -> crate::Result<AcceptOutcome> {
		let me_uuid: uuid::Uuid = me.parse().map_err(|_| invalid_uuid())?;
		let applicant_uuid: uuid::Uuid = applicant.parse().map_err(|_| invalid_uuid())?;
		let mut tx = self.ctx.store.pool().begin().await?;

		let updated = sqlx::query(
			"UPDATE apply_request SET status = 1 WHERE id = $1 AND status = 0",
		)
		.bind(apply_id)
		.execute(&mut *tx)
		.await?;

		if updated.rows_affected() == 0 {
			tx.rollback().await?;

			return Ok(AcceptOutcome { already_processed: true });
		}

		sqlx::query(
			"INSERT INTO user_relation (user_uuid, peer_uuid, status, remark, created_at, updated_at, deleted_at) \
			 VALUES ($1, $2, 0, $3, now(), now(), NULL) \
			 ON CONFLICT (user_uuid, peer_uuid) DO UPDATE SET \
			 status = 0, remark = $3, deleted_at = NULL, updated_at = now()",
		)
		.bind(me_uuid)
		.bind(applicant_uuid)
		.bind(remark)
		.execute(&mut *tx)
		.await?;

		sqlx::query(
			"INSERT INTO user_relation (user_uuid, peer_uuid, status, remark, created_at, updated_at, deleted_at) \
			 VALUES ($1, $2, 0, NULL, now(), now(), NULL) \
			 ON CONFLICT (user_uuid, peer_uuid) DO UPDATE SET \
			 status = 0, deleted_at = NULL, updated_at = now()",
		)
		.bind(applicant_uuid)
		.bind(me_uuid)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		self.inject_friend_edge(me_uuid, applicant_uuid, remark).await;
		self.inject_friend_edge(applicant_uuid, me_uuid, None).await;
		self.invalidate_pending(me).await;

		Ok(AcceptOutcome { already_processed: false })
	}

	async fn reject_apply(&self, apply_id: i64) -> crate::Result<()> {
		sqlx::query("UPDATE apply_request SET status = 2 WHERE id = $1 AND status = 0")
			.bind(apply_id)
			.execute(self.ctx.store.pool())
			.await?;

		Ok(())
	}

	async fn get_pending_list(&self, target_uuid: &str, offset: isize, count: isize) -> crate::Result<Vec<String>> {
		let key = keys::user_apply_pending(target_uuid);
		let existing = self.ctx.cache.zcard(&key).await?;

		if existing == 0 {
			return self.rebuild_pending(target_uuid, offset, count).await;
		}

		let members = self.ctx.cache.zrevrange(&key, offset, count).await?;

		Ok(members.into_iter().map(|m| m.member).filter(|m| m != keys::EMPTY_SET_MEMBER).collect())
	}
}
impl PgApplyRepository {
	async fn rebuild_pending(&self, target_uuid: &str, offset: isize, count: isize) -> crate::Result<Vec<String>> {
		let target: uuid::Uuid = target_uuid.parse().map_err(|_| invalid_uuid())?;
		let rows: Vec<(uuid::Uuid, DateTime<Utc>)> = sqlx::query_as(
			"SELECT applicant_uuid, created_at FROM apply_request \
			 WHERE target_uuid = $1 AND status = 0 AND deleted_at IS NULL",
		)
		.bind(target)
		.fetch_all(self.ctx.store.pool())
		.await?;

		let key = keys::user_apply_pending(target_uuid);
		let ttl = keys::jittered(keys::APPLY_PENDING_TTL);

		if rows.is_empty() {
			let _ = self.ctx.cache.zadd_ex(&key, keys::EMPTY_SET_MEMBER, 0.0, ttl).await;

			return Ok(Vec::new());
		}

		for (applicant, created_at) in &rows {
			let _ = self.ctx.cache.zadd_ex(&key, &applicant.to_string(), created_at.timestamp() as f64, ttl).await;
		}

		let members = self.ctx.cache.zrevrange(&key, offset, count).await?;

		Ok(members.into_iter().map(|m| m.member).filter(|m| m != keys::EMPTY_SET_MEMBER).collect())
	}
}

fn invalid_uuid() -> Error {
	Error::InvalidArgument { field: "uuid", reason: "not a uuid".into() }
}
