//! `SyncFriendList` (service view) and the friend/blacklist passthroughs (§4.7).

// self
use crate::{_prelude::*, repository::RelationRepository, store::models::UserRelation};

/// Classification of a changed relation returned by [`FriendService::sync_friend_list`] (§4.7
/// "SyncFriendList (service view)").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
	/// The relation was created after the requested cursor.
	Add,
	/// The relation existed before the cursor but changed.
	Update,
	/// The relation was soft-deleted after the requested cursor.
	Delete,
}

/// One entry of a [`FriendSyncPage`].
#[derive(Clone, Debug)]
pub struct FriendChange {
	/// The relation as currently stored.
	pub relation: UserRelation,
	/// How it changed relative to the requested cursor.
	pub kind: ChangeKind,
}

/// Service-level view over [`crate::repository::relation::SyncPage`], with each relation
/// classified by change type.
#[derive(Clone, Debug)]
pub struct FriendSyncPage {
	/// Classified changes, ascending by `updated_at`.
	pub changes: Vec<FriendChange>,
	/// Whether a further page remains.
	pub has_more: bool,
	/// Cursor to pass as `since_version_ms` on the next call.
	pub next_version: DateTime<Utc>,
}

/// Social-graph orchestrator.
pub struct FriendService {
	relation_repo: Arc<dyn RelationRepository>,
}
impl FriendService {
	/// Build a service over the given repository.
	pub fn new(relation_repo: Arc<dyn RelationRepository>) -> Self {
		Self { relation_repo }
	}

	/// Fetch a user's `Normal` friend relations.
	pub async fn list_friends(&self, user_uuid: &str) -> crate::Result<Vec<UserRelation>> {
		self.relation_repo.list_friends(user_uuid).await
	}

	/// Add `target` to `user`'s blacklist.
	pub async fn add_blacklist(&self, user_uuid: &str, target_uuid: &str) -> crate::Result<()> {
		self.relation_repo.add_blacklist(user_uuid, target_uuid).await
	}

	/// Remove `target` from `user`'s blacklist, restoring its remembered prior state.
	pub async fn remove_blacklist(&self, user_uuid: &str, target_uuid: &str) -> crate::Result<()> {
		self.relation_repo.remove_blacklist(user_uuid, target_uuid).await
	}

	/// Incremental sync with each relation classified as `add`/`update`/`delete` relative to
	/// `since_version_ms` (§4.7 "SyncFriendList (service view)").
	#[tracing::instrument(skip(self), fields(user_uuid = %user_uuid, since_version_ms, limit))]
	pub async fn sync_friend_list(&self, user_uuid: &str, since_version_ms: i64, limit: i64) -> crate::Result<FriendSyncPage> {
		let page = self.relation_repo.sync_friend_list(user_uuid, since_version_ms, limit).await?;
		let since = DateTime::<Utc>::from_timestamp_millis(since_version_ms).unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap());

		let changes = page
			.relations
			.into_iter()
			.map(|relation| {
				let kind = if relation.deleted_at.is_some() {
					ChangeKind::Delete
				} else if relation.created_at > since {
					ChangeKind::Add
				} else {
					ChangeKind::Update
				};

				FriendChange { relation, kind }
			})
			.collect();

		Ok(FriendSyncPage { changes, has_more: page.has_more, next_version: page.next_version })
	}
}
