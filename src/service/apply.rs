//! `SendFriendApply` and `HandleFriendApply` (§4.7).

// self
use crate::{
	_prelude::*,
	repository::{ApplyRepository, RelationRepository, UserRepository},
	store::models::RelationStatus,
};

/// Caller's disposition of a pending apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyAction {
	/// Accept, creating a mutual friend edge.
	Accept,
	/// Reject, leaving the social graph unchanged.
	Reject,
}

/// Friend-apply orchestrator.
pub struct ApplyService {
	apply_repo: Arc<dyn ApplyRepository>,
	relation_repo: Arc<dyn RelationRepository>,
	user_repo: Arc<dyn UserRepository>,
}
impl ApplyService {
	/// Build a service over the given repositories.
	pub fn new(
		apply_repo: Arc<dyn ApplyRepository>,
		relation_repo: Arc<dyn RelationRepository>,
		user_repo: Arc<dyn UserRepository>,
	) -> Self {
		Self { apply_repo, relation_repo, user_repo }
	}

	/// Create a friend-apply request, enforcing the six preconditions in order (§4.7
	/// "SendFriendApply").
	#[tracing::instrument(skip(self, reason, source), fields(applicant_uuid = %applicant_uuid, target_uuid = %target_uuid))]
	pub async fn send_friend_apply(
		&self,
		applicant_uuid: &str,
		target_uuid: &str,
		reason: Option<&str>,
		source: Option<&str>,
	) -> crate::Result<i64> {
		if applicant_uuid == target_uuid {
			return Err(Error::SelfTarget);
		}

		if self.user_repo.get_by_uuid(target_uuid).await?.is_none() {
			return Err(Error::RecordNotFound);
		}

		if let Some(relation) = self.relation_repo.get_relation(applicant_uuid, target_uuid).await? {
			if RelationStatus::try_from(relation.status)? == RelationStatus::Normal {
				return Err(Error::AlreadyFriend);
			}
		}

		if self.apply_repo.has_pending(applicant_uuid, target_uuid).await? {
			return Err(Error::PendingApplyExists);
		}

		if is_blacklisted(self.relation_repo.as_ref(), target_uuid, applicant_uuid).await? {
			return Err(Error::PeerBlockedYou);
		}

		if is_blacklisted(self.relation_repo.as_ref(), applicant_uuid, target_uuid).await? {
			return Err(Error::YouBlockedPeer);
		}

		self.apply_repo.create_apply(applicant_uuid, target_uuid, reason, source).await
	}

	/// Accept or reject a pending apply. A not-found apply is treated as idempotent success
	/// (§4.7, §7 "Idempotent outcomes") — it is already in a terminal state from the caller's
	/// point of view.
	#[tracing::instrument(skip(self, remark), fields(apply_id, caller_uuid = %caller_uuid))]
	pub async fn handle_friend_apply(&self, apply_id: i64, caller_uuid: &str, action: ApplyAction, remark: Option<&str>) -> crate::Result<()> {
		let Some(apply) = self.apply_repo.get_apply(apply_id).await? else {
			return Ok(());
		};

		if apply.target_uuid.to_string() != caller_uuid {
			return Err(Error::NoPermission);
		}

		match action {
			ApplyAction::Accept => {
				self.apply_repo
					.accept_apply_and_create_relation(apply_id, caller_uuid, &apply.applicant_uuid.to_string(), remark)
					.await?;
			},
			ApplyAction::Reject => {
				self.apply_repo.reject_apply(apply_id).await?;
			},
		}

		Ok(())
	}

	/// Page through a user's pending applies.
	pub async fn pending_applies(&self, target_uuid: &str, offset: isize, count: isize) -> crate::Result<Vec<String>> {
		self.apply_repo.get_pending_list(target_uuid, offset, count).await
	}
}

async fn is_blacklisted(relation_repo: &dyn RelationRepository, owner_uuid: &str, peer_uuid: &str) -> crate::Result<bool> {
	match relation_repo.get_relation(owner_uuid, peer_uuid).await? {
		Some(relation) => Ok(matches!(
			RelationStatus::try_from(relation.status)?,
			RelationStatus::BlacklistWasFriend | RelationStatus::BlacklistWasStranger
		)),
		None => Ok(false),
	}
}
