//! `KickDevice` and `GetOnlineStatus` (§4.7).

// std
use std::collections::HashMap;
// self
use crate::{_prelude::*, registry::ConnectionRegistry, repository::DeviceRepository, store::models::DeviceStatus};

/// Device-session orchestrator.
pub struct DeviceService {
	device_repo: Arc<dyn DeviceRepository>,
	registry: ConnectionRegistry,
	online_window: Duration,
}
impl DeviceService {
	/// Build a service over the given repository, registry, and online-window threshold.
	pub fn new(device_repo: Arc<dyn DeviceRepository>, registry: ConnectionRegistry, online_window: Duration) -> Self {
		Self { device_repo, registry, online_window }
	}

	/// Force a device offline: delete its tokens, apply the status-dominance rule, and close its
	/// live connection if one exists (§4.7 "KickDevice").
	#[tracing::instrument(skip(self), fields(caller_uuid = %caller_uuid, caller_device_id = %caller_device_id, target_device_id = %target_device_id))]
	pub async fn kick_device(&self, caller_uuid: &str, caller_device_id: &str, target_device_id: &str) -> crate::Result<()> {
		if caller_device_id == target_device_id {
			return Err(Error::CannotKickCurrent);
		}

		let Some(session) = self.device_repo.get_session(caller_uuid, target_device_id).await? else {
			return Err(Error::RecordNotFound);
		};

		self.device_repo.delete_tokens(caller_uuid, target_device_id).await?;

		// Only `online` yields to `kicked`; `logged_out` and `offline` are left as-is (§4.7
		// "KickDevice" — logged_out dominates, offline is already a no-op at the status level).
		if DeviceStatus::try_from(session.status)? == DeviceStatus::Online {
			self.device_repo.set_status(caller_uuid, target_device_id, DeviceStatus::Kicked as i16).await?;
		}

		self.registry.disconnect_device(caller_uuid, target_device_id).await;

		Ok(())
	}

	/// Batched online-status lookup: dedupe the request, join sessions against the active-time
	/// hash, patch missing timestamps to `now`, and re-expand into request order (§4.7
	/// "GetOnlineStatus").
	pub async fn get_online_status(&self, user_uuids: &[String]) -> crate::Result<Vec<bool>> {
		let mut first_seen: HashMap<&str, usize> = HashMap::new();
		let mut unique: Vec<&str> = Vec::new();

		for uuid in user_uuids {
			if !first_seen.contains_key(uuid.as_str()) {
				first_seen.insert(uuid.as_str(), unique.len());
				unique.push(uuid.as_str());
			}
		}

		let mut unique_online = Vec::with_capacity(unique.len());

		for uuid in &unique {
			unique_online.push(self.is_online(uuid).await?);
		}

		Ok(user_uuids.iter().map(|uuid| unique_online[first_seen[uuid.as_str()]]).collect())
	}

	async fn is_online(&self, user_uuid: &str) -> crate::Result<bool> {
		let sessions = self.device_repo.list_sessions(user_uuid).await?;
		let now = Utc::now().timestamp();

		for session in sessions {
			if DeviceStatus::try_from(session.status)? != DeviceStatus::Online {
				continue;
			}

			let active_at = match self.device_repo.get_active(user_uuid, &session.device_id).await? {
				Some(active_at) => active_at,
				None => {
					self.device_repo.touch_active(user_uuid, &session.device_id).await?;

					now
				},
			};

			if now - active_at <= self.online_window.as_secs() as i64 {
				return Ok(true);
			}
		}

		Ok(false)
	}
}
