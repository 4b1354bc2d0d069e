//! Shared in-memory fakes for the cross-module integration scenarios.
//!
//! Integration tests link against the compiled library (no `cfg(test)`), so the `cfg(test)`
//! fakes living inside `src/` are not visible here; these are separate, narrower doubles built
//! straight against the public repository/cache traits.

#![allow(dead_code)]

// std
use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicI64, Ordering},
		Mutex,
	},
};
// crates.io
use async_trait::async_trait;
use chrono::Utc;
use imcore::{
	cache::{CacheClient, ScoredMember},
	repository::{apply::AcceptOutcome, ApplyRepository, DeviceRepository, RelationRepository, UserRepository},
	store::models::{ApplyRequest, DeviceSession, RelationStatus, UserInfo, UserRelation, UserStatus},
};
use uuid::Uuid;

pub fn uuid_str(n: u128) -> String {
	Uuid::from_u128(n).to_string()
}

pub fn sample_user(uuid: &str) -> UserInfo {
	let now = Utc::now();

	UserInfo {
		uuid: uuid.parse().unwrap(),
		email: None,
		telephone: None,
		nickname: "someone".into(),
		avatar: None,
		password_hash: "hash".into(),
		status: UserStatus::Active,
		gender: 0,
		signature: None,
		birthday: None,
		is_admin: false,
		created_at: now,
		updated_at: now,
		deleted_at: None,
	}
}

pub fn session(user_uuid: &str, device_id: &str, status: i16) -> DeviceSession {
	let now = Utc::now();

	DeviceSession {
		user_uuid: user_uuid.parse().unwrap(),
		device_id: device_id.to_owned(),
		device_name: None,
		platform: None,
		app_version: None,
		ip: None,
		user_agent: None,
		status,
		expire_at: None,
		created_at: now,
		updated_at: now,
	}
}

/// Minimal in-process [`CacheClient`]: TTLs are accepted but never enforced.
#[derive(Default)]
pub struct MemoryCache {
	strings: Mutex<HashMap<String, String>>,
}
#[async_trait]
impl CacheClient for MemoryCache {
	async fn get(&self, key: &str) -> imcore::Result<Option<String>> {
		Ok(self.strings.lock().unwrap().get(key).cloned())
	}

	async fn set_ex(&self, key: &str, value: &str, _ttl: std::time::Duration) -> imcore::Result<()> {
		self.strings.lock().unwrap().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	async fn del(&self, key: &str) -> imcore::Result<()> {
		self.strings.lock().unwrap().remove(key);

		Ok(())
	}

	async fn expire(&self, _key: &str, _ttl: std::time::Duration) -> imcore::Result<()> {
		Ok(())
	}

	async fn hget(&self, _key: &str, _field: &str) -> imcore::Result<Option<String>> {
		Ok(None)
	}

	async fn hgetall(&self, _key: &str) -> imcore::Result<Vec<(String, String)>> {
		Ok(Vec::new())
	}

	async fn hset_ex(&self, _key: &str, _field: &str, _value: &str, _ttl: std::time::Duration) -> imcore::Result<()> {
		Ok(())
	}

	async fn hset_if_exists(
		&self,
		_key: &str,
		_field: &str,
		_value: &str,
		_ttl: std::time::Duration,
	) -> imcore::Result<bool> {
		Ok(false)
	}

	async fn hdel(&self, _key: &str, _field: &str) -> imcore::Result<()> {
		Ok(())
	}

	async fn zadd_ex(&self, _key: &str, _member: &str, _score: f64, _ttl: std::time::Duration) -> imcore::Result<()> {
		Ok(())
	}

	async fn zrem(&self, _key: &str, _member: &str) -> imcore::Result<()> {
		Ok(())
	}

	async fn zrange(&self, _key: &str, _offset: isize, _count: isize) -> imcore::Result<Vec<ScoredMember>> {
		Ok(Vec::new())
	}

	async fn zrevrange(&self, _key: &str, _offset: isize, _count: isize) -> imcore::Result<Vec<ScoredMember>> {
		Ok(Vec::new())
	}

	async fn zcard(&self, _key: &str) -> imcore::Result<u64> {
		Ok(0)
	}

	async fn zscore(&self, _key: &str, _member: &str) -> imcore::Result<Option<f64>> {
		Ok(None)
	}

	async fn incr_ex(&self, _key: &str, _ttl: std::time::Duration) -> imcore::Result<i64> {
		Ok(1)
	}
}

#[derive(Default)]
pub struct MemoryDeviceRepo {
	pub sessions: Mutex<HashMap<(String, String), DeviceSession>>,
	pub active: Mutex<HashMap<(String, String), i64>>,
	pub tokens_deleted: Mutex<Vec<(String, String)>>,
}
impl MemoryDeviceRepo {
	pub fn with_session(self, s: DeviceSession) -> Self {
		self.sessions.lock().unwrap().insert((s.user_uuid.to_string(), s.device_id.clone()), s);

		self
	}
}
#[async_trait]
impl DeviceRepository for MemoryDeviceRepo {
	async fn get_session(&self, user_uuid: &str, device_id: &str) -> imcore::Result<Option<DeviceSession>> {
		Ok(self.sessions.lock().unwrap().get(&(user_uuid.to_owned(), device_id.to_owned())).cloned())
	}

	async fn list_sessions(&self, user_uuid: &str) -> imcore::Result<Vec<DeviceSession>> {
		Ok(self.sessions.lock().unwrap().values().filter(|s| s.user_uuid.to_string() == user_uuid).cloned().collect())
	}

	async fn upsert_session(&self, session: &DeviceSession) -> imcore::Result<()> {
		self.sessions
			.lock()
			.unwrap()
			.insert((session.user_uuid.to_string(), session.device_id.clone()), session.clone());

		Ok(())
	}

	async fn store_access_token(&self, _: &str, _: &str, _: &str) -> imcore::Result<()> {
		Ok(())
	}

	async fn verify_access_token(&self, _: &str, _: &str, _: &str) -> imcore::Result<Option<bool>> {
		Ok(None)
	}

	async fn store_refresh_token(&self, _: &str, _: &str, _: &str) -> imcore::Result<()> {
		Ok(())
	}

	async fn delete_tokens(&self, user_uuid: &str, device_id: &str) -> imcore::Result<()> {
		self.tokens_deleted.lock().unwrap().push((user_uuid.to_owned(), device_id.to_owned()));

		Ok(())
	}

	async fn touch_active(&self, user_uuid: &str, device_id: &str) -> imcore::Result<()> {
		self.active.lock().unwrap().insert((user_uuid.to_owned(), device_id.to_owned()), Utc::now().timestamp());

		Ok(())
	}

	async fn get_active(&self, user_uuid: &str, device_id: &str) -> imcore::Result<Option<i64>> {
		Ok(self.active.lock().unwrap().get(&(user_uuid.to_owned(), device_id.to_owned())).copied())
	}

	async fn set_status(&self, user_uuid: &str, device_id: &str, status: i16) -> imcore::Result<()> {
		if let Some(s) = self.sessions.lock().unwrap().get_mut(&(user_uuid.to_owned(), device_id.to_owned())) {
			s.status = status;
		}

		Ok(())
	}
}

#[derive(Default)]
pub struct MemoryUserRepo {
	pub users: Mutex<HashMap<String, UserInfo>>,
}
impl MemoryUserRepo {
	pub fn with_user(self, user: UserInfo) -> Self {
		self.users.lock().unwrap().insert(user.uuid.to_string(), user);

		self
	}
}
#[async_trait]
impl UserRepository for MemoryUserRepo {
	async fn get_by_uuid(&self, uuid: &str) -> imcore::Result<Option<UserInfo>> {
		Ok(self.users.lock().unwrap().get(uuid).cloned())
	}

	async fn batch_get_by_uuids(&self, uuids: &[String]) -> imcore::Result<Vec<Option<UserInfo>>> {
		let users = self.users.lock().unwrap();

		Ok(uuids.iter().map(|u| users.get(u).cloned()).collect())
	}

	async fn update_profile(&self, _: &str, _: Option<&str>, _: Option<&str>, _: Option<&str>) -> imcore::Result<()> {
		Ok(())
	}

	async fn set_status(&self, uuid: &str, status: UserStatus) -> imcore::Result<()> {
		if let Some(user) = self.users.lock().unwrap().get_mut(uuid) {
			user.status = status;
		}

		Ok(())
	}
}

#[derive(Default)]
pub struct MemoryRelationRepo {
	pub relations: Mutex<HashMap<(String, String), i16>>,
	pub sync_page: Mutex<Option<imcore::repository::relation::SyncPage>>,
}
impl MemoryRelationRepo {
	pub fn with_relation(self, user_uuid: &str, peer_uuid: &str, status: RelationStatus) -> Self {
		self.relations.lock().unwrap().insert((user_uuid.to_owned(), peer_uuid.to_owned()), status as i16);

		self
	}
}
#[async_trait]
impl RelationRepository for MemoryRelationRepo {
	async fn get_relation(&self, user_uuid: &str, peer_uuid: &str) -> imcore::Result<Option<UserRelation>> {
		let now = Utc::now();

		Ok(self.relations.lock().unwrap().get(&(user_uuid.to_owned(), peer_uuid.to_owned())).map(|status| UserRelation {
			user_uuid: user_uuid.parse().unwrap(),
			peer_uuid: peer_uuid.parse().unwrap(),
			status: *status,
			remark: None,
			group_tag: None,
			source: None,
			created_at: now,
			updated_at: now,
			deleted_at: None,
		}))
	}

	async fn list_friends(&self, _: &str) -> imcore::Result<Vec<UserRelation>> {
		Ok(Vec::new())
	}

	async fn add_blacklist(&self, user_uuid: &str, target_uuid: &str) -> imcore::Result<()> {
		self.relations
			.lock()
			.unwrap()
			.insert((user_uuid.to_owned(), target_uuid.to_owned()), RelationStatus::BlacklistWasStranger as i16);

		Ok(())
	}

	async fn remove_blacklist(&self, user_uuid: &str, target_uuid: &str) -> imcore::Result<()> {
		self.relations.lock().unwrap().remove(&(user_uuid.to_owned(), target_uuid.to_owned()));

		Ok(())
	}

	async fn sync_friend_list(&self, _: &str, _: i64, _: i64) -> imcore::Result<imcore::repository::relation::SyncPage> {
		Ok(self.sync_page.lock().unwrap().clone().unwrap_or(imcore::repository::relation::SyncPage {
			relations: Vec::new(),
			has_more: false,
			next_version: Utc::now(),
		}))
	}
}

#[derive(Default)]
pub struct MemoryApplyRepo {
	pub applies: Mutex<HashMap<i64, ApplyRequest>>,
	pub pending: Mutex<bool>,
	next_id: AtomicI64,
}
#[async_trait]
impl ApplyRepository for MemoryApplyRepo {
	async fn create_apply(
		&self,
		applicant_uuid: &str,
		target_uuid: &str,
		reason: Option<&str>,
		source: Option<&str>,
	) -> imcore::Result<i64> {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
		let now = Utc::now();

		self.applies.lock().unwrap().insert(
			id,
			ApplyRequest {
				id,
				apply_type: 0,
				applicant_uuid: applicant_uuid.parse().unwrap(),
				target_uuid: target_uuid.parse().unwrap(),
				status: 0,
				is_read: false,
				reason: reason.map(str::to_owned),
				source: source.map(str::to_owned),
				handle_remark: None,
				created_at: now,
				deleted_at: None,
			},
		);

		Ok(id)
	}

	async fn get_apply(&self, apply_id: i64) -> imcore::Result<Option<ApplyRequest>> {
		Ok(self.applies.lock().unwrap().get(&apply_id).cloned())
	}

	async fn has_pending(&self, _: &str, _: &str) -> imcore::Result<bool> {
		Ok(*self.pending.lock().unwrap())
	}

	async fn accept_apply_and_create_relation(
		&self,
		apply_id: i64,
		_me: &str,
		_applicant: &str,
		remark: Option<&str>,
	) -> imcore::Result<AcceptOutcome> {
		let mut applies = self.applies.lock().unwrap();
		let Some(apply) = applies.get_mut(&apply_id) else { return Ok(AcceptOutcome { already_processed: true }) };

		if apply.status != 0 {
			return Ok(AcceptOutcome { already_processed: true });
		}

		apply.status = 1;
		apply.handle_remark = remark.map(str::to_owned);

		Ok(AcceptOutcome { already_processed: false })
	}

	async fn reject_apply(&self, apply_id: i64) -> imcore::Result<()> {
		if let Some(apply) = self.applies.lock().unwrap().get_mut(&apply_id) {
			if apply.status == 0 {
				apply.status = 2;
			}
		}

		Ok(())
	}

	async fn get_pending_list(&self, _: &str, _: isize, _: isize) -> imcore::Result<Vec<String>> {
		Ok(Vec::new())
	}
}
