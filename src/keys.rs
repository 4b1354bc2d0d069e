//! Canonical cache key formats and TTLs (§4.1).
//!
//! No other module concatenates a cache key by hand; every key string a caller needs comes out
//! of a function here, and every TTL that backs a collection is jittered by [`jittered`] before
//! it reaches the cache client.

// std
use std::cell::RefCell;
// crates.io
use rand::{rngs::SmallRng, Rng, SeedableRng};
// self
use crate::_prelude::*;

thread_local! {
	static SMALL_RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_rng(&mut rand::rng()));
}

/// TTL for `auth:at:*` — the MD5-hashed access token, valid as long as the token itself.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 2);
/// TTL for `auth:rt:*` — the raw refresh token.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 30);
/// TTL for `user:devices:*`, the device-session hash.
pub const DEVICE_SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 60);
/// TTL for `user:devices:active:*`, the last-active-per-device hash.
pub const DEVICE_ACTIVE_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 45);
/// TTL for a populated `user:info:*` entry, before jitter.
pub const USER_INFO_TTL: Duration = Duration::from_secs(60 * 60);
/// TTL for a `user:info:*` empty placeholder.
pub const USER_INFO_PLACEHOLDER_TTL: Duration = Duration::from_secs(60 * 5);
/// TTL for `user:relation:friend:*` and `user:relation:blacklist:*`, before jitter.
pub const RELATION_TTL: Duration = Duration::from_secs(60 * 60 * 24);
/// TTL for `user:apply:pending:*`, before jitter.
pub const APPLY_PENDING_TTL: Duration = Duration::from_secs(60 * 60 * 24);
/// TTL for the unread friend-apply notification counter.
pub const APPLY_UNREAD_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);
/// TTL for the paired QR-code token bindings.
pub const QRCODE_TTL: Duration = Duration::from_secs(60 * 60 * 48);
/// Window during which a device is considered online absent a fresher heartbeat (Open Question,
/// decided in favor of a configurable default — see [`crate::config::AppConfig::online_window`]).
pub const DEFAULT_ONLINE_WINDOW: Duration = Duration::from_secs(90);

/// Fraction of a TTL that may be added or subtracted as jitter.
const JITTER_FRACTION: f64 = 0.10;
/// Probability, per cache hit, of opportunistically renewing a key's TTL.
pub const TTL_RENEWAL_PROBABILITY: f64 = 0.01;

/// Member written into set/hash/zset-backed keys to represent "queried and confirmed empty",
/// defending against cache penetration for collection-shaped entries.
pub const EMPTY_SET_MEMBER: &str = "__EMPTY__";
/// Value written into string-backed keys to represent "queried and confirmed absent".
pub const EMPTY_SCALAR_VALUE: &str = "{}";

/// Hashed access-token key for a device session.
pub fn auth_access_token(user_uuid: &str, device_id: &str) -> String {
	format!("auth:at:{user_uuid}:{device_id}")
}

/// Raw refresh-token key for a device session.
pub fn auth_refresh_token(user_uuid: &str, device_id: &str) -> String {
	format!("auth:rt:{user_uuid}:{device_id}")
}

/// Hash of `device_id -> DeviceSession` for a user.
pub fn user_devices(user_uuid: &str) -> String {
	format!("user:devices:{user_uuid}")
}

/// Hash of `device_id -> last_active_unix_seconds` for a user.
pub fn user_devices_active(user_uuid: &str) -> String {
	format!("user:devices:active:{user_uuid}")
}

/// Cached `UserInfo` (or empty placeholder) for a user.
pub fn user_info(user_uuid: &str) -> String {
	format!("user:info:{user_uuid}")
}

/// Hash of `peer_uuid -> friend relation metadata` for a user.
pub fn user_relation_friend(user_uuid: &str) -> String {
	format!("user:relation:friend:{user_uuid}")
}

/// Sorted set of blacklisted peers, scored by blacklisted-at timestamp.
pub fn user_relation_blacklist(user_uuid: &str) -> String {
	format!("user:relation:blacklist:{user_uuid}")
}

/// Sorted set of pending applicant uuids for a target user, scored by apply created-at.
pub fn user_apply_pending(target_uuid: &str) -> String {
	format!("user:apply:pending:{target_uuid}")
}

/// Unread friend-apply notification counter for a user.
pub fn user_notify_friend_apply_unread(user_uuid: &str) -> String {
	format!("user:notify:friend_apply:unread:{user_uuid}")
}

/// QR-code token to user-uuid binding.
pub fn user_qrcode_token(token: &str) -> String {
	format!("user:qrcode:token:{token}")
}

/// User-uuid to QR-code token binding, the reverse of [`user_qrcode_token`].
pub fn user_qrcode_user(user_uuid: &str) -> String {
	format!("user:qrcode:user:{user_uuid}")
}

/// Verification-code key for a given email and code type.
pub fn user_verify_code(email: &str, code_type: &str) -> String {
	format!("user:verify_code:{email}:{code_type}")
}

/// Rate-limiter bucket key for a verification-code send, scoped to a window granularity
/// (`"minute"`, `"hour"`, or `"day"`).
pub fn verify_code_limiter(email: &str, window: &str) -> String {
	format!("user:verify_code:limiter:{email}:{window}")
}

/// Apply `±10%` jitter to `base`, used for every TTL that backs a collection so that keys
/// populated around the same time do not all expire in the same instant.
pub fn jittered(base: Duration) -> Duration {
	let span = Duration::from_secs_f64(base.as_secs_f64() * JITTER_FRACTION);

	random_within(base.saturating_sub(span), base.saturating_add(span))
}

/// Roll the dice for opportunistic TTL renewal on a cache hit.
pub fn should_renew_ttl() -> bool {
	SMALL_RNG.with(|cell| cell.borrow_mut().random_bool(TTL_RENEWAL_PROBABILITY))
}

fn random_within(min: Duration, max: Duration) -> Duration {
	if max <= min {
		return max;
	}
	SMALL_RNG.with(|cell| {
		let mut rng = cell.borrow_mut();
		let nanos = max.as_nanos() - min.as_nanos();
		let jitter = rng.random_range(0..=nanos.min(u64::MAX as u128));

		min + Duration::from_nanos(jitter as u64)
	})
}
