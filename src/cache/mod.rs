//! Cache-aside plumbing: the [`CacheClient`] abstraction, the empty-placeholder convention, and a
//! Redis-backed implementation.
//!
//! The trait shape is a handful of narrow async methods behind `Arc<dyn CacheClient>`, with a
//! single-flight guard used by callers above it, generalized from "one cached resource, one
//! entry" to the handful of collection shapes (string, hash, sorted set, set) the social graph
//! needs.

pub mod redis_client;

// crates.io
use async_trait::async_trait;
// self
use crate::_prelude::*;

pub use redis_client::RedisCacheClient;

/// A single `(member, score)` pair returned from a sorted-set range query.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredMember {
	/// Sorted-set member.
	pub member: String,
	/// Member's score.
	pub score: f64,
}

/// Cache-aside storage contract (§4.4 "Cache contract").
///
/// Implementors need not be Redis specifically; the contract only requires string get/set with
/// TTL, hash operations, sorted-set operations, set membership, and server-side script
/// evaluation for the Lua-guarded incremental update.
#[async_trait]
pub trait CacheClient: Send + Sync {
	/// Fetch a string value, or `None` if the key does not exist.
	async fn get(&self, key: &str) -> crate::Result<Option<String>>;

	/// Set a string value with a TTL.
	async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> crate::Result<()>;

	/// Delete a key outright, regardless of type.
	async fn del(&self, key: &str) -> crate::Result<()>;

	/// Extend a key's TTL without touching its value. No-op if the key does not exist.
	async fn expire(&self, key: &str, ttl: Duration) -> crate::Result<()>;

	/// Fetch one field of a hash.
	async fn hget(&self, key: &str, field: &str) -> crate::Result<Option<String>>;

	/// Fetch an entire hash.
	async fn hgetall(&self, key: &str) -> crate::Result<Vec<(String, String)>>;

	/// Set one field of a hash and reset the hash's TTL.
	async fn hset_ex(&self, key: &str, field: &str, value: &str, ttl: Duration)
		-> crate::Result<()>;

	/// Set one field of a hash only if the hash already exists, resetting its TTL on success.
	///
	/// Returns `true` if the field was written, `false` if the key did not exist (the
	/// Lua-guarded incremental update from §4.4: "if EXISTS key then apply mutation and reset TTL
	/// else return 0").
	async fn hset_if_exists(&self, key: &str, field: &str, value: &str, ttl: Duration)
		-> crate::Result<bool>;

	/// Delete one field of a hash.
	async fn hdel(&self, key: &str, field: &str) -> crate::Result<()>;

	/// Add a member to a sorted set with the given score, resetting the set's TTL.
	async fn zadd_ex(&self, key: &str, member: &str, score: f64, ttl: Duration)
		-> crate::Result<()>;

	/// Remove a member from a sorted set.
	async fn zrem(&self, key: &str, member: &str) -> crate::Result<()>;

	/// Page through a sorted set's members in ascending score order.
	async fn zrange(&self, key: &str, offset: isize, count: isize)
		-> crate::Result<Vec<ScoredMember>>;

	/// Page through a sorted set's members in descending score order (§4.4 "Pending-apply ZSet":
	/// "Reverse-range for listing newest-first").
	async fn zrevrange(&self, key: &str, offset: isize, count: isize)
		-> crate::Result<Vec<ScoredMember>>;

	/// Number of members in a sorted set. Zero if the key does not exist.
	async fn zcard(&self, key: &str) -> crate::Result<u64>;

	/// Whether a member is present in a sorted set.
	async fn zscore(&self, key: &str, member: &str) -> crate::Result<Option<f64>>;

	/// Atomically increment a counter, creating it with the given TTL if absent.
	async fn incr_ex(&self, key: &str, ttl: Duration) -> crate::Result<i64>;
}

/// Whether `value` is the empty-placeholder sentinel for a scalar key.
pub fn is_empty_scalar(value: &str) -> bool {
	value == crate::keys::EMPTY_SCALAR_VALUE
}

/// Whether a hash/set/zset's only member is the empty-placeholder sentinel.
pub fn is_empty_collection(members: &[(String, String)]) -> bool {
	matches!(members, [(member, _)] if member == crate::keys::EMPTY_SET_MEMBER)
}
