//! Redis-backed [`CacheClient`](super::CacheClient).

// crates.io
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Script};
// self
use super::{CacheClient, ScoredMember};
use crate::_prelude::*;

/// Lua script backing [`RedisCacheClient::hset_if_exists`] — the Lua-guarded incremental update
/// from §4.4. Returns `1` and resets the hash's TTL if the key already existed, `0` otherwise.
const HSET_IF_EXISTS_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
	redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
	redis.call('EXPIRE', KEYS[1], ARGV[3])
	return 1
else
	return 0
end
";

/// Thin wrapper around a [`ConnectionManager`], implementing [`CacheClient`] for Redis.
///
/// `ConnectionManager` reconnects transparently, so this type is cheap to clone and safe to hold
/// for the lifetime of the process; callers do not need their own pooling layer.
#[derive(Clone)]
pub struct RedisCacheClient {
	conn: ConnectionManager,
}
impl RedisCacheClient {
	/// Connect to Redis at `url` and wrap the resulting connection manager.
	pub async fn connect(url: &str) -> crate::Result<Self> {
		let client = redis::Client::open(url)?;
		let conn = client.get_connection_manager().await?;

		Ok(Self { conn })
	}
}
#[async_trait]
impl CacheClient for RedisCacheClient {
	async fn get(&self, key: &str) -> crate::Result<Option<String>> {
		Ok(self.conn.clone().get(key).await?)
	}

	async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> crate::Result<()> {
		let _: () = self.conn.clone().set_ex(key, value, ttl.as_secs().max(1)).await?;

		Ok(())
	}

	async fn del(&self, key: &str) -> crate::Result<()> {
		let _: () = self.conn.clone().del(key).await?;

		Ok(())
	}

	async fn expire(&self, key: &str, ttl: Duration) -> crate::Result<()> {
		let _: () = self.conn.clone().expire(key, ttl.as_secs().max(1) as i64).await?;

		Ok(())
	}

	async fn hget(&self, key: &str, field: &str) -> crate::Result<Option<String>> {
		Ok(self.conn.clone().hget(key, field).await?)
	}

	async fn hgetall(&self, key: &str) -> crate::Result<Vec<(String, String)>> {
		let map: std::collections::HashMap<String, String> = self.conn.clone().hgetall(key).await?;

		Ok(map.into_iter().collect())
	}

	async fn hset_ex(
		&self,
		key: &str,
		field: &str,
		value: &str,
		ttl: Duration,
	) -> crate::Result<()> {
		let mut conn = self.conn.clone();
		let _: () = conn.hset(key, field, value).await?;
		let _: () = conn.expire(key, ttl.as_secs().max(1) as i64).await?;

		Ok(())
	}

	async fn hset_if_exists(
		&self,
		key: &str,
		field: &str,
		value: &str,
		ttl: Duration,
	) -> crate::Result<bool> {
		let result: i64 = Script::new(HSET_IF_EXISTS_SCRIPT)
			.key(key)
			.arg(field)
			.arg(value)
			.arg(ttl.as_secs().max(1))
			.invoke_async(&mut self.conn.clone())
			.await?;

		Ok(result == 1)
	}

	async fn hdel(&self, key: &str, field: &str) -> crate::Result<()> {
		let _: () = self.conn.clone().hdel(key, field).await?;

		Ok(())
	}

	async fn zadd_ex(
		&self,
		key: &str,
		member: &str,
		score: f64,
		ttl: Duration,
	) -> crate::Result<()> {
		let mut conn = self.conn.clone();
		let _: () = conn.zadd(key, member, score).await?;
		let _: () = conn.expire(key, ttl.as_secs().max(1) as i64).await?;

		Ok(())
	}

	async fn zrem(&self, key: &str, member: &str) -> crate::Result<()> {
		let _: () = self.conn.clone().zrem(key, member).await?;

		Ok(())
	}

	async fn zrange(
		&self,
		key: &str,
		offset: isize,
		count: isize,
	) -> crate::Result<Vec<ScoredMember>> {
		let stop = if count < 0 { -1 } else { offset + count - 1 };
		let raw: Vec<(String, f64)> =
			self.conn.clone().zrange_withscores(key, offset as isize, stop).await?;

		Ok(raw.into_iter().map(|(member, score)| ScoredMember { member, score }).collect())
	}

	async fn zrevrange(
		&self,
		key: &str,
		offset: isize,
		count: isize,
	) -> crate::Result<Vec<ScoredMember>> {
		let stop = if count < 0 { -1 } else { offset + count - 1 };
		let raw: Vec<(String, f64)> =
			self.conn.clone().zrevrange_withscores(key, offset as isize, stop).await?;

		Ok(raw.into_iter().map(|(member, score)| ScoredMember { member, score }).collect())
	}

	async fn zcard(&self, key: &str) -> crate::Result<u64> {
		Ok(self.conn.clone().zcard(key).await?)
	}

	async fn zscore(&self, key: &str, member: &str) -> crate::Result<Option<f64>> {
		Ok(self.conn.clone().zscore(key, member).await?)
	}

	async fn incr_ex(&self, key: &str, ttl: Duration) -> crate::Result<i64> {
		let mut conn = self.conn.clone();
		let value: i64 = conn.incr(key, 1).await?;

		let _: () = conn.expire(key, ttl.as_secs().max(1) as i64).await?;

		Ok(value)
	}
}
