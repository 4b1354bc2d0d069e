//! Relational store of truth — the `sqlx`/Postgres pool and the row types repositories read and
//! write (§3 "Data Model").

pub mod models;

// crates.io
use sqlx::postgres::{PgPool, PgPoolOptions};
// self
use crate::_prelude::*;

/// Thin wrapper around a `sqlx::PgPool`.
///
/// Repositories take `&Store` rather than `&PgPool` directly so that the connection-acquisition
/// policy (pool size, acquire timeout) stays centralized here instead of being repeated at every
/// call site.
#[derive(Clone)]
pub struct Store {
	pool: PgPool,
}
impl Store {
	/// Connect to `database_url`, sizing the pool from `max_connections`.
	pub async fn connect(database_url: &str, max_connections: u32) -> crate::Result<Self> {
		let pool = PgPoolOptions::new()
			.max_connections(max_connections)
			.acquire_timeout(Duration::from_secs(5))
			.connect(database_url)
			.await?;

		Ok(Self { pool })
	}

	/// Build a store over an already-configured pool, used by tests against an ephemeral
	/// database and by callers that need custom pool options.
	pub fn from_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Access the underlying pool for queries that don't warrant their own repository method.
	pub fn pool(&self) -> &PgPool {
		&self.pool
	}
}
