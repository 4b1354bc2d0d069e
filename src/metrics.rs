//! Process-local counters for the repository and connection layers.
//!
//! A plain `AtomicU64` accumulator with a `snapshot()` method and no Prometheus exporter:
//! `GatewayMetrics` only needs to back the `/health` endpoint and internal logging, not a scrape
//! target.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Thread-safe counters for one running gateway process.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
	cache_hits: AtomicU64,
	cache_misses: AtomicU64,
	cache_placeholder_hits: AtomicU64,
	ttl_renewals: AtomicU64,
	retry_tasks_published: AtomicU64,
	retry_tasks_exhausted: AtomicU64,
	connections_registered: AtomicU64,
	connections_displaced: AtomicU64,
	connections_closed: AtomicU64,
}
impl GatewayMetrics {
	/// Build a zeroed accumulator, shared via `Arc` across repositories and the gateway.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a cache hit that returned a real (non-placeholder) value.
	pub fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a cache hit that returned the empty-placeholder sentinel.
	pub fn record_cache_placeholder_hit(&self) {
		self.cache_placeholder_hits.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a cache miss that fell through to the store.
	pub fn record_cache_miss(&self) {
		self.cache_misses.fetch_add(1, Ordering::Relaxed);
	}

	/// Record an opportunistic TTL renewal (§4.4 "Probabilistic TTL renewal").
	pub fn record_ttl_renewal(&self) {
		self.ttl_renewals.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a retry task handed to the bus.
	pub fn record_retry_published(&self) {
		self.retry_tasks_published.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a retry task dropped after exhausting its replay budget.
	pub fn record_retry_exhausted(&self) {
		self.retry_tasks_exhausted.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a successful `Registry::register` call.
	pub fn record_connection_registered(&self) {
		self.connections_registered.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a displacement (new connection closed a prior one for the same device).
	pub fn record_connection_displaced(&self) {
		self.connections_displaced.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a connection reaching `Close`, for any reason.
	pub fn record_connection_closed(&self) {
		self.connections_closed.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for `/health` and diagnostics.
	pub fn snapshot(&self) -> GatewayMetricsSnapshot {
		GatewayMetricsSnapshot {
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			cache_misses: self.cache_misses.load(Ordering::Relaxed),
			cache_placeholder_hits: self.cache_placeholder_hits.load(Ordering::Relaxed),
			ttl_renewals: self.ttl_renewals.load(Ordering::Relaxed),
			retry_tasks_published: self.retry_tasks_published.load(Ordering::Relaxed),
			retry_tasks_exhausted: self.retry_tasks_exhausted.load(Ordering::Relaxed),
			connections_registered: self.connections_registered.load(Ordering::Relaxed),
			connections_displaced: self.connections_displaced.load(Ordering::Relaxed),
			connections_closed: self.connections_closed.load(Ordering::Relaxed),
		}
	}
}

/// Read-only snapshot of [`GatewayMetrics`].
#[derive(Clone, Debug, serde::Serialize)]
pub struct GatewayMetricsSnapshot {
	/// Cache lookups that returned a real value.
	pub cache_hits: u64,
	/// Cache lookups that fell through to the store.
	pub cache_misses: u64,
	/// Cache lookups that returned the empty-placeholder sentinel.
	pub cache_placeholder_hits: u64,
	/// Opportunistic TTL renewals performed on hit.
	pub ttl_renewals: u64,
	/// Retry tasks handed to the bus.
	pub retry_tasks_published: u64,
	/// Retry tasks dropped after exhausting their replay budget.
	pub retry_tasks_exhausted: u64,
	/// Successful registrations.
	pub connections_registered: u64,
	/// Registrations that displaced a prior connection for the same device.
	pub connections_displaced: u64,
	/// Connections that reached `Close`.
	pub connections_closed: u64,
}
impl GatewayMetricsSnapshot {
	/// Fraction of cache lookups (hit or placeholder) that avoided a store query.
	pub fn cache_hit_rate(&self) -> f64 {
		let total = self.cache_hits + self.cache_placeholder_hits + self.cache_misses;

		if total == 0 {
			0.0
		} else {
			(self.cache_hits + self.cache_placeholder_hits) as f64 / total as f64
		}
	}
}
