//! Process entry point: load configuration, wire the repository/service/gateway layers, and
//! serve until a shutdown signal arrives.

// std
use std::sync::Arc;
// crates.io
use tracing_subscriber::EnvFilter;
// self
use imcore::{
	cache::RedisCacheClient,
	config::AppConfig,
	gateway,
	pool::AsyncPool,
	registry::ConnectionRegistry,
	repository::{PgApplyRepository, PgDeviceRepository, PgRelationRepository, PgUserRepository},
	retry::{RetryBus, RetryConsumer},
	service::{ApplyService, AuthService, DeviceService, FriendService, Services},
	store::Store,
};

#[tokio::main]
async fn main() -> imcore::Result<()> {
	tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

	let config = AppConfig::from_env()?;

	tracing::info!(bind_addr = %config.bind_addr, "starting imcore gateway");

	let store = Store::connect(&config.store_database_url, config.store_max_connections).await?;
	let cache: Arc<dyn imcore::cache::CacheClient> = Arc::new(RedisCacheClient::connect(&config.cache_url).await?);
	let (retry_bus, retry_rx) = RetryBus::in_process();
	let pool = AsyncPool::new(config.async_pool_capacity);

	let device_repo =
		Arc::new(PgDeviceRepository::new(store.clone(), cache.clone(), retry_bus.clone(), config.retry_max_retries));
	let user_repo =
		Arc::new(PgUserRepository::new(store.clone(), cache.clone(), retry_bus.clone(), config.retry_max_retries));
	let relation_repo = Arc::new(PgRelationRepository::new(
		store.clone(),
		cache.clone(),
		retry_bus.clone(),
		config.retry_max_retries,
	));
	let apply_repo =
		Arc::new(PgApplyRepository::new(store.clone(), cache.clone(), retry_bus.clone(), config.retry_max_retries));

	let consumer = RetryConsumer::new(cache.clone(), retry_bus);

	tokio::spawn(consumer.run(retry_rx));

	let metrics = imcore::metrics::GatewayMetrics::new();
	let registry = ConnectionRegistry::new();

	let services = Services::new(
		ApplyService::new(apply_repo, relation_repo.clone(), user_repo),
		AuthService::new(cache),
		DeviceService::new(device_repo.clone(), registry.clone(), config.online_window),
		FriendService::new(relation_repo),
	);

	let state = gateway::AppState {
		registry,
		device_repo,
		metrics,
		pool,
		jwt_secret: config.jwt_secret.clone(),
		send_queue_capacity: config.send_queue_capacity,
		write_deadline: config.write_deadline,
		services,
	};

	gateway::serve(&config.bind_addr, state, config.shutdown_drain_deadline).await?;

	Ok(())
}
