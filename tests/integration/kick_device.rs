//! `KickDevice` end to end through the real HTTP router: JWT bearer auth, the orchestrator, the
//! device repository, and the live connection registry all wired together (§4.7 "KickDevice").

mod support;

// std
use std::sync::Arc;
// crates.io
use axum::{
	body::Body,
	http::{Request, StatusCode},
};
use imcore::{
	gateway::{self, handshake::Claims},
	metrics::GatewayMetrics,
	pool::AsyncPool,
	registry::{Client, ConnectionRegistry},
	repository::DeviceRepository,
	service::{ApplyService, AuthService, DeviceService, FriendService, Services},
	store::models::DeviceStatus,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use tower::ServiceExt;
// self
use crate::support::{session, uuid_str, MemoryApplyRepo, MemoryCache, MemoryDeviceRepo, MemoryRelationRepo, MemoryUserRepo};

const SECRET: &str = "rpc-integration-secret";

fn bearer_for(user_uuid: &str, device_id: &str) -> String {
	let now = chrono::Utc::now().timestamp();
	let claims = Claims { user_uuid: user_uuid.to_owned(), device_id: device_id.to_owned(), iat: now, exp: now + 3600 };

	encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn build_state(device_repo: Arc<dyn DeviceRepository>, registry: ConnectionRegistry) -> gateway::AppState {
	let services = Services::new(
		ApplyService::new(Arc::new(MemoryApplyRepo::default()), Arc::new(MemoryRelationRepo::default()), Arc::new(MemoryUserRepo::default())),
		AuthService::new(Arc::new(MemoryCache::default())),
		DeviceService::new(device_repo.clone(), registry.clone(), std::time::Duration::from_secs(90)),
		FriendService::new(Arc::new(MemoryRelationRepo::default())),
	);

	gateway::AppState {
		registry,
		device_repo,
		metrics: GatewayMetrics::new(),
		pool: AsyncPool::new(16),
		jwt_secret: SECRET.to_owned(),
		send_queue_capacity: 32,
		write_deadline: std::time::Duration::from_secs(5),
		services,
	}
}

#[tokio::test]
async fn kicking_an_online_device_closes_its_live_connection_and_returns_204() {
	let caller_uuid = uuid_str(100);
	let target_session = session(&caller_uuid, "laptop", DeviceStatus::Online as i16);

	let device_repo: Arc<dyn DeviceRepository> = Arc::new(MemoryDeviceRepo::default().with_session(target_session));
	let registry = ConnectionRegistry::new();

	let (target_client, _rx) = Client::new(&caller_uuid, "laptop", 8);
	let target_client = Arc::new(target_client);
	registry.register(target_client.clone()).await;

	let state = build_state(device_repo, registry.clone());
	let router = gateway::router(state);

	let body = json!({ "caller_device_id": "phone", "target_device_id": "laptop" });
	let request = Request::builder()
		.method("POST")
		.uri("/rpc/kick_device")
		.header("content-type", "application/json")
		.header("authorization", format!("Bearer {}", bearer_for(&caller_uuid, "phone")))
		.body(Body::from(body.to_string()))
		.unwrap();

	let response = router.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::NO_CONTENT);
	assert!(target_client.is_closed(), "kicked device's live connection must be closed");
	assert_eq!(registry.count().await, 0);
}

#[tokio::test]
async fn kicking_without_a_bearer_token_is_rejected_before_reaching_the_orchestrator() {
	let device_repo: Arc<dyn DeviceRepository> = Arc::new(MemoryDeviceRepo::default());
	let state = build_state(device_repo, ConnectionRegistry::new());
	let router = gateway::router(state);

	let body = json!({ "caller_device_id": "phone", "target_device_id": "laptop" });
	let request = Request::builder()
		.method("POST")
		.uri("/rpc/kick_device")
		.header("content-type", "application/json")
		.body(Body::from(body.to_string()))
		.unwrap();

	let response = router.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn kicking_an_unknown_device_returns_404() {
	let caller_uuid = uuid_str(101);
	let device_repo: Arc<dyn DeviceRepository> = Arc::new(MemoryDeviceRepo::default());
	let state = build_state(device_repo, ConnectionRegistry::new());
	let router = gateway::router(state);

	let body = json!({ "caller_device_id": "phone", "target_device_id": "ghost" });
	let request = Request::builder()
		.method("POST")
		.uri("/rpc/kick_device")
		.header("content-type", "application/json")
		.header("authorization", format!("Bearer {}", bearer_for(&caller_uuid, "phone")))
		.body(Body::from(body.to_string()))
		.unwrap();

	let response = router.oneshot(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
