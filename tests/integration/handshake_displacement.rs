//! End-to-end handshake authentication and connection-displacement behavior (§4.5, §4.6).

mod support;

// std
use std::sync::Arc;
// crates.io
use imcore::{
	gateway::handshake::{authenticate, Claims},
	registry::{Client, ConnectionRegistry},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
// self
use crate::support::MemoryDeviceRepo;

fn token_for(user_uuid: &str, device_id: &str, secret: &str) -> String {
	let now = chrono::Utc::now().timestamp();
	let claims = Claims { user_uuid: user_uuid.to_owned(), device_id: device_id.to_owned(), iat: now, exp: now + 3600 };

	encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}

#[tokio::test]
async fn a_second_connection_for_the_same_device_displaces_the_first() {
	let secret = "integration-secret";
	let user_uuid = support::uuid_str(1);
	let device_repo = MemoryDeviceRepo::default();
	let token = token_for(&user_uuid, "phone-1", secret);

	let session = authenticate(&token, "phone-1", None, secret, &device_repo).await.unwrap();
	let registry = ConnectionRegistry::new();

	let (first_client, mut first_rx) = Client::new(&session.user_uuid, &session.device_id, 8);
	let first_client = Arc::new(first_client);
	assert!(registry.register(first_client.clone()).await.is_none());

	let (second_client, _second_rx) = Client::new(&session.user_uuid, &session.device_id, 8);
	let second_client = Arc::new(second_client);
	let displaced = registry.register(second_client.clone()).await;

	let displaced = displaced.expect("second registration for the same device must displace the first");
	assert!(Arc::ptr_eq(&displaced, &first_client));

	displaced.close();
	assert!(displaced.is_closed());
	assert!(first_rx.recv().await.is_none(), "write loop observes channel close after displacement");

	// The registry now only reflects the surviving connection.
	assert_eq!(registry.count().await, 1);
}

#[tokio::test]
async fn connecting_a_second_device_for_the_same_user_does_not_displace_anything() {
	let secret = "integration-secret";
	let user_uuid = support::uuid_str(2);
	let device_repo = MemoryDeviceRepo::default();

	let token_a = token_for(&user_uuid, "phone-a", secret);
	let token_b = token_for(&user_uuid, "phone-b", secret);

	let session_a = authenticate(&token_a, "phone-a", None, secret, &device_repo).await.unwrap();
	let session_b = authenticate(&token_b, "phone-b", None, secret, &device_repo).await.unwrap();

	let registry = ConnectionRegistry::new();
	let (client_a, _rx_a) = Client::new(&session_a.user_uuid, &session_a.device_id, 8);
	let (client_b, _rx_b) = Client::new(&session_b.user_uuid, &session_b.device_id, 8);

	assert!(registry.register(Arc::new(client_a)).await.is_none());
	assert!(registry.register(Arc::new(client_b)).await.is_none());
	assert_eq!(registry.count().await, 2);
}

#[tokio::test]
async fn handshake_rejects_a_token_minted_for_a_different_device() {
	let secret = "integration-secret";
	let device_repo = MemoryDeviceRepo::default();
	let token = token_for(&support::uuid_str(3), "phone-1", secret);

	let err = authenticate(&token, "phone-2", None, secret, &device_repo).await.unwrap_err();

	assert!(matches!(err, imcore::Error::DeviceIdMismatch));
}
