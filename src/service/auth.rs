//! `GetQRCode` (§4.7).

// crates.io
use serde::{Deserialize, Serialize};
use uuid::Uuid;
// self
use crate::{_prelude::*, cache::CacheClient, keys};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct QrCodeBinding {
	token: String,
	expires_at_ms: i64,
}

/// Login-pairing orchestrator.
pub struct AuthService {
	cache: Arc<dyn CacheClient>,
}
impl AuthService {
	/// Build a service over the given cache client.
	pub fn new(cache: Arc<dyn CacheClient>) -> Self {
		Self { cache }
	}

	/// Return the user's current login QR-code token, minting one if none exists or the existing
	/// one has expired (§4.7 "GetQRCode"). Stores both directions of the binding with a 48-hour
	/// TTL so the pairing side can look the token back up to the user.
	#[tracing::instrument(skip(self), fields(user_uuid = %user_uuid))]
	pub async fn get_qr_code(&self, user_uuid: &str) -> crate::Result<(String, DateTime<Utc>)> {
		let key = keys::user_qrcode_user(user_uuid);

		if let Some(raw) = self.cache.get(&key).await? {
			if let Ok(binding) = serde_json::from_str::<QrCodeBinding>(&raw) {
				if let Some(expires_at) = DateTime::from_timestamp_millis(binding.expires_at_ms) {
					if expires_at > Utc::now() {
						return Ok((binding.token, expires_at));
					}
				}
			}
		}

		let token = Uuid::new_v4().to_string();
		let expires_at = Utc::now() + keys::QRCODE_TTL;
		let binding = QrCodeBinding { token: token.clone(), expires_at_ms: expires_at.timestamp_millis() };
		let serialized = serde_json::to_string(&binding).map_err(|err| Error::Internal(err.to_string()))?;

		self.cache.set_ex(&key, &serialized, keys::QRCODE_TTL).await?;
		self.cache.set_ex(&keys::user_qrcode_token(&token), user_uuid, keys::QRCODE_TTL).await?;

		Ok((token, expires_at))
	}

	/// Resolve a presented QR-code token back to the user it was minted for, for the pairing
	/// side of the login flow.
	pub async fn resolve_qr_code(&self, token: &str) -> crate::Result<Option<String>> {
		self.cache.get(&keys::user_qrcode_token(token)).await
	}
}
