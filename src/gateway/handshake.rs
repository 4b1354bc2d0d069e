//! WebSocket handshake: claims parsing, device-id match, and the fail-open access-token check
//! (§4.6 "Handshake").

// crates.io
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
// self
use crate::{_prelude::*, repository::DeviceRepository};

/// `GET /ws?token=<jwt>&device_id=<id>` query parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct WsParams {
	/// The presented access token.
	pub token: String,
	/// The device identifier the client claims to be connecting as.
	pub device_id: String,
}

/// JWT claims carried by an access token (§3 "Claims").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
	/// Authenticated account.
	pub user_uuid: String,
	/// Device the token was issued for.
	pub device_id: String,
	/// Expiry, unix seconds.
	pub exp: i64,
	/// Issued-at, unix seconds.
	pub iat: i64,
}

/// Connection-scoped identity established by a successful handshake. Never persisted.
#[derive(Clone, Debug)]
pub struct Session {
	/// Authenticated account.
	pub user_uuid: String,
	/// Device identifier, confirmed to match the token's claims.
	pub device_id: String,
	/// Best-effort client address, for logging.
	pub client_ip: Option<String>,
	/// Trace id for this connection's lifetime, for log correlation.
	pub trace_id: String,
}

/// Run the handshake against a presented token, device id, and client address.
///
/// Verifies, in order: token and device_id are non-empty, the token decodes and has not expired,
/// `claims.device_id` matches the presented `device_id`, and — if the cache is reachable — the
/// MD5 of `token` matches the stored hash. A cache-unavailable result from
/// [`DeviceRepository::verify_access_token`] falls back to token-only verification (§4.6, §9
/// "fail-open on cache auth check").
#[tracing::instrument(skip(token, jwt_secret, device_repo), fields(device_id = %device_id))]
pub async fn authenticate(
	token: &str,
	device_id: &str,
	client_ip: Option<String>,
	jwt_secret: &str,
	device_repo: &dyn DeviceRepository,
) -> crate::Result<Session> {
	if token.trim().is_empty() {
		return Err(Error::TokenMissing);
	}
	if device_id.trim().is_empty() {
		return Err(Error::DeviceIdMissing);
	}

	let claims = decode_claims(token, jwt_secret)?;

	if claims.device_id != device_id {
		return Err(Error::DeviceIdMismatch);
	}

	match device_repo.verify_access_token(&claims.user_uuid, device_id, token).await {
		Ok(Some(true)) | Ok(None) => {},
		Ok(Some(false)) => return Err(Error::TokenInvalid),
		Err(err) => {
			tracing::warn!(error = %err, "cache error during access-token check; failing open");
		},
	}

	Ok(Session {
		user_uuid: claims.user_uuid,
		device_id: device_id.to_owned(),
		client_ip,
		trace_id: uuid::Uuid::new_v4().to_string(),
	})
}

pub(crate) fn decode_claims(token: &str, jwt_secret: &str) -> crate::Result<Claims> {
	let mut validation = Validation::new(Algorithm::HS256);

	validation.set_required_spec_claims(&["exp"]);

	let data = decode::<Claims>(token, &DecodingKey::from_secret(jwt_secret.as_bytes()), &validation).map_err(
		|err| match err.kind() {
			jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::TokenExpired,
			_ => Error::TokenInvalid,
		},
	)?;

	Ok(data.claims)
}
