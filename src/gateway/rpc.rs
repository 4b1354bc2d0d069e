//! Authenticated JSON/HTTP surface for the Service Orchestrators (§6 "RPC surface").
//!
//! The business RPC schemas live in an external IDL this crate does not own; what belongs here is
//! the gateway-side interceptor that extracts `user_uuid` from the bearer token and the thin
//! per-method handlers that translate a JSON request into a Service Orchestrator call, mirroring
//! the parse → authenticate → repository-calls → two-level error mapping shape of §4.7.

// crates.io
use axum::{
	extract::{FromRequestParts, State},
	http::{request::Parts, StatusCode},
	response::{IntoResponse, Json, Response},
	routing::post,
	Router,
};
use serde::{Deserialize, Serialize};
// self
use super::{handshake, server::AppState};
use crate::_prelude::*;

/// Extracts and verifies the caller's identity from an `Authorization: Bearer <token>` header.
///
/// This is the "gateway interceptor" that injects `user_uuid` into the request context ahead of
/// any Repository call (§4.7).
pub struct AuthenticatedUser {
	/// Authenticated account.
	pub user_uuid: String,
}
impl FromRequestParts<AppState> for AuthenticatedUser {
	type Rejection = Response;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
		let header = parts
			.headers
			.get(axum::http::header::AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.ok_or_else(|| rpc_error_response(&Error::TokenMissing))?;

		let token = header.strip_prefix("Bearer ").ok_or_else(|| rpc_error_response(&Error::TokenMissing))?;
		let claims = handshake::decode_claims(token, &state.jwt_secret).map_err(|err| rpc_error_response(&err))?;

		Ok(Self { user_uuid: claims.user_uuid })
	}
}

/// Uniform error body for every `/rpc/*` endpoint: a coarse kind plus the business message, per
/// §6's two-level error channel.
#[derive(Serialize)]
struct RpcError {
	kind: &'static str,
	message: String,
}

fn rpc_error_response(err: &Error) -> Response {
	let status = match err.kind() {
		ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
		ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
		ErrorKind::NotFound => StatusCode::NOT_FOUND,
		ErrorKind::AlreadyExists => StatusCode::CONFLICT,
		ErrorKind::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
		ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
		ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
	};
	let kind = match err.kind() {
		ErrorKind::Unauthenticated => "unauthenticated",
		ErrorKind::PermissionDenied => "permission_denied",
		ErrorKind::NotFound => "not_found",
		ErrorKind::AlreadyExists => "already_exists",
		ErrorKind::FailedPrecondition => "failed_precondition",
		ErrorKind::InvalidArgument => "invalid_argument",
		ErrorKind::Internal => "internal",
	};

	(status, Json(RpcError { kind, message: err.to_string() })).into_response()
}

/// Mount the `/rpc/*` routes onto an existing router.
pub fn routes() -> Router<AppState> {
	Router::new()
		.route("/rpc/send_friend_apply", post(send_friend_apply))
		.route("/rpc/handle_friend_apply", post(handle_friend_apply))
		.route("/rpc/kick_device", post(kick_device))
		.route("/rpc/get_online_status", post(get_online_status))
		.route("/rpc/sync_friend_list", post(sync_friend_list))
		.route("/rpc/get_qr_code", post(get_qr_code))
}

#[derive(Deserialize)]
struct SendFriendApplyRequest {
	target_uuid: String,
	reason: Option<String>,
	source: Option<String>,
}
#[derive(Serialize)]
struct SendFriendApplyResponse {
	apply_id: i64,
}
async fn send_friend_apply(
	caller: AuthenticatedUser,
	State(state): State<AppState>,
	Json(body): Json<SendFriendApplyRequest>,
) -> Response {
	match state
		.services
		.apply
		.send_friend_apply(&caller.user_uuid, &body.target_uuid, body.reason.as_deref(), body.source.as_deref())
		.await
	{
		Ok(apply_id) => Json(SendFriendApplyResponse { apply_id }).into_response(),
		Err(err) => rpc_error_response(&err),
	}
}

#[derive(Deserialize)]
struct HandleFriendApplyRequest {
	apply_id: i64,
	accept: bool,
	remark: Option<String>,
}
async fn handle_friend_apply(
	caller: AuthenticatedUser,
	State(state): State<AppState>,
	Json(body): Json<HandleFriendApplyRequest>,
) -> Response {
	let action = if body.accept { crate::service::apply::ApplyAction::Accept } else { crate::service::apply::ApplyAction::Reject };

	match state.services.apply.handle_friend_apply(body.apply_id, &caller.user_uuid, action, body.remark.as_deref()).await {
		Ok(()) => StatusCode::NO_CONTENT.into_response(),
		Err(err) => rpc_error_response(&err),
	}
}

#[derive(Deserialize)]
struct KickDeviceRequest {
	caller_device_id: String,
	target_device_id: String,
}
async fn kick_device(caller: AuthenticatedUser, State(state): State<AppState>, Json(body): Json<KickDeviceRequest>) -> Response {
	match state.services.device.kick_device(&caller.user_uuid, &body.caller_device_id, &body.target_device_id).await {
		Ok(()) => StatusCode::NO_CONTENT.into_response(),
		Err(err) => rpc_error_response(&err),
	}
}

#[derive(Deserialize)]
struct GetOnlineStatusRequest {
	user_uuids: Vec<String>,
}
#[derive(Serialize)]
struct GetOnlineStatusResponse {
	online: Vec<bool>,
}
async fn get_online_status(_caller: AuthenticatedUser, State(state): State<AppState>, Json(body): Json<GetOnlineStatusRequest>) -> Response {
	match state.services.device.get_online_status(&body.user_uuids).await {
		Ok(online) => Json(GetOnlineStatusResponse { online }).into_response(),
		Err(err) => rpc_error_response(&err),
	}
}

#[derive(Deserialize)]
struct SyncFriendListRequest {
	since_version_ms: i64,
	limit: i64,
}
#[derive(Serialize)]
struct SyncFriendListResponse {
	changes: Vec<FriendChangeResponse>,
	has_more: bool,
	next_version_ms: i64,
}
#[derive(Serialize)]
struct FriendChangeResponse {
	peer_uuid: String,
	kind: &'static str,
}
async fn sync_friend_list(caller: AuthenticatedUser, State(state): State<AppState>, Json(body): Json<SyncFriendListRequest>) -> Response {
	match state.services.friend.sync_friend_list(&caller.user_uuid, body.since_version_ms, body.limit).await {
		Ok(page) => {
			let changes = page
				.changes
				.into_iter()
				.map(|change| FriendChangeResponse {
					peer_uuid: change.relation.peer_uuid.to_string(),
					kind: match change.kind {
						crate::service::friend::ChangeKind::Add => "add",
						crate::service::friend::ChangeKind::Update => "update",
						crate::service::friend::ChangeKind::Delete => "delete",
					},
				})
				.collect();

			Json(SyncFriendListResponse { changes, has_more: page.has_more, next_version_ms: page.next_version.timestamp_millis() })
				.into_response()
		},
		Err(err) => rpc_error_response(&err),
	}
}

#[derive(Serialize)]
struct GetQrCodeResponse {
	token: String,
	expires_at_ms: i64,
}
async fn get_qr_code(caller: AuthenticatedUser, State(state): State<AppState>) -> Response {
	match state.services.auth.get_qr_code(&caller.user_uuid).await {
		Ok((token, expires_at)) => Json(GetQrCodeResponse { token, expires_at_ms: expires_at.timestamp_millis() }).into_response(),
		Err(err) => rpc_error_response(&err),
	}
}
