//! The `axum` HTTP/WebSocket server: upgrade handling, the per-connection read/write loops, and
//! `/health` (§4.6, §6.1).
//!
//! A split sender/receiver with a `tokio::select!` race between the two loops, plus the
//! registry's displacement contract and a per-write deadline on every outbound frame.

// crates.io
use axum::{
	extract::{
		ws::{Message, WebSocket, WebSocketUpgrade},
		Query, State,
	},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::get,
	Router,
};
use futures::{SinkExt, StreamExt};
// self
use super::{
	envelope::{Envelope, CODE_UNSUPPORTED_TYPE},
	handshake::{self, WsParams},
	rpc,
};
use crate::{
	_prelude::*,
	metrics::GatewayMetrics,
	pool::{AsyncPool, TraceContext},
	registry::{Client, ConnectionRegistry},
	repository::DeviceRepository,
	service::Services,
};

/// Shared state handed to every `axum` handler.
#[derive(Clone)]
pub struct AppState {
	/// Live connection table.
	pub registry: ConnectionRegistry,
	/// Device sessions, tokens, and active-timestamp heartbeats.
	pub device_repo: Arc<dyn DeviceRepository>,
	/// Shared counters.
	pub metrics: Arc<GatewayMetrics>,
	/// Bounded pool backing detached per-connection side effects.
	pub pool: AsyncPool,
	/// Secret used to verify inbound access tokens.
	pub jwt_secret: String,
	/// Bound on a connection's outbound send queue.
	pub send_queue_capacity: usize,
	/// Deadline applied to a single outbound frame write.
	pub write_deadline: Duration,
	/// Service Orchestrators backing the `/rpc/*` surface.
	pub services: Arc<Services>,
}

/// Build the `axum` router: `/ws`, `/health`, and the `/rpc/*` Service Orchestrator surface.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/ws", get(ws_upgrade))
		.route("/health", get(health))
		.merge(rpc::routes())
		.with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "ok",
		"connections": state.registry.count().await,
	}))
}

async fn ws_upgrade(ws: WebSocketUpgrade, Query(params): Query<WsParams>, State(state): State<AppState>) -> Response {
	let session = match handshake::authenticate(&params.token, &params.device_id, None, &state.jwt_secret, state.device_repo.as_ref()).await
	{
		Ok(session) => session,
		Err(err) => return handshake_error_response(&err),
	};

	ws.on_upgrade(move |socket| handle_socket(socket, session, state))
}

fn handshake_error_response(err: &Error) -> Response {
	let status = match err {
		Error::TokenMissing | Error::DeviceIdMissing => StatusCode::BAD_REQUEST,
		Error::TokenInvalid | Error::TokenExpired | Error::DeviceIdMismatch => StatusCode::UNAUTHORIZED,
		_ => StatusCode::INTERNAL_SERVER_ERROR,
	};

	(status, err.to_string()).into_response()
}

#[tracing::instrument(skip(socket, state), fields(user_uuid = %session.user_uuid, device_id = %session.device_id))]
async fn handle_socket(socket: WebSocket, session: handshake::Session, state: AppState) {
	let (client, mut outbound_rx) = Client::new(&session.user_uuid, &session.device_id, state.send_queue_capacity);
	let client = Arc::new(client);

	if let Some(displaced) = state.registry.register(client.clone()).await {
		state.metrics.record_connection_displaced();
		displaced.close();
	}
	state.metrics.record_connection_registered();

	if let Err(err) = state.device_repo.touch_active(&session.user_uuid, &session.device_id).await {
		tracing::warn!(error = %err, "failed to stamp active timestamp on connect");
	}

	let (mut ws_sender, mut ws_receiver) = socket.split();
	let write_deadline = state.write_deadline;
	let write_client = client.clone();

	let mut write_task = tokio::spawn(async move {
		loop {
			tokio::select! {
				biased;
				_ = write_client.closed() => break,
				message = outbound_rx.recv() => {
					let Some(text) = message else { break };

					let sent = tokio::time::timeout(write_deadline, ws_sender.send(Message::Text(text.into()))).await;

					if !matches!(sent, Ok(Ok(()))) {
						break;
					}
				}
			}
		}
	});

	let read_client = client.clone();
	let read_state = state.clone();
	let read_session = session.clone();

	let mut read_task = tokio::spawn(async move {
		loop {
			tokio::select! {
				biased;
				_ = read_client.closed() => break,
				frame = ws_receiver.next() => {
					match frame {
						Some(Ok(Message::Text(text))) => {
							dispatch(&text, &read_client, &read_session, &read_state).await;
						},
						Some(Ok(Message::Close(_))) | None => break,
						Some(Ok(_)) => {},
						Some(Err(_)) => break,
					}
				}
			}
		}
	});

	tokio::select! {
		_ = &mut write_task => read_task.abort(),
		_ = &mut read_task => write_task.abort(),
	}

	client.close();
	state.registry.unregister(&client).await;
	state.metrics.record_connection_closed();
}

async fn dispatch(text: &str, client: &Arc<Client>, session: &handshake::Session, state: &AppState) {
	let envelope = match Envelope::from_text(text) {
		Ok(envelope) => envelope,
		Err(error_frame) => {
			client.enqueue(error_frame.to_text());

			return;
		},
	};

	match envelope.kind.as_str() {
		"heartbeat" => {
			let ctx = TraceContext {
				trace_id: session.trace_id.clone(),
				user_uuid: Some(session.user_uuid.clone()),
				device_id: Some(session.device_id.clone()),
				client_ip: session.client_ip.clone(),
			};
			let device_repo = state.device_repo.clone();
			let user_uuid = session.user_uuid.clone();
			let device_id = session.device_id.clone();

			let _ = state
				.pool
				.run_safe(ctx, async move { device_repo.touch_active(&user_uuid, &device_id).await }, Duration::from_secs(5))
				.await;

			client.enqueue(Envelope::empty("heartbeat_ack").to_text());
		},
		"message" => {
			client.enqueue(Envelope::empty("message_ack").to_text());
		},
		_ => {
			client.enqueue(Envelope::error(CODE_UNSUPPORTED_TYPE, "unsupported message type").to_text());
		},
	}
}
