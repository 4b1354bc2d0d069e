//! WebSocket connection gateway: handshake, envelope dispatch, and the `axum` HTTP surface
//! (§4.6).

pub mod envelope;
pub mod handshake;
pub mod rpc;
pub mod server;

pub use handshake::{Claims, Session, WsParams};
pub use server::{router, AppState};

// self
use crate::{_prelude::*, registry::ConnectionRegistry};

/// Bind `state.registry`'s router and serve until a shutdown signal arrives, then drain for up to
/// `shutdown_drain_deadline` before returning (§5 "Deadlines", §4.6 "Shutdown").
pub async fn serve(bind_addr: &str, state: server::AppState, shutdown_drain_deadline: Duration) -> crate::Result<()> {
	let registry = state.registry.clone();
	let listener = tokio::net::TcpListener::bind(bind_addr).await?;
	let app = router(state);

	tracing::info!(%bind_addr, "gateway listening");

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal(registry, shutdown_drain_deadline))
		.await?;

	Ok(())
}

async fn shutdown_signal(registry: ConnectionRegistry, drain_deadline: Duration) {
	wait_for_signal().await;

	tracing::info!("shutdown signal received; closing connections");

	registry.shutdown().await;

	tokio::time::sleep(drain_deadline.min(Duration::from_secs(15))).await;
}

#[cfg(unix)]
async fn wait_for_signal() {
	use tokio::signal::unix::{signal, SignalKind};

	let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
	let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

	tokio::select! {
		_ = sigterm.recv() => {},
		_ = sigint.recv() => {},
	}
}

#[cfg(not(unix))]
async fn wait_for_signal() {
	let _ = tokio::signal::ctrl_c().await;
}
