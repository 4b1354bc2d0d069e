//! Multi-device instant-messaging backend — WebSocket gateway, presence registry, and a
//! cache-aside account/social-graph service layer built for modern async Rust.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]
#![allow(clippy::too_many_arguments)]

pub mod cache;
pub mod config;
pub mod gateway;
pub mod keys;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod repository;
pub mod retry;
pub mod service;
pub mod store;

mod error;

mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, ErrorKind, Result};
}

pub use crate::{
	config::AppConfig,
	error::{Error, ErrorKind, Result},
	registry::{Client, ConnectionRegistry},
};

use argon2 as _;
use password_hash as _;
use tower_http as _;
use tracing_subscriber as _;
