//! Service orchestrators — thin composition over the repository layer, one struct per bounded
//! context (§4.7).
//!
//! Each orchestrator holds only the repository handles and, where a flow needs to touch a live
//! connection, the [`crate::registry::ConnectionRegistry`]. Error mapping to the two-level
//! `(ErrorKind, business variant)` scheme falls directly out of [`crate::Error::kind`] — no
//! separate translation table is needed here.

pub mod apply;
pub mod auth;
pub mod device;
pub mod friend;

pub use apply::{ApplyAction, ApplyService};
pub use auth::AuthService;
pub use device::DeviceService;
pub use friend::FriendService;

// self
use crate::_prelude::*;

/// Bundle of every orchestrator, handed to the gateway's RPC surface as a single piece of shared
/// state (§4.7).
pub struct Services {
	/// `SendFriendApply`/`HandleFriendApply`.
	pub apply: ApplyService,
	/// `GetQRCode`.
	pub auth: AuthService,
	/// `KickDevice`/`GetOnlineStatus`.
	pub device: DeviceService,
	/// `SyncFriendList` (service view) and friend/blacklist passthroughs.
	pub friend: FriendService,
}
impl Services {
	/// Bundle the four orchestrators.
	pub fn new(apply: ApplyService, auth: AuthService, device: DeviceService, friend: FriendService) -> Arc<Self> {
		Arc::new(Self { apply, auth, device, friend })
	}
}
