//! Crate-wide error types, the transport-facing error kind, and the `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse transport-facing error kind.
///
/// Service orchestrators map every [`Error`] onto one of these before it crosses the RPC or
/// WebSocket boundary (§6/§7). The numeric business code that accompanies it stays in the
/// message field of [`Error`]'s `Display` output; upstream owns the localized-text lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
	/// Request did not carry valid credentials.
	Unauthenticated,
	/// Caller is authenticated but not allowed to perform the action.
	PermissionDenied,
	/// Referenced record does not exist.
	NotFound,
	/// Attempted to create something that already exists.
	AlreadyExists,
	/// Preconditions for the requested transition were not met.
	FailedPrecondition,
	/// Request payload failed validation.
	InvalidArgument,
	/// Unclassified internal failure.
	Internal,
}

/// Unified error type for the gateway and state-coherency layer.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Jsonwebtoken(#[from] jsonwebtoken::errors::Error),
	#[error(transparent)]
	Redis(#[from] redis::RedisError),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),

	#[error("Record not found.")]
	RecordNotFound,
	#[error("Duplicate key: {0}")]
	DuplicateKey(String),
	#[error("Cache is unreachable: {0}")]
	CacheUnavailable(String),

	#[error("Token is missing.")]
	TokenMissing,
	#[error("Token is invalid.")]
	TokenInvalid,
	#[error("Token has expired.")]
	TokenExpired,
	#[error("device_id is missing.")]
	DeviceIdMissing,
	#[error("device_id does not match the token claims.")]
	DeviceIdMismatch,

	#[error("Cannot target yourself.")]
	SelfTarget,
	#[error("Users are already friends.")]
	AlreadyFriend,
	#[error("A pending apply already exists.")]
	PendingApplyExists,
	#[error("The peer has blocked you.")]
	PeerBlockedYou,
	#[error("You have blocked the peer.")]
	YouBlockedPeer,
	#[error("Apply request not found or already handled.")]
	ApplyNotFoundOrHandled,

	#[error("Caller does not have permission to perform this action.")]
	NoPermission,
	#[error("Cannot kick the device making the request.")]
	CannotKickCurrent,
	#[error("Device is not currently online.")]
	DeviceOffline,

	#[error("Invalid argument for {field}: {reason}")]
	InvalidArgument { field: &'static str, reason: String },
	#[error("Internal error: {0}")]
	Internal(String),
}
impl Error {
	/// Map this error onto its coarse transport [`ErrorKind`].
	///
	/// Idempotent-success outcomes (duplicate accept/reject, delete-not-present) are decided by
	/// the caller *before* this mapping is consulted — by the time an error reaches here it is a
	/// genuine failure.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::TokenMissing
			| Error::TokenInvalid
			| Error::TokenExpired
			| Error::DeviceIdMissing
			| Error::DeviceIdMismatch => ErrorKind::Unauthenticated,

			Error::NoPermission | Error::PeerBlockedYou | Error::YouBlockedPeer =>
				ErrorKind::PermissionDenied,

			Error::RecordNotFound | Error::ApplyNotFoundOrHandled | Error::DeviceOffline =>
				ErrorKind::NotFound,

			Error::DuplicateKey(_) | Error::AlreadyFriend => ErrorKind::AlreadyExists,

			Error::SelfTarget | Error::PendingApplyExists | Error::CannotKickCurrent =>
				ErrorKind::FailedPrecondition,

			Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,

			Error::Io(_)
			| Error::Jsonwebtoken(_)
			| Error::Redis(_)
			| Error::Serde(_)
			| Error::Sqlx(_)
			| Error::CacheUnavailable(_)
			| Error::Internal(_) => ErrorKind::Internal,
		}
	}

	/// Whether this error represents an outcome a caller should treat as idempotent success
	/// rather than surface as a failure (§7 "Idempotent outcomes").
	pub fn is_idempotent_noop(&self) -> bool {
		matches!(self, Error::RecordNotFound | Error::ApplyNotFoundOrHandled)
	}
}
