//! Row types for each persisted entity (§3).

// crates.io
use sqlx::FromRow;
use uuid::Uuid;
// self
use crate::_prelude::*;

/// Account status, persisted as plain text (`"active"` / `"disabled"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
	/// Account can authenticate and use the service.
	Active,
	/// Account has been administratively disabled.
	Disabled,
}
impl UserStatus {
	/// Render as the text stored in the `status` column.
	pub fn as_str(self) -> &'static str {
		match self {
			UserStatus::Active => "active",
			UserStatus::Disabled => "disabled",
		}
	}
}
impl std::str::FromStr for UserStatus {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"active" => Ok(UserStatus::Active),
			"disabled" => Ok(UserStatus::Disabled),
			other => Err(Error::InvalidArgument {
				field: "status",
				reason: format!("unrecognized user status '{other}'"),
			}),
		}
	}
}
impl sqlx::Type<sqlx::Postgres> for UserStatus {
	fn type_info() -> sqlx::postgres::PgTypeInfo {
		<String as sqlx::Type<sqlx::Postgres>>::type_info()
	}
}
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for UserStatus {
	fn decode(
		value: sqlx::postgres::PgValueRef<'r>,
	) -> std::result::Result<Self, sqlx::error::BoxDynError> {
		let raw = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;

		Ok(raw.parse()?)
	}
}
impl<'q> sqlx::Encode<'q, sqlx::Postgres> for UserStatus {
	fn encode_by_ref(
		&self,
		buf: &mut sqlx::postgres::PgArgumentBuffer,
	) -> std::result::Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
		<String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
	}
}

/// A registered account. Soft-deleted via `deleted_at`; `uuid` is globally unique and stable.
///
/// `password_hash` is carried on the struct because the cache stores and reconstructs the whole
/// row; service orchestrators strip it before the value crosses the RPC boundary (§6).
#[derive(Clone, Debug, FromRow, serde::Serialize, serde::Deserialize)]
pub struct UserInfo {
	/// Globally unique, stable account identifier.
	pub uuid: Uuid,
	/// Account email, if any.
	pub email: Option<String>,
	/// Account telephone number, if any.
	pub telephone: Option<String>,
	/// Display name.
	pub nickname: String,
	/// Avatar URL, if any.
	pub avatar: Option<String>,
	/// Password hash.
	pub password_hash: String,
	/// Account status.
	pub status: UserStatus,
	/// Gender code.
	pub gender: i16,
	/// User-provided signature/bio, if any.
	pub signature: Option<String>,
	/// Date of birth, if provided.
	pub birthday: Option<DateTime<Utc>>,
	/// Whether this account has administrative privileges.
	pub is_admin: bool,
	/// Creation timestamp.
	pub created_at: DateTime<Utc>,
	/// Last-update timestamp.
	pub updated_at: DateTime<Utc>,
	/// Soft-deletion timestamp, if deleted.
	pub deleted_at: Option<DateTime<Utc>>,
}

/// Device-session lifecycle state. Persisted as the plain `i16` discriminant in
/// [`DeviceSession::status`]; this enum is the business-logic view over that column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i16)]
pub enum DeviceStatus {
	/// Device has a live WebSocket connection.
	Online = 0,
	/// Device session exists but has no live connection.
	Offline = 1,
	/// Device was explicitly logged out.
	LoggedOut = 2,
	/// Device was kicked by another session.
	Kicked = 3,
}
impl DeviceStatus {
	/// Whether `self` outranks `other` for kick/login displacement decisions (§4.7
	/// "status-dominance rules" — `Kicked`/`LoggedOut` are terminal and win over `Online`).
	pub fn dominates(self, other: DeviceStatus) -> bool {
		self.rank() >= other.rank()
	}

	fn rank(self) -> u8 {
		match self {
			DeviceStatus::Online => 0,
			DeviceStatus::Offline => 1,
			DeviceStatus::LoggedOut => 2,
			DeviceStatus::Kicked => 3,
		}
	}
}
impl TryFrom<i16> for DeviceStatus {
	type Error = Error;

	fn try_from(raw: i16) -> Result<Self> {
		match raw {
			0 => Ok(DeviceStatus::Online),
			1 => Ok(DeviceStatus::Offline),
			2 => Ok(DeviceStatus::LoggedOut),
			3 => Ok(DeviceStatus::Kicked),
			other => Err(Error::Internal(format!("unrecognized device status {other}"))),
		}
	}
}

/// A device's login session. A session may exist without a live WebSocket connection.
///
/// Uniqueness: `(user_uuid, device_id)`.
#[derive(Clone, Debug, FromRow, serde::Serialize, serde::Deserialize)]
pub struct DeviceSession {
	/// Owning account.
	pub user_uuid: Uuid,
	/// Caller-supplied device identifier.
	pub device_id: String,
	/// Human-readable device name, if provided.
	pub device_name: Option<String>,
	/// Device platform (e.g. `"ios"`, `"android"`), if provided.
	pub platform: Option<String>,
	/// Client app version, if provided.
	pub app_version: Option<String>,
	/// Last-seen IP address, if known.
	pub ip: Option<String>,
	/// Last-seen user agent, if known.
	pub user_agent: Option<String>,
	/// [`DeviceStatus`] discriminant.
	pub status: i16,
	/// Session expiration timestamp, if set.
	pub expire_at: Option<DateTime<Utc>>,
	/// Creation timestamp.
	pub created_at: DateTime<Utc>,
	/// Last-update timestamp.
	pub updated_at: DateTime<Utc>,
}

/// Directional relation status between two users. Persisted as the plain `i16` discriminant in
/// [`UserRelation::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i16)]
pub enum RelationStatus {
	/// Active relation (friend edge, direction-specific).
	Normal = 0,
	/// Blacklisted; the pair was friends before being blacklisted.
	BlacklistWasFriend = 1,
	/// Soft-deleted relation.
	Deleted = 2,
	/// Blacklisted; the pair was strangers before being blacklisted.
	BlacklistWasStranger = 3,
}
impl TryFrom<i16> for RelationStatus {
	type Error = Error;

	fn try_from(raw: i16) -> Result<Self> {
		match raw {
			0 => Ok(RelationStatus::Normal),
			1 => Ok(RelationStatus::BlacklistWasFriend),
			2 => Ok(RelationStatus::Deleted),
			3 => Ok(RelationStatus::BlacklistWasStranger),
			other => Err(Error::Internal(format!("unrecognized relation status {other}"))),
		}
	}
}

/// A directional edge in the social graph. A "friend" edge is a pair of `Normal` rows, one in
/// each direction. Blacklist is one-directional and remembers whether the target was previously
/// a friend so un-blacklisting can restore the prior state.
///
/// Uniqueness: `(user_uuid, peer_uuid)`.
#[derive(Clone, Debug, FromRow, serde::Serialize, serde::Deserialize)]
pub struct UserRelation {
	/// Account this edge is from.
	pub user_uuid: Uuid,
	/// Account this edge points to.
	pub peer_uuid: Uuid,
	/// [`RelationStatus`] discriminant.
	pub status: i16,
	/// Caller-set remark for the peer, if any.
	pub remark: Option<String>,
	/// Caller-set grouping tag for the peer, if any.
	pub group_tag: Option<String>,
	/// How this relation was established, if recorded.
	pub source: Option<String>,
	/// Creation timestamp.
	pub created_at: DateTime<Utc>,
	/// Last-update timestamp.
	pub updated_at: DateTime<Utc>,
	/// Soft-deletion timestamp, if deleted.
	pub deleted_at: Option<DateTime<Utc>>,
}

/// Disposition of a friend-apply request. Persisted as the plain `i16` discriminant in
/// [`ApplyRequest::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(i16)]
pub enum ApplyStatus {
	/// Awaiting the target's decision.
	Pending = 0,
	/// Target accepted the apply.
	Accepted = 1,
	/// Target rejected the apply.
	Rejected = 2,
}
impl TryFrom<i16> for ApplyStatus {
	type Error = Error;

	fn try_from(raw: i16) -> Result<Self> {
		match raw {
			0 => Ok(ApplyStatus::Pending),
			1 => Ok(ApplyStatus::Accepted),
			2 => Ok(ApplyStatus::Rejected),
			other => Err(Error::Internal(format!("unrecognized apply status {other}"))),
		}
	}
}

/// A friend-apply request. A pending apply may coexist with any relation state except an
/// already-accepted friend edge.
#[derive(Clone, Debug, FromRow, serde::Serialize, serde::Deserialize)]
pub struct ApplyRequest {
	/// Apply request identifier.
	pub id: i64,
	/// Kind of apply (e.g. friend request).
	pub apply_type: i16,
	/// Account that sent the apply.
	pub applicant_uuid: Uuid,
	/// Account the apply was sent to.
	pub target_uuid: Uuid,
	/// [`ApplyStatus`] discriminant.
	pub status: i16,
	/// Whether the target has seen this apply.
	pub is_read: bool,
	/// Applicant-supplied reason, if any.
	pub reason: Option<String>,
	/// How the applicant found the target, if recorded.
	pub source: Option<String>,
	/// Target-supplied remark on handling the apply, if any.
	pub handle_remark: Option<String>,
	/// Creation timestamp.
	pub created_at: DateTime<Utc>,
	/// Soft-deletion timestamp, if deleted.
	pub deleted_at: Option<DateTime<Utc>>,
}
