//! The WebSocket wire frame (§6 "WebSocket ingress").

// crates.io
use serde::{Deserialize, Serialize};

/// Invalid JSON could not be parsed as an [`Envelope`] at all.
pub const CODE_INVALID_FRAME: i32 = 10001;
/// The envelope parsed but `type` was not recognized.
pub const CODE_UNSUPPORTED_TYPE: i32 = 10002;

/// `{"type": "<kind>", "data": {...}}`, the one shape every inbound and outbound frame takes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
	/// Frame kind: `heartbeat`, `heartbeat_ack`, `message`, `message_ack`, `error`.
	#[serde(rename = "type")]
	pub kind: String,
	/// Kind-specific payload.
	#[serde(default)]
	pub data: serde_json::Value,
}
impl Envelope {
	/// Build a frame of the given kind with no payload.
	pub fn empty(kind: &str) -> Self {
		Self { kind: kind.to_owned(), data: serde_json::Value::Null }
	}

	/// Build an `error` frame for `{code, message}`.
	pub fn error(code: i32, message: impl Into<String>) -> Self {
		Self {
			kind: "error".to_owned(),
			data: serde_json::json!({ "code": code, "message": message.into() }),
		}
	}

	/// Serialize to the wire text representation. Infallible for any value this module produces.
	pub fn to_text(&self) -> String {
		serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error","data":{"code":10001}}"#.to_owned())
	}

	/// Parse an inbound frame, yielding the `invalid frame format` error frame on failure.
	pub fn from_text(text: &str) -> Result<Self, Envelope> {
		serde_json::from_str(text).map_err(|_| Envelope::error(CODE_INVALID_FRAME, "invalid frame format"))
	}
}
