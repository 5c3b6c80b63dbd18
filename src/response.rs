//! The server's side of the wire contract.

use crate::ordered::OrderedMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const REDIRECT_KEY: &str = "X_WINTER_REDIRECT";
pub const ASSETS_KEY: &str = "X_WINTER_ASSETS";
pub const ERROR_MESSAGE_KEY: &str = "X_WINTER_ERROR_MESSAGE";
pub const ERROR_FIELDS_KEY: &str = "X_WINTER_ERROR_FIELDS";
pub const FLASH_MESSAGES_KEY: &str = "X_WINTER_FLASH_MESSAGES";

/// Structured payload returned by a handler, on success as well as with a `406` "smart" error.
///
/// Any key that isn't part of the reserved set lands in [`Envelope::partials`],
/// keyed by partial name or by explicit selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub result: Value,

	#[serde(default, rename = "X_WINTER_REDIRECT", skip_serializing_if = "Option::is_none")]
	pub redirect: Option<String>,

	#[serde(default, rename = "X_WINTER_ASSETS", skip_serializing_if = "Option::is_none")]
	pub assets: Option<Assets>,

	#[serde(default, rename = "X_WINTER_ERROR_MESSAGE", skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,

	#[serde(default, rename = "X_WINTER_ERROR_FIELDS", skip_serializing_if = "Option::is_none")]
	pub error_fields: Option<OrderedMap<Vec<String>>>,

	/// Severity → message.
	#[serde(default, rename = "X_WINTER_FLASH_MESSAGES", skip_serializing_if = "Option::is_none")]
	pub flash_messages: Option<OrderedMap<String>>,

	#[serde(flatten)]
	pub partials: OrderedMap<Value>,
}

impl Envelope {
	/// Parses a response body. An empty body is an empty envelope.
	///
	/// # Errors
	///
	/// Iff `body` is neither empty nor an envelope-shaped JSON object.
	pub fn from_json(body: &str) -> serde_json::Result<Self> {
		if body.trim().is_empty() {
			Ok(Self::default())
		} else {
			serde_json::from_str(body)
		}
	}

	/// Whether there are validation messages to show.
	#[must_use]
	pub fn has_error_fields(&self) -> bool {
		self.error_fields.as_ref().map_or(false, |fields| !fields.is_empty())
	}

	/// Flash messages as `(message, severity)` pairs, in payload order.
	pub fn flash_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
		self.flash_messages.iter().flat_map(|messages| messages.iter().map(|(severity, message)| (message.as_str(), severity)))
	}
}

/// Lists of script, stylesheet and image references the updated page depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
	#[serde(default)]
	pub js: Vec<String>,
	#[serde(default)]
	pub css: Vec<String>,
	#[serde(default)]
	pub img: Vec<String>,
}

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	pub status: u16,
	pub status_text: String,
	pub body: Envelope,
}
