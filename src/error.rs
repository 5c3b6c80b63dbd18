//! Error taxonomy.
//!
//! Only [`Error`] ever reaches a caller of [`Request::send`](`crate::Request::send`).
//! [`TransportError`]s are absorbed by the lifecycle's failure path and surface through
//! notifications and hooks instead.

use crate::response::Envelope;
use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
	/// The lifecycle instance could not be constructed.
	#[error(transparent)]
	Configuration(#[from] ConfigurationError),

	/// The bound form failed the browser's constraint validation.
	///
	/// Raised before any transport call is made.
	#[error("Browser-side form validation failed")]
	ValidationFailed,

	/// [`Request::send`](`crate::Request::send`) was called on an instance that is running or already went through a transport call.
	#[error("The request is running or was already sent")]
	AlreadySent,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
	#[error("No handler name was given")]
	MissingHandler,

	#[error("Invalid handler name {0:?}: expected `[scope::]onName`")]
	InvalidHandler(String),

	#[error("Could not parse `{attribute}`: {reason}")]
	InvalidAttribute {
		attribute: &'static str,
		reason: String,
	},
}

/// Failure reported by a [`Transport`](`crate::transport::Transport`).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
	/// A non-2xx response.
	///
	/// `body` is present if the response carried a parseable envelope,
	/// which is what makes a `406` a "smart" error.
	#[error("HTTP {status} {status_text}")]
	Status {
		status: u16,
		status_text: String,
		body: Option<Envelope>,
	},

	#[error("Network error: {0}")]
	Network(String),

	/// The lifecycle was cancelled while (or before) the transport call was in flight.
	#[error("The request was cancelled")]
	Cancelled,
}

impl TransportError {
	/// The structured body of a `406 Not Acceptable` response, if this is one.
	#[must_use]
	pub fn smart_body(&self) -> Option<&Envelope> {
		match self {
			Self::Status { status: 406, body: Some(body), .. } => Some(body),
			_ => None,
		}
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}

	/// What the failure path shows to the user in absence of a server-provided message.
	#[must_use]
	pub fn status_text(&self) -> String {
		match self {
			Self::Status { status_text, .. } => status_text.clone(),
			Self::Network(message) => message.clone(),
			Self::Cancelled => self.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_406_with_body_is_smart() {
		let body = Envelope::default();
		let smart = TransportError::Status { status: 406, status_text: "Not Acceptable".into(), body: Some(body.clone()) };
		assert!(smart.smart_body().is_some());

		let plain = TransportError::Status { status: 500, status_text: "Internal Server Error".into(), body: Some(body) };
		assert!(plain.smart_body().is_none());

		let bodiless = TransportError::Status { status: 406, status_text: "Not Acceptable".into(), body: None };
		assert!(bodiless.smart_body().is_none());
	}

	#[test]
	fn status_text_falls_back_to_display() {
		assert_eq!(TransportError::Network("offline".into()).status_text(), "offline");
		assert_eq!(TransportError::Cancelled.status_text(), "The request was cancelled");
	}
}
