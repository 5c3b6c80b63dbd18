use crate::error::ConfigurationError;
use core::{fmt, str::FromStr};

/// Name of a server-side handler, `[scope::]onName`.
///
/// Validated on construction, so an instance is always sendable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerName(String);

impl HandlerName {
	/// # Errors
	///
	/// [`ConfigurationError::MissingHandler`] for an empty name,
	/// [`ConfigurationError::InvalidHandler`] if `name` isn't `[scope::]onName`.
	pub fn new(name: impl Into<String>) -> Result<Self, ConfigurationError> {
		let name = name.into();
		if name.is_empty() {
			return Err(ConfigurationError::MissingHandler);
		}

		let local = match name.split_once("::") {
			Some((scope, local)) if is_word(scope) => local,
			Some(_) => return Err(ConfigurationError::InvalidHandler(name)),
			None => name.as_str(),
		};
		match local.strip_prefix("on") {
			Some(rest) if is_word(rest) => Ok(Self(name)),
			_ => Err(ConfigurationError::InvalidHandler(name)),
		}
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The component name before `::`, if any.
	#[must_use]
	pub fn scope(&self) -> Option<&str> {
		self.0.split_once("::").map(|(scope, _)| scope)
	}
}

fn is_word(s: &str) -> bool {
	!s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for HandlerName {
	type Err = ConfigurationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl fmt::Display for HandlerName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for HandlerName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
