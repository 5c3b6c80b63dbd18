//! Configuration layers and their resolution.
//!
//! Three layers are merged, lowest precedence first:
//! built-in (and application) defaults, the triggering element's `data-request-*` attributes,
//! and options passed explicitly by the caller.
//! Maps merge key-wise (`data` deeply), everything else is overwritten by the higher layer.

use crate::{dom::Dom, error::ConfigurationError, handler::HandlerName, hooks::Hooks, literal, ordered::OrderedMap};
use serde_json::{Map, Value};
use tracing::trace;

/// Debounce used by `data-track-input` without an explicit interval.
pub const DEFAULT_TRACK_INPUT_MS: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
	/// Run the confirm hook without a message. The default hook lets the request proceed.
	Absent,
	/// Skip confirmation altogether.
	Disabled,
	Message(String),
}

/// An element, either already in hand or still to be looked up.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementRef<E> {
	Selector(String),
	Element(E),
}

impl<E: Clone> ElementRef<E> {
	pub fn resolve<D: Dom<Element = E>>(&self, dom: &D) -> Option<E> {
		match self {
			Self::Selector(selector) => dom.query(selector),
			Self::Element(element) => Some(element.clone()),
		}
	}
}

/// Where form fields come from. Leaving this unset picks the nearest enclosing form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormRef<E> {
	/// No form, and no automatic lookup either.
	Detached,
	Selector(String),
	Element(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackInput {
	Disabled,
	Debounce { ms: u32 },
}

impl TrackInput {
	/// Interprets a `data-track-input` attribute value.
	#[must_use]
	pub fn from_attribute(value: &str) -> Self {
		let value = value.trim();
		if value.is_empty() || parse_bool(value) {
			Self::Debounce { ms: DEFAULT_TRACK_INPUT_MS }
		} else if let Ok(ms) = value.parse() {
			Self::Debounce { ms }
		} else {
			Self::Disabled
		}
	}
}

/// `"true"` (any case) and `"1"` are true, anything else is false.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
	let value = value.trim();
	value.eq_ignore_ascii_case("true") || value == "1"
}

/// One configuration layer. Unset fields defer to lower layers.
pub struct Options<D: Dom> {
	pub handler: Option<String>,
	pub url: Option<String>,
	pub confirm: Option<Confirm>,
	/// Extra payload data.
	pub data: Option<Map<String, Value>>,
	/// Where to go after a successful response.
	pub redirect: Option<String>,
	/// Partial name → selector (optionally prefixed with `^` or `@`).
	pub update: Option<OrderedMap<String>>,
	pub flash: Option<bool>,
	pub files: Option<bool>,
	pub json: Option<bool>,
	pub browser_validate: Option<bool>,
	pub form: Option<FormRef<D::Element>>,
	pub loading: Option<ElementRef<D::Element>>,
	pub track_input: Option<TrackInput>,
	pub hooks: Hooks<D>,
}

impl<D: Dom> Default for Options<D> {
	fn default() -> Self {
		Self {
			handler: None,
			url: None,
			confirm: None,
			data: None,
			redirect: None,
			update: None,
			flash: None,
			files: None,
			json: None,
			browser_validate: None,
			form: None,
			loading: None,
			track_input: None,
			hooks: Hooks::default(),
		}
	}
}

impl<D: Dom> Clone for Options<D> {
	fn clone(&self) -> Self {
		Self {
			handler: self.handler.clone(),
			url: self.url.clone(),
			confirm: self.confirm.clone(),
			data: self.data.clone(),
			redirect: self.redirect.clone(),
			update: self.update.clone(),
			flash: self.flash,
			files: self.files,
			json: self.json,
			browser_validate: self.browser_validate,
			form: self.form.clone(),
			loading: self.loading.clone(),
			track_input: self.track_input,
			hooks: self.hooks.clone(),
		}
	}
}

impl<D: Dom> core::fmt::Debug for Options<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Options")
			.field("handler", &self.handler)
			.field("url", &self.url)
			.field("confirm", &self.confirm)
			.field("data", &self.data.as_ref().map(Map::len))
			.field("redirect", &self.redirect)
			.field("update", &self.update)
			.field("flash", &self.flash)
			.field("files", &self.files)
			.field("json", &self.json)
			.field("browser_validate", &self.browser_validate)
			.field("form", &self.form)
			.field("loading", &self.loading)
			.field("track_input", &self.track_input)
			.field("hooks", &self.hooks)
			.finish()
	}
}

impl<D: Dom> Options<D> {
	/// The built-in defaults: no confirmation message, url-encoded payload, no flash, no files.
	#[must_use]
	pub fn builtin() -> Self {
		Self {
			confirm: Some(Confirm::Absent),
			data: Some(Map::new()),
			update: Some(OrderedMap::new()),
			flash: Some(false),
			files: Some(false),
			json: Some(false),
			browser_validate: Some(false),
			track_input: Some(TrackInput::Disabled),
			..Self::default()
		}
	}

	/// Shorthand for an explicit layer naming just the handler.
	#[must_use]
	pub fn for_handler(handler: impl Into<String>) -> Self {
		Self { handler: Some(handler.into()), ..Self::default() }
	}

	/// Reads the `data-request*` attributes of `element`.
	///
	/// # Errors
	///
	/// [`ConfigurationError::InvalidAttribute`] if `data-request-data` or `data-request-update` don't parse.
	pub fn from_element(dom: &D, element: &D::Element) -> Result<Self, ConfigurationError> {
		let attribute = |name: &str| dom.attribute(element, name);
		let flag = |name: &str| attribute(name).map(|value| parse_bool(&value));

		let data = attribute("data-request-data")
			.map(|source| literal::parse_object(&source))
			.transpose()
			.map_err(|error| ConfigurationError::InvalidAttribute { attribute: "data-request-data", reason: error.to_string() })?;

		let update = attribute("data-request-update")
			.map(|source| parse_update_map(&source))
			.transpose()
			.map_err(|reason| ConfigurationError::InvalidAttribute { attribute: "data-request-update", reason })?;

		let options = Self {
			handler: attribute("data-request").filter(|handler| !handler.is_empty()),
			url: attribute("data-request-url"),
			confirm: attribute("data-request-confirm").filter(|message| !message.is_empty()).map(Confirm::Message),
			data,
			redirect: attribute("data-request-redirect"),
			update,
			flash: flag("data-request-flash"),
			files: flag("data-request-files"),
			json: flag("data-request-json"),
			browser_validate: flag("data-request-browser-validate"),
			form: attribute("data-request-form").map(FormRef::Selector),
			loading: attribute("data-request-loading").map(ElementRef::Selector),
			track_input: attribute("data-track-input").map(|value| TrackInput::from_attribute(&value)),
			hooks: Hooks::default(),
		};
		trace!(?options, "Read element layer.");
		Ok(options)
	}

	/// Layers `higher` over `self`.
	#[must_use]
	pub fn merge(self, higher: Self) -> Self {
		Self {
			handler: higher.handler.or(self.handler),
			url: higher.url.or(self.url),
			confirm: higher.confirm.or(self.confirm),
			data: match (self.data, higher.data) {
				(Some(mut lower), Some(higher)) => {
					deep_merge(&mut lower, higher);
					Some(lower)
				}
				(lower, higher) => higher.or(lower),
			},
			redirect: higher.redirect.or(self.redirect),
			update: match (self.update, higher.update) {
				(Some(mut lower), Some(higher)) => {
					lower.merge(higher);
					Some(lower)
				}
				(lower, higher) => higher.or(lower),
			},
			flash: higher.flash.or(self.flash),
			files: higher.files.or(self.files),
			json: higher.json.or(self.json),
			browser_validate: higher.browser_validate.or(self.browser_validate),
			form: higher.form.or(self.form),
			loading: higher.loading.or(self.loading),
			track_input: higher.track_input.or(self.track_input),
			hooks: self.hooks.merge(higher.hooks),
		}
	}
}

fn parse_update_map(source: &str) -> Result<OrderedMap<String>, String> {
	literal::parse_object(source)
		.map_err(|error| error.to_string())?
		.into_iter()
		.map(|(name, selector)| match selector {
			Value::String(selector) => Ok((name, selector)),
			other => Err(format!("Expected a selector string for partial {:?}, found {}", name, other)),
		})
		.collect()
}

/// Recursively merges `higher` into `lower`. Objects merge key-wise; anything else is replaced.
pub fn deep_merge(lower: &mut Map<String, Value>, higher: Map<String, Value>) {
	for (key, value) in higher {
		match (lower.get_mut(&key), value) {
			(Some(Value::Object(lower)), Value::Object(higher)) => deep_merge(lower, higher),
			(_, value) => {
				lower.insert(key, value);
			}
		}
	}
}

/// The effective configuration of one lifecycle instance.
///
/// Owned by that instance: changing it never affects defaults or other instances.
pub struct Config<D: Dom> {
	pub handler: HandlerName,
	pub url: Option<String>,
	pub confirm: Confirm,
	pub data: Map<String, Value>,
	pub redirect: Option<String>,
	pub update: OrderedMap<String>,
	pub flash: bool,
	pub files: bool,
	pub json: bool,
	pub browser_validate: bool,
	/// `None` means "the nearest enclosing form of the triggering element".
	pub form: Option<FormRef<D::Element>>,
	pub loading: Option<ElementRef<D::Element>>,
	pub track_input: TrackInput,
	pub hooks: Hooks<D>,
}

impl<D: Dom> Clone for Config<D> {
	fn clone(&self) -> Self {
		Self {
			handler: self.handler.clone(),
			url: self.url.clone(),
			confirm: self.confirm.clone(),
			data: self.data.clone(),
			redirect: self.redirect.clone(),
			update: self.update.clone(),
			flash: self.flash,
			files: self.files,
			json: self.json,
			browser_validate: self.browser_validate,
			form: self.form.clone(),
			loading: self.loading.clone(),
			track_input: self.track_input,
			hooks: self.hooks.clone(),
		}
	}
}

impl<D: Dom> core::fmt::Debug for Config<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Config")
			.field("handler", &self.handler)
			.field("url", &self.url)
			.field("confirm", &self.confirm)
			.field("redirect", &self.redirect)
			.field("update", &self.update)
			.field("flash", &self.flash)
			.field("files", &self.files)
			.field("json", &self.json)
			.field("browser_validate", &self.browser_validate)
			.field("form", &self.form)
			.field("loading", &self.loading)
			.field("track_input", &self.track_input)
			.field("hooks", &self.hooks)
			.finish_non_exhaustive()
	}
}

impl<D: Dom> Config<D> {
	/// Merges `defaults`, then `element`, then `explicit`.
	///
	/// # Errors
	///
	/// Iff the merged handler name is missing or malformed.
	pub fn resolve(defaults: &Options<D>, element: Option<Options<D>>, explicit: Options<D>) -> Result<Self, ConfigurationError> {
		let mut merged = defaults.clone();
		if let Some(element) = element {
			merged = merged.merge(element);
		}
		let merged = merged.merge(explicit);

		let handler = HandlerName::new(merged.handler.unwrap_or_default())?;
		Ok(Self {
			handler,
			url: merged.url,
			confirm: merged.confirm.unwrap_or(Confirm::Absent),
			data: merged.data.unwrap_or_default(),
			redirect: merged.redirect,
			update: merged.update.unwrap_or_default(),
			flash: merged.flash.unwrap_or(false),
			files: merged.files.unwrap_or(false),
			json: merged.json.unwrap_or(false),
			browser_validate: merged.browser_validate.unwrap_or(false),
			form: merged.form,
			loading: merged.loading,
			track_input: merged.track_input.unwrap_or(TrackInput::Disabled),
			hooks: merged.hooks,
		})
	}

	/// Finds the bound form, see [`FormRef`].
	pub fn resolve_form(&self, dom: &D, element: Option<&D::Element>) -> Option<D::Element> {
		match &self.form {
			None => element.and_then(|element| dom.closest_form(element)),
			Some(FormRef::Detached) => None,
			Some(FormRef::Selector(selector)) => dom.query(selector),
			Some(FormRef::Element(form)) => Some(form.clone()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::{deep_merge, parse_bool, parse_update_map, TrackInput, DEFAULT_TRACK_INPUT_MS};
	use serde_json::json;

	#[test]
	fn booleans() {
		for truthy in ["true", "TRUE", "True", "1", " true "] {
			assert!(parse_bool(truthy), "{}", truthy);
		}
		for falsy in ["", "false", "0", "yes", "on", "2"] {
			assert!(!parse_bool(falsy), "{}", falsy);
		}
	}

	#[test]
	fn track_input_attribute() {
		assert_eq!(TrackInput::from_attribute(""), TrackInput::Debounce { ms: DEFAULT_TRACK_INPUT_MS });
		assert_eq!(TrackInput::from_attribute("true"), TrackInput::Debounce { ms: DEFAULT_TRACK_INPUT_MS });
		assert_eq!(TrackInput::from_attribute("500"), TrackInput::Debounce { ms: 500 });
		assert_eq!(TrackInput::from_attribute("false"), TrackInput::Disabled);
	}

	#[test]
	fn deep_merge_is_key_wise_for_objects_only() {
		let mut lower = json!({"a": {"x": 1, "y": 2}, "b": [1, 2], "c": "keep"}).as_object().unwrap().clone();
		let higher = json!({"a": {"y": 3, "z": 4}, "b": [3]}).as_object().unwrap().clone();
		deep_merge(&mut lower, higher);
		assert_eq!(serde_json::Value::Object(lower), json!({"a": {"x": 1, "y": 3, "z": 4}, "b": [3], "c": "keep"}));
	}

	#[test]
	fn update_map_rejects_non_strings() {
		let map = parse_update_map("first: '#a', second: '@#b'").unwrap();
		assert_eq!(map.keys().collect::<Vec<_>>(), ["first", "second"]);
		assert!(parse_update_map("first: true").is_err());
	}
}
