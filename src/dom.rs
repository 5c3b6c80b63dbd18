//! The page, as far as a request lifecycle is concerned.
//!
//! [`web::WebDom`](`crate::web::WebDom`) implements this over `web-sys`.
//! Anything else (a test double, a server-side document) works as long as it keeps element identity stable.

use core::{any::Any, fmt::Debug, hash::Hash};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

/// Position for [`Dom::insert_html`], named after [***insertAdjacentHTML***](https://developer.mozilla.org/en-US/docs/Web/API/Element/insertAdjacentHTML).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
	/// Before the first child.
	AfterBegin,
	/// After the last child.
	BeforeEnd,
}

impl InsertPosition {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::AfterBegin => "afterbegin",
			Self::BeforeEnd => "beforeend",
		}
	}
}

/// A single serialized form entry.
#[derive(Clone)]
pub enum FieldValue {
	Text(String),
	/// A file or blob. The handle is whatever the [`Transport`](`crate::transport::Transport`) pairs with this [`Dom`].
	File { file_name: String, handle: Rc<dyn Any> },
}

impl Debug for FieldValue {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
			Self::File { file_name, .. } => f.debug_struct("File").field("file_name", file_name).finish_non_exhaustive(),
		}
	}
}

impl FieldValue {
	#[must_use]
	pub fn is_file(&self) -> bool {
		matches!(self, Self::File { .. })
	}
}

/// A named control inside a form, as needed to locate fields that failed server-side validation.
#[derive(Debug, Clone, PartialEq)]
pub struct FormControl<E> {
	pub element: E,
	pub name: String,
	pub disabled: bool,
}

/// Handle to a pending [`Dom::schedule`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub i32);

pub trait Dom: 'static {
	type Element: Clone + PartialEq + Debug + 'static;
	/// Stable identity of an [`Element`](`Dom::Element`), for side tables.
	type Key: Copy + Eq + Hash + Debug + 'static;

	fn key(&self, element: &Self::Element) -> Self::Key;

	/// First match of `selector` in the document.
	fn query(&self, selector: &str) -> Option<Self::Element>;

	/// The nearest `<form>`, starting with `element` itself.
	fn closest_form(&self, element: &Self::Element) -> Option<Self::Element>;

	fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

	/// Upper-case tag name.
	fn tag_name(&self, element: &Self::Element) -> String;

	/// The `value` of an input-like element (`type` is reported via [`attribute`](`Dom::attribute`)).
	fn element_value(&self, element: &Self::Element) -> Option<String>;

	fn set_inner_html(&self, element: &Self::Element, html: &str);

	fn insert_html(&self, element: &Self::Element, position: InsertPosition, html: &str);

	/// The form's successful controls, in document order.
	fn serialize_form(&self, form: &Self::Element) -> Vec<(String, FieldValue)>;

	/// Every named control of the form, in document order.
	fn form_controls(&self, form: &Self::Element) -> Vec<FormControl<Self::Element>>;

	/// Browser-side constraint validation.
	fn check_validity(&self, form: &Self::Element) -> bool;

	fn focus(&self, element: &Self::Element);

	fn set_visible(&self, element: &Self::Element, visible: bool);

	/// Native confirmation dialog.
	fn confirm(&self, message: &str) -> bool;

	/// Native alert dialog.
	fn alert(&self, message: &str);

	fn navigate(&self, url: &str);

	/// Calls `callback` on the next history pop, then forgets it.
	fn on_next_history_pop(&self, callback: Box<dyn FnOnce()>);

	/// `content` of `<meta name="{name}">`.
	fn meta_content(&self, name: &str) -> Option<String>;

	fn current_url(&self) -> String;

	/// Runs `future` to completion on the page's event loop.
	fn spawn(&self, future: LocalBoxFuture<'static, ()>);

	fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle;

	fn cancel_scheduled(&self, handle: TimerHandle);
}
