//! Browser bindings over `web-sys`.

use crate::{
	dom::{Dom, FieldValue, FormControl, InsertPosition, TimerHandle},
	error::TransportError,
	events::{Detail, EventBus, Flow, ListenerId, Notification, Target},
	request::Environment,
	response::{Envelope, Response},
	transport::{Body, CancellationToken, HttpRequest, Transport},
	trigger::{TriggerEvent, Triggers},
};
use async_trait::async_trait;
use core::cell::Cell;
use futures::future::LocalBoxFuture;
use js_sys::{Array, Object, WeakMap};
use serde_json::{json, Value};
use std::rc::Rc;
use tracing::{error, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{
	AbortController, AddEventListenerOptions, Blob, CustomEvent, CustomEventInit, Document, Element, EventTarget, File, FormData, Headers, HtmlElement,
	HtmlFormElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, KeyboardEvent, MutationObserver, MutationObserverInit, MutationRecord,
	RequestInit, Window,
};

/// The live document.
///
/// Element keys are handed out lazily and remembered in a `WeakMap`, so they don't keep elements alive.
pub struct WebDom {
	window: Window,
	document: Document,
	keys: WeakMap,
	next_key: Cell<u32>,
}

impl core::fmt::Debug for WebDom {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("WebDom").field("next_key", &self.next_key.get()).finish_non_exhaustive()
	}
}

impl WebDom {
	/// `None` outside of a browsing context.
	#[must_use]
	pub fn new() -> Option<Self> {
		let window = web_sys::window()?;
		let document = window.document()?;
		Some(Self { window, document, keys: WeakMap::new(), next_key: Cell::new(0) })
	}

	#[must_use]
	pub fn window(&self) -> &Window {
		&self.window
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}
}

impl Dom for WebDom {
	type Element = Element;
	type Key = u32;

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn key(&self, element: &Element) -> u32 {
		let object: &Object = element.as_ref();
		if let Some(key) = self.keys.get(object).as_f64() {
			return key as u32;
		}
		let key = self.next_key.get();
		self.next_key.set(key.wrapping_add(1));
		self.keys.set(object, &JsValue::from(key));
		key
	}

	fn query(&self, selector: &str) -> Option<Element> {
		match self.document.query_selector(selector) {
			Ok(element) => element,
			Err(error) => {
				error!("Invalid selector {:?}: {:?}", selector, error);
				None
			}
		}
	}

	fn closest_form(&self, element: &Element) -> Option<Element> {
		element.closest("form").ok().flatten()
	}

	fn attribute(&self, element: &Element, name: &str) -> Option<String> {
		element.get_attribute(name)
	}

	fn tag_name(&self, element: &Element) -> String {
		element.tag_name().to_ascii_uppercase()
	}

	fn element_value(&self, element: &Element) -> Option<String> {
		if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
			Some(input.value())
		} else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
			Some(select.value())
		} else {
			element.dyn_ref::<HtmlTextAreaElement>().map(HtmlTextAreaElement::value)
		}
	}

	fn set_inner_html(&self, element: &Element, html: &str) {
		element.set_inner_html(html);
	}

	fn insert_html(&self, element: &Element, position: InsertPosition, html: &str) {
		if let Err(error) = element.insert_adjacent_html(position.as_str(), html) {
			error!("Failed to insert HTML: {:?}", error);
		}
	}

	fn serialize_form(&self, form: &Element) -> Vec<(String, FieldValue)> {
		let form = match form.dyn_ref::<HtmlFormElement>() {
			Some(form) => form,
			None => {
				warn!("Bound form is not a <form>: {:?}", form);
				return Vec::new();
			}
		};
		let data = match FormData::new_with_form(form) {
			Ok(data) => data,
			Err(error) => {
				error!("Failed to read form data: {:?}", error);
				return Vec::new();
			}
		};
		let entries = match js_sys::try_iter(&data) {
			Ok(Some(entries)) => entries,
			Ok(None) | Err(_) => {
				error!("`FormData` is not iterable.");
				return Vec::new();
			}
		};

		entries
			.filter_map(|entry| {
				let entry: Array = entry.ok()?.unchecked_into();
				let name = entry.get(0).as_string()?;
				let value = entry.get(1);
				if let Some(text) = value.as_string() {
					return Some((name, FieldValue::Text(text)));
				}
				let file: File = value.dyn_into().ok()?;
				let file_name = file.name();
				Some((name, FieldValue::File { file_name, handle: Rc::new(Blob::from(file)) }))
			})
			.collect()
	}

	fn form_controls(&self, form: &Element) -> Vec<FormControl<Element>> {
		let nodes = match form.query_selector_all("[name]") {
			Ok(nodes) => nodes,
			Err(error) => {
				error!("Failed to list form controls: {:?}", error);
				return Vec::new();
			}
		};
		(0..nodes.length())
			.filter_map(|i| nodes.item(i)?.dyn_into::<Element>().ok())
			.filter_map(|element| {
				let name = element.get_attribute("name")?;
				let disabled = element.matches(":disabled").unwrap_or(false);
				Some(FormControl { element, name, disabled })
			})
			.collect()
	}

	fn check_validity(&self, form: &Element) -> bool {
		form.dyn_ref::<HtmlFormElement>().map_or(true, HtmlFormElement::report_validity)
	}

	fn focus(&self, element: &Element) {
		if let Some(element) = element.dyn_ref::<HtmlElement>() {
			if let Err(error) = element.focus() {
				warn!("Failed to focus: {:?}", error);
			}
		}
	}

	fn set_visible(&self, element: &Element, visible: bool) {
		match element.dyn_ref::<HtmlElement>() {
			Some(element) => element.set_hidden(!visible),
			None => warn!("Loading indicator is not an HTML element: {:?}", element),
		}
	}

	fn confirm(&self, message: &str) -> bool {
		self.window.confirm_with_message(message).unwrap_or_else(|error| {
			error!("`confirm` failed: {:?}", error);
			false
		})
	}

	fn alert(&self, message: &str) {
		if let Err(error) = self.window.alert_with_message(message) {
			error!("`alert` failed: {:?}", error);
		}
	}

	fn navigate(&self, url: &str) {
		if let Err(error) = self.window.location().set_href(url) {
			error!("Failed to navigate to {:?}: {:?}", url, error);
		}
	}

	fn on_next_history_pop(&self, callback: Box<dyn FnOnce()>) {
		let options = AddEventListenerOptions::new();
		options.set_once(true);
		let listener = Closure::once_into_js(move || callback());
		if let Err(error) = self.window.add_event_listener_with_callback_and_add_event_listener_options("popstate", listener.unchecked_ref(), &options) {
			error!("Failed to listen for `popstate`: {:?}", error);
		}
	}

	fn meta_content(&self, name: &str) -> Option<String> {
		self.query(&format!("meta[name=\"{}\"]", name))?.get_attribute("content")
	}

	fn current_url(&self) -> String {
		self.window.location().href().unwrap_or_else(|error| {
			error!("Failed to read the current URL: {:?}", error);
			String::new()
		})
	}

	fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
		wasm_bindgen_futures::spawn_local(future);
	}

	fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
		// Leaks if cleared before it fires.
		let callback = Closure::once_into_js(move || callback());
		let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
		match self.window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay) {
			Ok(handle) => TimerHandle(handle),
			Err(error) => {
				error!("`setTimeout` failed: {:?}", error);
				TimerHandle(-1)
			}
		}
	}

	fn cancel_scheduled(&self, handle: TimerHandle) {
		self.window.clear_timeout_with_handle(handle.0);
	}
}

/// `fetch`-based [`Transport`]. Cancellation aborts the native request.
#[derive(Debug, Clone)]
pub struct FetchTransport {
	window: Window,
}

impl FetchTransport {
	#[must_use]
	pub fn new(window: Window) -> Self {
		Self { window }
	}
}

fn network_error(error: JsValue) -> TransportError {
	TransportError::Network(error.as_string().unwrap_or_else(|| format!("{:?}", error)))
}

#[async_trait(?Send)]
impl Transport for FetchTransport {
	#[instrument(skip(self, request, cancellation), fields(url = %request.url))]
	async fn request(&self, request: HttpRequest, cancellation: CancellationToken) -> Result<Response, TransportError> {
		let controller = AbortController::new().map_err(network_error)?;
		{
			let controller = controller.clone();
			cancellation.on_cancel(move || controller.abort());
		}

		let headers = Headers::new().map_err(network_error)?;
		for (name, value) in &request.headers {
			headers.set(name, value).map_err(network_error)?;
		}
		if let Some(content_type) = request.body.content_type() {
			headers.set("Content-Type", content_type).map_err(network_error)?;
		}

		let body: JsValue = match request.body {
			Body::UrlEncoded(text) | Body::Json(text) => JsValue::from_str(&text),
			Body::Multipart(fields) => {
				let form_data = FormData::new().map_err(network_error)?;
				for (name, value) in fields {
					match value {
						FieldValue::Text(text) => form_data.append_with_str(&name, &text).map_err(network_error)?,
						FieldValue::File { file_name, handle } => match handle.downcast_ref::<Blob>() {
							Some(blob) => form_data.append_with_blob_and_filename(&name, blob, &file_name).map_err(network_error)?,
							None => warn!(name, "File handle is not a `Blob`. Skipping."),
						},
					}
				}
				form_data.into()
			}
		};

		let init = RequestInit::new();
		init.set_method(request.method);
		init.set_headers(&headers);
		init.set_body(&body);
		init.set_signal(Some(&controller.signal()));

		let response: web_sys::Response = JsFuture::from(self.window.fetch_with_str_and_init(&request.url, &init))
			.await
			.map_err(|error| if cancellation.is_cancelled() { TransportError::Cancelled } else { network_error(error) })?
			.unchecked_into();
		let text = JsFuture::from(response.text().map_err(network_error)?)
			.await
			.map_err(network_error)?
			.as_string()
			.unwrap_or_default();

		let status = response.status();
		let status_text = response.status_text();
		trace!(status, "Received response.");
		if response.ok() {
			let body = Envelope::from_json(&text).map_err(|error| TransportError::Network(format!("Malformed response body: {}", error)))?;
			Ok(Response { status, status_text, body })
		} else {
			let body = if text.trim().is_empty() { None } else { Envelope::from_json(&text).ok() };
			Err(TransportError::Status { status, status_text, body })
		}
	}
}

/// A ready-to-use environment for the current page.
#[must_use]
pub fn environment() -> Option<Environment<WebDom>> {
	let dom = WebDom::new()?;
	let transport = FetchTransport::new(dom.window().clone());
	Some(Environment::new(Rc::new(dom), Rc::new(transport)))
}

fn detail_json(notification: &Notification<WebDom>) -> Value {
	let handler = notification.handler().as_str();
	match &notification.detail {
		Detail::None => json!({ "handler": handler }),
		Detail::Response(envelope) => json!({ "handler": handler, "data": &**envelope }),
		Detail::Error(error) => {
			let status = match error {
				TransportError::Status { status, .. } => Some(*status),
				TransportError::Network(_) | TransportError::Cancelled => None,
			};
			json!({ "handler": handler, "status": status, "message": error.status_text(), "data": error.smart_body() })
		}
		Detail::Message(message) => json!({ "handler": handler, "message": message }),
		Detail::Flash { message, severity } => json!({ "handler": handler, "message": message, "type": severity }),
		Detail::Fragment { selector, html } => json!({ "handler": handler, "selector": selector, "html": html }),
		Detail::Fields(fields) => json!({ "handler": handler, "fields": fields }),
		Detail::InvalidField { name, messages, .. } => json!({ "handler": handler, "fieldName": name, "errorMsg": messages }),
		Detail::Url(url) => json!({ "handler": handler, "url": url }),
	}
}

/// Re-dispatches every notification of `bus` as a bubbling, cancelable `CustomEvent`.
///
/// `preventDefault()` in a page script cancels the notification.
pub fn forward_notifications(bus: &EventBus<WebDom>, dom: Rc<WebDom>) -> ListenerId {
	bus.on_any(move |notification| {
		let init = CustomEventInit::new();
		init.set_bubbles(true);
		init.set_cancelable(true);
		match js_sys::JSON::parse(&detail_json(notification).to_string()) {
			Ok(detail) => init.set_detail(&detail),
			Err(error) => error!("Failed to convert notification detail: {:?}", error),
		}

		let event = match CustomEvent::new_with_event_init_dict(notification.kind.event_name(), &init) {
			Ok(event) => event,
			Err(error) => {
				error!("Failed to create `CustomEvent`: {:?}", error);
				return Flow::Continue;
			}
		};
		let target: &EventTarget = match &notification.target {
			Target::Element(element) => element.as_ref(),
			Target::Window => dom.window().as_ref(),
		};
		match target.dispatch_event(&event) {
			Ok(proceed) => Flow::from(proceed),
			Err(error) => {
				error!("Failed to dispatch {:?}: {:?}", notification.kind.event_name(), error);
				Flow::Continue
			}
		}
	})
}

const CLICK_SELECTOR: &str = "a[data-request], button[data-request], input[type=button][data-request], input[type=submit][data-request], input[type=image][data-request]";

/// Document-level listeners feeding [`Triggers`]. Removed on drop.
pub struct DocumentBinding {
	document: Document,
	listeners: Vec<(&'static str, Closure<dyn Fn(web_sys::Event)>)>,
	removals: Option<(MutationObserver, Closure<dyn Fn(Array)>)>,
}

impl core::fmt::Debug for DocumentBinding {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_list().entries(self.listeners.iter().map(|(name, _)| name)).finish()
	}
}

impl DocumentBinding {
	#[must_use]
	pub fn install(triggers: &Rc<Triggers<WebDom>>) -> Self {
		let document = triggers.environment().dom.document().clone();
		let mut listeners = Vec::new();
		for name in ["click", "submit", "change", "keydown", "keyup", "input"] {
			let triggers = Rc::clone(triggers);
			let listener = Closure::wrap(Box::new(move |event: web_sys::Event| on_event(&triggers, name, &event)) as Box<dyn Fn(web_sys::Event)>);
			if let Err(error) = document.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref()) {
				error!("Failed to listen for {:?}: {:?}", name, error);
				continue;
			}
			listeners.push((name, listener));
		}
		trace!("Installed {} document listener(s).", listeners.len());
		let removals = observe_removals(triggers, &document);
		Self { document, listeners, removals }
	}
}

/// Forgets trigger state of track-input elements once they leave the document.
fn observe_removals(triggers: &Rc<Triggers<WebDom>>, document: &Document) -> Option<(MutationObserver, Closure<dyn Fn(Array)>)> {
	let triggers = Rc::clone(triggers);
	let callback = Closure::wrap(Box::new(move |records: Array| {
		for record in records.iter().filter_map(|record| record.dyn_into::<MutationRecord>().ok()) {
			let removed = record.removed_nodes();
			for node in (0..removed.length()).filter_map(|i| removed.get(i)) {
				if node.is_connected() {
					// Moved, not removed.
					continue;
				}
				if let Ok(element) = node.dyn_into::<Element>() {
					forget_subtree(&triggers, &element);
				}
			}
		}
	}) as Box<dyn Fn(Array)>);

	let observer = match MutationObserver::new(callback.as_ref().unchecked_ref()) {
		Ok(observer) => observer,
		Err(error) => {
			error!("Failed to create removal observer: {:?}", error);
			return None;
		}
	};
	let init = MutationObserverInit::new();
	init.set_child_list(true);
	init.set_subtree(true);
	if let Err(error) = observer.observe_with_options(document, &init) {
		error!("Failed to observe removals: {:?}", error);
		return None;
	}
	Some((observer, callback))
}

fn forget_subtree(triggers: &Triggers<WebDom>, element: &Element) {
	if element.has_attribute("data-track-input") {
		triggers.forget(element);
	}
	let descendants = match element.query_selector_all("[data-track-input]") {
		Ok(descendants) => descendants,
		Err(error) => {
			error!("Failed to query removed subtree: {:?}", error);
			return;
		}
	};
	for descendant in (0..descendants.length()).filter_map(|i| descendants.get(i)).filter_map(|node| node.dyn_into::<Element>().ok()) {
		triggers.forget(&descendant);
	}
}

impl Drop for DocumentBinding {
	fn drop(&mut self) {
		if let Some((observer, _callback)) = self.removals.take() {
			observer.disconnect();
		}
		for (name, listener) in self.listeners.drain(..) {
			if let Err(error) = self.document.remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref()) {
				error!("Failed to remove {:?} listener: {:?}", name, error);
			}
		}
	}
}

fn on_event(triggers: &Rc<Triggers<WebDom>>, name: &str, event: &web_sys::Event) {
	let target = match event.target().and_then(|target| target.dyn_into::<Element>().ok()) {
		Some(target) => target,
		None => return,
	};
	let key = || event.dyn_ref::<KeyboardEvent>().map(KeyboardEvent::key).unwrap_or_default();
	let (trigger, element) = match name {
		"click" => match target.closest(CLICK_SELECTOR).ok().flatten() {
			Some(element) => (TriggerEvent::Click, element),
			None => return,
		},
		"submit" => (TriggerEvent::Submit, target),
		"change" => (TriggerEvent::Change, target),
		"keydown" => (TriggerEvent::KeyDown { key: key() }, target),
		"keyup" => (TriggerEvent::KeyUp { key: key() }, target),
		"input" => (TriggerEvent::Input, target),
		_ => return,
	};

	match triggers.dispatch(trigger, &element) {
		Ok(dispatch) => {
			if dispatch.prevents_default() {
				event.prevent_default();
			}
		}
		Err(error) => error!("{}", error),
	}
}
