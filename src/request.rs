//! The request lifecycle.
//!
//! ```text
//! idle → confirming → setting-up → sending → succeeding ─┐
//!   ▲        │             │              └→ failing ────┤
//!   │        └── declined  └── invalid form              ▼
//!   └──────────────────────────────────────────── completing
//! ```
//!
//! Each step goes through its [hook](`crate::hooks`) if one is configured, and through the matching
//! `default_*` method otherwise. Hooks of one instance never overlap.

use crate::{
	config::{Config, Confirm, Options},
	dom::Dom,
	error::{Error, Result, TransportError},
	events::{Detail, EventBus, Kind, Notification, Target},
	handler::HandlerName,
	hooks::{FlashMessage, Outcome},
	ordered::OrderedMap,
	partials,
	payload::{self, Payload},
	response::{Assets, Envelope, Response},
	transport::{CancellationToken, HttpRequest, Transport, METHOD},
	validation,
};
use core::cell::{Cell, RefCell};
use futures::future::{AbortRegistration, Abortable};
use serde_json::{Map, Value};
use std::rc::Rc;
use tracing::{debug, instrument, trace, warn};

/// Everything a lifecycle instance needs from its surroundings.
pub struct Environment<D: Dom> {
	pub dom: Rc<D>,
	pub transport: Rc<dyn Transport>,
	pub bus: Rc<EventBus<D>>,
	/// Built-in defaults with application-wide defaults layered over them.
	pub defaults: Rc<Options<D>>,
}

impl<D: Dom> Clone for Environment<D> {
	fn clone(&self) -> Self {
		Self {
			dom: Rc::clone(&self.dom),
			transport: Rc::clone(&self.transport),
			bus: Rc::clone(&self.bus),
			defaults: Rc::clone(&self.defaults),
		}
	}
}

impl<D: Dom> core::fmt::Debug for Environment<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Environment").field("bus", &self.bus).field("defaults", &self.defaults).finish_non_exhaustive()
	}
}

impl<D: Dom> Environment<D> {
	#[must_use]
	pub fn new(dom: Rc<D>, transport: Rc<dyn Transport>) -> Self {
		Self {
			dom,
			transport,
			bus: Rc::new(EventBus::new()),
			defaults: Rc::new(Options::builtin()),
		}
	}

	/// Layers application-wide defaults over the built-in ones.
	#[must_use]
	pub fn with_defaults(mut self, defaults: Options<D>) -> Self {
		self.defaults = Rc::new(Options::builtin().merge(defaults));
		self
	}

	/// See [`Request::new`].
	///
	/// # Errors
	///
	/// See [`Request::new`].
	pub fn request(&self, element: Option<D::Element>, options: Options<D>) -> Result<Request<D>> {
		Request::new(self, element, options)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	Idle,
	Confirming,
	SettingUp,
	Sending,
	Succeeding,
	Failing,
	Completing,
}

/// One lifecycle instance. Cloning yields another handle to the same instance.
pub struct Request<D: Dom> {
	inner: Rc<Inner<D>>,
}

struct Inner<D: Dom> {
	env: Environment<D>,
	config: Config<D>,
	element: Option<D::Element>,
	form: Option<D::Element>,
	loading: Option<D::Element>,
	state: Cell<State>,
	cancellation: CancellationToken,
	registration: RefCell<Option<AbortRegistration>>,
}

impl<D: Dom> Clone for Request<D> {
	fn clone(&self) -> Self {
		Self { inner: Rc::clone(&self.inner) }
	}
}

impl<D: Dom> PartialEq for Request<D> {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl<D: Dom> core::fmt::Debug for Request<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Request")
			.field("handler", self.handler())
			.field("state", &self.state())
			.field("element", &self.inner.element)
			.field("form", &self.inner.form)
			.finish_non_exhaustive()
	}
}

impl<D: Dom> Request<D> {
	/// Resolves the configuration for `element` (if any) and `options`, and binds form and loading indicator.
	///
	/// The handler name comes from `options.handler` or the element's `data-request` attribute.
	///
	/// # Errors
	///
	/// [`Error::Configuration`] if the handler name is missing or malformed, or an attribute literal doesn't parse.
	#[instrument(skip(env, options))]
	pub fn new(env: &Environment<D>, element: Option<D::Element>, options: Options<D>) -> Result<Self> {
		let dom = &*env.dom;
		let element_layer = element.as_ref().map(|element| Options::from_element(dom, element)).transpose()?;
		let config = Config::resolve(&env.defaults, element_layer, options)?;

		let form = config.resolve_form(dom, element.as_ref());
		let loading = config.loading.as_ref().and_then(|loading| {
			let resolved = loading.resolve(dom);
			if resolved.is_none() {
				warn!(?loading, "Loading indicator not found.");
			}
			resolved
		});
		trace!(?config, ?form, "Resolved configuration.");

		let (cancellation, registration) = CancellationToken::new();
		Ok(Self {
			inner: Rc::new(Inner {
				env: env.clone(),
				config,
				element,
				form,
				loading,
				state: Cell::new(State::Idle),
				cancellation,
				registration: RefCell::new(Some(registration)),
			}),
		})
	}

	#[must_use]
	pub fn handler(&self) -> &HandlerName {
		&self.inner.config.handler
	}

	#[must_use]
	pub fn config(&self) -> &Config<D> {
		&self.inner.config
	}

	#[must_use]
	pub fn dom(&self) -> &D {
		&self.inner.env.dom
	}

	#[must_use]
	pub fn bus(&self) -> &EventBus<D> {
		&self.inner.env.bus
	}

	#[must_use]
	pub fn element(&self) -> Option<&D::Element> {
		self.inner.element.as_ref()
	}

	#[must_use]
	pub fn form(&self) -> Option<&D::Element> {
		self.inner.form.as_ref()
	}

	#[must_use]
	pub fn loading(&self) -> Option<&D::Element> {
		self.inner.loading.as_ref()
	}

	#[must_use]
	pub fn state(&self) -> State {
		self.inner.state.get()
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.inner.cancellation.is_cancelled()
	}

	/// Cancels the transport call, which then fails with [`TransportError::Cancelled`].
	///
	/// Before [`send`](`Request::send`) this makes the eventual transport call fail right away.
	/// After completion it does nothing.
	pub fn cancel(&self) {
		if self.state() == State::Idle && self.inner.registration.borrow().is_none() {
			trace!(handler = %self.handler(), "Cancel after completion ignored.");
			return;
		}
		debug!(handler = %self.handler(), state = ?self.state(), "Cancelling.");
		self.inner.cancellation.cancel();
	}

	/// The triggering element, or window.
	#[must_use]
	pub fn trigger_target(&self) -> Target<D::Element> {
		self.element().map_or(Target::Window, |element| Target::Element(element.clone()))
	}

	/// The bound form, else the triggering element, else window.
	#[must_use]
	pub fn event_target(&self) -> Target<D::Element> {
		self.form().or_else(|| self.element()).map_or(Target::Window, |element| Target::Element(element.clone()))
	}

	/// Dispatches a notification with this instance as context. Returns `false` iff canceled.
	pub fn notify(&self, kind: Kind, target: Target<D::Element>, detail: Detail<D::Element>) -> bool {
		self.bus().dispatch(&Notification::new(kind, target, self.clone(), detail))
	}

	fn transition(&self, state: State) {
		trace!(handler = %self.handler(), from = ?self.state(), to = ?state, "Transition.");
		self.inner.state.set(state);
	}

	fn show_loading(&self, visible: bool) {
		if let Some(loading) = self.loading() {
			self.dom().set_visible(loading, visible);
		}
	}

	/// Runs the lifecycle once.
	///
	/// Resolves to the response on success and to `None` if confirmation was declined,
	/// `before-request` was canceled, or the transport call failed (failures are handled by the failure path).
	///
	/// # Errors
	///
	/// - [`Error::ValidationFailed`] if browser-side validation is enabled and the bound form is invalid.
	///   Nothing is sent and no completion notifications fire.
	/// - [`Error::AlreadySent`] if this instance is running or has already been sent.
	#[instrument(skip(self, extra), fields(handler = %self.handler()))]
	pub async fn send(&self, extra: Option<Map<String, Value>>) -> Result<Option<Response>> {
		if self.state() != State::Idle || self.inner.registration.borrow().is_none() {
			return Err(Error::AlreadySent);
		}

		self.transition(State::Confirming);
		if self.inner.config.confirm != Confirm::Disabled {
			let message = match &self.inner.config.confirm {
				Confirm::Message(message) => Some(message.clone()),
				Confirm::Absent | Confirm::Disabled => None,
			};
			if !self.run_confirm(message).await {
				debug!("Confirmation declined.");
				self.transition(State::Idle);
				return Ok(None);
			}
		}

		if let Some(element) = self.element() {
			if !self.notify(Kind::BeforeRequest, Target::Element(element.clone()), Detail::None) {
				debug!("Aborted by `before-request`.");
				self.transition(State::Idle);
				return Ok(None);
			}
		}

		self.transition(State::SettingUp);
		self.show_loading(true);
		self.run_setup().await;
		let http_request = self.build_http_request(extra.as_ref());

		if self.inner.config.browser_validate {
			if let Some(form) = self.form() {
				if !self.dom().check_validity(form) {
					warn!("Browser-side validation failed. Not sending.");
					self.show_loading(false);
					self.transition(State::Idle);
					return Err(Error::ValidationFailed);
				}
			}
		}

		self.transition(State::Sending);
		let registration = self.inner.registration.borrow_mut().take().ok_or(Error::AlreadySent)?;
		let transport = Rc::clone(&self.inner.env.transport);
		let outcome = match Abortable::new(transport.request(http_request, self.inner.cancellation.clone()), registration).await {
			Ok(Err(_)) if self.is_cancelled() => Err(TransportError::Cancelled),
			Ok(outcome) => outcome,
			Err(_aborted) => Err(TransportError::Cancelled),
		};

		let (response, outcome) = match outcome {
			Ok(response) => {
				debug!(status = response.status, "Transport succeeded.");
				self.transition(State::Succeeding);
				self.run_success(response.clone()).await;
				(Some(response), Outcome::Succeeded)
			}
			Err(error) => {
				debug!(%error, "Transport failed.");
				self.transition(State::Failing);
				self.run_error(error).await;
				(None, Outcome::Failed)
			}
		};

		self.transition(State::Completing);
		self.show_loading(false);
		self.run_complete(outcome).await;
		self.transition(State::Idle);
		Ok(response)
	}

	fn build_http_request(&self, extra: Option<&Map<String, Value>>) -> HttpRequest {
		let config = &self.inner.config;
		let dom = self.dom();

		let fields = self.form().map(|form| dom.serialize_form(form)).unwrap_or_default();
		let payload = Payload::new(fields, &config.data, extra, config.files);
		#[cfg(feature = "dangerous-logging")]
		trace!(?payload, "Built payload.");
		#[cfg(not(feature = "dangerous-logging"))]
		trace!(fields = payload.fields.len(), data = payload.data.len(), "Built payload.");

		let csrf_token = dom.meta_content("csrf-token");
		HttpRequest {
			method: METHOD,
			url: config.url.clone().unwrap_or_else(|| dom.current_url()),
			headers: payload::headers(&config.handler, &config.update, config.flash, csrf_token.as_deref()),
			body: payload.into_body(config.json, config.files),
		}
	}

	// Hook dispatch.

	async fn run_confirm(&self, message: Option<String>) -> bool {
		match &self.inner.config.hooks.confirm {
			Some(hook) => hook(self.clone(), message).await,
			None => self.default_confirm(message).await,
		}
	}

	async fn run_setup(&self) {
		match &self.inner.config.hooks.setup {
			Some(hook) => hook(self.clone(), ()).await,
			None => self.default_setup().await,
		}
	}

	async fn run_success(&self, response: Response) {
		match &self.inner.config.hooks.success {
			Some(hook) => hook(self.clone(), response).await,
			None => self.default_success(response).await,
		}
	}

	async fn run_error(&self, error: TransportError) {
		match &self.inner.config.hooks.error {
			Some(hook) => hook(self.clone(), error).await,
			None => self.default_error(error).await,
		}
	}

	async fn run_complete(&self, outcome: Outcome) {
		match &self.inner.config.hooks.complete {
			Some(hook) => hook(self.clone(), outcome).await,
			None => self.default_complete(outcome).await,
		}
	}

	/// Applies `envelope` through the `update_response` hook or [`default_update_response`](`Request::default_update_response`).
	pub async fn update_response(&self, envelope: Rc<Envelope>) {
		match &self.inner.config.hooks.update_response {
			Some(hook) => hook(self.clone(), envelope).await,
			None => self.default_update_response(envelope).await,
		}
	}

	async fn run_flash_message(&self, message: FlashMessage) {
		match &self.inner.config.hooks.flash_message {
			Some(hook) => hook(self.clone(), message).await,
			None => self.default_flash_message(message).await,
		}
	}

	async fn run_error_message(&self, message: String) {
		match &self.inner.config.hooks.error_message {
			Some(hook) => hook(self.clone(), message).await,
			None => self.default_error_message(message).await,
		}
	}

	async fn run_validation_message(&self, fields: OrderedMap<Vec<String>>) {
		match &self.inner.config.hooks.validation_message {
			Some(hook) => hook(self.clone(), fields).await,
			None => self.default_validation_message(fields).await,
		}
	}

	async fn run_redirect(&self, url: String) {
		match &self.inner.config.hooks.redirect {
			Some(hook) => hook(self.clone(), url).await,
			None => self.default_redirect(url).await,
		}
	}

	async fn run_assets(&self, assets: Assets) {
		match &self.inner.config.hooks.assets {
			Some(hook) => hook(self.clone(), assets).await,
			None => self.default_assets(assets).await,
		}
	}

	// Default behaviour.

	/// Asks listeners via `confirm-message`, falling back to the native dialog if not canceled.
	///
	/// A listener that cancels decides through [`Notification::respond`] (declining if it doesn't).
	/// Without a message, the request proceeds.
	pub async fn default_confirm(&self, message: Option<String>) -> bool {
		let detail = message.clone().map_or(Detail::None, Detail::Message);
		let notification = Notification::new(Kind::ConfirmMessage, Target::Window, self.clone(), detail);
		if !self.bus().dispatch(&notification) {
			return notification.answer().unwrap_or(false);
		}
		match message {
			Some(message) => self.dom().confirm(&message),
			None => true,
		}
	}

	/// Fires `setup` and `before-send`.
	pub async fn default_setup(&self) {
		self.notify(Kind::Setup, self.trigger_target(), Detail::None);
		self.notify(Kind::BeforeSend, self.trigger_target(), Detail::None);
	}

	/// Fires `done`, then (unless `before-update` is canceled) shows flash messages,
	/// applies the response, follows a configured redirect and fires `success`.
	pub async fn default_success(&self, response: Response) {
		let envelope = Rc::new(response.body);
		#[cfg(feature = "dangerous-logging")]
		trace!(?envelope, "Response.");

		let target = self.event_target();
		let redirect_pending = envelope.redirect.is_some() || self.inner.config.redirect.is_some();
		if !redirect_pending {
			self.notify(Kind::Done, target.clone(), Detail::Response(Rc::clone(&envelope)));
		}

		if !self.notify(Kind::BeforeUpdate, target.clone(), Detail::Response(Rc::clone(&envelope))) {
			debug!("`before-update` canceled. Response not applied.");
			return;
		}

		if self.inner.config.flash {
			for (message, severity) in envelope.flash_pairs() {
				self.run_flash_message(FlashMessage { message: message.to_owned(), severity: severity.to_owned() }).await;
			}
		}

		self.update_response(Rc::clone(&envelope)).await;

		if envelope.redirect.is_none() {
			if let Some(url) = &self.inner.config.redirect {
				self.run_redirect(url.clone()).await;
			}
		}

		self.notify(Kind::Success, target, Detail::Response(envelope));
	}

	/// Applies a `406` envelope like a success would, fires `fail` and `error`,
	/// and shows the server's message (or the status text) unless `error` is canceled.
	/// Cancellation shows no message.
	pub async fn default_error(&self, error: TransportError) {
		let target = self.event_target();
		let mut redirect_pending = false;
		let message = if let Some(body) = error.smart_body() {
			let envelope = Rc::new(body.clone());
			redirect_pending = envelope.redirect.is_some();
			self.update_response(Rc::clone(&envelope)).await;
			envelope.error_message.clone()
		} else if error.is_cancelled() {
			None
		} else {
			Some(error.status_text())
		};

		if !redirect_pending {
			self.notify(Kind::Fail, target.clone(), Detail::Error(error.clone()));
		}

		if !self.notify(Kind::Error, target, Detail::Error(error)) {
			debug!("`error` canceled. No error message.");
			return;
		}
		if let Some(message) = message.filter(|message| !message.is_empty()) {
			self.run_error_message(message).await;
		}
	}

	/// Fires `always` and `complete`.
	pub async fn default_complete(&self, outcome: Outcome) {
		trace!(?outcome, "Completing.");
		let target = self.event_target();
		self.notify(Kind::Always, target.clone(), Detail::None);
		self.notify(Kind::Complete, target, Detail::None);
	}

	/// Redirects (and stops there), or hands assets to the `assets` hook,
	/// applies partials and shows validation messages.
	pub async fn default_update_response(&self, envelope: Rc<Envelope>) {
		if let Some(url) = &envelope.redirect {
			self.run_redirect(url.clone()).await;
			return;
		}

		if let Some(assets) = &envelope.assets {
			self.run_assets(assets.clone()).await;
		}

		partials::apply_partials(self, &self.inner.config.update, &envelope);

		if envelope.has_error_fields() {
			let fields = envelope.error_fields.clone().unwrap_or_default();
			self.run_validation_message(fields).await;
		}
	}

	/// Fires `flash-message` on window.
	pub async fn default_flash_message(&self, message: FlashMessage) {
		let FlashMessage { message, severity } = message;
		self.notify(Kind::FlashMessage, Target::Window, Detail::Flash { message, severity });
	}

	/// Fires `error-message` on window and falls back to the native alert if not canceled.
	pub async fn default_error_message(&self, message: String) {
		if self.notify(Kind::ErrorMessage, Target::Window, Detail::Message(message.clone())) {
			self.dom().alert(&message);
		}
	}

	/// Fires `validation` on the bound form, then `invalid-field` on window for each control found.
	/// The first control found is focused unless its notification is canceled.
	pub async fn default_validation_message(&self, fields: OrderedMap<Vec<String>>) {
		let form = match self.form() {
			Some(form) => form.clone(),
			None => {
				debug!(fields = fields.len(), "No bound form for validation messages.");
				return;
			}
		};
		self.notify(Kind::Validation, Target::Element(form.clone()), Detail::Fields(fields.clone()));

		let controls = self.dom().form_controls(&form);
		let mut first = true;
		for (name, messages) in fields.iter() {
			let control = match validation::find_control(&controls, name) {
				Some(control) => control,
				None => {
					debug!(name, "No enabled control for invalid field.");
					continue;
				}
			};

			let proceed = self.notify(
				Kind::InvalidField,
				Target::Window,
				Detail::InvalidField { name: name.to_owned(), messages: messages.clone(), element: control.element.clone() },
			);
			if first {
				if proceed {
					self.dom().focus(&control.element);
				}
				first = false;
			}
		}
	}

	/// Navigates to `url`, after arranging for `redirected` to fire on the next history pop.
	pub async fn default_redirect(&self, url: String) {
		debug!(%url, "Redirecting.");
		let request = self.clone();
		let popped_url = url.clone();
		self.dom().on_next_history_pop(Box::new(move || {
			request.notify(Kind::Redirected, request.trigger_target(), Detail::Url(popped_url));
		}));
		self.dom().navigate(&url);
	}

	/// Only logs the manifest. Loading the listed files is left to an overriding hook.
	pub async fn default_assets(&self, assets: Assets) {
		trace!(js = assets.js.len(), css = assets.css.len(), img = assets.img.len(), "Asset manifest received.");
	}
}
