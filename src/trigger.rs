//! Declarative triggers: turning DOM events on `data-request` elements into lifecycle instances.

use crate::{
	aux_data::AuxData,
	config::{Options, TrackInput},
	dom::{Dom, TimerHandle},
	error::Result,
	request::{Environment, Request},
};
use core::cell::RefCell;
use futures::FutureExt;
use std::rc::Rc;
use tracing::{debug, instrument, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
	Click,
	Submit,
	Change,
	KeyDown { key: String },
	KeyUp { key: String },
	Input,
}

/// What [`Triggers::dispatch`] did with an event.
pub enum Dispatch<D: Dom> {
	Ignored,
	/// A request was started. The DOM event's default action should be prevented.
	Sent(Request<D>),
	/// A track-input request was (re)scheduled.
	Debounced,
}

impl<D: Dom> Dispatch<D> {
	#[must_use]
	pub fn prevents_default(&self) -> bool {
		matches!(self, Self::Sent(_))
	}
}

impl<D: Dom> core::fmt::Debug for Dispatch<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Ignored => f.write_str("Ignored"),
			Self::Sent(request) => f.debug_tuple("Sent").field(request).finish(),
			Self::Debounced => f.write_str("Debounced"),
		}
	}
}

/// Last lifecycle instance started for a trigger element.
///
/// Used to cancel a stale request before a newer one for the same element starts.
pub trait LastInstance<D: Dom> {
	fn last_instance(&self, element: &D::Element) -> Option<Request<D>>;
	fn set_last_instance(&self, element: &D::Element, request: Request<D>);
}

struct LastValue(String);
struct PendingTimer(TimerHandle);
struct InFlight<D: Dom>(Request<D>);

pub struct Triggers<D: Dom> {
	env: Environment<D>,
	aux: RefCell<AuxData<D::Key>>,
}

impl<D: Dom> core::fmt::Debug for Triggers<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Triggers").field("aux", &self.aux).finish_non_exhaustive()
	}
}

impl<D: Dom> LastInstance<D> for Triggers<D> {
	fn last_instance(&self, element: &D::Element) -> Option<Request<D>> {
		let key = self.env.dom.key(element);
		self.aux.borrow().get::<InFlight<D>>(key).map(|InFlight(request)| request.clone())
	}

	fn set_last_instance(&self, element: &D::Element, request: Request<D>) {
		let key = self.env.dom.key(element);
		self.aux.borrow_mut().set(key, InFlight(request));
	}
}

const TEXT_INPUT_TYPES: &[&str] = &["text", "search", "email", "url", "tel", "number", "password"];
const NAVIGATION_KEYS: &[&str] = &["Enter", "Tab", "Shift", "Control", "Alt", "Meta", "ArrowLeft", "ArrowRight", "ArrowUp", "ArrowDown"];

impl<D: Dom> Triggers<D> {
	#[must_use]
	pub fn new(env: Environment<D>) -> Rc<Self> {
		Rc::new(Self { env, aux: RefCell::default() })
	}

	#[must_use]
	pub fn environment(&self) -> &Environment<D> {
		&self.env
	}

	fn has_request(&self, element: &D::Element) -> bool {
		self.env.dom.attribute(element, "data-request").is_some()
	}

	fn input_type(&self, element: &D::Element) -> Option<String> {
		if self.env.dom.tag_name(element) != "INPUT" {
			return None;
		}
		Some(self.env.dom.attribute(element, "type").unwrap_or_else(|| "text".to_owned()).to_ascii_lowercase())
	}

	/// The element whose `data-request` handles events of `element`: itself, or its form.
	fn request_source(&self, element: &D::Element) -> Option<D::Element> {
		if self.has_request(element) {
			return Some(element.clone());
		}
		self.env.dom.closest_form(element).filter(|form| self.has_request(form))
	}

	/// Handles one DOM event that happened on `element`.
	///
	/// # Errors
	///
	/// Iff the element's `data-request*` attributes don't make up a valid configuration.
	#[instrument(skip(self))]
	pub fn dispatch(self: &Rc<Self>, event: TriggerEvent, element: &D::Element) -> Result<Dispatch<D>> {
		let dom = &*self.env.dom;
		let tag = dom.tag_name(element);
		let input_type = self.input_type(element);
		let navigation = matches!(&event, TriggerEvent::KeyUp { key } if NAVIGATION_KEYS.contains(&key.as_str()));

		match event {
			TriggerEvent::Click => {
				let clickable = tag == "A" || tag == "BUTTON" || matches!(input_type.as_deref(), Some("button" | "submit" | "image"));
				if clickable && self.has_request(element) {
					self.fire(element, None).map(Dispatch::Sent)
				} else {
					Ok(Dispatch::Ignored)
				}
			}

			TriggerEvent::Submit => {
				if tag == "FORM" && self.has_request(element) {
					self.fire(element, None).map(Dispatch::Sent)
				} else {
					Ok(Dispatch::Ignored)
				}
			}

			TriggerEvent::Change => {
				let changeable = tag == "SELECT" || matches!(input_type.as_deref(), Some("checkbox" | "radio" | "file"));
				if changeable && self.has_request(element) {
					self.fire(element, None).map(Dispatch::Sent)
				} else {
					Ok(Dispatch::Ignored)
				}
			}

			TriggerEvent::KeyDown { key } => {
				let text_like = input_type.as_deref().map_or(false, |t| TEXT_INPUT_TYPES.contains(&t));
				if key != "Enter" || !text_like {
					return Ok(Dispatch::Ignored);
				}
				match self.request_source(element) {
					Some(source) => self.fire(&source, None).map(Dispatch::Sent),
					None => Ok(Dispatch::Ignored),
				}
			}

			TriggerEvent::KeyUp { .. } | TriggerEvent::Input => {
				if navigation {
					return Ok(Dispatch::Ignored);
				}
				let interval = match dom.attribute(element, "data-track-input").map(|value| TrackInput::from_attribute(&value)) {
					Some(TrackInput::Debounce { ms }) => ms,
					Some(TrackInput::Disabled) | None => return Ok(Dispatch::Ignored),
				};
				match self.request_source(element) {
					Some(source) => Ok(self.debounce(element, source, interval)),
					None => {
						debug!("`data-track-input` without a `data-request` source.");
						Ok(Dispatch::Ignored)
					}
				}
			}
		}
	}

	/// Starts a lifecycle for `source` in the background.
	///
	/// With `tracked`, the instance is that element's last instance until it finishes.
	fn fire(self: &Rc<Self>, source: &D::Element, tracked: Option<D::Element>) -> Result<Request<D>> {
		let request = Request::new(&self.env, Some(source.clone()), Options::default())?;
		debug!(handler = %request.handler(), "Triggered.");
		if let Some(element) = &tracked {
			self.set_last_instance(element, request.clone());
		}
		let this = Rc::clone(self);
		let sending = request.clone();
		self.env.dom.spawn(
			async move {
				if let Err(error) = sending.send(None).await {
					warn!(%error, handler = %sending.handler(), "Triggered request failed.");
				}
				if let Some(element) = tracked {
					this.release(&element, &sending);
				}
			}
			.boxed_local(),
		);
		Ok(request)
	}

	/// Drops `request` as the last instance of `element`, unless a newer one replaced it already.
	fn release(&self, element: &D::Element, request: &Request<D>) {
		let key = self.env.dom.key(element);
		let mut aux = self.aux.borrow_mut();
		if aux.get::<InFlight<D>>(key).map_or(false, |InFlight(last)| last == request) {
			aux.remove::<InFlight<D>>(key);
			trace!("Released finished instance.");
		}
	}

	/// Forgets all state kept for `element` and cancels its pending debounce, if any.
	///
	/// Call this once the element left the document. A request still in flight runs to completion.
	#[instrument(skip(self))]
	pub fn forget(&self, element: &D::Element) {
		let key = self.env.dom.key(element);
		let mut aux = self.aux.borrow_mut();
		if let Some(PendingTimer(handle)) = aux.remove::<PendingTimer>(key) {
			self.env.dom.cancel_scheduled(handle);
		}
		let dropped = aux.remove_all(&key);
		if dropped > 0 {
			trace!(dropped, "Forgot element.");
		}
	}

	/// Number of per-element entries currently kept.
	#[must_use]
	pub fn tracked(&self) -> usize {
		self.aux.borrow().len()
	}

	/// Restarts the debounce timer of `element`, unless its value didn't change since last time.
	fn debounce(self: &Rc<Self>, element: &D::Element, source: D::Element, interval: u32) -> Dispatch<D> {
		let dom = &*self.env.dom;
		let key = dom.key(element);
		let value = dom.element_value(element).unwrap_or_default();

		{
			let mut aux = self.aux.borrow_mut();
			if aux.get::<LastValue>(key).map_or(false, |LastValue(last)| *last == value) {
				trace!("Value unchanged.");
				return Dispatch::Ignored;
			}
			aux.set(key, LastValue(value));
			if let Some(PendingTimer(handle)) = aux.remove::<PendingTimer>(key) {
				dom.cancel_scheduled(handle);
			}
		}

		let this = Rc::clone(self);
		let element = element.clone();
		let handle = dom.schedule(
			interval,
			Box::new(move || {
				this.aux.borrow_mut().remove::<PendingTimer>(this.env.dom.key(&element));
				if let Some(previous) = this.last_instance(&element) {
					previous.cancel();
				}
				if let Err(error) = this.fire(&source, Some(element)) {
					warn!(%error, "Could not start track-input request.");
				}
			}),
		);
		self.aux.borrow_mut().set(key, PendingTimer(handle));
		Dispatch::Debounced
	}
}
