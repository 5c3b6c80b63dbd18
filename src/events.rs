//! Cancelable lifecycle notifications.
//!
//! Listeners are plain callbacks invoked synchronously and in registration order.
//! Returning [`Flow::Cancel`] vetoes whatever the notification guards (see [`Kind`]);
//! all listeners still run, like with DOM events whose default was prevented.

use crate::{
	dom::Dom,
	error::TransportError,
	handler::HandlerName,
	ordered::OrderedMap,
	request::Request,
	response::Envelope,
};
use core::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
	/// On the triggering element (or window). Informational.
	Setup,
	/// On the triggering element. Canceling aborts the request before anything is sent.
	BeforeRequest,
	/// On the triggering element (or window). Informational.
	BeforeSend,
	/// On the bound form or element. Canceling skips applying the response.
	BeforeUpdate,
	/// On a partial's target. Canceling keeps its current content.
	BeforeReplace,
	/// On a partial's target, after it was updated.
	Update,
	/// On window, after all partials.
	UpdateComplete,
	/// On window, after [`UpdateComplete`](`Kind::UpdateComplete`).
	Resize,
	Success,
	/// On the bound form or element. Canceling suppresses the error message.
	Error,
	Complete,
	Done,
	Fail,
	Always,
	/// On window. Canceling suppresses the native dialog; the listener may [`respond`](`Notification::respond`).
	ConfirmMessage,
	/// On window. Canceling suppresses the native dialog.
	ErrorMessage,
	/// On window.
	FlashMessage,
	/// On the bound form.
	Validation,
	/// On window, once per located field. Canceling suppresses auto-focus.
	InvalidField,
	/// On the triggering element (or window), on the first history pop after a redirect.
	Redirected,
}

impl Kind {
	/// Event type used when forwarding to the DOM.
	#[must_use]
	pub fn event_name(self) -> &'static str {
		match self {
			Self::Setup => "ajax:setup",
			Self::BeforeRequest => "ajax:before-request",
			Self::BeforeSend => "ajax:before-send",
			Self::BeforeUpdate => "ajax:before-update",
			Self::BeforeReplace => "ajax:before-replace",
			Self::Update => "ajax:update",
			Self::UpdateComplete => "ajax:update-complete",
			Self::Resize => "resize",
			Self::Success => "ajax:request-success",
			Self::Error => "ajax:request-error",
			Self::Complete => "ajax:request-complete",
			Self::Done => "ajax:done",
			Self::Fail => "ajax:fail",
			Self::Always => "ajax:always",
			Self::ConfirmMessage => "ajax:confirm-message",
			Self::ErrorMessage => "ajax:error-message",
			Self::FlashMessage => "ajax:flash-message",
			Self::Validation => "ajax:validation",
			Self::InvalidField => "ajax:invalid-field",
			Self::Redirected => "ajax:redirected",
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target<E> {
	Element(E),
	Window,
}

impl<E> Target<E> {
	pub fn element(&self) -> Option<&E> {
		match self {
			Self::Element(element) => Some(element),
			Self::Window => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Detail<E> {
	None,
	Response(Rc<Envelope>),
	Error(TransportError),
	Message(String),
	Flash { message: String, severity: String },
	Fragment { selector: String, html: String },
	Fields(OrderedMap<Vec<String>>),
	InvalidField { name: String, messages: Vec<String>, element: E },
	Url(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	Continue,
	Cancel,
}

impl From<bool> for Flow {
	fn from(proceed: bool) -> Self {
		if proceed {
			Self::Continue
		} else {
			Self::Cancel
		}
	}
}

pub struct Notification<D: Dom> {
	pub kind: Kind,
	pub target: Target<D::Element>,
	/// The lifecycle instance this belongs to.
	pub context: Request<D>,
	pub detail: Detail<D::Element>,
	answer: Cell<Option<bool>>,
}

impl<D: Dom> Notification<D> {
	#[must_use]
	pub fn new(kind: Kind, target: Target<D::Element>, context: Request<D>, detail: Detail<D::Element>) -> Self {
		Self { kind, target, context, detail, answer: Cell::new(None) }
	}

	#[must_use]
	pub fn handler(&self) -> &HandlerName {
		self.context.handler()
	}

	/// Answers a [`ConfirmMessage`](`Kind::ConfirmMessage`) that the listener cancels to replace the native dialog.
	pub fn respond(&self, answer: bool) {
		self.answer.set(Some(answer));
	}

	#[must_use]
	pub fn answer(&self) -> Option<bool> {
		self.answer.get()
	}
}

impl<D: Dom> core::fmt::Debug for Notification<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Notification")
			.field("kind", &self.kind)
			.field("target", &self.target)
			.field("handler", self.handler())
			.field("detail", &self.detail)
			.finish_non_exhaustive()
	}
}

pub type Listener<D> = Rc<dyn Fn(&Notification<D>) -> Flow>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct EventBus<D: Dom> {
	listeners: RefCell<Vec<(ListenerId, Option<Kind>, Listener<D>)>>,
	next_id: Cell<u64>,
}

impl<D: Dom> Default for EventBus<D> {
	fn default() -> Self {
		Self { listeners: RefCell::default(), next_id: Cell::new(0) }
	}
}

impl<D: Dom> core::fmt::Debug for EventBus<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("EventBus").field("listeners", &self.listeners.borrow().len()).finish()
	}
}

impl<D: Dom> EventBus<D> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Listens to one kind of notification.
	pub fn on(&self, kind: Kind, listener: impl Fn(&Notification<D>) -> Flow + 'static) -> ListenerId {
		self.add(Some(kind), Rc::new(listener))
	}

	/// Listens to every notification.
	pub fn on_any(&self, listener: impl Fn(&Notification<D>) -> Flow + 'static) -> ListenerId {
		self.add(None, Rc::new(listener))
	}

	fn add(&self, kind: Option<Kind>, listener: Listener<D>) -> ListenerId {
		let id = ListenerId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		self.listeners.borrow_mut().push((id, kind, listener));
		id
	}

	/// Returns whether the listener was still registered.
	pub fn off(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.borrow_mut();
		let before = listeners.len();
		listeners.retain(|(listener_id, _, _)| *listener_id != id);
		listeners.len() != before
	}

	/// Returns `false` iff any listener canceled.
	#[instrument(skip(self, notification), fields(kind = ?notification.kind))]
	pub fn dispatch(&self, notification: &Notification<D>) -> bool {
		// Snapshot, so listeners may (un)register re-entrantly.
		let listeners: Vec<Listener<D>> = self
			.listeners
			.borrow()
			.iter()
			.filter(|(_, kind, _)| kind.map_or(true, |kind| kind == notification.kind))
			.map(|(_, _, listener)| Rc::clone(listener))
			.collect();

		let mut proceed = true;
		for listener in listeners {
			if listener(notification) == Flow::Cancel {
				proceed = false;
			}
		}
		if !proceed {
			trace!("Canceled by listener.");
		}
		proceed
	}
}
