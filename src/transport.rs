use crate::{
	dom::FieldValue,
	error::TransportError,
	response::Response,
};
use async_trait::async_trait;
use core::cell::{Cell, RefCell};
use futures::future::{AbortHandle, AbortRegistration};
use std::rc::Rc;

/// Every lifecycle request is a `POST`.
pub const METHOD: &str = "POST";

#[derive(Debug, Clone)]
pub enum Body {
	UrlEncoded(String),
	Json(String),
	/// Form fields including files. The transport picks the boundary.
	Multipart(Vec<(String, FieldValue)>),
}

impl Body {
	/// `None` for multipart bodies, whose content type depends on the boundary.
	#[must_use]
	pub fn content_type(&self) -> Option<&'static str> {
		match self {
			Self::UrlEncoded(_) => Some("application/x-www-form-urlencoded; charset=UTF-8"),
			Self::Json(_) => Some("application/json"),
			Self::Multipart(_) => None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
	pub method: &'static str,
	pub url: String,
	pub headers: Vec<(String, String)>,
	pub body: Body,
}

impl HttpRequest {
	/// Case-insensitive header lookup.
	#[must_use]
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}
}

/// The HTTP client collaborator.
///
/// Implementations should abort their native request when `cancellation` fires
/// (see [`CancellationToken::on_cancel`]). The lifecycle additionally stops waiting on its own,
/// so a transport that ignores the token is still cancelable, just not on the wire.
#[async_trait(?Send)]
pub trait Transport {
	/// # Errors
	///
	/// Any non-2xx response ([`TransportError::Status`]) or network failure.
	async fn request(&self, request: HttpRequest, cancellation: CancellationToken) -> Result<Response, TransportError>;
}

/// Cancellation handle of one lifecycle instance.
#[derive(Clone)]
pub struct CancellationToken {
	inner: Rc<TokenInner>,
}

struct TokenInner {
	handle: AbortHandle,
	cancelled: Cell<bool>,
	callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl CancellationToken {
	/// Creates a token and the registration that makes a future abortable by it.
	#[allow(clippy::new_ret_no_self)]
	#[must_use]
	pub fn new() -> (Self, AbortRegistration) {
		let (handle, registration) = AbortHandle::new_pair();
		let token = Self {
			inner: Rc::new(TokenInner {
				handle,
				cancelled: Cell::new(false),
				callbacks: RefCell::default(),
			}),
		};
		(token, registration)
	}

	/// Idempotent.
	pub fn cancel(&self) {
		if self.inner.cancelled.replace(true) {
			return;
		}
		self.inner.handle.abort();
		let callbacks = self.inner.callbacks.take();
		for callback in callbacks {
			callback();
		}
	}

	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		self.inner.cancelled.get()
	}

	/// Runs `callback` on cancellation, or right away if that already happened.
	pub fn on_cancel(&self, callback: impl FnOnce() + 'static) {
		if self.is_cancelled() {
			callback();
		} else {
			self.inner.callbacks.borrow_mut().push(Box::new(callback));
		}
	}
}

impl core::fmt::Debug for CancellationToken {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("CancellationToken").field("cancelled", &self.is_cancelled()).finish_non_exhaustive()
	}
}
