//! Override points of the request lifecycle.
//!
//! Each hook, when set, **replaces** the default behaviour of its step entirely.
//! The defaults stay reachable through [`Request`]'s `default_*` methods, so an override can still delegate.

use crate::{
	dom::Dom,
	error::TransportError,
	ordered::OrderedMap,
	request::Request,
	response::{Assets, Envelope, Response},
};
use core::future::Future;
use futures::{future::LocalBoxFuture, FutureExt};
use std::rc::Rc;

pub type Hook<D, A, R = ()> = Rc<dyn Fn(Request<D>, A) -> LocalBoxFuture<'static, R>>;

/// Wraps an async closure as a [`Hook`].
pub fn hook<D, A, R, F, Fut>(f: F) -> Hook<D, A, R>
where
	D: Dom,
	A: 'static,
	R: 'static,
	F: Fn(Request<D>, A) -> Fut + 'static,
	Fut: Future<Output = R> + 'static,
{
	Rc::new(move |request: Request<D>, argument: A| f(request, argument).boxed_local())
}

/// How the transport step ended, as seen by the `complete` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Succeeded,
	Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
	pub message: String,
	pub severity: String,
}

macro_rules! hooks {
	($($(#[$attr:meta])* $name:ident: $argument:ty $(=> $output:ty)?,)*) => {
		pub struct Hooks<D: Dom> {
			$($(#[$attr])* pub $name: Option<Hook<D, $argument $(, $output)?>>,)*
		}

		impl<D: Dom> Default for Hooks<D> {
			fn default() -> Self {
				Self { $($name: None,)* }
			}
		}

		impl<D: Dom> Clone for Hooks<D> {
			fn clone(&self) -> Self {
				Self { $($name: self.$name.clone(),)* }
			}
		}

		impl<D: Dom> Hooks<D> {
			/// Key-wise: hooks set in `higher` win, the rest are kept.
			#[must_use]
			pub fn merge(self, higher: Self) -> Self {
				Self { $($name: higher.$name.or(self.$name),)* }
			}

			/// Names of the hooks that are set.
			#[must_use]
			pub fn overridden(&self) -> Vec<&'static str> {
				let mut names = Vec::new();
				$(if self.$name.is_some() {
					names.push(stringify!($name));
				})*
				names
			}
		}
	};
}

hooks! {
	/// Decides whether to proceed. Receives the confirmation message, if any.
	confirm: Option<String> => bool,
	/// Runs right before the payload is built.
	setup: (),
	success: Response,
	error: TransportError,
	/// Runs last, on both paths.
	complete: Outcome,
	/// Applies a response envelope (redirect, assets, partials, validation messages).
	update_response: Rc<Envelope>,
	flash_message: FlashMessage,
	error_message: String,
	validation_message: OrderedMap<Vec<String>>,
	redirect: String,
	/// Receives the asset manifest of a response. The default only logs it.
	assets: Assets,
}

impl<D: Dom> core::fmt::Debug for Hooks<D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_list().entries(self.overridden()).finish()
	}
}
