#![doc(html_root_url = "https://docs.rs/winter-ajax/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! Client side of the Winter CMS AJAX handler convention.
//!
//! A [`Request`] is one lifecycle instance: it resolves its [configuration](`config`),
//! asks for confirmation, posts the page's form data to a named server-side handler,
//! and applies the structured [response](`response::Envelope`) by splicing [partials](`partials`) into the page,
//! showing flash and validation messages or redirecting.
//! Every step is observable (and mostly cancelable) through the [`EventBus`](`events::EventBus`)
//! and can be replaced with a [hook](`hooks`).
//!
//! The page and the network are abstracted by [`Dom`](`dom::Dom`) and [`Transport`](`transport::Transport`).
//! [`web`] implements both over `web-sys`.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod aux_data;
pub mod config;
pub mod dom;
pub mod error;
pub mod events;
pub mod handler;
pub mod hooks;
pub mod literal;
pub mod ordered;
pub mod partials;
pub mod payload;
pub mod request;
pub mod response;
pub mod transport;
pub mod trigger;
pub mod validation;
pub mod web;

pub use config::Options;
pub use error::{Error, Result};
pub use request::{Environment, Request, State};
