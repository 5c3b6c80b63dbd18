//! Splicing partial fragments into the page.

use crate::{
	dom::{Dom, InsertPosition},
	events::{Detail, Kind, Target},
	ordered::OrderedMap,
	request::Request,
	response::Envelope,
};
use std::rc::Rc;
use tracing::{debug, instrument, trace, warn};

/// How a fragment lands in its target, from the selector's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
	/// No prefix: replace the target's content.
	Replace,
	/// `^`: insert before the target's first child.
	Prepend,
	/// `@`: insert after the target's last child.
	Append,
}

impl Placement {
	/// Splits the placement prefix off a selector.
	#[must_use]
	pub fn parse(selector: &str) -> (Self, &str) {
		if let Some(selector) = selector.strip_prefix('^') {
			(Self::Prepend, selector)
		} else if let Some(selector) = selector.strip_prefix('@') {
			(Self::Append, selector)
		} else {
			(Self::Replace, selector)
		}
	}
}

/// Applies every fragment of `envelope`.
///
/// Each response key is looked up in `selectors` (partial name → selector) and used as the selector itself if absent.
/// Keys whose selector matches nothing are skipped; the rest are still applied.
#[instrument(skip(request, selectors, envelope), fields(handler = %request.handler(), fragments = envelope.partials.len()))]
pub fn apply_partials<D: Dom>(request: &Request<D>, selectors: &OrderedMap<String>, envelope: &Rc<Envelope>) {
	let dom = request.dom();
	for (key, value) in envelope.partials.iter() {
		let html = match value.as_str() {
			Some(html) => html,
			None => {
				debug!(key, "Skipping non-string response value.");
				continue;
			}
		};

		let mapped = selectors.get(key).map_or(key, String::as_str);
		let (placement, selector) = Placement::parse(mapped);
		let element = match dom.query(selector) {
			Some(element) => element,
			None => {
				warn!(key, selector, "No element matches partial selector. Skipping.");
				continue;
			}
		};

		match placement {
			Placement::Prepend => dom.insert_html(&element, InsertPosition::AfterBegin, html),
			Placement::Append => dom.insert_html(&element, InsertPosition::BeforeEnd, html),
			Placement::Replace => {
				let proceed = request.notify(
					Kind::BeforeReplace,
					Target::Element(element.clone()),
					Detail::Fragment { selector: selector.to_owned(), html: html.to_owned() },
				);
				if proceed {
					dom.set_inner_html(&element, html);
				} else {
					trace!(selector, "Replacement canceled.");
				}
			}
		}
		#[cfg(feature = "dangerous-logging")]
		trace!(selector, ?placement, html, "Applied fragment.");
		#[cfg(not(feature = "dangerous-logging"))]
		trace!(selector, ?placement, "Applied fragment.");

		request.notify(Kind::Update, Target::Element(element), Detail::Response(Rc::clone(envelope)));
	}

	request.notify(Kind::UpdateComplete, Target::Window, Detail::Response(Rc::clone(envelope)));
	request.notify(Kind::Resize, Target::Window, Detail::None);
}
