#![cfg(target_arch = "wasm32")]

use async_trait::async_trait;
use std::{cell::RefCell, rc::Rc, sync::Once};
use wasm_bindgen::{closure::Closure, JsCast};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlBodyElement};
use winter_ajax::{
	dom::{Dom, InsertPosition},
	error::TransportError,
	events::Kind,
	response::{Envelope, Response},
	transport::{CancellationToken, HttpRequest, Transport},
	trigger::{Dispatch, TriggerEvent, Triggers},
	web::{forward_notifications, DocumentBinding, WebDom},
	Environment, Options,
};

wasm_bindgen_test_configure!(run_in_browser);

static LOG: Once = Once::new();

fn init_logging() {
	LOG.call_once(tracing_wasm::set_as_global_default);
}

fn body() -> HtmlBodyElement {
	window().unwrap().document().unwrap().body().unwrap().dyn_into::<HtmlBodyElement>().unwrap()
}

struct Canned(RefCell<Option<Envelope>>);

#[async_trait(?Send)]
impl Transport for Canned {
	async fn request(&self, _request: HttpRequest, _cancellation: CancellationToken) -> Result<Response, TransportError> {
		let body = self.0.borrow_mut().take().unwrap_or_default();
		Ok(Response { status: 200, status_text: "OK".into(), body })
	}
}

#[wasm_bindgen_test]
fn element_keys_are_stable() {
	init_logging();
	body().set_inner_html(r#"<div id="a"></div><div id="b"></div>"#);
	let dom = WebDom::new().unwrap();

	let a = dom.query("#a").unwrap();
	let b = dom.query("#b").unwrap();
	assert_eq!(dom.key(&a), dom.key(&dom.query("#a").unwrap()));
	assert_ne!(dom.key(&a), dom.key(&b));
}

#[wasm_bindgen_test]
fn insert_positions() {
	init_logging();
	body().set_inner_html(r#"<ul id="list"><li>b</li></ul>"#);
	let dom = WebDom::new().unwrap();
	let list = dom.query("#list").unwrap();

	dom.insert_html(&list, InsertPosition::AfterBegin, "<li>a</li>");
	dom.insert_html(&list, InsertPosition::BeforeEnd, "<li>c</li>");
	assert_eq!(list.inner_html(), "<li>a</li><li>b</li><li>c</li>");
}

#[wasm_bindgen_test]
async fn prevented_dom_event_cancels_the_replacement() {
	init_logging();
	body().set_inner_html(r#"<form id="f"><input name="title" value="x"><button id="go" data-request="onSave"></button></form><div id="status">old</div>"#);
	let dom = Rc::new(WebDom::new().unwrap());
	let envelope: Envelope = serde_json::from_str(r##"{"#status": "<p>new</p>"}"##).unwrap();
	let env = Environment::new(Rc::clone(&dom), Rc::new(Canned(RefCell::new(Some(envelope)))));
	forward_notifications(&env.bus, Rc::clone(&dom));

	let status = dom.query("#status").unwrap();
	let prevent = Closure::wrap(Box::new(|event: web_sys::Event| event.prevent_default()) as Box<dyn Fn(web_sys::Event)>);
	status.add_event_listener_with_callback(Kind::BeforeReplace.event_name(), prevent.as_ref().unchecked_ref()).unwrap();

	let button = dom.query("#go").unwrap();
	let request = env.request(Some(button), Options::default()).unwrap();
	assert_eq!(request.form(), dom.query("#f").as_ref());
	request.send(None).await.unwrap().unwrap();
	assert_eq!(status.inner_html(), "old");

	status.remove_event_listener_with_callback(Kind::BeforeReplace.event_name(), prevent.as_ref().unchecked_ref()).unwrap();
}

#[wasm_bindgen_test]
fn form_serialization() {
	init_logging();
	body().set_inner_html(r#"<form id="f"><input name="a" value="1"><input name="b" value="2" disabled><select name="c"><option value="3" selected></option></select></form>"#);
	let dom = WebDom::new().unwrap();
	let form = dom.query("#f").unwrap();

	let names: Vec<_> = dom.serialize_form(&form).into_iter().map(|(name, _)| name).collect();
	assert_eq!(names, ["a", "c"]);
	let controls = dom.form_controls(&form);
	assert_eq!(controls.iter().map(|control| (control.name.as_str(), control.disabled)).collect::<Vec<_>>(), [("a", false), ("b", true), ("c", false)]);
}

#[wasm_bindgen_test]
async fn removed_track_inputs_are_forgotten() {
	init_logging();
	body().set_inner_html(r#"<div id="panel"><input id="q" data-request="onSearch" data-track-input="10000"></div>"#);
	let dom = Rc::new(WebDom::new().unwrap());
	let triggers = Triggers::new(Environment::new(Rc::clone(&dom), Rc::new(Canned(RefCell::new(None)))));
	let _binding = DocumentBinding::install(&triggers);

	let input = dom.query("#q").unwrap();
	input.unchecked_ref::<web_sys::HtmlInputElement>().set_value("a");
	assert!(matches!(triggers.dispatch(TriggerEvent::Input, &input).unwrap(), Dispatch::Debounced));
	assert_eq!(triggers.tracked(), 2);

	dom.query("#panel").unwrap().set_inner_html("<p>replaced</p>");
	// Mutation records are delivered as a microtask.
	wasm_bindgen_futures::JsFuture::from(js_sys::Promise::resolve(&wasm_bindgen::JsValue::NULL)).await.unwrap();
	assert_eq!(triggers.tracked(), 0);
}
