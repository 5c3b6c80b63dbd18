#![allow(dead_code)]

use async_trait::async_trait;
use futures::{
	executor::{LocalPool, LocalSpawner},
	future::{pending, LocalBoxFuture},
	task::LocalSpawnExt,
};
use std::{
	cell::{Cell, RefCell},
	collections::{HashMap, VecDeque},
	rc::Rc,
};
use winter_ajax::{
	dom::{Dom, FieldValue, FormControl, InsertPosition, TimerHandle},
	error::TransportError,
	events::{EventBus, Flow, Kind, Target},
	response::{Envelope, Response},
	transport::{CancellationToken, HttpRequest, Transport},
	Environment,
};

pub fn init_logging() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::TRACE).try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(pub usize);

#[derive(Debug)]
struct Node {
	tag: String,
	attributes: Vec<(String, String)>,
	parent: Option<Id>,
	html: String,
	value: Option<String>,
	visible: bool,
}

/// In-memory page. Selectors understood by [`Dom::query`]: `#id`, `.class` and bare tag names.
pub struct FakeDom {
	nodes: RefCell<Vec<Node>>,
	pub valid: Cell<bool>,
	pub confirm_answer: Cell<bool>,
	pub confirms: RefCell<Vec<String>>,
	pub alerts: RefCell<Vec<String>>,
	pub navigations: RefCell<Vec<String>>,
	pub focused: RefCell<Vec<Id>>,
	meta: RefCell<HashMap<String, String>>,
	history_pops: RefCell<Vec<Box<dyn FnOnce()>>>,
	timers: RefCell<Vec<(TimerHandle, u32, Box<dyn FnOnce()>)>>,
	next_timer: Cell<i32>,
	pool: RefCell<LocalPool>,
	spawner: LocalSpawner,
}

impl FakeDom {
	pub fn new() -> Rc<Self> {
		let pool = LocalPool::new();
		let spawner = pool.spawner();
		Rc::new(Self {
			nodes: RefCell::default(),
			valid: Cell::new(true),
			confirm_answer: Cell::new(true),
			confirms: RefCell::default(),
			alerts: RefCell::default(),
			navigations: RefCell::default(),
			focused: RefCell::default(),
			meta: RefCell::default(),
			history_pops: RefCell::default(),
			timers: RefCell::default(),
			next_timer: Cell::new(1),
			pool: RefCell::new(pool),
			spawner,
		})
	}

	pub fn add(&self, parent: Option<Id>, tag: &str, attributes: &[(&str, &str)]) -> Id {
		let mut nodes = self.nodes.borrow_mut();
		nodes.push(Node {
			tag: tag.to_ascii_uppercase(),
			attributes: attributes.iter().map(|&(name, value)| (name.to_owned(), value.to_owned())).collect(),
			parent,
			html: String::new(),
			value: None,
			visible: true,
		});
		Id(nodes.len() - 1)
	}

	pub fn set_value(&self, id: Id, value: &str) {
		self.nodes.borrow_mut()[id.0].value = Some(value.to_owned());
	}

	pub fn set_attribute(&self, id: Id, name: &str, value: &str) {
		let mut nodes = self.nodes.borrow_mut();
		let attributes = &mut nodes[id.0].attributes;
		attributes.retain(|(n, _)| n != name);
		attributes.push((name.to_owned(), value.to_owned()));
	}

	pub fn set_html(&self, id: Id, html: &str) {
		self.nodes.borrow_mut()[id.0].html = html.to_owned();
	}

	pub fn html(&self, id: Id) -> String {
		self.nodes.borrow()[id.0].html.clone()
	}

	pub fn is_visible(&self, id: Id) -> bool {
		self.nodes.borrow()[id.0].visible
	}

	pub fn set_meta(&self, name: &str, content: &str) {
		self.meta.borrow_mut().insert(name.to_owned(), content.to_owned());
	}

	/// Runs the callbacks registered for the next history pop.
	pub fn pop_history(&self) {
		let callbacks = self.history_pops.take();
		for callback in callbacks {
			callback();
		}
	}

	pub fn pending_timers(&self) -> Vec<u32> {
		self.timers.borrow().iter().map(|(_, delay, _)| *delay).collect()
	}

	/// Fires every scheduled callback, as if enough time had passed.
	pub fn fire_timers(&self) {
		let timers = self.timers.take();
		for (_, _, callback) in timers {
			callback();
		}
	}

	/// Drives spawned futures until none can make progress.
	pub fn run(&self) {
		self.pool.borrow_mut().run_until_stalled();
	}

	fn attr(&self, id: Id, name: &str) -> Option<String> {
		self.nodes.borrow()[id.0].attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone())
	}

	fn is_inside(&self, id: Id, ancestor: Id) -> bool {
		let nodes = self.nodes.borrow();
		let mut current = nodes[id.0].parent;
		while let Some(parent) = current {
			if parent == ancestor {
				return true;
			}
			current = nodes[parent.0].parent;
		}
		false
	}

	fn descendants(&self, ancestor: Id) -> Vec<Id> {
		(0..self.nodes.borrow().len()).map(Id).filter(|&id| self.is_inside(id, ancestor)).collect()
	}

	fn matches(&self, id: Id, selector: &str) -> bool {
		if let Some(id_attribute) = selector.strip_prefix('#') {
			self.attr(id, "id").as_deref() == Some(id_attribute)
		} else if let Some(class) = selector.strip_prefix('.') {
			self.attr(id, "class").map_or(false, |classes| classes.split_whitespace().any(|c| c == class))
		} else {
			self.nodes.borrow()[id.0].tag.eq_ignore_ascii_case(selector)
		}
	}
}

impl Dom for FakeDom {
	type Element = Id;
	type Key = Id;

	fn key(&self, element: &Id) -> Id {
		*element
	}

	fn query(&self, selector: &str) -> Option<Id> {
		let len = self.nodes.borrow().len();
		(0..len).map(Id).find(|&id| self.matches(id, selector.trim()))
	}

	fn closest_form(&self, element: &Id) -> Option<Id> {
		let mut current = Some(*element);
		while let Some(id) = current {
			let node_is_form = self.nodes.borrow()[id.0].tag == "FORM";
			if node_is_form {
				return Some(id);
			}
			current = self.nodes.borrow()[id.0].parent;
		}
		None
	}

	fn attribute(&self, element: &Id, name: &str) -> Option<String> {
		self.attr(*element, name)
	}

	fn tag_name(&self, element: &Id) -> String {
		self.nodes.borrow()[element.0].tag.clone()
	}

	fn element_value(&self, element: &Id) -> Option<String> {
		self.nodes.borrow()[element.0].value.clone()
	}

	fn set_inner_html(&self, element: &Id, html: &str) {
		self.set_html(*element, html);
	}

	fn insert_html(&self, element: &Id, position: InsertPosition, html: &str) {
		let mut nodes = self.nodes.borrow_mut();
		let current = &mut nodes[element.0].html;
		match position {
			InsertPosition::AfterBegin => current.insert_str(0, html),
			InsertPosition::BeforeEnd => current.push_str(html),
		}
	}

	fn serialize_form(&self, form: &Id) -> Vec<(String, FieldValue)> {
		self.descendants(*form)
			.into_iter()
			.filter(|&id| self.attr(id, "disabled").is_none())
			.filter_map(|id| {
				let name = self.attr(id, "name")?;
				let value = self.nodes.borrow()[id.0].value.clone().unwrap_or_default();
				if self.attr(id, "type").as_deref() == Some("file") {
					Some((name, FieldValue::File { file_name: value, handle: Rc::new(()) }))
				} else {
					Some((name, FieldValue::Text(value)))
				}
			})
			.collect()
	}

	fn form_controls(&self, form: &Id) -> Vec<FormControl<Id>> {
		self.descendants(*form)
			.into_iter()
			.filter_map(|id| {
				let name = self.attr(id, "name")?;
				Some(FormControl { element: id, name, disabled: self.attr(id, "disabled").is_some() })
			})
			.collect()
	}

	fn check_validity(&self, _form: &Id) -> bool {
		self.valid.get()
	}

	fn focus(&self, element: &Id) {
		self.focused.borrow_mut().push(*element);
	}

	fn set_visible(&self, element: &Id, visible: bool) {
		self.nodes.borrow_mut()[element.0].visible = visible;
	}

	fn confirm(&self, message: &str) -> bool {
		self.confirms.borrow_mut().push(message.to_owned());
		self.confirm_answer.get()
	}

	fn alert(&self, message: &str) {
		self.alerts.borrow_mut().push(message.to_owned());
	}

	fn navigate(&self, url: &str) {
		self.navigations.borrow_mut().push(url.to_owned());
	}

	fn on_next_history_pop(&self, callback: Box<dyn FnOnce()>) {
		self.history_pops.borrow_mut().push(callback);
	}

	fn meta_content(&self, name: &str) -> Option<String> {
		self.meta.borrow().get(name).cloned()
	}

	fn current_url(&self) -> String {
		"/current".to_owned()
	}

	fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
		if let Err(error) = self.spawner.spawn_local(future) {
			panic!("Failed to spawn: {}", error);
		}
	}

	fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
		let handle = TimerHandle(self.next_timer.get());
		self.next_timer.set(handle.0 + 1);
		self.timers.borrow_mut().push((handle, delay_ms, callback));
		handle
	}

	fn cancel_scheduled(&self, handle: TimerHandle) {
		self.timers.borrow_mut().retain(|(h, _, _)| *h != handle);
	}
}

pub enum Reply {
	Respond(Result<Response, TransportError>),
	/// Never resolves on its own.
	Hang,
}

/// Replies in script order, then with empty `200 OK`s.
#[derive(Default)]
pub struct FakeTransport {
	replies: RefCell<VecDeque<Reply>>,
	pub requests: RefCell<Vec<HttpRequest>>,
}

impl FakeTransport {
	pub fn new() -> Rc<Self> {
		Rc::new(Self::default())
	}

	pub fn reply(&self, reply: Reply) {
		self.replies.borrow_mut().push_back(reply);
	}

	pub fn ok(&self, body: serde_json::Value) {
		let body: Envelope = serde_json::from_value(body).unwrap();
		self.reply(Reply::Respond(Ok(Response { status: 200, status_text: "OK".into(), body })));
	}

	pub fn fail(&self, status: u16, status_text: &str, body: Option<serde_json::Value>) {
		let body = body.map(|body| serde_json::from_value(body).unwrap());
		self.reply(Reply::Respond(Err(TransportError::Status { status, status_text: status_text.into(), body })));
	}

	pub fn request_count(&self) -> usize {
		self.requests.borrow().len()
	}

	pub fn last_request(&self) -> HttpRequest {
		self.requests.borrow().last().cloned().unwrap()
	}
}

#[async_trait(?Send)]
impl Transport for FakeTransport {
	async fn request(&self, request: HttpRequest, _cancellation: CancellationToken) -> Result<Response, TransportError> {
		self.requests.borrow_mut().push(request);
		let reply = self.replies.borrow_mut().pop_front();
		match reply {
			Some(Reply::Respond(result)) => result,
			Some(Reply::Hang) => pending().await,
			None => Ok(Response { status: 200, status_text: "OK".into(), body: Envelope::default() }),
		}
	}
}

pub fn environment(dom: &Rc<FakeDom>, transport: &Rc<FakeTransport>) -> Environment<FakeDom> {
	init_logging();
	Environment::new(Rc::clone(dom), Rc::clone(transport) as Rc<dyn Transport>)
}

pub type Recording = Rc<RefCell<Vec<(Kind, Target<Id>)>>>;

/// Records every notification on `bus`, in order.
pub fn record(bus: &EventBus<FakeDom>) -> Recording {
	let recording = Recording::default();
	{
		let recording = Rc::clone(&recording);
		bus.on_any(move |notification| {
			recording.borrow_mut().push((notification.kind, notification.target.clone()));
			Flow::Continue
		});
	}
	recording
}

pub fn kinds(recording: &Recording) -> Vec<Kind> {
	recording.borrow().iter().map(|(kind, _)| *kind).collect()
}

/// Cancels every notification of `kind`.
pub fn veto(bus: &EventBus<FakeDom>, kind: Kind) {
	bus.on(kind, |_| Flow::Cancel);
}
