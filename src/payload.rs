//! Request payload and headers.

use crate::{
	config::deep_merge,
	dom::FieldValue,
	handler::HandlerName,
	ordered::OrderedMap,
	transport::Body,
};
use serde_json::{Map, Value};
use url::form_urlencoded;

pub const REQUESTED_WITH_HEADER: &str = "X-REQUESTED-WITH";
pub const REQUESTED_WITH: &str = "XMLHttpRequest";
pub const HANDLER_HEADER: &str = "X-WINTER-REQUEST-HANDLER";
pub const PARTIALS_HEADER: &str = "X-WINTER-REQUEST-PARTIALS";
pub const FLASH_HEADER: &str = "X-WINTER-REQUEST-FLASH";
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Wire headers of a handler request.
///
/// The partials header lists the declared partial names joined by `&`, and is sent (empty) even if there are none.
#[must_use]
pub fn headers(handler: &HandlerName, update: &OrderedMap<String>, flash: bool, csrf_token: Option<&str>) -> Vec<(String, String)> {
	let mut headers = vec![
		(REQUESTED_WITH_HEADER.to_owned(), REQUESTED_WITH.to_owned()),
		(HANDLER_HEADER.to_owned(), handler.to_string()),
		(PARTIALS_HEADER.to_owned(), update.keys().collect::<Vec<_>>().join("&")),
	];
	if flash {
		headers.push((FLASH_HEADER.to_owned(), "true".to_owned()));
	}
	if let Some(token) = csrf_token {
		headers.push((CSRF_HEADER.to_owned(), token.to_owned()));
	}
	headers
}

/// Form fields plus configured and per-call data, before encoding.
#[derive(Debug, Clone)]
pub struct Payload {
	pub fields: Vec<(String, FieldValue)>,
	pub data: Map<String, Value>,
}

impl Payload {
	/// Per-call `extra` data wins over configured `data`. Files are dropped unless `files` is set.
	#[must_use]
	pub fn new(form_fields: Vec<(String, FieldValue)>, data: &Map<String, Value>, extra: Option<&Map<String, Value>>, files: bool) -> Self {
		let fields = form_fields.into_iter().filter(|(_, value)| files || !value.is_file()).collect();
		let mut data = data.clone();
		if let Some(extra) = extra {
			deep_merge(&mut data, extra.clone());
		}
		Self { fields, data }
	}

	/// Multipart if `files`, otherwise JSON if `json`, otherwise URL-encoded.
	#[must_use]
	pub fn into_body(self, json: bool, files: bool) -> Body {
		if files {
			let mut fields = self.fields;
			fields.extend(flatten_data(&self.data).into_iter().map(|(name, value)| (name, FieldValue::Text(value))));
			Body::Multipart(fields)
		} else if json {
			Body::Json(self.to_json().to_string())
		} else {
			let mut serializer = form_urlencoded::Serializer::new(String::new());
			for (name, value) in &self.fields {
				if let FieldValue::Text(text) = value {
					serializer.append_pair(name, text);
				}
			}
			for (name, value) in flatten_data(&self.data) {
				serializer.append_pair(&name, &value);
			}
			Body::UrlEncoded(serializer.finish())
		}
	}

	/// Form fields as an object (`name[]` collects into arrays), with data merged over it.
	#[must_use]
	pub fn to_json(&self) -> Value {
		let mut object = Map::new();
		for (name, value) in &self.fields {
			let FieldValue::Text(text) = value else { continue };
			match name.strip_suffix("[]") {
				Some(name) => match object.entry(name.to_owned()).or_insert_with(|| Value::Array(Vec::new())) {
					Value::Array(items) => items.push(Value::String(text.clone())),
					other => *other = Value::Array(vec![other.take(), Value::String(text.clone())]),
				},
				None => {
					object.insert(name.clone(), Value::String(text.clone()));
				}
			}
		}
		deep_merge(&mut object, self.data.clone());
		Value::Object(object)
	}
}

/// Flattens nested data into bracketed form names: `{a: {b: 1}, c: [2, 3]}` → `a[b]=1`, `c[]=2`, `c[]=3`.
#[must_use]
pub fn flatten_data(data: &Map<String, Value>) -> Vec<(String, String)> {
	let mut pairs = Vec::new();
	for (key, value) in data {
		flatten_into(key.clone(), value, &mut pairs);
	}
	pairs
}

fn flatten_into(name: String, value: &Value, pairs: &mut Vec<(String, String)>) {
	match value {
		Value::Object(map) => {
			for (key, value) in map {
				flatten_into(format!("{}[{}]", name, key), value, pairs);
			}
		}
		Value::Array(items) => {
			let scalar = items.iter().all(|item| !item.is_object() && !item.is_array());
			for (index, item) in items.iter().enumerate() {
				let name = if scalar { format!("{}[]", name) } else { format!("{}[{}]", name, index) };
				flatten_into(name, item, pairs);
			}
		}
		Value::String(text) => pairs.push((name, text.clone())),
		Value::Null => pairs.push((name, String::new())),
		Value::Bool(_) | Value::Number(_) => pairs.push((name, value.to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use std::rc::Rc;

	fn map(value: Value) -> Map<String, Value> {
		value.as_object().unwrap().clone()
	}

	fn text(name: &str, value: &str) -> (String, FieldValue) {
		(name.to_owned(), FieldValue::Text(value.to_owned()))
	}

	#[test]
	fn wire_headers() {
		let mut update = OrderedMap::new();
		update.insert("cart", "#cart".to_owned());
		update.insert("totals", "@#totals".to_owned());
		let handler = HandlerName::new("cart::onAdd").unwrap();

		let headers = headers(&handler, &update, true, Some("tok"));
		assert_eq!(
			headers,
			[
				("X-REQUESTED-WITH".to_owned(), "XMLHttpRequest".to_owned()),
				("X-WINTER-REQUEST-HANDLER".to_owned(), "cart::onAdd".to_owned()),
				("X-WINTER-REQUEST-PARTIALS".to_owned(), "cart&totals".to_owned()),
				("X-WINTER-REQUEST-FLASH".to_owned(), "true".to_owned()),
				("X-CSRF-TOKEN".to_owned(), "tok".to_owned()),
			]
		);
	}

	#[test]
	fn no_flash_header_unless_requested() {
		let handler = HandlerName::new("onSave").unwrap();
		let headers = headers(&handler, &OrderedMap::new(), false, None);
		assert_eq!(headers.len(), 3);
		assert_eq!(headers[2].1, "");
	}

	#[test]
	fn url_encoding_puts_fields_first_and_brackets_nested_data() {
		let payload = Payload::new(
			vec![text("name", "Ann Lee"), text("tags[]", "a")],
			&map(json!({"id": 5, "meta": {"page": 2}})),
			Some(&map(json!({"list": [1, 2], "flag": true}))),
			false,
		);
		match payload.into_body(false, false) {
			Body::UrlEncoded(body) => assert_eq!(body, "name=Ann+Lee&tags%5B%5D=a&id=5&meta%5Bpage%5D=2&list%5B%5D=1&list%5B%5D=2&flag=true"),
			other => panic!("{:?}", other),
		}
	}

	#[test]
	fn extra_data_overrides_configured_data() {
		let payload = Payload::new(Vec::new(), &map(json!({"id": 5, "meta": {"a": 1}})), Some(&map(json!({"id": 6, "meta": {"b": 2}}))), false);
		assert_eq!(Value::Object(payload.data), json!({"id": 6, "meta": {"a": 1, "b": 2}}));
	}

	#[test]
	fn files_are_dropped_unless_file_mode() {
		let file = (
			"avatar".to_owned(),
			FieldValue::File { file_name: "me.png".to_owned(), handle: Rc::new(()) },
		);

		let payload = Payload::new(vec![text("name", "x"), file.clone()], &Map::new(), None, false);
		assert_eq!(payload.fields.len(), 1);

		let payload = Payload::new(vec![text("name", "x"), file], &map(json!({"id": 1})), None, true);
		match payload.into_body(true, true) {
			Body::Multipart(fields) => {
				assert_eq!(fields.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(), ["name", "avatar", "id"]);
				assert!(fields[1].1.is_file());
			}
			other => panic!("{:?}", other),
		}
	}

	#[test]
	fn json_mode() {
		let payload = Payload::new(vec![text("name", "x"), text("tags[]", "a"), text("tags[]", "b")], &map(json!({"id": 5})), None, false);
		match payload.into_body(true, false) {
			Body::Json(body) => {
				let value: Value = serde_json::from_str(&body).unwrap();
				assert_eq!(value, json!({"name": "x", "tags": ["a", "b"], "id": 5}));
			}
			other => panic!("{:?}", other),
		}
	}
}
