//! Parser for the relaxed object literals found in `data-request-data` and `data-request-update`.
//!
//! Accepted: unquoted keys, single- or double-quoted strings, trailing commas,
//! and an optional pair of outer braces (`id: 5` is the same as `{id: 5}`).

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
	pub offset: usize,
	pub message: &'static str,
}

/// # Errors
///
/// Iff `source` isn't a (relaxed) object literal.
pub fn parse_object(source: &str) -> Result<Map<String, Value>, LiteralError> {
	let trimmed = source.trim();
	if trimmed.is_empty() {
		return Ok(Map::new());
	}

	let wrapped;
	let source = if trimmed.starts_with('{') {
		trimmed
	} else {
		wrapped = format!("{{{}}}", trimmed);
		&wrapped
	};

	let mut parser = Parser { chars: source.char_indices().collect(), position: 0 };
	let value = parser.value()?;
	parser.skip_whitespace();
	if parser.position < parser.chars.len() {
		return Err(parser.error("Trailing characters"));
	}
	match value {
		Value::Object(map) => Ok(map),
		_ => Err(LiteralError { offset: 0, message: "Expected an object" }),
	}
}

struct Parser {
	chars: Vec<(usize, char)>,
	position: usize,
}

impl Parser {
	fn peek(&self) -> Option<char> {
		self.chars.get(self.position).map(|&(_, c)| c)
	}

	fn bump(&mut self) -> Option<char> {
		let c = self.peek()?;
		self.position += 1;
		Some(c)
	}

	fn error(&self, message: &'static str) -> LiteralError {
		let offset = self.chars.get(self.position).map_or_else(|| self.chars.last().map_or(0, |&(i, c)| i + c.len_utf8()), |&(i, _)| i);
		LiteralError { offset, message }
	}

	fn skip_whitespace(&mut self) {
		while self.peek().map_or(false, char::is_whitespace) {
			self.position += 1;
		}
	}

	fn expect(&mut self, expected: char, message: &'static str) -> Result<(), LiteralError> {
		self.skip_whitespace();
		if self.peek() == Some(expected) {
			self.position += 1;
			Ok(())
		} else {
			Err(self.error(message))
		}
	}

	fn value(&mut self) -> Result<Value, LiteralError> {
		self.skip_whitespace();
		match self.peek() {
			Some('{') => self.object(),
			Some('[') => self.array(),
			Some(quote @ ('\'' | '"')) => {
				self.position += 1;
				self.string(quote).map(Value::String)
			}
			Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
			Some(c) if is_identifier_char(c) => match self.identifier().as_str() {
				"true" => Ok(Value::Bool(true)),
				"false" => Ok(Value::Bool(false)),
				"null" | "undefined" => Ok(Value::Null),
				_ => Err(self.error("Unexpected bare word")),
			},
			_ => Err(self.error("Expected a value")),
		}
	}

	fn object(&mut self) -> Result<Value, LiteralError> {
		self.expect('{', "Expected '{'")?;
		let mut map = Map::new();
		loop {
			self.skip_whitespace();
			if self.peek() == Some('}') {
				self.position += 1;
				return Ok(Value::Object(map));
			}

			let key = match self.peek() {
				Some(quote @ ('\'' | '"')) => {
					self.position += 1;
					self.string(quote)?
				}
				Some(c) if is_identifier_char(c) => self.identifier(),
				_ => return Err(self.error("Expected a key")),
			};
			self.expect(':', "Expected ':'")?;
			let value = self.value()?;
			map.insert(key, value);

			self.skip_whitespace();
			match self.bump() {
				Some(',') => {}
				Some('}') => return Ok(Value::Object(map)),
				_ => {
					self.position = self.position.saturating_sub(1);
					return Err(self.error("Expected ',' or '}'"));
				}
			}
		}
	}

	fn array(&mut self) -> Result<Value, LiteralError> {
		self.expect('[', "Expected '['")?;
		let mut items = Vec::new();
		loop {
			self.skip_whitespace();
			if self.peek() == Some(']') {
				self.position += 1;
				return Ok(Value::Array(items));
			}
			items.push(self.value()?);
			self.skip_whitespace();
			match self.bump() {
				Some(',') => {}
				Some(']') => return Ok(Value::Array(items)),
				_ => {
					self.position = self.position.saturating_sub(1);
					return Err(self.error("Expected ',' or ']'"));
				}
			}
		}
	}

	fn string(&mut self, quote: char) -> Result<String, LiteralError> {
		let mut text = String::new();
		loop {
			match self.bump() {
				None => return Err(self.error("Unterminated string")),
				Some(c) if c == quote => return Ok(text),
				Some('\\') => match self.bump() {
					Some('n') => text.push('\n'),
					Some('t') => text.push('\t'),
					Some('r') => text.push('\r'),
					Some(c) => text.push(c),
					None => return Err(self.error("Unterminated escape")),
				},
				Some(c) => text.push(c),
			}
		}
	}

	fn identifier(&mut self) -> String {
		let mut name = String::new();
		while let Some(c) = self.peek().filter(|&c| is_identifier_char(c)) {
			name.push(c);
			self.position += 1;
		}
		name
	}

	fn number(&mut self) -> Result<Value, LiteralError> {
		let start = self.position;
		let mut text = String::new();
		while let Some(c) = self.peek().filter(|&c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')) {
			text.push(c);
			self.position += 1;
		}
		let text = text.strip_prefix('+').unwrap_or(&text);

		if let Ok(integer) = text.parse::<i64>() {
			return Ok(Value::Number(integer.into()));
		}
		match text.parse::<f64>().ok().and_then(Number::from_f64) {
			Some(number) => Ok(Value::Number(number)),
			None => {
				self.position = start;
				Err(self.error("Invalid number"))
			}
		}
	}
}

fn is_identifier_char(c: char) -> bool {
	c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
	use super::parse_object;
	use serde_json::json;

	#[test]
	fn braces_are_optional() {
		let expected = json!({"id": 5, "name": "x"});
		assert_eq!(serde_json::Value::Object(parse_object("id: 5, name: 'x'").unwrap()), expected);
		assert_eq!(serde_json::Value::Object(parse_object("{ id: 5, \"name\": \"x\", }").unwrap()), expected);
	}

	#[test]
	fn nested_values() {
		let parsed = parse_object("list: [1, 2.5, 'a',], flags: {on: true, off: false, none: null}").unwrap();
		assert_eq!(serde_json::Value::Object(parsed), json!({"list": [1, 2.5, "a"], "flags": {"on": true, "off": false, "none": null}}));
	}

	#[test]
	fn update_map_literal() {
		let parsed = parse_object("mypartial: '#myDiv', 'other/partial': '@#list'").unwrap();
		assert_eq!(parsed["mypartial"], "#myDiv");
		assert_eq!(parsed["other/partial"], "@#list");
	}

	#[test]
	fn empty_is_empty() {
		assert!(parse_object("   ").unwrap().is_empty());
	}

	#[test]
	fn errors_carry_offsets() {
		let error = parse_object("{id 5}").unwrap_err();
		assert_eq!(error.message, "Expected ':'");
		assert_eq!(error.offset, 4);
		assert!(parse_object("{a: 'open").is_err());
		assert!(parse_object("[1, 2]").is_err());
	}
}
