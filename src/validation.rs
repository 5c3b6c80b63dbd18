//! Locating the form controls that server-side validation messages refer to.

use crate::dom::FormControl;

/// Rewrites dotted field names into bracket notation: `address.city` → `address[city]`.
///
/// Each dot followed by ASCII word characters becomes a bracketed run of those characters.
/// Anything after the run stays as it is, so `a.b-c` → `a[b]-c`. A dot not followed by a word character is kept.
#[must_use]
pub fn bracket_name(field: &str) -> String {
	let mut name = String::with_capacity(field.len() + 2);
	let mut rest = field;
	while let Some(dot) = rest.find('.') {
		name.push_str(&rest[..dot]);
		let after = &rest[dot + 1..];
		let run = after.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(after.len());
		if run == 0 {
			name.push('.');
		} else {
			name.push('[');
			name.push_str(&after[..run]);
			name.push(']');
		}
		rest = &after[run..];
	}
	name.push_str(rest);
	name
}

/// Whether a control's `name` refers to `field` (already in bracket notation):
/// `field`, `field[]`, `…[field]` or `…[field][]`.
#[must_use]
pub fn name_matches(name: &str, field: &str) -> bool {
	let name = name.strip_suffix("[]").unwrap_or(name);
	name == field || name.ends_with(&format!("[{}]", field))
}

/// First enabled control matching `field` (dotted or bracketed), in document order.
pub fn find_control<'a, E>(controls: &'a [FormControl<E>], field: &str) -> Option<&'a FormControl<E>> {
	let field = bracket_name(field);
	controls.iter().find(|control| !control.disabled && name_matches(&control.name, &field))
}

#[cfg(test)]
mod tests {
	use super::{bracket_name, find_control, name_matches};
	use crate::dom::FormControl;

	#[test]
	fn bracket_rewrite() {
		assert_eq!(bracket_name("email"), "email");
		assert_eq!(bracket_name("address.city"), "address[city]");
		assert_eq!(bracket_name("items.0.qty"), "items[0][qty]");
		assert_eq!(bracket_name("odd.-x"), "odd.-x");
		assert_eq!(bracket_name("a.b-c"), "a[b]-c");
		assert_eq!(bracket_name("a..b"), "a.[b]");
		assert_eq!(bracket_name("name.é"), "name.é");
		assert_eq!(bracket_name("trailing."), "trailing.");
	}

	#[test]
	fn four_variants() {
		assert!(name_matches("email", "email"));
		assert!(name_matches("email[]", "email"));
		assert!(name_matches("User[email]", "email"));
		assert!(name_matches("User[email][]", "email"));
		assert!(!name_matches("User[myemail]", "email"));
		assert!(!name_matches("email2", "email"));
		assert!(name_matches("address[city]", "address[city]"));
	}

	#[test]
	fn skips_disabled_and_keeps_document_order() {
		let control = |element, name: &str, disabled| FormControl { element, name: name.to_owned(), disabled };
		let controls = [control(1, "email", true), control(2, "User[email]", false), control(3, "email[]", false)];
		assert_eq!(find_control(&controls, "email").map(|c| c.element), Some(2));
		assert_eq!(find_control(&controls, "phone").map(|c| c.element), None);
	}
}
