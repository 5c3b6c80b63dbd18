use core::{fmt, marker::PhantomData};
use hashbrown::HashMap;
use serde::{
	de::{MapAccess, Visitor},
	ser::SerializeMap,
	Deserialize, Deserializer, Serialize, Serializer,
};

/// A map that keeps its entries in insertion (or document) order.
///
/// Response envelopes are iterated in the order the server wrote them, and partial names are
/// sent to the server in the order they were declared, so neither a hash map nor a sorted map fits.
/// Lookups go through a hashed index into the entry list.
#[derive(Clone, PartialEq)]
pub struct OrderedMap<V> {
	entries: Vec<(String, V)>,
	index: HashMap<String, usize>,
}

impl<V> Default for OrderedMap<V> {
	fn default() -> Self {
		Self { entries: Vec::new(), index: HashMap::new() }
	}
}

impl<V: fmt::Debug> fmt::Debug for OrderedMap<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.entries.iter().map(|(k, v)| (k, v))).finish()
	}
}

impl<V> OrderedMap<V> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_capacity(capacity: usize) -> Self {
		Self { entries: Vec::with_capacity(capacity), index: HashMap::with_capacity(capacity) }
	}

	/// Inserts or replaces in place, returning the previous value.
	pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
		let key = key.into();
		if let Some(&position) = self.index.get(&key) {
			return Some(core::mem::replace(&mut self.entries[position].1, value));
		}
		self.index.insert(key.clone(), self.entries.len());
		self.entries.push((key, value));
		None
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<&V> {
		self.index.get(key).map(|&position| &self.entries[position].1)
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|(k, _)| k.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Key-wise merge: entries of `other` overwrite or extend `self`.
	pub fn merge(&mut self, other: Self) {
		for (k, v) in other.entries {
			self.insert(k, v);
		}
	}
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
	fn from_iter<T: IntoIterator<Item = (String, V)>>(iter: T) -> Self {
		let mut map = Self::new();
		for (k, v) in iter {
			map.insert(k, v);
		}
		map
	}
}

impl<V> IntoIterator for OrderedMap<V> {
	type Item = (String, V);
	type IntoIter = std::vec::IntoIter<(String, V)>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.into_iter()
	}
}

impl<V: Serialize> Serialize for OrderedMap<V> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.entries.len()))?;
		for (k, v) in &self.entries {
			map.serialize_entry(k, v)?;
		}
		map.end()
	}
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct OrderedVisitor<V>(PhantomData<V>);

		impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
			type Value = OrderedMap<V>;

			fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
				formatter.write_str("a map")
			}

			fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
				let mut map = OrderedMap::with_capacity(access.size_hint().unwrap_or(0));
				while let Some((k, v)) = access.next_entry::<String, V>()? {
					map.insert(k, v);
				}
				Ok(map)
			}
		}

		deserializer.deserialize_map(OrderedVisitor(PhantomData))
	}
}
