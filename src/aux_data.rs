use core::{
	any::{Any, TypeId},
	hash::{BuildHasher, Hash},
};
use hashbrown::{hash_map::DefaultHashBuilder, HashMap};

/// Per-object side table: at most one value of each type per key.
///
/// Keys are stable identities handed out by the DOM layer (see [`Dom::key`](`crate::dom::Dom::key`)),
/// so elements themselves are never touched. Entries live until removed.
pub struct AuxData<K, S = DefaultHashBuilder>(HashMap<(K, TypeId), Box<dyn Any>, S>)
where
	K: Hash + Eq,
	S: BuildHasher;

impl<K, S> Default for AuxData<K, S>
where
	K: Hash + Eq,
	S: Default + BuildHasher,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<K, S> AuxData<K, S>
where
	K: Hash + Eq,
	S: BuildHasher,
{
	#[must_use]
	pub fn new() -> Self
	where
		S: Default,
	{
		Self(HashMap::with_hasher(S::default()))
	}

	#[must_use]
	pub fn get<T: 'static>(&self, key: K) -> Option<&T> {
		self.0.get(&(key, TypeId::of::<T>())).and_then(|value| value.downcast_ref())
	}

	/// Returns the previous value of the same type.
	pub fn set<T: 'static>(&mut self, key: K, value: T) -> Option<T> {
		self.0
			.insert((key, TypeId::of::<T>()), Box::new(value))
			.and_then(|previous| previous.downcast().ok())
			.map(|previous| *previous)
	}

	pub fn remove<T: 'static>(&mut self, key: K) -> Option<T> {
		self.0
			.remove(&(key, TypeId::of::<T>()))
			.and_then(|previous| previous.downcast().ok())
			.map(|previous| *previous)
	}

	/// Forgets everything stored for `key`. Returns how many entries were dropped.
	pub fn remove_all(&mut self, key: &K) -> usize {
		let before = self.0.len();
		self.0.retain(|(k, _), _| k != key);
		before - self.0.len()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl<K, S> core::fmt::Debug for AuxData<K, S>
where
	K: Hash + Eq,
	S: BuildHasher,
{
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("AuxData").field("len", &self.0.len()).finish()
	}
}
