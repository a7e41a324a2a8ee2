//! Open-addressed, linear-probed hash set.
//!
//! A generic associative container used by the wallet engine for `allTx`,
//! `spentOutputs`, `usedAddrs` and `allAddrs`. Growth follows a fixed table
//! of primes, each roughly 1.5x its predecessor, so the load factor never
//! exceeds 2/3. Unlike `std::collections::HashSet`, insertion returns the
//! item it displaced (if any), matching the upstream container's contract
//! and letting callers detect "was this already present" without a second
//! lookup.
//!
//! Iteration order is the table's physical bucket order and is not stable
//! across mutation; do not rely on it for anything but a full traversal.

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;

const TABLE_SIZES: &[usize] = &[
	1, 3, 7, 13, 23, 37, 59, 97, 149, 227, 347, 523, 787, 1187, 1783, 2677, 4019, 6037, 9059, 13591,
	20389, 30593, 45887, 68863, 103307, 154981, 232487, 348739, 523129, 784697, 1177067, 1765609,
	2648419, 3972643, 5958971, 8938469, 13407707, 20111563, 30167359, 45251077, 67876637, 101814991,
];

fn next_size(capacity: usize) -> usize {
	let mut i = 0;
	while i < TABLE_SIZES.len() && TABLE_SIZES[i] < capacity {
		i += 1;
	}
	TABLE_SIZES[(i + 1).min(TABLE_SIZES.len() - 1)]
}

fn hash_of<T: Hash + ?Sized>(item: &T) -> u64 {
	let mut hasher = DefaultHasher::new();
	item.hash(&mut hasher);
	hasher.finish()
}

/// A set of `T`, open-addressed with linear probing.
#[derive(Debug, Clone)]
pub struct Set<T> {
	table: Vec<Option<T>>,
	count: usize,
}

impl<T: Hash + Eq> Set<T> {
	pub fn new() -> Set<T> {
		Set::with_capacity(0)
	}

	pub fn with_capacity(capacity: usize) -> Set<T> {
		let size = next_size(capacity);
		Set {
			table: (0..size).map(|_| None).collect(),
			count: 0,
		}
	}

	pub fn len(&self) -> usize {
		self.count
	}

	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	fn grow(&mut self, capacity: usize) {
		let mut bigger = Set::with_capacity(capacity);
		for item in self.table.drain(..).flatten() {
			bigger.add(item);
		}
		*self = bigger;
	}

	/// Adds `item`, replacing and returning an equal existing item if any.
	pub fn add(&mut self, item: T) -> Option<T> {
		let size = self.table.len();
		let mut i = (hash_of(&item) as usize) % size;
		loop {
			match &self.table[i] {
				None => break,
				Some(t) if *t == item => break,
				Some(_) => i = (i + 1) % size,
			}
		}
		let displaced = self.table[i].replace(item);
		if displaced.is_none() {
			self.count += 1;
		}
		if self.count > ((size + 2) / 3) * 2 {
			self.grow(size);
		}
		displaced
	}

	/// Removes the item equal to `item`, with backward-shift cleanup of the
	/// probe sequence so later lookups remain correct.
	pub fn remove<Q>(&mut self, item: &Q) -> Option<T>
	where
		T: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let size = self.table.len();
		let mut i = (hash_of(item) as usize) % size;
		loop {
			match &self.table[i] {
				None => return None,
				Some(t) if t.borrow() == item => break,
				Some(_) => i = (i + 1) % size,
			}
		}
		let removed = self.table[i].take();
		self.count -= 1;

		// Hashtable cleanup: re-insert every item in the probe chain after
		// the freed slot, since some of them may have been displaced past
		// it by the now-removed item.
		let mut j = (i + 1) % size;
		while let Some(displaced) = self.table[j].take() {
			self.count -= 1;
			self.add(displaced);
			j = (j + 1) % size;
		}
		removed
	}

	pub fn contains<Q>(&self, item: &Q) -> bool
	where
		T: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.get(item).is_some()
	}

	pub fn get<Q>(&self, item: &Q) -> Option<&T>
	where
		T: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let size = self.table.len();
		let mut i = (hash_of(item) as usize) % size;
		loop {
			match &self.table[i] {
				None => return None,
				Some(t) if t.borrow() == item => return Some(t),
				Some(_) => i = (i + 1) % size,
			}
		}
	}

	pub fn clear(&mut self) {
		for slot in self.table.iter_mut() {
			*slot = None;
		}
		self.count = 0;
	}

	pub fn iter(&self) -> impl Iterator<Item = &T> {
		self.table.iter().filter_map(|s| s.as_ref())
	}

	pub fn intersects(&self, other: &Set<T>) -> bool {
		other.iter().any(|t| self.contains(t))
	}
}

impl<T: Hash + Eq + Clone> Set<T> {
	pub fn union(&mut self, other: &Set<T>) {
		for item in other.iter() {
			self.add(item.clone());
		}
	}

	pub fn minus(&mut self, other: &Set<T>) {
		for item in other.iter() {
			self.remove(item);
		}
	}

	pub fn intersect(&mut self, other: &Set<T>) {
		let to_drop: Vec<T> = self.iter().filter(|t| !other.contains(*t)).cloned().collect();
		for item in to_drop {
			self.remove(&item);
		}
	}
}

impl<T: Hash + Eq> Default for Set<T> {
	fn default() -> Set<T> {
		Set::new()
	}
}

impl<T: Hash + Eq> FromIterator<T> for Set<T> {
	fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Set<T> {
		let mut set = Set::new();
		for item in iter {
			set.add(item);
		}
		set
	}
}

#[cfg(test)]
mod tests {
	use super::Set;

	#[test]
	fn add_contains_remove() {
		let mut s = Set::new();
		assert!(s.add(1u32).is_none());
		assert!(s.add(2u32).is_none());
		assert_eq!(s.add(1u32), Some(1u32));
		assert!(s.contains(&1u32));
		assert!(s.contains(&2u32));
		assert_eq!(s.len(), 2);
		assert_eq!(s.remove(&1u32), Some(1u32));
		assert!(!s.contains(&1u32));
		assert_eq!(s.len(), 1);
	}

	#[test]
	fn grows_past_load_factor() {
		let mut s = Set::new();
		for i in 0..10_000u32 {
			s.add(i);
		}
		assert_eq!(s.len(), 10_000);
		for i in 0..10_000u32 {
			assert!(s.contains(&i));
		}
	}

	#[test]
	fn remove_cleans_up_probe_chain() {
		// Force collisions into a tiny table and make sure every surviving
		// item is still reachable after a removal disturbs the chain.
		let mut s: Set<u32> = Set::with_capacity(1);
		for i in 0..20u32 {
			s.add(i);
		}
		for i in (0..20u32).step_by(2) {
			s.remove(&i);
		}
		for i in 0..20u32 {
			assert_eq!(s.contains(&i), i % 2 == 1);
		}
	}

	#[test]
	fn union_minus_intersect() {
		let a: Set<u32> = (0..5).collect();
		let b: Set<u32> = (3..8).collect();
		let mut u = a.clone();
		u.union(&b);
		assert_eq!(u.len(), 8);

		let mut m = a.clone();
		m.minus(&b);
		assert_eq!(m.len(), 3);

		let mut i = a.clone();
		i.intersect(&b);
		assert_eq!(i.len(), 2);
	}
}
