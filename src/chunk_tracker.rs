//! Chunk presence cache.
//!
//! Tracks, per content hash, whether the server is already known to hold
//! that chunk so workers can skip re-uploading plaintext the server has
//! already seen (spec.md §4.7: server-side dedup is opportunistic, but
//! the client still benefits from not re-sending bytes it already knows
//! are present). This is an in-memory, best-effort cache — a false
//! "missing" just costs a redundant upload attempt; a false "present" is
//! never produced since entries are only added once the server has
//! confirmed a commit.

use std::collections::BTreeSet;
use std::sync::RwLock;

/// Thread-safe set of chunk hashes known present on the server.
#[derive(Debug, Default)]
pub struct ChunkPresenceCache {
	known_present: RwLock<BTreeSet<String>>,
}

impl ChunkPresenceCache {
	pub fn new() -> Self {
		ChunkPresenceCache { known_present: RwLock::new(BTreeSet::new()) }
	}

	/// Record that the server now holds `hash` (e.g. after a successful
	/// upload or a server dedup response naming it already present).
	pub fn mark_present(&self, hash: &str) {
		self.known_present.write().expect("chunk presence lock poisoned").insert(hash.to_string());
	}

	pub fn mark_many_present<'a>(&self, hashes: impl IntoIterator<Item = &'a str>) {
		let mut set = self.known_present.write().expect("chunk presence lock poisoned");
		for hash in hashes {
			set.insert(hash.to_string());
		}
	}

	/// Whether the server is already known to hold this chunk.
	pub fn is_present(&self, hash: &str) -> bool {
		self.known_present.read().expect("chunk presence lock poisoned").contains(hash)
	}

	/// Filter `hashes` down to the subset not yet known present, in the
	/// order given — the set a worker actually needs to upload.
	pub fn filter_missing<'a>(&self, hashes: &'a [String]) -> Vec<&'a str> {
		let set = self.known_present.read().expect("chunk presence lock poisoned");
		hashes.iter().filter(|h| !set.contains(h.as_str())).map(String::as_str).collect()
	}

	pub fn len(&self) -> usize {
		self.known_present.read().expect("chunk presence lock poisoned").len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}


// vim: ts=4
