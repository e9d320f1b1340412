//! Chunk/file content identity: SHA-256 of the plaintext (spec.md §3,
//! §4.7, §8 — a wire-visible identity the server itself verifies, unlike
//! the teacher's locally-scoped BLAKE3 cache key).

use sha2::{Digest, Sha256};

use crate::util::hash_to_hex;

/// Hex-encoded SHA-256 of `data`. This is the canonical chunk/file
/// identity used in `SyncedFileRecord::chunk_hashes`, `Chunk::hash`, and
/// the wire protocol.
pub fn content_hash(data: &[u8]) -> String {
	let mut hasher = Sha256::new();
	hasher.update(data);
	let digest: [u8; 32] = hasher.finalize().into();
	hash_to_hex(&digest)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hash_is_deterministic() {
		assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
	}

	#[test]
	fn different_input_different_hash() {
		assert_ne!(content_hash(b"hello"), content_hash(b"world"));
	}

	#[test]
	fn hash_is_64_hex_chars() {
		assert_eq!(content_hash(b"").len(), 64);
	}
}

// vim: ts=4
