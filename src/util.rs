//! Small shared helpers.

/// Hex-encode a SHA-256 digest the way chunk/file hashes are represented
/// on the wire and in the local state store.
pub fn hash_to_hex(hash: &[u8; 32]) -> String {
	hex::encode(hash)
}

/// Parse a hex-encoded 32-byte hash back to binary, rejecting anything
/// that isn't exactly 32 bytes once decoded.
pub fn hash_from_hex(hex_str: &str) -> Result<[u8; 32], hex::FromHexError> {
	let bytes = hex::decode(hex_str)?;
	let mut hash = [0u8; 32];
	if bytes.len() != 32 {
		return Err(hex::FromHexError::InvalidStringLength);
	}
	hash.copy_from_slice(&bytes);
	Ok(hash)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hex_round_trips() {
		let hash = [7u8; 32];
		let encoded = hash_to_hex(&hash);
		assert_eq!(encoded.len(), 64);
		assert_eq!(hash_from_hex(&encoded).unwrap(), hash);
	}

	#[test]
	fn rejects_wrong_length() {
		assert!(hash_from_hex("abcd").is_err());
	}
}

// vim: ts=4
