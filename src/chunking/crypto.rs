//! Chunk-level encryption: AES-256-GCM with a fresh 96-bit nonce per
//! chunk, and Argon2id key derivation from the user's passphrase
//! (spec.md §3: the key is held only in memory, never persisted in
//! clear).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::ChunkError;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Argon2id parameters fixed by spec.md §3: t=3, m=64MiB, p=4.
fn kdf_params() -> Params {
	Params::new(64 * 1024, 3, 4, Some(KEY_LEN)).expect("fixed Argon2id parameters are valid")
}

/// A derived 256-bit data-encryption key. Zeroized on drop; never
/// serialized.
pub struct DataKey([u8; KEY_LEN]);

impl DataKey {
	/// Derive the key from `passphrase` and `salt` via Argon2id.
	pub fn derive(passphrase: &[u8], salt: &SaltString) -> Result<Self, ChunkError> {
		let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, kdf_params());
		let mut out = [0u8; KEY_LEN];
		argon2
			.hash_password_into(passphrase, salt.as_str().as_bytes(), &mut out)
			.map_err(|e| ChunkError::InvalidConfig { message: format!("key derivation failed: {}", e) })?;
		Ok(DataKey(out))
	}

	pub fn from_raw(bytes: [u8; KEY_LEN]) -> Self {
		DataKey(bytes)
	}

	/// The raw key bytes, for wrapping/unwrapping by the keystore. Callers
	/// must not persist this themselves in the clear.
	pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
		&self.0
	}

	fn cipher(&self) -> Aes256Gcm {
		Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
	}
}

impl Drop for DataKey {
	fn drop(&mut self) {
		self.0.zeroize();
	}
}

/// An encrypted chunk: a fresh random nonce plus the AES-GCM ciphertext
/// (which includes the authentication tag).
pub struct EncryptedChunk {
	pub nonce: [u8; NONCE_LEN],
	pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key` with a freshly generated nonce.
pub fn encrypt(key: &DataKey, plaintext: &[u8]) -> Result<EncryptedChunk, ChunkError> {
	let mut nonce_bytes = [0u8; NONCE_LEN];
	rand::thread_rng().fill_bytes(&mut nonce_bytes);
	let nonce = Nonce::from_slice(&nonce_bytes);

	let ciphertext = key
		.cipher()
		.encrypt(nonce, plaintext)
		.map_err(|e| ChunkError::InvalidConfig { message: format!("encryption failed: {}", e) })?;

	Ok(EncryptedChunk { nonce: nonce_bytes, ciphertext })
}

/// Decrypt `ciphertext` under `key` and `nonce`. Any tampering or wrong
/// key surfaces as `ChunkError::DecryptFailed`.
pub fn decrypt(key: &DataKey, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, ChunkError> {
	let nonce = Nonce::from_slice(nonce);
	key.cipher()
		.decrypt(nonce, ciphertext)
		.map_err(|e| ChunkError::DecryptFailed { message: e.to_string() })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encrypt_then_decrypt_round_trips() {
		let key = DataKey::from_raw([9u8; KEY_LEN]);
		let plaintext = b"the quick brown fox jumps over the lazy dog";

		let encrypted = encrypt(&key, plaintext).unwrap();
		let decrypted = decrypt(&key, &encrypted.nonce, &encrypted.ciphertext).unwrap();

		assert_eq!(decrypted, plaintext);
	}

	#[test]
	fn two_encryptions_use_different_nonces() {
		let key = DataKey::from_raw([3u8; KEY_LEN]);
		let a = encrypt(&key, b"same plaintext").unwrap();
		let b = encrypt(&key, b"same plaintext").unwrap();
		assert_ne!(a.nonce, b.nonce);
		assert_ne!(a.ciphertext, b.ciphertext);
	}

	#[test]
	fn wrong_key_fails_to_decrypt() {
		let key = DataKey::from_raw([1u8; KEY_LEN]);
		let wrong_key = DataKey::from_raw([2u8; KEY_LEN]);
		let encrypted = encrypt(&key, b"secret").unwrap();

		assert!(decrypt(&wrong_key, &encrypted.nonce, &encrypted.ciphertext).is_err());
	}

	#[test]
	fn derive_is_deterministic_for_same_salt() {
		let salt = SaltString::generate(&mut rand_core_compat::OsRng);
		let a = DataKey::derive(b"correct horse battery staple", &salt).unwrap();
		let b = DataKey::derive(b"correct horse battery staple", &salt).unwrap();
		assert_eq!(a.0, b.0);
	}

	mod rand_core_compat {
		pub use argon2::password_hash::rand_core::OsRng;
	}
}

// vim: ts=4
