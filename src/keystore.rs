//! Keystore: the narrow boundary to wherever the master password is
//! turned into the 32-byte data key (spec.md §3, §6). The bootstrap flow
//! (OS keyring prompts, recovery-phrase UI) is explicitly out of scope;
//! this module only needs `unlock`/`lock`/`export`/`import` and a key
//! that never touches disk in the clear.

use std::fs;
use std::path::{Path, PathBuf};

use argon2::password_hash::SaltString;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::chunking::crypto::{self, DataKey};
use crate::error::SyncError;

/// Everything the engine needs from wherever keys are managed.
/// Implemented by `FileKeystore` for the on-disk `keyfile`; tests can
/// substitute an in-memory fake.
pub trait Keystore: Send + Sync {
	fn unlock(&self, master_password: &str) -> Result<DataKey, SyncError>;
	fn lock(&mut self);
	fn export(&self) -> Result<String, SyncError>;
}

/// On-disk wrapped-key file: the data key encrypted under a key derived
/// from the master password, plus the salt needed to re-derive it.
/// Layout matches `~/.<agent>/keyfile` (spec.md §6).
#[derive(Serialize, Deserialize)]
struct WrappedKey {
	salt: String,
	nonce: [u8; 12],
	ciphertext: Vec<u8>,
}

/// File-backed keystore. Holds no key material in memory except while
/// `unlock` has been called and the caller still holds the returned
/// `DataKey` — the keystore itself never caches it.
pub struct FileKeystore {
	path: PathBuf,
}

impl FileKeystore {
	pub fn new(agent_dir: &Path) -> Self {
		FileKeystore { path: agent_dir.join("keyfile") }
	}

	/// Generate a fresh random data key, wrap it under `master_password`,
	/// and write the keyfile. Fails if one already exists — callers
	/// should `import` or remove the stale file deliberately.
	pub fn init(agent_dir: &Path, master_password: &str) -> Result<Self, SyncError> {
		let keystore = FileKeystore::new(agent_dir);
		if keystore.path.exists() {
			return Err(SyncError::Configuration {
				message: format!("keyfile already exists at {}", keystore.path.display()),
			});
		}

		let mut raw = [0u8; 32];
		rand::thread_rng().fill_bytes(&mut raw);
		let data_key = DataKey::from_raw(raw);

		let wrapped = wrap(&data_key, master_password)?;
		write_wrapped(&keystore.path, &wrapped)?;
		Ok(keystore)
	}

	/// Load an exported keyfile blob (`export()`'s output) re-encrypted
	/// under `master_password`, writing it as this machine's keyfile.
	pub fn import(agent_dir: &Path, exported: &str, master_password: &str) -> Result<Self, SyncError> {
		let wrapped = decode_blob(exported)?;
		// Validate the password actually unwraps before committing to disk.
		unwrap(&wrapped, master_password)?;

		let keystore = FileKeystore::new(agent_dir);
		write_wrapped(&keystore.path, &wrapped)?;
		Ok(keystore)
	}
}

impl Keystore for FileKeystore {
	fn unlock(&self, master_password: &str) -> Result<DataKey, SyncError> {
		let contents = fs::read_to_string(&self.path).map_err(|e| SyncError::StateCorruption {
			message: format!("cannot read keyfile {}: {}", self.path.display(), e),
			recoverable: false,
		})?;
		let wrapped: WrappedKey = serde_json::from_str(&contents).map_err(|e| SyncError::StateCorruption {
			message: format!("keyfile {} is corrupt: {}", self.path.display(), e),
			recoverable: false,
		})?;
		unwrap(&wrapped, master_password)
	}

	fn lock(&mut self) {
		// The key is owned by the caller, not cached here; nothing to
		// clear. Kept as a method so callers have a symmetric API and a
		// place to hook future in-memory caching if it's ever added.
	}

	fn export(&self) -> Result<String, SyncError> {
		let contents = fs::read_to_string(&self.path).map_err(|e| SyncError::StateCorruption {
			message: format!("cannot read keyfile {}: {}", self.path.display(), e),
			recoverable: false,
		})?;
		Ok(BASE64.encode(contents.as_bytes()))
	}
}

fn wrap(data_key: &DataKey, master_password: &str) -> Result<WrappedKey, SyncError> {
	let salt = SaltString::generate(&mut argon2_rand::OsRng);
	let kek = DataKey::derive(master_password.as_bytes(), &salt)
		.map_err(|e| SyncError::Configuration { message: format!("key derivation failed: {}", e) })?;

	let encrypted = crypto::encrypt(&kek, data_key.as_bytes())
		.map_err(|e| SyncError::Configuration { message: format!("key wrap failed: {}", e) })?;

	Ok(WrappedKey { salt: salt.as_str().to_string(), nonce: encrypted.nonce, ciphertext: encrypted.ciphertext })
}

fn unwrap(wrapped: &WrappedKey, master_password: &str) -> Result<DataKey, SyncError> {
	let salt = SaltString::from_b64(&wrapped.salt)
		.map_err(|e| SyncError::StateCorruption { message: format!("bad salt in keyfile: {}", e), recoverable: false })?;
	let kek = DataKey::derive(master_password.as_bytes(), &salt)
		.map_err(|e| SyncError::Configuration { message: format!("key derivation failed: {}", e) })?;

	let plaintext = crypto::decrypt(&kek, &wrapped.nonce, &wrapped.ciphertext)
		.map_err(|_| SyncError::Authentication { message: "incorrect master password".to_string() })?;

	let raw: [u8; 32] = plaintext
		.try_into()
		.map_err(|_| SyncError::StateCorruption { message: "wrapped key has wrong length".to_string(), recoverable: false })?;
	Ok(DataKey::from_raw(raw))
}

fn write_wrapped(path: &Path, wrapped: &WrappedKey) -> Result<(), SyncError> {
	let json = serde_json::to_string(wrapped)
		.map_err(|e| SyncError::Other { message: format!("failed to serialize keyfile: {}", e) })?;
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}
	fs::write(path, json)?;
	Ok(())
}

fn decode_blob(exported: &str) -> Result<WrappedKey, SyncError> {
	let json = BASE64
		.decode(exported)
		.map_err(|e| SyncError::Configuration { message: format!("invalid export blob: {}", e) })?;
	serde_json::from_slice(&json)
		.map_err(|e| SyncError::Configuration { message: format!("invalid export blob: {}", e) })
}

mod argon2_rand {
	pub use argon2::password_hash::rand_core::OsRng;
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn init_then_unlock_recovers_the_same_key() {
		let tmp = TempDir::new().unwrap();
		let keystore = FileKeystore::init(tmp.path(), "correct horse battery staple").unwrap();

		let key = keystore.unlock("correct horse battery staple").unwrap();
		assert_eq!(key.as_bytes().len(), 32);
	}

	#[test]
	fn unlock_with_wrong_password_fails() {
		let tmp = TempDir::new().unwrap();
		let keystore = FileKeystore::init(tmp.path(), "right password").unwrap();
		assert!(keystore.unlock("wrong password").is_err());
	}

	#[test]
	fn export_then_import_on_another_machine_unlocks_with_same_password() {
		let tmp_a = TempDir::new().unwrap();
		let tmp_b = TempDir::new().unwrap();

		let keystore_a = FileKeystore::init(tmp_a.path(), "shared secret").unwrap();
		let original_key = keystore_a.unlock("shared secret").unwrap();
		let exported = keystore_a.export().unwrap();

		let keystore_b = FileKeystore::import(tmp_b.path(), &exported, "shared secret").unwrap();
		let imported_key = keystore_b.unlock("shared secret").unwrap();

		assert_eq!(original_key.as_bytes(), imported_key.as_bytes());
	}

	#[test]
	fn init_refuses_to_overwrite_existing_keyfile() {
		let tmp = TempDir::new().unwrap();
		FileKeystore::init(tmp.path(), "pw").unwrap();
		assert!(FileKeystore::init(tmp.path(), "pw").is_err());
	}

	#[test]
	fn import_with_wrong_password_is_rejected_before_writing() {
		let tmp_a = TempDir::new().unwrap();
		let tmp_b = TempDir::new().unwrap();

		let keystore_a = FileKeystore::init(tmp_a.path(), "shared secret").unwrap();
		let exported = keystore_a.export().unwrap();

		assert!(FileKeystore::import(tmp_b.path(), &exported, "wrong secret").is_err());
		assert!(!tmp_b.path().join("keyfile").exists());
	}
}

// vim: ts=4
