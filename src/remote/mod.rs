//! Remote Sync API: the narrow boundary between this engine and the
//! central metadata/blob server. Everything server-side — storage,
//! auth, the admin UI — is out of scope; this module only needs to
//! reach it.

pub mod http;
pub mod ws;

pub use http::HttpRemoteApi;
pub use ws::ChangeStream;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Server-reported state for a path, used to detect whether the local
/// record is stale before committing a change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFileInfo {
	pub version: u64,
	pub chunk_hashes: Vec<String>,
	pub size: u64,
}

/// One entry in a change-stream batch (spec.md §4.2/§4.6): a path whose
/// server version advanced since the client's last cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteChange {
	pub path: String,
	pub version: u64,
	pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeBatch {
	pub changes: Vec<RemoteChange>,
	pub next_cursor: u64,
}

/// One entry in a `GET /files` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFileSummary {
	pub path: String,
	pub version: u64,
	pub size: u64,
}

/// Everything the engine needs from the central server. Implemented by
/// `HttpRemoteApi` for production and by an in-memory fake in tests.
#[async_trait]
pub trait RemoteApi: Send + Sync {
	async fn get_file_info(&self, path: &str) -> Result<Option<RemoteFileInfo>, SyncError>;

	/// Upload one chunk's ciphertext, keyed by its plaintext hash. A
	/// no-op on the server if it already has the chunk (opportunistic
	/// dedup, spec.md §4.7).
	async fn upload_chunk(&self, hash: &str, nonce: &[u8], ciphertext: &[u8]) -> Result<(), SyncError>;

	async fn download_chunk(&self, hash: &str) -> Result<(Vec<u8>, Vec<u8>), SyncError>;

	/// Commit a file at the given chunk list, contingent on the server
	/// still being at `base_version`. A version mismatch surfaces as
	/// `SyncError::VersionConflict`.
	async fn commit_file(
		&self,
		path: &str,
		chunk_hashes: &[String],
		size: u64,
		base_version: Option<u64>,
	) -> Result<u64, SyncError>;

	async fn delete_file(&self, path: &str, base_version: u64) -> Result<(), SyncError>;

	/// Poll for changes since `cursor` (used when the push channel is
	/// disabled or between reconnects).
	async fn poll_changes(&self, cursor: Option<u64>) -> Result<ChangeBatch, SyncError>;

	/// `HEAD /chunks/{hash}`: whether the server already holds this
	/// chunk, consulted before encrypting and uploading one (spec.md
	/// §4.4 step 4's opportunistic dedup, which must survive process
	/// restarts — unlike the in-memory `ChunkPresenceCache`).
	async fn has_chunk(&self, hash: &str) -> Result<bool, SyncError>;

	/// `GET /files`, optionally scoped by `prefix`: a full listing used
	/// to reconcile the remote side of the tree the same way the scanner
	/// reconciles the local side.
	async fn list_files(&self, prefix: Option<&str>) -> Result<Vec<RemoteFileSummary>, SyncError>;
}

// vim: ts=4
