//! In-memory `RemoteApi` fake for driving coordinator/worker scenarios
//! without a real server (spec.md §8's end-to-end scenarios).

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use syncagent_core::chunk_tracker::ChunkPresenceCache;
use syncagent_core::chunking::crypto::DataKey;
use syncagent_core::config::CdcConfig;
use syncagent_core::error::SyncError;
use syncagent_core::queue::EventQueue;
use syncagent_core::remote::{ChangeBatch, RemoteApi, RemoteFileInfo, RemoteFileSummary};
use syncagent_core::callbacks::NoCallbacks;
use syncagent_core::coordinator::TransferTable;
use syncagent_core::state::{ChangeCursorTracker, LocalStateStore};
use syncagent_core::workers::WorkerContext;

struct FileEntry {
	version: u64,
	chunk_hashes: Vec<String>,
	size: u64,
}

/// A minimal in-process stand-in for the central metadata/blob server.
/// Commits are version-checked exactly like the real server (§4.4); chunk
/// storage is a plain hash map, never evicted.
pub struct FakeRemoteApi {
	files: Mutex<HashMap<String, FileEntry>>,
	chunks: Mutex<HashMap<String, (Vec<u8>, Vec<u8>)>>,
	upload_calls: AtomicUsize,
}

impl FakeRemoteApi {
	pub fn new() -> Self {
		FakeRemoteApi { files: Mutex::new(HashMap::new()), chunks: Mutex::new(HashMap::new()), upload_calls: AtomicUsize::new(0) }
	}

	/// Seed a file as if the server already committed it at `version`.
	pub fn seed_file(&self, path: &str, version: u64, chunk_hashes: Vec<String>, size: u64) {
		self.files.lock().unwrap().insert(path.to_string(), FileEntry { version, chunk_hashes, size });
	}

	/// Seed a chunk as if it had already been uploaded, so `download_chunk`
	/// can serve it back.
	pub fn seed_chunk(&self, hash: &str, nonce: Vec<u8>, ciphertext: Vec<u8>) {
		self.chunks.lock().unwrap().insert(hash.to_string(), (nonce, ciphertext));
	}

	pub fn upload_call_count(&self) -> usize {
		self.upload_calls.load(Ordering::SeqCst)
	}
}

impl Default for FakeRemoteApi {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl RemoteApi for FakeRemoteApi {
	async fn get_file_info(&self, path: &str) -> Result<Option<RemoteFileInfo>, SyncError> {
		Ok(self.files.lock().unwrap().get(path).map(|e| RemoteFileInfo {
			version: e.version,
			chunk_hashes: e.chunk_hashes.clone(),
			size: e.size,
		}))
	}

	async fn upload_chunk(&self, hash: &str, nonce: &[u8], ciphertext: &[u8]) -> Result<(), SyncError> {
		self.upload_calls.fetch_add(1, Ordering::SeqCst);
		self.chunks.lock().unwrap().insert(hash.to_string(), (nonce.to_vec(), ciphertext.to_vec()));
		Ok(())
	}

	async fn download_chunk(&self, hash: &str) -> Result<(Vec<u8>, Vec<u8>), SyncError> {
		self.chunks
			.lock()
			.unwrap()
			.get(hash)
			.cloned()
			.ok_or_else(|| SyncError::Other { message: format!("fake server has no chunk {}", hash) })
	}

	async fn commit_file(
		&self,
		path: &str,
		chunk_hashes: &[String],
		size: u64,
		base_version: Option<u64>,
	) -> Result<u64, SyncError> {
		let mut files = self.files.lock().unwrap();
		let current_version = files.get(path).map(|e| e.version);

		if base_version != current_version {
			return Err(SyncError::VersionConflict {
				path: path.to_string(),
				current_version: current_version.unwrap_or(0),
			});
		}

		let next_version = current_version.unwrap_or(0) + 1;
		files.insert(path.to_string(), FileEntry { version: next_version, chunk_hashes: chunk_hashes.to_vec(), size });
		Ok(next_version)
	}

	async fn delete_file(&self, path: &str, _base_version: u64) -> Result<(), SyncError> {
		// Idempotent soft-delete: a second delete of an already-gone path
		// is not an error (spec.md §8's "idempotent delete" invariant).
		self.files.lock().unwrap().remove(path);
		Ok(())
	}

	async fn poll_changes(&self, cursor: Option<u64>) -> Result<ChangeBatch, SyncError> {
		Ok(ChangeBatch { changes: vec![], next_cursor: cursor.unwrap_or(0) })
	}

	async fn has_chunk(&self, hash: &str) -> Result<bool, SyncError> {
		Ok(self.chunks.lock().unwrap().contains_key(hash))
	}

	async fn list_files(&self, prefix: Option<&str>) -> Result<Vec<RemoteFileSummary>, SyncError> {
		Ok(self
			.files
			.lock()
			.unwrap()
			.iter()
			.filter(|(path, _)| prefix.map(|p| path.starts_with(p)).unwrap_or(true))
			.map(|(path, entry)| RemoteFileSummary { path: path.clone(), version: entry.version, size: entry.size })
			.collect())
	}
}

/// Build a `WorkerContext` wired to a fresh on-disk state store under
/// `sync_root` and the given fake remote, with a small CDC window so test
/// fixtures produce several chunks instead of one.
pub fn build_ctx(sync_root: &Path, remote: Arc<dyn RemoteApi>) -> (tokio::runtime::Runtime, Arc<WorkerContext>) {
	let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
	let state = Arc::new(LocalStateStore::open(&sync_root.join("state.redb")).unwrap());
	let key = Arc::new(DataKey::from_raw([7u8; 32]));
	let change_cursor_tracker = Arc::new(ChangeCursorTracker::new(state.clone()));

	let ctx = Arc::new(WorkerContext {
		state,
		remote,
		chunk_cache: Arc::new(ChunkPresenceCache::new()),
		key,
		runtime: runtime.handle().clone(),
		sync_root: sync_root.to_path_buf(),
		cdc: CdcConfig { min: 64, avg: 256, max: 1024 },
		callbacks: Arc::new(NoCallbacks),
		machine_id: "test-machine".to_string(),
		queue: Arc::new(EventQueue::new()),
		next_event_id: Arc::new(AtomicU64::new(0)),
		transfer_table: TransferTable::new(),
		change_cursor_tracker,
	});

	(runtime, ctx)
}

// vim: ts=4
