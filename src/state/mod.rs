//! Local state store (spec.md §4.6).
//!
//! Three logical tables backed by a single `redb` database, bincode
//! serialized: `synced_files` (the last known-good record per path),
//! `upload_progress` (resumable in-flight uploads) and `meta` (a handful
//! of scalars, currently just `change_cursor`). Writes to a single path
//! are atomic (one `redb` write transaction each); `change_cursor` only
//! advances once every event in the batch that produced it has reached
//! a terminal outcome. An unreadable store is never repaired in place —
//! it is deleted and rebuilt empty, which forces a full re-sync against
//! the server's record of the world.

pub mod cursor_tracker;

pub use cursor_tracker::ChangeCursorTracker;

use redb::{Database, ReadableTable, TableDefinition};
use std::error::Error;
use std::path::Path;

use crate::error::SyncError;
use crate::types::{RelativePath, SyncedFileRecord, UploadProgress};

const SYNCED_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("synced_files");
const UPLOAD_PROGRESS: TableDefinition<&str, &[u8]> = TableDefinition::new("upload_progress");
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

const CHANGE_CURSOR_KEY: &str = "change_cursor";

/// Local, redb-backed store of sync state. One instance per agent.
pub struct LocalStateStore {
	db: Database,
}

impl LocalStateStore {
	/// Open (or create) the store at `db_path`. A corrupt file is
	/// replaced with a fresh, empty database rather than surfaced as a
	/// fatal error — the caller is expected to log this and trigger a
	/// full re-sync.
	pub fn open(db_path: &Path) -> Result<Self, SyncError> {
		match Self::open_inner(db_path) {
			Ok(store) => Ok(store),
			Err(_) => {
				let _ = std::fs::remove_file(db_path);
				Self::open_inner(db_path).map_err(|e| SyncError::StateCorruption {
					message: format!("failed to rebuild local state store: {}", e),
					recoverable: false,
				})
			}
		}
	}

	fn open_inner(db_path: &Path) -> Result<Self, Box<dyn Error>> {
		let db = Database::create(db_path)?;
		let write_txn = db.begin_write()?;
		{
			let _ = write_txn.open_table(SYNCED_FILES)?;
			let _ = write_txn.open_table(UPLOAD_PROGRESS)?;
			let _ = write_txn.open_table(META)?;
		}
		write_txn.commit()?;
		Ok(LocalStateStore { db })
	}

	/// The last known-good record for `path`, if the client has ever
	/// successfully synced it.
	pub fn get_record(&self, path: &RelativePath) -> Result<Option<SyncedFileRecord>, SyncError> {
		self.get_row(SYNCED_FILES, path.as_str())
	}

	/// Write (or overwrite) the record for `path`. Atomic: one commit.
	pub fn put_record(&self, record: &SyncedFileRecord) -> Result<(), SyncError> {
		self.put_row(SYNCED_FILES, record.path.as_str(), record)
	}

	pub fn delete_record(&self, path: &RelativePath) -> Result<(), SyncError> {
		self.delete_row(SYNCED_FILES, path.as_str())
	}

	/// All currently known synced-file records, for startup reconciliation.
	pub fn iter_records(&self) -> Result<Vec<SyncedFileRecord>, SyncError> {
		self.iter_table(SYNCED_FILES)
	}

	pub fn get_upload_progress(&self, path: &RelativePath) -> Result<Option<UploadProgress>, SyncError> {
		self.get_row(UPLOAD_PROGRESS, path.as_str())
	}

	pub fn put_upload_progress(&self, progress: &UploadProgress) -> Result<(), SyncError> {
		self.put_row(UPLOAD_PROGRESS, progress.path.as_str(), progress)
	}

	pub fn delete_upload_progress(&self, path: &RelativePath) -> Result<(), SyncError> {
		self.delete_row(UPLOAD_PROGRESS, path.as_str())
	}

	/// All resumable uploads, consulted once at startup.
	pub fn iter_upload_progress(&self) -> Result<Vec<UploadProgress>, SyncError> {
		self.iter_table(UPLOAD_PROGRESS)
	}

	/// The change cursor the remote change stream resumes from. `None`
	/// before the first successful poll/commit.
	pub fn get_change_cursor(&self) -> Result<Option<u64>, SyncError> {
		let read_txn = self.db.begin_read().map_err(state_err)?;
		let table = read_txn.open_table(META).map_err(state_err)?;
		match table.get(CHANGE_CURSOR_KEY).map_err(state_err)? {
			Some(v) => {
				let bytes = v.value();
				let cursor: u64 = bincode::deserialize(bytes).map_err(state_err)?;
				Ok(Some(cursor))
			}
			None => Ok(None),
		}
	}

	/// Advance the change cursor. Callers must only do this once every
	/// event produced by the batch at `cursor` has reached a terminal
	/// outcome (spec.md §4.6 invariant).
	pub fn set_change_cursor(&self, cursor: u64) -> Result<(), SyncError> {
		let bytes = bincode::serialize(&cursor).map_err(state_err)?;
		let write_txn = self.db.begin_write().map_err(state_err)?;
		{
			let mut table = write_txn.open_table(META).map_err(state_err)?;
			table.insert(CHANGE_CURSOR_KEY, bytes.as_slice()).map_err(state_err)?;
		}
		write_txn.commit().map_err(state_err)?;
		Ok(())
	}

	fn get_row<T: serde::de::DeserializeOwned>(
		&self,
		table_def: TableDefinition<&str, &[u8]>,
		key: &str,
	) -> Result<Option<T>, SyncError> {
		let read_txn = self.db.begin_read().map_err(state_err)?;
		let table = read_txn.open_table(table_def).map_err(state_err)?;
		match table.get(key).map_err(state_err)? {
			Some(v) => {
				let value: T = bincode::deserialize(v.value()).map_err(state_err)?;
				Ok(Some(value))
			}
			None => Ok(None),
		}
	}

	fn put_row<T: serde::Serialize>(
		&self,
		table_def: TableDefinition<&str, &[u8]>,
		key: &str,
		value: &T,
	) -> Result<(), SyncError> {
		let bytes = bincode::serialize(value).map_err(state_err)?;
		let write_txn = self.db.begin_write().map_err(state_err)?;
		{
			let mut table = write_txn.open_table(table_def).map_err(state_err)?;
			table.insert(key, bytes.as_slice()).map_err(state_err)?;
		}
		write_txn.commit().map_err(state_err)?;
		Ok(())
	}

	fn delete_row(&self, table_def: TableDefinition<&str, &[u8]>, key: &str) -> Result<(), SyncError> {
		let write_txn = self.db.begin_write().map_err(state_err)?;
		{
			let mut table = write_txn.open_table(table_def).map_err(state_err)?;
			table.remove(key).map_err(state_err)?;
		}
		write_txn.commit().map_err(state_err)?;
		Ok(())
	}

	fn iter_table<T: serde::de::DeserializeOwned>(
		&self,
		table_def: TableDefinition<&str, &[u8]>,
	) -> Result<Vec<T>, SyncError> {
		let read_txn = self.db.begin_read().map_err(state_err)?;
		let table = read_txn.open_table(table_def).map_err(state_err)?;
		let mut out = Vec::new();
		for row in table.iter().map_err(state_err)? {
			let (_, v) = row.map_err(state_err)?;
			let value: T = bincode::deserialize(v.value()).map_err(state_err)?;
			out.push(value);
		}
		Ok(out)
	}
}

fn state_err<E: std::fmt::Display>(e: E) -> SyncError {
	SyncError::StateCorruption { message: e.to_string(), recoverable: true }
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn record(path: &str, version: u64) -> SyncedFileRecord {
		SyncedFileRecord {
			path: RelativePath::new(path).unwrap(),
			local_mtime: 100.0,
			local_size: 42,
			server_version: version,
			chunk_hashes: vec!["abc".to_string()],
			synced_at: 100.0,
		}
	}

	#[test]
	fn put_and_get_record_round_trips() {
		let tmp = TempDir::new().unwrap();
		let store = LocalStateStore::open(&tmp.path().join("state.redb")).unwrap();

		let r = record("a/b.txt", 3);
		store.put_record(&r).unwrap();

		let fetched = store.get_record(&r.path).unwrap().unwrap();
		assert_eq!(fetched.server_version, 3);
		assert_eq!(fetched.chunk_hashes, vec!["abc".to_string()]);
	}

	#[test]
	fn missing_record_is_none() {
		let tmp = TempDir::new().unwrap();
		let store = LocalStateStore::open(&tmp.path().join("state.redb")).unwrap();
		assert!(store.get_record(&RelativePath::new("nope.txt").unwrap()).unwrap().is_none());
	}

	#[test]
	fn delete_record_removes_it() {
		let tmp = TempDir::new().unwrap();
		let store = LocalStateStore::open(&tmp.path().join("state.redb")).unwrap();
		let r = record("x.txt", 1);
		store.put_record(&r).unwrap();
		store.delete_record(&r.path).unwrap();
		assert!(store.get_record(&r.path).unwrap().is_none());
	}

	#[test]
	fn iter_records_returns_all() {
		let tmp = TempDir::new().unwrap();
		let store = LocalStateStore::open(&tmp.path().join("state.redb")).unwrap();
		store.put_record(&record("a.txt", 1)).unwrap();
		store.put_record(&record("b.txt", 1)).unwrap();
		let mut paths: Vec<String> =
			store.iter_records().unwrap().into_iter().map(|r| r.path.as_str().to_string()).collect();
		paths.sort();
		assert_eq!(paths, vec!["a.txt".to_string(), "b.txt".to_string()]);
	}

	#[test]
	fn upload_progress_round_trips_and_deletes() {
		let tmp = TempDir::new().unwrap();
		let store = LocalStateStore::open(&tmp.path().join("state.redb")).unwrap();
		let progress = UploadProgress {
			path: RelativePath::new("big.bin").unwrap(),
			expected_chunk_hashes: vec!["h1".into(), "h2".into()],
			uploaded_chunk_hashes: vec!["h1".into()],
			started_at: 0.0,
		};
		store.put_upload_progress(&progress).unwrap();
		let fetched = store.get_upload_progress(&progress.path).unwrap().unwrap();
		assert_eq!(fetched.uploaded_chunk_hashes, vec!["h1".to_string()]);

		store.delete_upload_progress(&progress.path).unwrap();
		assert!(store.get_upload_progress(&progress.path).unwrap().is_none());
	}

	#[test]
	fn change_cursor_starts_absent_then_advances() {
		let tmp = TempDir::new().unwrap();
		let store = LocalStateStore::open(&tmp.path().join("state.redb")).unwrap();
		assert!(store.get_change_cursor().unwrap().is_none());
		store.set_change_cursor(42).unwrap();
		assert_eq!(store.get_change_cursor().unwrap(), Some(42));
	}

	#[test]
	fn corrupt_file_is_rebuilt_empty() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("state.redb");
		std::fs::write(&path, b"not a redb file at all").unwrap();

		let store = LocalStateStore::open(&path).unwrap();
		assert!(store.iter_records().unwrap().is_empty());
	}
}

// vim: ts=4
