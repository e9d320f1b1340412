//! Core data types: the entities described in the data model — relative
//! paths, synced-file records, events, transfers, upload progress and chunks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use unicode_normalization::UnicodeNormalization;

use crate::error::PathError;

/// A path normalized to forward slashes, relative to the sync root, in
/// Unicode normalization form C. Never escapes the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelativePath(String);

impl RelativePath {
	/// Build a RelativePath from a path relative to the sync root,
	/// rejecting anything that would let it escape the root.
	pub fn new(path: impl AsRef<Path>) -> Result<Self, PathError> {
		let path = path.as_ref();
		for component in path.components() {
			match component {
				Component::Normal(_) => {}
				Component::CurDir => {}
				Component::ParentDir => {
					return Err(PathError::EscapesRoot(path.display().to_string()))
				}
				Component::RootDir | Component::Prefix(_) => {
					return Err(PathError::NotRelative(path.display().to_string()))
				}
			}
		}

		let raw = path.to_string_lossy().replace('\\', "/");
		let normalized: String = raw.nfc().collect();

		if normalized.is_empty() {
			return Err(PathError::Empty);
		}
		if normalized.chars().any(|c| matches!(c, '\0'..='\u{1f}' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
		{
			return Err(PathError::ForbiddenCharacter(normalized));
		}

		Ok(RelativePath(normalized))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn as_path(&self) -> &Path {
		Path::new(&self.0)
	}

	/// File-name extension stem/extension split used when naming conflict
	/// siblings (`{stem}.conflict-*{ext}`).
	pub fn stem_and_extension(&self) -> (&str, &str) {
		match self.0.rsplit_once('/') {
			Some((_, name)) => split_ext(name),
			None => split_ext(&self.0),
		}
	}
}

fn split_ext(name: &str) -> (&str, &str) {
	match name.rsplit_once('.') {
		Some((stem, ext)) if !stem.is_empty() => (stem, ext),
		_ => (name, ""),
	}
}

impl fmt::Display for RelativePath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// One content-addressed plaintext span produced by content-defined
/// chunking. Identity is the SHA-256 of the plaintext (`hash`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
	pub hash: String,
	pub offset: u64,
	pub length: usize,
}

/// Authoritative local record of "the last known-good sync" for a path.
/// A record exists iff the client has ever successfully committed a sync
/// for the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedFileRecord {
	pub path: RelativePath,
	pub local_mtime: f64,
	pub local_size: u64,
	pub server_version: u64,
	pub chunk_hashes: Vec<String>,
	pub synced_at: f64,
}

/// Status derived from a SyncedFileRecord plus the current disk/record
/// state — never itself persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedStatus {
	New,
	Modified,
	Deleted,
	Synced,
	ConflictPending,
}

impl fmt::Display for DerivedStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			DerivedStatus::New => "NEW",
			DerivedStatus::Modified => "MODIFIED",
			DerivedStatus::Deleted => "DELETED",
			DerivedStatus::Synced => "SYNCED",
			DerivedStatus::ConflictPending => "CONFLICT_PENDING",
		};
		write!(f, "{}", s)
	}
}

/// Observed on-disk facts used to derive a status without touching the
/// filesystem a second time.
#[derive(Debug, Clone, Copy)]
pub struct OnDiskFacts {
	pub exists: bool,
	pub mtime: f64,
	pub size: u64,
}

/// record + on-disk stat -> status (spec.md §9: the derived-status rule
/// has no write contention and is the canonical source of truth).
pub fn derive_status(record: Option<&SyncedFileRecord>, disk: Option<OnDiskFacts>) -> DerivedStatus {
	match (record, disk) {
		(None, Some(d)) if d.exists => DerivedStatus::New,
		(None, _) => DerivedStatus::Deleted,
		(Some(_), None) => DerivedStatus::Deleted,
		(Some(_), Some(d)) if !d.exists => DerivedStatus::Deleted,
		(Some(r), Some(d)) => {
			if (r.local_mtime - d.mtime).abs() > f64::EPSILON || r.local_size != d.size {
				DerivedStatus::Modified
			} else {
				DerivedStatus::Synced
			}
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
	LocalCreated,
	LocalModified,
	LocalDeleted,
	RemoteCreated,
	RemoteModified,
	RemoteDeleted,
	TransferComplete,
	TransferFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
	Local,
	Remote,
	Internal,
}

/// Extra facts an emitter observed at read time — never the emission
/// time, which matters for dedup correctness (spec.md §4.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMetadata {
	pub mtime: Option<f64>,
	pub size: Option<u64>,
	pub parent_version: Option<u64>,
	pub server_version: Option<u64>,
	pub content_hash: Option<String>,
}

/// An immutable tuple describing one thing that happened, fed into the
/// EventQueue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
	pub id: u64,
	pub event_type: EventType,
	pub source: EventSource,
	pub path: RelativePath,
	pub timestamp: f64,
	pub metadata: EventMetadata,
}

impl SyncEvent {
	pub fn new(
		id: u64,
		event_type: EventType,
		source: EventSource,
		path: RelativePath,
		metadata: EventMetadata,
	) -> Self {
		SyncEvent { id, event_type, source, path, timestamp: now_secs(), metadata }
	}
}

pub fn now_secs() -> f64 {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
	Upload,
	Download,
	Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
	Pending,
	InProgress,
	Completed,
	Cancelled,
	Failed,
}

/// Coordinator-tracked, in-memory record of one operation for exactly one
/// path. Only one active Transfer per path at a time.
#[derive(Debug, Clone)]
pub struct Transfer {
	pub path: RelativePath,
	pub kind: TransferKind,
	pub status: TransferStatus,
	pub base_version: Option<u64>,
	pub detected_server_version: Option<u64>,
	pub has_conflict: bool,
}

/// Persisted, resumable record of an in-flight upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
	pub path: RelativePath,
	pub expected_chunk_hashes: Vec<String>,
	pub uploaded_chunk_hashes: Vec<String>,
	pub started_at: f64,
}

impl UploadProgress {
	pub fn remaining<'a>(&'a self) -> impl Iterator<Item = &'a str> {
		let uploaded: std::collections::HashSet<&str> =
			self.uploaded_chunk_hashes.iter().map(String::as_str).collect();
		self.expected_chunk_hashes.iter().map(String::as_str).filter(move |h| !uploaded.contains(h))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn relative_path_rejects_parent_dir() {
		assert!(RelativePath::new("../escape").is_err());
		assert!(RelativePath::new("a/../../b").is_err());
	}

	#[test]
	fn relative_path_rejects_absolute() {
		assert!(RelativePath::new("/etc/passwd").is_err());
	}

	#[test]
	fn relative_path_normalizes_backslashes() {
		let p = RelativePath::new("a\\b\\c.txt").unwrap();
		assert_eq!(p.as_str(), "a/b/c.txt");
	}

	#[test]
	fn stem_and_extension_split() {
		let p = RelativePath::new("dir/doc.md").unwrap();
		assert_eq!(p.stem_and_extension(), ("doc", "md"));

		let p = RelativePath::new("dir/noext").unwrap();
		assert_eq!(p.stem_and_extension(), ("noext", ""));
	}

	#[test]
	fn derive_status_new_modified_deleted_synced() {
		assert_eq!(derive_status(None, Some(OnDiskFacts { exists: true, mtime: 1.0, size: 1 })), DerivedStatus::New);
		assert_eq!(derive_status(None, None), DerivedStatus::Deleted);

		let record = SyncedFileRecord {
			path: RelativePath::new("a.txt").unwrap(),
			local_mtime: 10.0,
			local_size: 5,
			server_version: 1,
			chunk_hashes: vec![],
			synced_at: 10.0,
		};
		assert_eq!(derive_status(Some(&record), None), DerivedStatus::Deleted);
		assert_eq!(
			derive_status(Some(&record), Some(OnDiskFacts { exists: true, mtime: 10.0, size: 5 })),
			DerivedStatus::Synced
		);
		assert_eq!(
			derive_status(Some(&record), Some(OnDiskFacts { exists: true, mtime: 11.0, size: 5 })),
			DerivedStatus::Modified
		);
	}

	#[test]
	fn upload_progress_remaining_skips_uploaded() {
		let progress = UploadProgress {
			path: RelativePath::new("f.bin").unwrap(),
			expected_chunk_hashes: vec!["a".into(), "b".into(), "c".into()],
			uploaded_chunk_hashes: vec!["a".into()],
			started_at: 0.0,
		};
		let remaining: Vec<&str> = progress.remaining().collect();
		assert_eq!(remaining, vec!["b", "c"]);
	}
}

// vim: ts=4
