//! Periodic full scan (spec.md §4.1, §5): walks the sync tree and
//! reconciles it against the local state store, catching drift the
//! watcher missed (e.g. while the agent was offline or a network
//! filesystem dropped inotify events).

use ignore::WalkBuilder;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::exclusion::ExclusionEngine;
use crate::queue::EventQueue;
use crate::state::LocalStateStore;
use crate::types::{
	derive_status, DerivedStatus, EventMetadata, EventSource, EventType, OnDiskFacts, RelativePath,
	SyncEvent,
};

pub struct Scanner {
	sync_root: std::path::PathBuf,
}

impl Scanner {
	pub fn new(sync_root: std::path::PathBuf) -> Self {
		Scanner { sync_root }
	}

	/// Walk the tree once, emitting one event per path whose derived
	/// status indicates local drift (`New` or `Modified`), plus one
	/// `LocalDeleted` for every recorded path no longer observed on disk.
	pub fn scan_once(
		&self,
		state: &LocalStateStore,
		exclusion: &ExclusionEngine,
		queue: &Arc<EventQueue>,
		next_event_id: &Arc<AtomicU64>,
	) -> Result<usize, crate::error::SyncError> {
		let mut emitted = 0;
		let mut seen = std::collections::HashSet::new();

		let walker = WalkBuilder::new(&self.sync_root).hidden(false).git_ignore(false).build();

		for entry in walker {
			let entry = match entry {
				Ok(e) => e,
				Err(_) => continue,
			};
			if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
				continue;
			}

			let abs_path = entry.path();
			let Ok(relative) = abs_path.strip_prefix(&self.sync_root) else { continue };
			let Ok(rel_path) = RelativePath::new(relative) else { continue };

			if exclusion.should_exclude(abs_path, None) {
				continue;
			}

			seen.insert(rel_path.clone());

			let meta = std::fs::metadata(abs_path)?;
			let disk = OnDiskFacts {
				exists: true,
				mtime: meta
					.modified()
					.ok()
					.and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
					.map(|d| d.as_secs_f64())
					.unwrap_or(0.0),
				size: meta.len(),
			};

			let record = state.get_record(&rel_path)?;
			let status = derive_status(record.as_ref(), Some(disk));

			if matches!(status, DerivedStatus::New | DerivedStatus::Modified) {
				self.emit(queue, next_event_id, rel_path, local_event_type(status), Some(disk));
				emitted += 1;
			}
		}

		for record in state.iter_records()? {
			if !seen.contains(&record.path) {
				self.emit(queue, next_event_id, record.path.clone(), EventType::LocalDeleted, None);
				emitted += 1;
			}
		}

		Ok(emitted)
	}

	fn emit(
		&self,
		queue: &Arc<EventQueue>,
		next_event_id: &Arc<AtomicU64>,
		path: RelativePath,
		event_type: EventType,
		disk: Option<OnDiskFacts>,
	) {
		let id = next_event_id.fetch_add(1, Ordering::SeqCst);
		let metadata = EventMetadata {
			mtime: disk.map(|d| d.mtime),
			size: disk.map(|d| d.size),
			..Default::default()
		};
		queue.push(SyncEvent::new(id, event_type, EventSource::Internal, path, metadata));
	}
}

fn local_event_type(status: DerivedStatus) -> EventType {
	match status {
		DerivedStatus::New => EventType::LocalCreated,
		_ => EventType::LocalModified,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::exclusion::ExclusionEngine;
	use tempfile::TempDir;

	fn exclusion_for(root: &std::path::Path) -> ExclusionEngine {
		ExclusionEngine::new(&crate::exclusion::ExcludeConfig::default(), root).unwrap()
	}

	#[test]
	fn new_file_on_disk_is_detected() {
		let tmp = TempDir::new().unwrap();
		std::fs::write(tmp.path().join("new.txt"), b"hello").unwrap();

		let state = LocalStateStore::open(&tmp.path().join("state.redb")).unwrap();
		let exclusion = exclusion_for(tmp.path());
		let queue = Arc::new(EventQueue::new());
		let next_id = Arc::new(AtomicU64::new(0));

		let scanner = Scanner::new(tmp.path().to_path_buf());
		let emitted = scanner.scan_once(&state, &exclusion, &queue, &next_id).unwrap();

		assert_eq!(emitted, 1);
		let event = queue.pop().unwrap();
		assert_eq!(event.event_type, EventType::LocalCreated);
	}

	#[test]
	fn deleted_recorded_file_is_detected() {
		let tmp = TempDir::new().unwrap();
		let state = LocalStateStore::open(&tmp.path().join("state.redb")).unwrap();
		state
			.put_record(&crate::types::SyncedFileRecord {
				path: RelativePath::new("gone.txt").unwrap(),
				local_mtime: 0.0,
				local_size: 0,
				server_version: 1,
				chunk_hashes: vec![],
				synced_at: 0.0,
			})
			.unwrap();

		let exclusion = exclusion_for(tmp.path());
		let queue = Arc::new(EventQueue::new());
		let next_id = Arc::new(AtomicU64::new(0));

		let scanner = Scanner::new(tmp.path().to_path_buf());
		let emitted = scanner.scan_once(&state, &exclusion, &queue, &next_id).unwrap();

		assert_eq!(emitted, 1);
		let event = queue.pop().unwrap();
		assert_eq!(event.event_type, EventType::LocalDeleted);
	}
}

// vim: ts=4
