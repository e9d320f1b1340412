//! Filesystem watcher: turns raw `notify` events into debounced
//! `SyncEvent`s pushed onto the `EventQueue` (spec.md §4.1).

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::exclusion::ExclusionEngine;
use crate::queue::EventQueue;
use crate::types::{EventMetadata, EventSource, EventType, RelativePath, SyncEvent};

/// Runs on its own OS thread for the lifetime of the agent, blocking on
/// the `notify` channel and debouncing bursts of events per path before
/// emitting one `SyncEvent` onto the shared queue.
pub struct Watcher {
	sync_root: std::path::PathBuf,
	debounce: Duration,
	settle: Duration,
}

impl Watcher {
	pub fn new(sync_root: std::path::PathBuf, debounce_ms: u64, settle_ms: u64) -> Self {
		Watcher {
			sync_root,
			debounce: Duration::from_millis(debounce_ms),
			settle: Duration::from_millis(settle_ms),
		}
	}

	/// Blocks the calling thread forever (or until the watch channel
	/// errors out), pushing debounced events onto `queue`.
	pub fn run(
		&self,
		queue: Arc<EventQueue>,
		exclusion: Arc<ExclusionEngine>,
		next_event_id: Arc<std::sync::atomic::AtomicU64>,
	) -> notify::Result<()> {
		let (tx, rx) = channel::<notify::Result<Event>>();
		let mut watcher = RecommendedWatcher::new(tx, notify::Config::default())?;
		watcher.watch(&self.sync_root, RecursiveMode::Recursive)?;

		let mut pending: HashMap<RelativePath, (EventType, Instant)> = HashMap::new();

		loop {
			match rx.recv_timeout(self.debounce) {
				Ok(Ok(event)) => {
					self.record_event(event, &mut pending);
				}
				Ok(Err(_)) => continue,
				Err(RecvTimeoutError::Timeout) => {}
				Err(RecvTimeoutError::Disconnected) => return Ok(()),
			}

			self.flush_settled(&mut pending, &queue, &exclusion, &next_event_id);
		}
	}

	fn record_event(&self, event: Event, pending: &mut HashMap<RelativePath, (EventType, Instant)>) {
		let event_type = match event.kind {
			EventKind::Create(_) => EventType::LocalCreated,
			EventKind::Modify(_) => EventType::LocalModified,
			EventKind::Remove(_) => EventType::LocalDeleted,
			_ => return,
		};

		for abs_path in event.paths {
			let Ok(relative) = abs_path.strip_prefix(&self.sync_root) else { continue };
			let Ok(rel_path) = RelativePath::new(relative) else { continue };
			pending.insert(rel_path, (event_type, Instant::now()));
		}
	}

	fn flush_settled(
		&self,
		pending: &mut HashMap<RelativePath, (EventType, Instant)>,
		queue: &Arc<EventQueue>,
		exclusion: &Arc<ExclusionEngine>,
		next_event_id: &Arc<std::sync::atomic::AtomicU64>,
	) {
		let now = Instant::now();
		let settled: Vec<RelativePath> = pending
			.iter()
			.filter(|(_, (_, seen_at))| now.duration_since(*seen_at) >= self.settle)
			.map(|(path, _)| path.clone())
			.collect();

		for path in settled {
			let (event_type, _) = pending.remove(&path).expect("just filtered from this map");
			if exclusion.should_exclude(path.as_path(), None) {
				continue;
			}

			let abs_path = self.sync_root.join(path.as_path());
			let metadata = stat(&abs_path);

			let id = next_event_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
			queue.push(SyncEvent::new(id, event_type, EventSource::Local, path, metadata));
		}
	}
}

fn stat(path: &Path) -> EventMetadata {
	match std::fs::metadata(path) {
		Ok(meta) => EventMetadata {
			mtime: meta.modified().ok().and_then(|m| {
				m.duration_since(std::time::UNIX_EPOCH).ok().map(|d| d.as_secs_f64())
			}),
			size: Some(meta.len()),
			..Default::default()
		},
		Err(_) => EventMetadata::default(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn stat_missing_path_is_empty_metadata() {
		let metadata = stat(Path::new("/nonexistent/definitely/missing"));
		assert!(metadata.size.is_none());
	}
}

// vim: ts=4
