//! Composition root: wires the watcher, scanner, coordinator and worker
//! pool together and owns the agent's lifecycle from `agent run` until a
//! signal asks it to stop (spec.md §5, ambient stack §A). No single
//! teacher file plays this role — the teacher's `main.rs` dispatches CLI
//! subcommands directly — so this is grounded in the overall shape of
//! how the teacher's own modules are wired together, not one file.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::callbacks::SyncCallbacks;
use crate::chunk_tracker::ChunkPresenceCache;
use crate::chunking::crypto::DataKey;
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::delete::DeleteProtection;
use crate::detector::{Scanner, Watcher};
use crate::error::SyncError;
use crate::exclusion::{ExcludeConfig, ExclusionEngine};
use crate::keystore::{FileKeystore, Keystore};
use crate::queue::EventQueue;
use crate::remote::{ChangeStream, HttpRemoteApi, RemoteApi};
use crate::retry::RetryPolicy;
use crate::state::{ChangeCursorTracker, LocalStateStore};
use crate::types::{EventMetadata, EventSource, EventType, RelativePath, SyncEvent};
use crate::utils::lock::FileLock;
use crate::workers::WorkerContext;

/// Everything needed to run one agent instance for its whole lifetime.
pub struct Supervisor {
	config: Config,
	sync_root: PathBuf,
	_lock: FileLock,
	state: Arc<LocalStateStore>,
	queue: Arc<EventQueue>,
	next_event_id: Arc<AtomicU64>,
	exclusion: Arc<ExclusionEngine>,
	ctx: Arc<WorkerContext>,
	runtime: tokio::runtime::Runtime,
	remote: Arc<dyn RemoteApi>,
	cursor_tracker: Arc<ChangeCursorTracker>,
}

impl Supervisor {
	/// Acquire the single-instance lock, open local state, unlock the
	/// keystore and build every shared piece of agent state. Does not
	/// start any threads yet — call `run` for that.
	pub fn init(config: Config, master_password: &str, callbacks: Arc<dyn SyncCallbacks>) -> Result<Self, SyncError> {
		std::fs::create_dir_all(&config.agent_dir)?;
		let lock = FileLock::acquire(&config.agent_dir)
			.map_err(|e| SyncError::Configuration { message: e.to_string() })?;

		let state = Arc::new(LocalStateStore::open(&config.agent_dir.join("state.redb"))?);

		let keystore = FileKeystore::new(&config.agent_dir);
		let key = Arc::new(keystore.unlock(master_password)?);

		let exclude_config = ExcludeConfig {
			patterns: config.ignore_patterns.clone(),
			respect_ignore_files: if config.respect_ignore_files {
				vec![".syncignore".to_string(), ".gitignore".to_string()]
			} else {
				vec![]
			},
			..Default::default()
		};
		let exclusion = Arc::new(ExclusionEngine::new(&exclude_config, &config.sync_folder)?);

		let runtime = tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.build()
			.map_err(|e| SyncError::Configuration { message: format!("failed to start async runtime: {}", e) })?;

		let remote: Arc<dyn RemoteApi> = Arc::new(HttpRemoteApi::new(
			config.server_url.clone(),
			config.auth_token.clone(),
			Duration::from_secs(config.connect_timeout_secs),
			Duration::from_secs(config.read_timeout_secs),
		)?);

		let machine_id = load_or_create_machine_id(&config.agent_dir)?;
		let queue = Arc::new(EventQueue::new());
		let next_event_id = Arc::new(AtomicU64::new(0));
		let cursor_tracker = Arc::new(ChangeCursorTracker::new(state.clone()));

		let ctx = Arc::new(WorkerContext {
			state: state.clone(),
			remote: remote.clone(),
			chunk_cache: Arc::new(ChunkPresenceCache::new()),
			key,
			runtime: runtime.handle().clone(),
			sync_root: config.sync_folder.clone(),
			cdc: config.cdc,
			callbacks,
			machine_id,
			queue: queue.clone(),
			next_event_id: next_event_id.clone(),
			transfer_table: crate::coordinator::TransferTable::new(),
			change_cursor_tracker: cursor_tracker.clone(),
		});

		Ok(Supervisor {
			sync_root: config.sync_folder.clone(),
			state,
			queue,
			next_event_id,
			exclusion,
			ctx,
			runtime,
			remote,
			cursor_tracker,
			config,
			_lock: lock,
		})
	}

	/// Resume any uploads that were interrupted mid-transfer, then catch
	/// up on local drift before the watcher ever sees an event (spec.md
	/// §4.1/§9: the first scan is not a special case, but running one
	/// before the watcher starts avoids racing it against startup).
	fn resync_on_startup(&self) -> Result<(), SyncError> {
		let resumable = self.state.iter_upload_progress()?;
		if !resumable.is_empty() {
			info!(count = resumable.len(), "re-queueing interrupted uploads from a previous run");
		}
		for progress in resumable {
			let id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
			self.queue.push(SyncEvent::new(
				id,
				EventType::LocalModified,
				EventSource::Internal,
				progress.path,
				EventMetadata::default(),
			));
		}

		let scanner = Scanner::new(self.sync_root.clone());
		let emitted = scanner.scan_once(&self.state, &self.exclusion, &self.queue, &self.next_event_id)?;
		info!(emitted, "startup scan complete");

		self.runtime.handle().block_on(poll_once(
			&self.remote,
			&self.state,
			&self.cursor_tracker,
			&self.queue,
			&self.next_event_id,
		));

		self.runtime.handle().block_on(reconcile_remote_listing(&self.remote, &self.state, &self.queue, &self.next_event_id));
		Ok(())
	}

	/// Run until a termination signal arrives. Blocks the calling thread.
	pub fn run(self) -> Result<(), SyncError> {
		self.runtime.spawn(async { crate::utils::lock::setup_signal_handlers() });

		self.resync_on_startup()?;

		let coordinator = Coordinator::new(self.config.worker_count, self.ctx.clone(), DeleteProtection::new(self.config.delete_protection.clone()));

		let watcher_queue = self.queue.clone();
		let watcher_exclusion = self.exclusion.clone();
		let watcher_next_id = self.next_event_id.clone();
		let watcher = Watcher::new(self.sync_root.clone(), self.config.debounce_ms, self.config.settle_ms);
		let watcher_handle = std::thread::spawn(move || {
			if let Err(e) = watcher.run(watcher_queue, watcher_exclusion, watcher_next_id) {
				warn!(error = %e, "filesystem watcher exited");
			}
		});

		let coordinator = Arc::new(coordinator);
		let coordinator_for_thread = coordinator.clone();
		let coordinator_handle = std::thread::spawn(move || coordinator_for_thread.run());

		let scan_interval = Duration::from_secs(self.config.scan_interval_secs);
		let scanner_state = self.state.clone();
		let scanner_exclusion = self.exclusion.clone();
		let scanner_queue = self.queue.clone();
		let scanner_next_id = self.next_event_id.clone();
		let scanner_sync_root = self.sync_root.clone();
		let scanner_coordinator = coordinator.clone();
		let scanner_remote = self.remote.clone();
		let scanner_tracker = self.cursor_tracker.clone();
		let scanner_runtime = self.runtime.handle().clone();
		let scanner_handle = std::thread::spawn(move || {
			let scanner = Scanner::new(scanner_sync_root);
			loop {
				std::thread::sleep(scan_interval);
				if crate::utils::lock::check_shutdown() {
					return;
				}
				match scanner.scan_once(&scanner_state, &scanner_exclusion, &scanner_queue, &scanner_next_id) {
					Ok(emitted) => info!(emitted, "periodic scan complete"),
					Err(e) => warn!(error = %e, "periodic scan failed"),
				}
				// Local drift and remote drift are caught on the same
				// cadence (spec.md §4.1); this is also the periodic
				// polling fallback when the push channel is disabled or
				// between reconnects.
				scanner_runtime.block_on(poll_once(&scanner_remote, &scanner_state, &scanner_tracker, &scanner_queue, &scanner_next_id));
				scanner_coordinator.reset_delete_streak();
			}
		});

		if self.config.enable_change_stream {
			self.spawn_change_stream();
		}

		while !crate::utils::lock::check_shutdown() {
			std::thread::sleep(Duration::from_millis(200));
		}

		self.queue.close();
		let _ = watcher_handle.join();
		let _ = scanner_handle.join();
		let _ = coordinator_handle.join();

		Ok(())
	}

	/// Subscribe to the server's push channel, if reachable, translating
	/// inbound changes into queue events. Reconnects with exponential
	/// backoff (1..60 s, spec.md §6) rather than exiting when the stream
	/// drops; the periodic scanner's own `changes-since` poll (same
	/// cadence as its local walk) covers the gap while a reconnect is
	/// pending, so the coordinator never depends on this channel staying
	/// up.
	fn spawn_change_stream(&self) {
		let ws_url = to_ws_url(&self.config.server_url);
		let auth_token = self.config.auth_token.clone();
		let queue = self.queue.clone();
		let next_event_id = self.next_event_id.clone();
		let remote = self.remote.clone();
		let state = self.state.clone();
		let tracker = self.cursor_tracker.clone();

		self.runtime.spawn(async move {
			let mut retry = RetryPolicy::new(u32::MAX, 60);
			loop {
				if crate::utils::lock::check_shutdown() {
					return;
				}

				match ChangeStream::connect(&ws_url, &auth_token).await {
					Ok(mut stream) => {
						retry.reset();
						while let Some(change) = stream.next_change().await {
							if let Ok(path) = RelativePath::new(&change.path) {
								let event_type = if change.deleted { EventType::RemoteDeleted } else { EventType::RemoteModified };
								let metadata = EventMetadata { server_version: Some(change.version), ..Default::default() };
								let id = next_event_id.fetch_add(1, Ordering::SeqCst);
								queue.push(SyncEvent::new(id, event_type, EventSource::Remote, path, metadata));
							}
						}
						warn!("change stream dropped; reconnecting with backoff");
						poll_once(&remote, &state, &tracker, &queue, &next_event_id).await;
					}
					Err(e) => {
						warn!(error = %e, "could not establish change stream; retrying with backoff");
						poll_once(&remote, &state, &tracker, &queue, &next_event_id).await;
					}
				}

				tokio::time::sleep(retry.next_delay()).await;
			}
		});
	}
}

async fn poll_once(
	remote: &Arc<dyn RemoteApi>,
	state: &Arc<LocalStateStore>,
	tracker: &Arc<ChangeCursorTracker>,
	queue: &Arc<EventQueue>,
	next_event_id: &Arc<AtomicU64>,
) {
	let cursor = state.get_change_cursor().ok().flatten();
	let batch = match remote.poll_changes(cursor).await {
		Ok(batch) => batch,
		Err(e) => {
			warn!(error = %e, "poll_changes failed");
			return;
		}
	};

	let changes: Vec<(RelativePath, u64, bool)> = batch
		.changes
		.into_iter()
		.filter_map(|change| RelativePath::new(&change.path).ok().map(|path| (path, change.version, change.deleted)))
		.collect();

	// Register before pushing: a worker must never be able to report a
	// path terminal before the tracker knows to expect it (spec.md §4.6).
	tracker.register(batch.next_cursor, changes.iter().map(|(path, _, _)| path.clone()));

	for (path, version, deleted) in changes {
		let event_type = if deleted { EventType::RemoteDeleted } else { EventType::RemoteModified };
		let metadata = EventMetadata { server_version: Some(version), ..Default::default() };
		let id = next_event_id.fetch_add(1, Ordering::SeqCst);
		queue.push(SyncEvent::new(id, event_type, EventSource::Remote, path, metadata));
	}
}

/// Full-listing reconciliation (spec.md §6's `GET /files`), run once at
/// startup alongside the local scan: `changes-since` only covers drift
/// since a known cursor, which is no help the very first time an agent
/// points at a sync root, or after the cursor's local record is lost.
/// Compares every server-known path's version against `SyncedFileRecord`
/// and emits the same remote events the push channel and poller would
/// have, had they seen the drift happen live.
async fn reconcile_remote_listing(
	remote: &Arc<dyn RemoteApi>,
	state: &Arc<LocalStateStore>,
	queue: &Arc<EventQueue>,
	next_event_id: &Arc<AtomicU64>,
) {
	let listing = match remote.list_files(None).await {
		Ok(listing) => listing,
		Err(e) => {
			warn!(error = %e, "list_files failed during startup reconciliation");
			return;
		}
	};

	let known = match state.iter_records() {
		Ok(records) => records,
		Err(e) => {
			warn!(error = %e, "failed to read local records during startup reconciliation");
			return;
		}
	};
	let known_versions: std::collections::HashMap<String, u64> =
		known.iter().map(|r| (r.path.to_string(), r.server_version)).collect();
	let mut seen = std::collections::HashSet::new();

	for entry in &listing {
		seen.insert(entry.path.clone());
		let path = match RelativePath::new(&entry.path) {
			Ok(path) => path,
			Err(_) => continue,
		};
		if known_versions.get(&entry.path) != Some(&entry.version) {
			let metadata = EventMetadata { server_version: Some(entry.version), ..Default::default() };
			let id = next_event_id.fetch_add(1, Ordering::SeqCst);
			queue.push(SyncEvent::new(id, EventType::RemoteModified, EventSource::Remote, path, metadata));
		}
	}

	for path in known_versions.keys().filter(|p| !seen.contains(*p)) {
		if let Ok(path) = RelativePath::new(path) {
			let id = next_event_id.fetch_add(1, Ordering::SeqCst);
			queue.push(SyncEvent::new(id, EventType::RemoteDeleted, EventSource::Remote, path, EventMetadata::default()));
		}
	}
}

fn to_ws_url(server_url: &str) -> String {
	let ws = if let Some(rest) = server_url.strip_prefix("https://") {
		format!("wss://{}", rest)
	} else if let Some(rest) = server_url.strip_prefix("http://") {
		format!("ws://{}", rest)
	} else {
		server_url.to_string()
	};
	format!("{}/ws/changes", ws.trim_end_matches('/'))
}

/// A random per-install identifier disambiguating which machine created a
/// conflict sibling (spec.md's SafeRename naming). Persisted once,
/// alongside the keyfile, so it stays stable across restarts.
fn load_or_create_machine_id(agent_dir: &std::path::Path) -> Result<String, SyncError> {
	let path = agent_dir.join("machine_id");
	if let Ok(existing) = std::fs::read_to_string(&path) {
		let trimmed = existing.trim().to_string();
		if !trimmed.is_empty() {
			return Ok(trimmed);
		}
	}
	let id = uuid::Uuid::new_v4().to_string();
	std::fs::write(&path, &id)?;
	Ok(id)
}

// vim: ts=4
