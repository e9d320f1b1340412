//! Fixed-size worker pool: `worker_count` OS threads (default 4, spec.md
//! §4.4) sharing one `mpsc::Receiver<WorkItem>`, mirroring the teacher's
//! preference for plain threads over a cooperative scheduler for
//! I/O-bound transfer work.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use crate::callbacks::SyncCallbacks;
use crate::chunk_tracker::ChunkPresenceCache;
use crate::chunking::crypto::DataKey;
use crate::config::CdcConfig;
use crate::coordinator::transfer::TransferTable;
use crate::queue::EventQueue;
use crate::remote::RemoteApi;
use crate::state::{ChangeCursorTracker, LocalStateStore};
use crate::types::{EventMetadata, EventSource, EventType, RelativePath, SyncEvent, TransferKind};

use super::{delete, download, upload, TransferOutcome};

/// One dispatched unit of work: a path, the kind of transfer to run, the
/// event that triggered it, and the cancel flag the coordinator can set
/// to interrupt it between chunks.
pub struct WorkItem {
	pub path: RelativePath,
	pub kind: TransferKind,
	pub event: SyncEvent,
	pub cancel: Arc<AtomicBool>,
}

/// Everything a worker thread needs to run a transfer, shared across the
/// whole pool.
pub struct WorkerContext {
	pub state: Arc<LocalStateStore>,
	pub remote: Arc<dyn RemoteApi>,
	pub chunk_cache: Arc<ChunkPresenceCache>,
	pub key: Arc<DataKey>,
	pub runtime: tokio::runtime::Handle,
	pub sync_root: PathBuf,
	pub cdc: CdcConfig,
	pub callbacks: Arc<dyn SyncCallbacks>,
	pub machine_id: String,
	pub queue: Arc<EventQueue>,
	pub next_event_id: Arc<AtomicU64>,
	pub transfer_table: TransferTable,
	pub change_cursor_tracker: Arc<ChangeCursorTracker>,
}

pub struct WorkerPool {
	sender: Option<mpsc::Sender<WorkItem>>,
	handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
	/// Spawn `worker_count` threads pulling from a shared channel.
	pub fn spawn(worker_count: usize, ctx: Arc<WorkerContext>) -> Self {
		let (sender, receiver) = mpsc::channel::<WorkItem>();
		let receiver = Arc::new(Mutex::new(receiver));

		let handles = (0..worker_count.max(1))
			.map(|_| {
				let receiver = receiver.clone();
				let ctx = ctx.clone();
				std::thread::spawn(move || worker_loop(receiver, ctx))
			})
			.collect();

		WorkerPool { sender: Some(sender), handles }
	}

	/// Dispatch one item to the pool. Fails only if every worker thread
	/// has already exited (a bug, not a runtime condition).
	pub fn submit(&self, item: WorkItem) -> Result<(), mpsc::SendError<WorkItem>> {
		self.sender.as_ref().expect("pool not shut down").send(item)
	}

	/// Close the channel and join every worker thread. Workers finish
	/// whatever transfer they're mid-way through; callers wanting a
	/// faster shutdown should cancel active transfers via the shared
	/// `TransferTable` first.
	pub fn shutdown(mut self) {
		self.sender.take();
		for handle in self.handles.drain(..) {
			let _ = handle.join();
		}
	}
}

fn worker_loop(receiver: Arc<Mutex<mpsc::Receiver<WorkItem>>>, ctx: Arc<WorkerContext>) {
	loop {
		let item = {
			let receiver = receiver.lock().expect("worker pool receiver lock poisoned");
			receiver.recv()
		};
		let item = match item {
			Ok(item) => item,
			Err(_) => return,
		};

		ctx.transfer_table.mark_in_progress(&item.path);
		ctx.callbacks.on_transfer_started(&item.path, item.kind);

		let outcome = match item.kind {
			TransferKind::Upload => upload::run(&ctx, &item),
			TransferKind::Download => download::run(&ctx, &item),
			TransferKind::Delete => delete::run(&ctx, &item),
		};

		match &outcome {
			TransferOutcome::Completed | TransferOutcome::Conflict => {
				ctx.callbacks.on_transfer_complete(&item.path, item.kind);
			}
			TransferOutcome::Failed { error, .. } => {
				ctx.callbacks.on_transfer_failed(&item.path, item.kind, error);
			}
			TransferOutcome::Cancelled => {}
		}

		ctx.transfer_table.finish(&item.path);
		ctx.change_cursor_tracker.notify_terminal(&item.path);

		let bookkeeping = match outcome {
			TransferOutcome::Completed | TransferOutcome::Conflict => EventType::TransferComplete,
			TransferOutcome::Failed { .. } | TransferOutcome::Cancelled => EventType::TransferFailed,
		};
		let id = ctx.next_event_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
		ctx.queue.push(SyncEvent::new(id, bookkeeping, EventSource::Internal, item.path, EventMetadata::default()));
	}
}

// vim: ts=4
