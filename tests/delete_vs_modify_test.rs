//! S6 (spec.md §8): A deletes `r.txt` (soft-delete on the server) while B
//! concurrently modifies it. B's stale `parent_version` commit finds no
//! server record at all and must "create fresh" rather than fail, so both
//! machines converge on B's content.

mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use syncagent_core::chunking::{cdc, content_hash};
use syncagent_core::config::CdcConfig;
use syncagent_core::types::{EventMetadata, EventSource, EventType, RelativePath, SyncEvent, SyncedFileRecord, TransferKind};
use syncagent_core::workers::{delete, download, upload, TransferOutcome, WorkItem};

use common::{build_ctx, FakeRemoteApi};

fn small_cdc() -> CdcConfig {
	CdcConfig { min: 64, avg: 256, max: 1024 }
}

/// A's side: `r.txt` already existed at server version 1 and A deletes it
/// locally, then runs the delete worker to soft-delete it remotely.
#[test]
fn delete_worker_soft_deletes_a_record_the_server_already_had() {
	let tmp = tempfile::TempDir::new().unwrap();
	std::fs::write(tmp.path().join("r.txt"), b"original").unwrap();

	let remote = Arc::new(FakeRemoteApi::new());
	remote.seed_file("r.txt", 1, vec![content_hash(b"original")], 8);

	let (_runtime, ctx) = build_ctx(tmp.path(), remote.clone());
	let path = RelativePath::new("r.txt").unwrap();
	ctx.state
		.put_record(&SyncedFileRecord {
			path: path.clone(),
			local_mtime: 0.0,
			local_size: 8,
			server_version: 1,
			chunk_hashes: vec![content_hash(b"original")],
			synced_at: 0.0,
		})
		.unwrap();

	let event = SyncEvent::new(1, EventType::LocalDeleted, EventSource::Local, path.clone(), EventMetadata::default());
	let item = WorkItem { path: path.clone(), kind: TransferKind::Delete, event, cancel: Arc::new(AtomicBool::new(false)) };

	let outcome = delete::run(&ctx, &item);
	assert!(matches!(outcome, TransferOutcome::Completed));
	assert!(!tmp.path().join("r.txt").exists());
	assert!(ctx.state.get_record(&path).unwrap().is_none(), "local record must be erased after delete");

	// The fake server's soft-delete just removes the file entry outright,
	// which is the observable A needs: B's next commit will see no record.
	let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
	assert!(runtime.block_on(remote.get_file_info("r.txt")).unwrap().is_none());
}

/// B's side: B's local copy says "new", and B still believes the server
/// is at version 1 (the version it last knew about, before A's delete
/// landed). Uploading against a server that now has no record of the
/// path must re-create it fresh instead of erroring out.
#[test]
fn upload_against_a_soft_deleted_path_recreates_it_fresh() {
	let tmp = tempfile::TempDir::new().unwrap();
	std::fs::write(tmp.path().join("r.txt"), b"new").unwrap();

	// No seed_file call: the server has no record of r.txt, as if A's
	// delete already landed before B's upload attempt.
	let remote = Arc::new(FakeRemoteApi::new());
	let (_runtime, ctx) = build_ctx(tmp.path(), remote.clone());

	let path = RelativePath::new("r.txt").unwrap();
	let metadata = EventMetadata { parent_version: Some(1), ..Default::default() };
	let event = SyncEvent::new(1, EventType::LocalModified, EventSource::Local, path.clone(), metadata);
	let item = WorkItem { path: path.clone(), kind: TransferKind::Upload, event, cancel: Arc::new(AtomicBool::new(false)) };

	let outcome = upload::run(&ctx, &item);
	assert!(matches!(outcome, TransferOutcome::Completed), "create-fresh must succeed, got {:?}", outcome);

	let record = ctx.state.get_record(&path).unwrap().unwrap();
	assert_eq!(record.server_version, 1, "a fresh commit against an empty server starts back at version 1");

	let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
	let server_info = runtime.block_on(remote.get_file_info("r.txt")).unwrap().unwrap();
	let expected_hashes: Vec<String> = cdc::split(b"new", &small_cdc()).unwrap().iter().map(|c| content_hash(&c.data)).collect();
	assert_eq!(server_info.chunk_hashes, expected_hashes);

	// A pulls next and downloads B's re-created file; it must end up with
	// B's content, same as B already has locally.
	let tmp_a = tempfile::TempDir::new().unwrap();
	let (_runtime_a, ctx_a) = build_ctx(tmp_a.path(), remote);
	let download_event =
		SyncEvent::new(2, EventType::RemoteCreated, EventSource::Remote, path.clone(), EventMetadata::default());
	let download_item = WorkItem { path: path.clone(), kind: TransferKind::Download, event: download_event, cancel: Arc::new(AtomicBool::new(false)) };
	let download_outcome = download::run(&ctx_a, &download_item);
	assert!(matches!(download_outcome, TransferOutcome::Completed));
	assert_eq!(std::fs::read(tmp_a.path().join("r.txt")).unwrap(), b"new");
}

// vim: ts=4
