//! Server-Wins + Local-Preserved conflict resolution (spec.md §4.4):
//! when the server and the local record disagree, the server's content
//! becomes the new local content, but whatever was on disk locally is
//! renamed aside first rather than overwritten in place.

use chrono::Utc;
use std::fs::Metadata;
use std::path::Path;

use super::naming::safe_rename_path;
use super::ConflictContext;
use crate::error::ConflictError;
use crate::types::RelativePath;

/// Disposition of a detected divergence (spec.md §4.5's four outcomes,
/// plus `NoConflict` for the non-conflict case).
#[derive(Debug, Clone)]
pub enum ConflictOutcome {
	/// No real conflict: a server version bump with no local modification.
	NoConflict,
	/// Local and server content are byte-identical; the caller should
	/// just adopt the server's version, no rename or transfer needed.
	AlreadySynced,
	/// SafeRename completed (or there was nothing local to preserve).
	Resolved { renamed_to: Option<RelativePath> },
	/// The local file changed again during the rename race window; the
	/// caller should retry the whole operation.
	RetryNeeded,
	/// SafeRename could not find a free sibling name after repeated
	/// attempts; the caller should surface this as a fatal error.
	Abort,
}

/// Is this divergence actually a conflict? (A server version bump with
/// no local modification is just a normal download, not a conflict.)
pub fn is_conflict(ctx: &ConflictContext) -> bool {
	ctx.local_modified && ctx.local_base_version != Some(ctx.server_version)
}

fn mtime_secs(meta: &Metadata) -> f64 {
	meta.modified()
		.ok()
		.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
		.map(|d| d.as_secs_f64())
		.unwrap_or(0.0)
}

/// Whether the rename-window race guard should fire: the file was
/// touched again between the pre-rename mtime capture and the
/// post-rename stat.
fn mtime_raced(before: f64, after: f64) -> bool {
	(after - before).abs() > f64::EPSILON
}

/// Resolve a conflict at `path` rooted under `sync_root`: if the local
/// file exists, rename it aside under the SafeRename scheme so the
/// caller can then write the server's content to the original path.
/// `machine_id` disambiguates two machines racing the same rename.
///
/// **SafeRename race guard** (spec.md §4.5): the local file's mtime is
/// captured before the rename; once renamed, the sibling is re-stat'd —
/// if its mtime has moved, the user saved again mid-rename, so the
/// sibling is renamed back to the original path and `RetryNeeded` is
/// returned instead of silently preserving a half-written file.
///
/// Retries the rename under a fresh timestamp if a sibling with the same
/// name already exists — a same-millisecond double-conflict is rare but
/// not impossible (spec.md §4.4 edge case).
pub fn resolve_conflict(
	sync_root: &Path,
	path: &RelativePath,
	ctx: &ConflictContext,
	machine_id: &str,
) -> Result<ConflictOutcome, ConflictError> {
	if !is_conflict(ctx) {
		return Ok(ConflictOutcome::NoConflict);
	}

	let local_abs = sync_root.join(path.as_path());
	let before = match std::fs::metadata(&local_abs) {
		Ok(meta) => meta,
		Err(_) => return Ok(ConflictOutcome::Resolved { renamed_to: None }),
	};
	let mtime_before = mtime_secs(&before);

	const MAX_ATTEMPTS: u32 = 5;
	for attempt in 0..MAX_ATTEMPTS {
		let when = Utc::now() + chrono::Duration::milliseconds(attempt as i64);
		let sibling = safe_rename_path(path, when, machine_id);
		let sibling_abs = sync_root.join(sibling.as_path());

		if sibling_abs.exists() {
			continue;
		}

		match std::fs::rename(&local_abs, &sibling_abs) {
			Ok(()) => {
				let after = std::fs::metadata(&sibling_abs)
					.map_err(|e| ConflictError::StrategyFailed { message: e.to_string() })?;
				if mtime_raced(mtime_before, mtime_secs(&after)) {
					std::fs::rename(&sibling_abs, &local_abs)
						.map_err(|e| ConflictError::StrategyFailed { message: e.to_string() })?;
					return Ok(ConflictOutcome::RetryNeeded);
				}
				return Ok(ConflictOutcome::Resolved { renamed_to: Some(sibling) });
			}
			Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
			Err(e) => {
				return Err(ConflictError::StrategyFailed { message: e.to_string() });
			}
		}
	}

	Ok(ConflictOutcome::Abort)
}


// vim: ts=4
