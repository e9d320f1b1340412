//! Error taxonomy for the sync engine.
//!
//! `SyncError` is the unified type the coordinator and workers convert
//! into before deciding retry vs. park vs. surface (spec.md §7). Kinds
//! map directly onto the taxonomy: Configuration, Authentication,
//! Network-transient, Version-conflict, Integrity, Local-IO,
//! State-corruption, Cancellation.

use std::error::Error;
use std::fmt;
use std::io;

use crate::exclusion::ExclusionError;
use crate::validation::ValidationError;

/// Helper to reduce `Box::new()` boilerplate when wrapping errors into a
/// nested `SyncError` variant.
#[inline]
pub fn boxed_error<E: Error + Send + Sync + 'static>(e: E) -> Box<dyn Error + Send + Sync> {
	Box::new(e)
}

#[derive(Debug)]
pub enum SyncError {
	/// Not initialized, not registered, invalid credentials — fatal.
	Configuration { message: String },

	/// 401 from server — fatal, re-register.
	Authentication { message: String },

	/// Connect refused, timeout, 5xx — retried per the backoff policy;
	/// the agent goes OFFLINE and keeps observing local changes meanwhile.
	NetworkTransient { message: String, source: Option<Box<dyn Error + Send + Sync>> },

	/// 409 on commit, handed to the conflict subsystem. Never surfaced
	/// as a failure if resolvable.
	VersionConflict { path: String, current_version: u64 },

	/// Chunk or whole-file hash mismatch after decrypt — fatal for that
	/// transfer, destination left untouched.
	Integrity { path: String, expected: String, actual: String },

	/// Permission denied, disk full, file locked — retried a small
	/// bounded number of times, then parked.
	LocalIo { path: String, source: io::Error },

	/// Unreadable local store (rebuilt empty) or unreadable keystore
	/// (fatal, requires manual re-init) — the two are told apart by the
	/// `recoverable` flag.
	StateCorruption { message: String, recoverable: bool },

	/// Cancellation is never propagated as an error to the user; this
	/// variant exists only so internal plumbing can use `Result`.
	Cancelled,

	Chunk(ChunkError),
	Conflict(ConflictError),
	Exclusion(Box<dyn Error + Send + Sync>),
	Remote(Box<dyn Error + Send + Sync>),

	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Configuration { message } => write!(f, "configuration error: {}", message),
			SyncError::Authentication { message } => write!(f, "authentication failed: {}", message),
			SyncError::NetworkTransient { message, source } => match source {
				Some(s) => write!(f, "network error: {}: {}", message, s),
				None => write!(f, "network error: {}", message),
			},
			SyncError::VersionConflict { path, current_version } => {
				write!(f, "version conflict on {}: server is at version {}", path, current_version)
			}
			SyncError::Integrity { path, expected, actual } => {
				write!(f, "integrity check failed for {}: expected {}, got {}", path, expected, actual)
			}
			SyncError::LocalIo { path, source } => write!(f, "I/O error on {}: {}", path, source),
			SyncError::StateCorruption { message, recoverable } => {
				write!(f, "state corruption ({}): {}", if *recoverable { "recoverable" } else { "fatal" }, message)
			}
			SyncError::Cancelled => write!(f, "operation cancelled"),
			SyncError::Chunk(e) => write!(f, "chunk error: {}", e),
			SyncError::Conflict(e) => write!(f, "conflict error: {}", e),
			SyncError::Exclusion(e) => write!(f, "exclusion error: {}", e),
			SyncError::Remote(e) => write!(f, "remote API error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::LocalIo { path: String::new(), source: e }
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<ChunkError> for SyncError {
	fn from(e: ChunkError) -> Self {
		SyncError::Chunk(e)
	}
}

impl From<ConflictError> for SyncError {
	fn from(e: ConflictError) -> Self {
		SyncError::Conflict(e)
	}
}

impl From<ExclusionError> for SyncError {
	fn from(e: ExclusionError) -> Self {
		SyncError::Exclusion(boxed_error(e))
	}
}

impl From<ValidationError> for SyncError {
	fn from(e: ValidationError) -> Self {
		SyncError::Configuration { message: e.to_string() }
	}
}

impl SyncError {
	/// Whether the retry policy (§4.8) should ever attempt this failure
	/// again. Integrity, configuration, and authentication failures are
	/// never retried; network failures and a handful of local-IO cases
	/// are.
	pub fn is_retryable(&self) -> bool {
		matches!(self, SyncError::NetworkTransient { .. } | SyncError::LocalIo { .. })
	}
}

/// Path-safety / normalization errors from `RelativePath::new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
	Empty,
	EscapesRoot(String),
	NotRelative(String),
	ForbiddenCharacter(String),
}

impl fmt::Display for PathError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PathError::Empty => write!(f, "path is empty"),
			PathError::EscapesRoot(p) => write!(f, "path escapes sync root: {}", p),
			PathError::NotRelative(p) => write!(f, "path is not relative to sync root: {}", p),
			PathError::ForbiddenCharacter(p) => write!(f, "path contains a forbidden character: {}", p),
		}
	}
}

impl Error for PathError {}

/// Chunk-codec errors (CDC, encryption, hashing).
#[derive(Debug)]
pub enum ChunkError {
	ReadFailed { source: io::Error },
	InvalidConfig { message: String },
	HashMismatch { expected: String, actual: String },
	DecryptFailed { message: String },
	SizeOutOfBounds { size: usize, max: usize },
}

impl fmt::Display for ChunkError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChunkError::ReadFailed { source } => write!(f, "failed to read chunk: {}", source),
			ChunkError::InvalidConfig { message } => write!(f, "invalid chunk configuration: {}", message),
			ChunkError::HashMismatch { expected, actual } => {
				write!(f, "chunk hash mismatch: expected {}, got {}", expected, actual)
			}
			ChunkError::DecryptFailed { message } => write!(f, "chunk decryption failed: {}", message),
			ChunkError::SizeOutOfBounds { size, max } => {
				write!(f, "chunk size {} exceeds maximum {}", size, max)
			}
		}
	}
}

impl Error for ChunkError {}

impl From<io::Error> for ChunkError {
	fn from(e: io::Error) -> Self {
		ChunkError::ReadFailed { source: e }
	}
}

/// Conflict-subsystem errors — distinct from `ConflictOutcome`, which is
/// a control-flow result rather than a failure.
#[derive(Debug)]
pub enum ConflictError {
	SafeRenameRaced { path: String },
	StrategyFailed { message: String },
	Unresolvable { message: String },
}

impl fmt::Display for ConflictError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConflictError::SafeRenameRaced { path } => {
				write!(f, "rename of {} raced a concurrent write", path)
			}
			ConflictError::StrategyFailed { message } => write!(f, "failed to resolve conflict: {}", message),
			ConflictError::Unresolvable { message } => write!(f, "cannot resolve conflict: {}", message),
		}
	}
}

impl Error for ConflictError {}

// vim: ts=4
