//! # syncagent-core
//!
//! Client-side engine for a zero-knowledge, end-to-end-encrypted file
//! synchronization agent: watches a local directory, content-defines and
//! encrypts chunks client-side, and reconciles state against a central
//! metadata/blob server it never needs to trust with plaintext.
//!
//! The binary (`main.rs`) is a thin `clap` CLI; this crate holds the
//! detector → queue → coordinator → worker-pool pipeline plus the local
//! state store, conflict resolution, and remote transport it runs on.

#![deny(unsafe_code)]
#![warn(dead_code)]

pub mod callbacks;
pub mod chunk_tracker;
pub mod chunking;
pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod delete;
pub mod detector;
pub mod error;
pub mod exclusion;
pub mod keystore;
pub mod logging;
pub mod queue;
pub mod remote;
pub mod retry;
pub mod state;
pub mod supervisor;
pub mod types;
pub mod util;
pub mod utils;
pub mod validation;
pub mod workers;

pub use callbacks::{AgentPhase, ProgressStats, SyncCallbacks};
pub use config::Config;
pub use coordinator::Coordinator;
pub use delete::DeleteProtection;
pub use error::{ChunkError, ConflictError, PathError, SyncError};
pub use exclusion::{ExclusionEngine, ExclusionError};
pub use keystore::{FileKeystore, Keystore};
pub use remote::{HttpRemoteApi, RemoteApi};
pub use state::LocalStateStore;
pub use supervisor::Supervisor;
pub use types::{RelativePath, SyncEvent, SyncedFileRecord, TransferKind};

// vim: ts=4
