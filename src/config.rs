#![allow(dead_code)]

//! Configuration for the sync engine.
//!
//! Single `Config` struct, loaded through a layered priority chain:
//! 1. Built-in defaults (`Config::default()`)
//! 2. Config file (`~/.syncagent/config.toml`)
//! 3. Environment variables (`SYNCAGENT_*` prefix)
//! 4. CLI flags (highest priority, applied by `main.rs`)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::validation;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Directory being synchronized.
	pub sync_folder: PathBuf,

	/// Base URL of the central metadata/blob server.
	pub server_url: String,

	/// Bearer token presented to the server.
	pub auth_token: String,

	/// Content-defined chunking parameters.
	pub cdc: CdcConfig,

	/// Size of the worker pool.
	pub worker_count: usize,

	/// Max attempts per retryable failure category (§4.8).
	pub max_retries: u32,

	/// Cap on the exponential backoff delay, in seconds.
	pub retry_max_delay_secs: u64,

	/// Periodic full-scan interval, in seconds.
	pub scan_interval_secs: u64,

	/// Watcher per-path debounce window, in milliseconds.
	pub debounce_ms: u64,

	/// Watcher settle delay after the last event, in milliseconds.
	pub settle_ms: u64,

	/// Additional glob patterns excluded from sync, beyond `.syncignore`.
	pub ignore_patterns: Vec<String>,

	/// Honor `.syncignore`/`.gitignore` files at the sync root.
	pub respect_ignore_files: bool,

	/// Connect timeout for remote requests, in seconds.
	pub connect_timeout_secs: u64,

	/// Read timeout for remote requests, in seconds.
	pub read_timeout_secs: u64,

	/// Subscribe to the optional `/ws/changes` push channel.
	pub enable_change_stream: bool,

	/// Mass-deletion safety limits.
	pub delete_protection: DeleteProtectionConfig,

	/// Directory holding the local state store, lock file and keyfile.
	pub agent_dir: PathBuf,

	pub log_level: String,
}

impl Default for Config {
	fn default() -> Self {
		let home = std::env::var("HOME").ok().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
		Config {
			sync_folder: home.join("SyncAgent"),
			server_url: String::new(),
			auth_token: String::new(),
			cdc: CdcConfig::default(),
			worker_count: 4,
			max_retries: 5,
			retry_max_delay_secs: 60,
			scan_interval_secs: 300,
			debounce_ms: 250,
			settle_ms: 3000,
			ignore_patterns: vec![],
			respect_ignore_files: true,
			connect_timeout_secs: 10,
			read_timeout_secs: 30,
			enable_change_stream: true,
			delete_protection: DeleteProtectionConfig::default(),
			agent_dir: home.join(".syncagent"),
			log_level: "info".to_string(),
		}
	}
}

impl Config {
	/// Load defaults, then overlay a config file (if present), then
	/// environment variables, in that priority order.
	pub fn load(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
		let mut config = Config::default();

		if let Some(path) = config_path {
			if path.exists() {
				let text = std::fs::read_to_string(path)
					.map_err(|e| ConfigError::Read { path: path.display().to_string(), source: e })?;
				config = toml::from_str(&text)
					.map_err(|e| ConfigError::Parse { path: path.display().to_string(), message: e.to_string() })?;
			}
		}

		config.apply_env();
		config.validate()?;
		Ok(config)
	}

	fn apply_env(&mut self) {
		if let Ok(v) = std::env::var("SYNCAGENT_SERVER_URL") {
			self.server_url = v;
		}
		if let Ok(v) = std::env::var("SYNCAGENT_AUTH_TOKEN") {
			self.auth_token = v;
		}
		if let Ok(v) = std::env::var("SYNCAGENT_SYNC_FOLDER") {
			self.sync_folder = PathBuf::from(v);
		}
		if let Ok(v) = std::env::var("SYNCAGENT_WORKER_COUNT") {
			if let Ok(n) = v.parse() {
				self.worker_count = n;
			}
		}
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		validation::config::validate_cdc_sizes(self.cdc.min, self.cdc.avg, self.cdc.max)
			.map_err(|e| ConfigError::Invalid(e.to_string()))?;
		validation::config::validate_retry_count(self.max_retries)
			.map_err(|e| ConfigError::Invalid(e.to_string()))?;
		validation::config::validate_timeout_secs(self.connect_timeout_secs)
			.map_err(|e| ConfigError::Invalid(e.to_string()))?;
		validation::config::validate_timeout_secs(self.read_timeout_secs)
			.map_err(|e| ConfigError::Invalid(e.to_string()))?;
		if self.worker_count == 0 {
			return Err(ConfigError::Invalid("worker_count must be at least 1".to_string()));
		}
		Ok(())
	}
}

/// Content-defined chunking window, spec.md §4.7/§6.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CdcConfig {
	pub min: usize,
	pub avg: usize,
	pub max: usize,
}

impl Default for CdcConfig {
	fn default() -> Self {
		CdcConfig { min: 1 << 20, avg: 4 << 20, max: 8 << 20 }
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteProtectionConfig {
	pub enabled: bool,
	pub max_delete_count: Option<usize>,
	pub max_delete_percent: Option<u8>,
}

impl Default for DeleteProtectionConfig {
	fn default() -> Self {
		DeleteProtectionConfig { enabled: true, max_delete_count: Some(1000), max_delete_percent: Some(50) }
	}
}

#[derive(Debug)]
pub enum ConfigError {
	Read { path: String, source: std::io::Error },
	Parse { path: String, message: String },
	Invalid(String),
}

impl std::fmt::Display for ConfigError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ConfigError::Read { path, source } => write!(f, "failed to read config {}: {}", path, source),
			ConfigError::Parse { path, message } => write!(f, "failed to parse config {}: {}", path, message),
			ConfigError::Invalid(message) => write!(f, "invalid configuration: {}", message),
		}
	}
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_matches_spec_defaults() {
		let config = Config::default();
		assert_eq!(config.worker_count, 4);
		assert_eq!(config.max_retries, 5);
		assert_eq!(config.retry_max_delay_secs, 60);
		assert_eq!(config.scan_interval_secs, 300);
		assert_eq!(config.debounce_ms, 250);
		assert_eq!(config.settle_ms, 3000);
		assert_eq!(config.cdc.min, 1024 * 1024);
		assert_eq!(config.cdc.avg, 4 * 1024 * 1024);
		assert_eq!(config.cdc.max, 8 * 1024 * 1024);
	}

	#[test]
	fn config_round_trips_through_toml() {
		let config = Config::default();
		let text = toml::to_string(&config).unwrap();
		let restored: Config = toml::from_str(&text).unwrap();
		assert_eq!(config.worker_count, restored.worker_count);
		assert_eq!(config.cdc.avg, restored.cdc.avg);
	}

	#[test]
	fn validate_rejects_zero_workers() {
		let mut config = Config::default();
		config.worker_count = 0;
		assert!(config.validate().is_err());
	}
}

// vim: ts=4
