//! Exponential backoff retry policy (spec.md §4.8): 1s, 2s, 4s, 8s, 16s,
//! 30s, capped thereafter, up to `max_retries` attempts. A sustained
//! network-unreachable condition is exempt from the attempt budget — the
//! agent just goes OFFLINE and keeps retrying indefinitely once
//! connectivity looks plausible again.

use std::time::Duration;

use crate::error::SyncError;

const BASE_DELAYS_SECS: [u64; 6] = [1, 2, 4, 8, 16, 30];

/// Tracks retry attempts for a single failing operation (one transfer,
/// one remote call) and decides whether to retry and for how long to
/// wait first.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	max_retries: u32,
	max_delay_secs: u64,
	attempts: u32,
}

impl RetryPolicy {
	pub fn new(max_retries: u32, max_delay_secs: u64) -> Self {
		RetryPolicy { max_retries, max_delay_secs, attempts: 0 }
	}

	/// Whether another attempt should be made for `error`. Non-retryable
	/// error kinds (configuration, authentication, integrity, version
	/// conflict) always return false regardless of the attempt budget.
	pub fn should_retry(&self, error: &SyncError) -> bool {
		if !error.is_retryable() {
			return false;
		}
		if is_network_unreachable(error) {
			return true;
		}
		self.attempts < self.max_retries
	}

	/// Record an attempt and return the delay to wait before the next
	/// one. Call `should_retry` first to decide whether to call this.
	pub fn next_delay(&mut self) -> Duration {
		let idx = (self.attempts as usize).min(BASE_DELAYS_SECS.len() - 1);
		self.attempts += 1;
		let secs = BASE_DELAYS_SECS[idx].min(self.max_delay_secs);
		Duration::from_secs(secs)
	}

	pub fn attempts(&self) -> u32 {
		self.attempts
	}

	pub fn reset(&mut self) {
		self.attempts = 0;
	}
}

/// Network-unreachable failures (as opposed to e.g. a 5xx from a server
/// that is up but struggling) are exempt from the attempt budget —
/// distinguished here by message sniffing since `SyncError` doesn't
/// carry a structured "unreachable" flag.
fn is_network_unreachable(error: &SyncError) -> bool {
	matches!(error, SyncError::NetworkTransient { message, .. } if message.contains("unreachable") || message.contains("connection refused"))
}


// vim: ts=4
