//! Configuration validation functions

use super::ValidationError;

/// Validate the content-defined-chunking window (spec.md §4.7/§6):
/// `min <= avg <= max`, all non-zero.
pub fn validate_cdc_sizes(min: usize, avg: usize, max: usize) -> Result<(), ValidationError> {
	if min == 0 || avg == 0 || max == 0 {
		return Err(ValidationError::ConfigError("cdc.min/avg/max must all be greater than 0".to_string()));
	}
	if !(min <= avg && avg <= max) {
		return Err(ValidationError::ConfigError(format!(
			"cdc window must satisfy min <= avg <= max, got min={}, avg={}, max={}",
			min, avg, max
		)));
	}
	Ok(())
}

/// Validate cache size in bytes
pub fn validate_cache_size(size_bytes: u64) -> Result<(), ValidationError> {
	if size_bytes == 0 {
		return Err(ValidationError::ConfigError("Cache size must be greater than 0".to_string()));
	}
	Ok(())
}

/// Validate retry count
pub fn validate_retry_count(count: u32) -> Result<(), ValidationError> {
	if count > 100 {
		return Err(ValidationError::ConfigError(format!("Retry count too high: {}", count)));
	}
	Ok(())
}

/// Validate timeout in seconds
pub fn validate_timeout_secs(timeout_secs: u64) -> Result<(), ValidationError> {
	if timeout_secs == 0 {
		return Err(ValidationError::ConfigError("Timeout must be greater than 0".to_string()));
	}
	if timeout_secs > 3600 {
		return Err(ValidationError::ConfigError(format!(
			"Timeout too large: {} seconds (max 3600)",
			timeout_secs
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn validate_cdc_sizes_accepts_spec_defaults() {
		assert!(validate_cdc_sizes(1 << 20, 4 << 20, 8 << 20).is_ok());
	}

	#[test]
	fn validate_cdc_sizes_rejects_out_of_order_window() {
		assert!(validate_cdc_sizes(8 << 20, 4 << 20, 1 << 20).is_err());
	}

	#[test]
	fn validate_cdc_sizes_rejects_zero() {
		assert!(validate_cdc_sizes(0, 4 << 20, 8 << 20).is_err());
	}

	#[test]
	fn test_validate_cache_size_valid() {
		assert!(validate_cache_size(1024).is_ok());
		assert!(validate_cache_size(1).is_ok());
		assert!(validate_cache_size(1_000_000_000).is_ok());
	}

	#[test]
	fn test_validate_cache_size_zero() {
		let result = validate_cache_size(0);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("greater than 0"));
	}

	#[test]
	fn test_validate_retry_count_valid() {
		assert!(validate_retry_count(1).is_ok());
		assert!(validate_retry_count(50).is_ok());
		assert!(validate_retry_count(100).is_ok());
	}

	#[test]
	fn test_validate_retry_count_too_high() {
		let result = validate_retry_count(101);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("too high"));
	}

	#[test]
	fn test_validate_timeout_secs_valid() {
		assert!(validate_timeout_secs(1).is_ok());
		assert!(validate_timeout_secs(60).is_ok());
		assert!(validate_timeout_secs(3600).is_ok());
	}

	#[test]
	fn test_validate_timeout_secs_zero() {
		let result = validate_timeout_secs(0);
		assert!(result.is_err());
	}

	#[test]
	fn test_validate_timeout_secs_too_large() {
		let result = validate_timeout_secs(3601);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("too large"));
	}
}
