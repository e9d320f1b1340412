//! Content-defined chunking using the Bup rolling hash, generalized from
//! a single `chunk_bits` knob to the three-parameter `{min, avg, max}`
//! window (spec.md §4.7/§6).

use rollsum::Bup;

use crate::config::CdcConfig;
use crate::error::ChunkError;

/// One plaintext span produced by `split`, before hashing/encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
	pub offset: u64,
	pub data: Vec<u8>,
}

/// Split `data` into content-defined chunks honoring `cdc`'s window.
/// `min` bytes are always skipped before the rolling hash is allowed to
/// report a boundary; no chunk ever exceeds `max` bytes.
pub fn split(data: &[u8], cdc: &CdcConfig) -> Result<Vec<RawChunk>, ChunkError> {
	if cdc.min == 0 || cdc.avg == 0 || cdc.max == 0 || cdc.min > cdc.avg || cdc.avg > cdc.max {
		return Err(ChunkError::InvalidConfig {
			message: format!("invalid cdc window: min={} avg={} max={}", cdc.min, cdc.avg, cdc.max),
		});
	}

	let chunk_bits = avg_to_bits(cdc.avg);
	let mut chunks = Vec::new();
	let mut pos = 0usize;
	let mut offset = 0u64;

	while pos < data.len() {
		let window_end = std::cmp::min(pos + cdc.max, data.len());
		let scan_start = std::cmp::min(pos + cdc.min, window_end);

		let count = if scan_start >= window_end {
			window_end - pos
		} else {
			let mut bup = Bup::new_with_chunk_bits(chunk_bits);
			match bup.find_chunk_edge(&data[scan_start..window_end]) {
				Some((edge, _)) => (scan_start - pos) + edge,
				None => window_end - pos,
			}
		};

		let count = count.max(1);
		chunks.push(RawChunk { offset, data: data[pos..pos + count].to_vec() });
		offset += count as u64;
		pos += count;
	}

	Ok(chunks)
}

/// `avg` is a target size; the rolling hash looks for a boundary on
/// roughly every `2^bits`-th byte, so `bits = log2(avg)` rounded to the
/// nearest integer.
fn avg_to_bits(avg: usize) -> u32 {
	(avg as f64).log2().round().clamp(1.0, 30.0) as u32
}

#[cfg(test)]
mod tests {
	use super::*;

	fn small_cdc() -> CdcConfig {
		CdcConfig { min: 64, avg: 256, max: 1024 }
	}

	#[test]
	fn splits_cover_input_with_no_gaps() {
		let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
		let cdc = small_cdc();
		let chunks = split(&data, &cdc).unwrap();

		let mut expected_offset = 0u64;
		for chunk in &chunks {
			assert_eq!(chunk.offset, expected_offset);
			assert!(chunk.data.len() <= cdc.max);
			expected_offset += chunk.data.len() as u64;
		}
		assert_eq!(expected_offset, data.len() as u64);
	}

	#[test]
	fn no_chunk_exceeds_max() {
		let data = vec![7u8; 5000];
		let cdc = small_cdc();
		let chunks = split(&data, &cdc).unwrap();
		assert!(chunks.iter().all(|c| c.data.len() <= cdc.max));
	}

	#[test]
	fn empty_input_produces_no_chunks() {
		let cdc = small_cdc();
		assert!(split(&[], &cdc).unwrap().is_empty());
	}

	#[test]
	fn rejects_out_of_order_window() {
		let cdc = CdcConfig { min: 1024, avg: 256, max: 4096 };
		assert!(split(b"x", &cdc).is_err());
	}

	#[test]
	fn reassembled_chunks_reproduce_the_original_bytes() {
		let data: Vec<u8> = (0..20_000u32).map(|i| ((i * 37) % 256) as u8).collect();
		let cdc = small_cdc();
		let chunks = split(&data, &cdc).unwrap();

		let mut rebuilt = Vec::with_capacity(data.len());
		for chunk in &chunks {
			rebuilt.extend_from_slice(&chunk.data);
		}
		assert_eq!(rebuilt, data);
	}
}

// vim: ts=4
