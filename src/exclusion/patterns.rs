//! Glob-pattern exclusion matching.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

use super::ExclusionError;

/// Patterns that are always excluded regardless of configuration: the
/// agent's own state directory and its in-flight temp files.
fn build_always_excluded() -> Vec<&'static str> {
	vec![".syncagent/**", "**/*.syncagent-tmp"]
}

/// Combines user-configured exclude globs, built-in always-excluded
/// globs, and include ("anchor") globs that override both.
pub struct PatternMatcher {
	exclude_set: GlobSet,
	include_set: GlobSet,
	has_includes: bool,
}

impl PatternMatcher {
	pub fn new(exclude_patterns: &[String], include_patterns: &[String]) -> Result<Self, ExclusionError> {
		let mut exclude_builder = GlobSetBuilder::new();

		for pattern in build_always_excluded() {
			let glob = Glob::new(pattern)
				.map_err(|e| ExclusionError::InvalidPattern(format!("{}: {}", pattern, e)))?;
			exclude_builder.add(glob);
		}

		for pattern in exclude_patterns {
			let glob = build_glob(pattern)
				.map_err(|e| ExclusionError::InvalidPattern(format!("{}: {}", pattern, e)))?;
			exclude_builder.add(glob);
		}

		let exclude_set = exclude_builder
			.build()
			.map_err(|e| ExclusionError::InvalidPattern(e.to_string()))?;

		let mut include_builder = GlobSetBuilder::new();
		for pattern in include_patterns {
			let glob = build_glob(pattern)
				.map_err(|e| ExclusionError::InvalidPattern(format!("{}: {}", pattern, e)))?;
			include_builder.add(glob);
		}
		let include_set =
			include_builder.build().map_err(|e| ExclusionError::InvalidPattern(e.to_string()))?;

		Ok(PatternMatcher { exclude_set, include_set, has_includes: !include_patterns.is_empty() })
	}

	/// True if `path` matches an exclude pattern and isn't rescued by an
	/// include pattern.
	pub fn is_excluded(&self, path: &Path) -> bool {
		if !self.exclude_set.is_match(path) {
			return false;
		}
		if self.has_includes && self.include_set.is_match(path) {
			return false;
		}
		true
	}
}

fn build_glob(pattern: &str) -> Result<Glob, globset::Error> {
	GlobBuilder::new(pattern).literal_separator(false).build()
}


// vim: ts=4
