//! SafeRename naming scheme: `{stem}.conflict-YYYYMMDD-HHMMSSmmm-{machine}{ext}`
//! (spec.md §4.4). The renamed sibling carries the local content that
//! lost to Server-Wins, so nothing is ever silently discarded.

use chrono::{DateTime, Utc};

use crate::types::RelativePath;

/// Build the conflict-sibling file name for `path`, stamped at `when`
/// and tagged with `machine_id` (spec.md's disambiguator between two
/// machines racing the same rename at the same millisecond).
pub fn safe_rename_name(path: &RelativePath, when: DateTime<Utc>, machine_id: &str) -> String {
	let (stem, ext) = path.stem_and_extension();
	let stamp = when.format("%Y%m%d-%H%M%S%3f");
	if ext.is_empty() {
		format!("{}.conflict-{}-{}", stem, stamp, machine_id)
	} else {
		format!("{}.conflict-{}-{}.{}", stem, stamp, machine_id, ext)
	}
}

/// Full relative path for the conflict sibling, living alongside the
/// original file.
pub fn safe_rename_path(path: &RelativePath, when: DateTime<Utc>, machine_id: &str) -> RelativePath {
	let name = safe_rename_name(path, when, machine_id);
	let sibling = match path.as_str().rsplit_once('/') {
		Some((dir, _)) => format!("{}/{}", dir, name),
		None => name,
	};
	RelativePath::new(sibling).expect("SafeRename output is always a valid relative path")
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn builds_expected_name_with_extension() {
		let path = RelativePath::new("docs/report.md").unwrap();
		let when = Utc.with_ymd_and_hms(2026, 7, 27, 13, 5, 9).unwrap();
		let name = safe_rename_name(&path, when, "laptop-01");
		assert_eq!(name, "report.conflict-20260727-130509000-laptop-01.md");
	}

	#[test]
	fn builds_expected_name_without_extension() {
		let path = RelativePath::new("README").unwrap();
		let when = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
		let name = safe_rename_name(&path, when, "desktop");
		assert_eq!(name, "README.conflict-20260102-030405000-desktop");
	}

	#[test]
	fn sibling_path_stays_in_same_directory() {
		let path = RelativePath::new("a/b/doc.txt").unwrap();
		let when = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
		let sibling = safe_rename_path(&path, when, "m1");
		assert!(sibling.as_str().starts_with("a/b/"));
	}
}

// vim: ts=4
