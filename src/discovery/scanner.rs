//! Container scanner
//!
//! Walks the root with `walkdir`, pruning any directory whose path contains
//! an exclusion fragment so excluded trees are never descended into.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::errors::{QcError, QcResult};
use crate::observability::{log_event_with_fields, Event};

/// File extension of container files (compared case-insensitively)
pub const CONTAINER_EXTENSION: &str = "mdb";

fn is_excluded(path: &Path, exclusions: &[String]) -> bool {
    let lowered = path.to_string_lossy().to_lowercase();
    exclusions
        .iter()
        .any(|e| lowered.contains(&e.to_lowercase()))
}

fn is_container(entry: &DirEntry) -> bool {
    entry.file_type().is_file()
        && entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(CONTAINER_EXTENSION))
}

/// Find container files under `root`, sorted
///
/// Paths containing any exclusion fragment (case-insensitive) are dropped.
pub fn scan_containers(root: &Path, exclusions: &[String]) -> QcResult<Vec<PathBuf>> {
    if !root.exists() {
        return Err(QcError::configuration(format!(
            "Root folder not found: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(QcError::configuration(format!(
            "Root is not a directory: {}",
            root.display()
        )));
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded(e.path(), exclusions));

    let mut containers = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if is_container(&entry) {
                    containers.push(entry.into_path());
                }
            }
            Err(e) => {
                tracing::warn!("Error accessing entry: {}", e);
            }
        }
    }
    containers.sort();

    log_event_with_fields(
        Event::ScanComplete,
        &[
            ("root", &root.display().to_string()),
            ("containers", &containers.len().to_string()),
        ],
    );
    Ok(containers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_finds_containers_case_insensitively() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a/ward_1.mdb");
        touch(tmp.path(), "b/WARD_2.MDB");
        touch(tmp.path(), "b/notes.txt");

        let found = scan_containers(tmp.path(), &[]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ward_1.mdb", "WARD_2.MDB"]);
    }

    #[test]
    fn test_exclusions_prune_directories_and_files() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "keep/ward_1.mdb");
        touch(tmp.path(), "Merged/ward_2.mdb");
        touch(tmp.path(), "keep/ward_3_merged.mdb");

        let found = scan_containers(tmp.path(), &["merged".to_string()]).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("keep/ward_1.mdb"));
    }

    #[test]
    fn test_missing_root_is_configuration_error() {
        let err = scan_containers(Path::new("/nonexistent/parcelqc"), &[]).unwrap_err();
        assert_eq!(err.code(), "QC_CONFIGURATION");
    }

    #[test]
    fn test_root_must_be_directory() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "x.mdb");
        assert!(scan_containers(&tmp.path().join("x.mdb"), &[]).is_err());
    }
}
