use crate::extensions::ExtensionFilter;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One relevant file found under a source directory.
#[derive(Clone, Debug)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
}

/// Recursive scan result for one top-level source directory.
#[derive(Clone, Debug, Default)]
pub struct DirScan {
    pub files: Vec<FileEntry>,
    /// Files skipped by the extension filter.
    pub ignored: usize,
}

impl DirScan {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Immediate subdirectories of the source root, sorted by name so a
/// run visits them in a stable order.
pub fn top_level_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Walk one directory recursively and collect relevant files with
/// their sizes. Unreadable entries abort the scan; a half-counted
/// directory would break reconciliation later.
pub fn scan_directory(dir: &Path, filter: &ExtensionFilter) -> Result<DirScan> {
    let mut scan = DirScan::default();

    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !filter.is_relevant(&name) {
            scan.ignored += 1;
            continue;
        }
        let meta = entry
            .metadata()
            .with_context(|| format!("metadata {}", entry.path().display()))?;
        scan.files.push(FileEntry {
            path: entry.into_path(),
            size: meta.len(),
        });
    }

    scan.files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(scan)
}

/// Count relevant files anywhere under `root`. Used by the
/// orchestrator to cross-check the engine's counters against disk.
pub fn count_relevant_files(root: &Path, filter: &ExtensionFilter) -> Result<usize> {
    if !root.exists() {
        return Ok(0);
    }
    let mut n = 0;
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if entry.file_type().is_file() && filter.is_relevant(&entry.file_name().to_string_lossy()) {
            n += 1;
        }
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_collects_relevant_files_recursively() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Nintendo - NES");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("a.nes"), b"aaaa").unwrap();
        fs::write(dir.join("sub/b.zip"), b"bb").unwrap();
        fs::write(dir.join("notes.txt"), b"x").unwrap();

        let scan = scan_directory(&dir, &ExtensionFilter::new()).unwrap();
        assert_eq!(scan.files.len(), 2);
        assert_eq!(scan.ignored, 1);
        assert_eq!(scan.total_bytes(), 6);
    }

    #[test]
    fn top_level_dirs_are_sorted_and_exclude_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("b")).unwrap();
        fs::create_dir(tmp.path().join("a")).unwrap();
        fs::write(tmp.path().join("stray.nes"), b"x").unwrap();

        let dirs = top_level_dirs(tmp.path()).unwrap();
        let names: Vec<_> = dirs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn count_is_zero_for_missing_root() {
        let n = count_relevant_files(Path::new("/nonexistent/surely"), &ExtensionFilter::new())
            .unwrap();
        assert_eq!(n, 0);
    }
}
