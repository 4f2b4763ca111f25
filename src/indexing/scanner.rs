//! Project tree scanner.
//!
//! Walks the project root once and partitions files into resource
//! manifests and script sources. The traversal is iterative (worklist of
//! directories) so deep trees never hit call-depth limits, and results
//! are sorted by relative path for deterministic downstream ordering.

use crate::error::{IndexError, IndexResult};
use crate::fs::{FileSystem, is_not_found};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Project-level manifest extension.
pub const PROJECT_MANIFEST_EXT: &str = "yyp";
/// Per-resource manifest extension.
pub const RESOURCE_MANIFEST_EXT: &str = "yy";
/// Script source extension.
pub const SOURCE_EXT: &str = "gml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub absolute: PathBuf,
    /// Path relative to the project root, `/`-separated.
    pub relative: String,
}

#[derive(Debug, Default, Clone)]
pub struct ProjectScan {
    pub manifest_files: Vec<ScannedFile>,
    pub source_files: Vec<ScannedFile>,
}

pub struct DirectoryScanner {
    fs: Arc<dyn FileSystem>,
}

impl DirectoryScanner {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Walk `root` and classify every file by extension. A missing root
    /// (or a directory deleted mid-walk) yields an empty listing; any
    /// other I/O error propagates.
    pub fn scan(&self, root: &Path) -> IndexResult<ProjectScan> {
        let mut scan = ProjectScan::default();
        let mut worklist: Vec<PathBuf> = vec![root.to_path_buf()];

        while let Some(dir) = worklist.pop() {
            let entries = match self.fs.read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if is_not_found(&e) => continue,
                Err(e) => return Err(IndexError::DirList { path: dir, source: e }),
            };

            for entry in entries {
                let stat = match self.fs.stat(&entry) {
                    Ok(stat) => stat,
                    Err(e) if is_not_found(&e) => continue,
                    Err(e) => return Err(IndexError::Stat { path: entry, source: e }),
                };

                if stat.is_directory {
                    worklist.push(entry);
                    continue;
                }
                if !stat.is_file {
                    continue;
                }

                let ext = entry.extension().and_then(|e| e.to_str());
                let bucket = match ext {
                    Some(PROJECT_MANIFEST_EXT) | Some(RESOURCE_MANIFEST_EXT) => {
                        &mut scan.manifest_files
                    }
                    Some(SOURCE_EXT) => &mut scan.source_files,
                    _ => continue,
                };
                bucket.push(ScannedFile {
                    relative: relative_path(root, &entry),
                    absolute: entry,
                });
            }
        }

        scan.manifest_files.sort_by(|a, b| a.relative.cmp(&b.relative));
        scan.source_files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(scan)
    }
}

/// Root-relative path with `/` separators regardless of platform.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut out = String::new();
    for component in rel.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}
