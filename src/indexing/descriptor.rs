//! Build descriptors and modification-time fingerprints.

use crate::error::IndexResult;
use crate::fs::{FileSystem, is_not_found};
use crate::indexing::scanner::{DirectoryScanner, ScannedFile};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-file modification-time maps used to detect whether cached data is
/// stale. Keys are root-relative paths, values float millisecond stamps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fingerprints {
    pub manifest_mtimes: BTreeMap<String, f64>,
    pub source_mtimes: BTreeMap<String, f64>,
}

impl Fingerprints {
    /// Scan `root` and stat every discovered file. Files that vanish
    /// between listing and stat are skipped, mirroring scan tolerance.
    pub fn collect(fs: &Arc<dyn FileSystem>, root: &Path) -> IndexResult<Self> {
        let scan = DirectoryScanner::new(Arc::clone(fs)).scan(root)?;
        Ok(Self {
            manifest_mtimes: stat_all(fs, &scan.manifest_files)?,
            source_mtimes: stat_all(fs, &scan.source_files)?,
        })
    }
}

fn stat_all(
    fs: &Arc<dyn FileSystem>,
    files: &[ScannedFile],
) -> IndexResult<BTreeMap<String, f64>> {
    let mut mtimes = BTreeMap::new();
    for file in files {
        match fs.stat(&file.absolute) {
            Ok(stat) => {
                mtimes.insert(file.relative.clone(), stat.mtime_ms);
            }
            Err(e) if is_not_found(&e) => continue,
            Err(e) => {
                return Err(crate::error::IndexError::Stat {
                    path: file.absolute.clone(),
                    source: e,
                });
            }
        }
    }
    Ok(mtimes)
}

/// Everything that identifies one build request: the root, the tool
/// versions participating in the cache key, and the fingerprints of the
/// project as the caller observed it.
#[derive(Debug, Clone)]
pub struct BuildDescriptor {
    /// Absolute, resolved project root.
    pub project_root: PathBuf,
    pub formatter_version: String,
    pub plugin_version: String,
    pub fingerprints: Fingerprints,
}

impl BuildDescriptor {
    pub fn new(project_root: PathBuf, fingerprints: Fingerprints) -> Self {
        Self {
            project_root,
            formatter_version: String::new(),
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
            fingerprints,
        }
    }

    pub fn with_versions(
        mut self,
        formatter_version: impl Into<String>,
        plugin_version: impl Into<String>,
    ) -> Self {
        self.formatter_version = formatter_version.into();
        self.plugin_version = plugin_version.into();
        self
    }
}
