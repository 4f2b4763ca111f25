//! Cache store for the serialized ProjectIndex.
//!
//! Validation fails closed: any mismatch between the stored payload and
//! the incoming descriptor is a miss with its own reason, and the whole
//! cache is invalidated at once; there is no partial reuse. Writes go
//! through a uniquely-suffixed temp file and a rename, so a reader never
//! observes a half-written cache file.

use crate::config::CacheConfig;
use crate::error::{IndexError, IndexResult};
use crate::fs::{FileSystem, is_not_found};
use crate::index::{BuildMetrics, ProjectIndex};
use crate::indexing::descriptor::BuildDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bumped whenever the serialized shape changes.
pub const SCHEMA_VERSION: u32 = 3;
pub const DEFAULT_CACHE_DIR: &str = ".tool-cache";
pub const CACHE_FILE_NAME: &str = "project-index-cache.json";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePayload {
    pub schema_version: u32,
    pub project_root: PathBuf,
    pub formatter_version: String,
    pub plugin_version: String,
    pub manifest_mtimes: BTreeMap<String, f64>,
    pub source_mtimes: BTreeMap<String, f64>,
    pub metrics_summary: Option<BuildMetrics>,
    pub project_index: ProjectIndex,
}

/// Why a load did not produce a hit. Not errors, just "rebuild needed",
/// with enough detail for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    CacheFileMissing,
    InvalidPayload,
    SchemaVersionMismatch,
    ProjectRootMismatch,
    ToolVersionMismatch,
    ManifestMtimesMismatch,
    SourceMtimesMismatch,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Hit(Box<CachePayload>),
    Miss(MissReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { bytes: u64 },
    Skipped { reason: SkipReason },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    PayloadTooLarge { bytes: u64, max: u64 },
    CacheDisabled,
}

pub struct CacheStore {
    fs: Arc<dyn FileSystem>,
    max_payload_bytes: u64,
    path_override: Option<PathBuf>,
}

impl CacheStore {
    pub fn new(fs: Arc<dyn FileSystem>, config: &CacheConfig) -> Self {
        Self {
            fs,
            max_payload_bytes: config.max_payload_bytes,
            path_override: config.path.clone(),
        }
    }

    /// Cache file location for a project root: the explicit override, or
    /// `<root>/.tool-cache/project-index-cache.json`.
    pub fn cache_path(&self, project_root: &Path) -> PathBuf {
        self.path_override.clone().unwrap_or_else(|| {
            project_root.join(DEFAULT_CACHE_DIR).join(CACHE_FILE_NAME)
        })
    }

    /// Validate and load the cached payload for `descriptor`. A missing
    /// file or any field mismatch is a miss; non-NotFound I/O errors
    /// propagate.
    #[must_use = "a miss means the caller must rebuild"]
    pub fn load(&self, descriptor: &BuildDescriptor) -> IndexResult<LoadOutcome> {
        let path = self.cache_path(&descriptor.project_root);
        let text = match self.fs.read_to_string(&path) {
            Ok(text) => text,
            Err(e) if is_not_found(&e) => {
                return Ok(LoadOutcome::Miss(MissReason::CacheFileMissing));
            }
            Err(e) => return Err(IndexError::FileRead { path, source: e }),
        };

        let mut payload: CachePayload = match serde_json::from_str(&text) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("cache payload unreadable ({e}), rebuilding");
                return Ok(LoadOutcome::Miss(MissReason::InvalidPayload));
            }
        };

        let reason = if payload.schema_version != SCHEMA_VERSION {
            Some(MissReason::SchemaVersionMismatch)
        } else if payload.project_root != descriptor.project_root {
            Some(MissReason::ProjectRootMismatch)
        } else if payload.formatter_version != descriptor.formatter_version
            || payload.plugin_version != descriptor.plugin_version
        {
            Some(MissReason::ToolVersionMismatch)
        } else if payload.manifest_mtimes != descriptor.fingerprints.manifest_mtimes {
            Some(MissReason::ManifestMtimesMismatch)
        } else if payload.source_mtimes != descriptor.fingerprints.source_mtimes {
            Some(MissReason::SourceMtimesMismatch)
        } else {
            None
        };
        if let Some(reason) = reason {
            tracing::debug!("cache miss: {reason:?}");
            return Ok(LoadOutcome::Miss(reason));
        }

        // The index's own metrics field travels hoisted in the payload.
        payload.project_index.metrics = payload.metrics_summary.clone();
        Ok(LoadOutcome::Hit(Box::new(payload)))
    }

    /// Persist `index` under `descriptor`'s cache key. Oversized payloads
    /// are skipped, never an error; write or rename failures surface to
    /// the caller after best-effort temp cleanup.
    #[must_use = "save outcomes should be recorded"]
    pub fn save(
        &self,
        descriptor: &BuildDescriptor,
        index: &ProjectIndex,
    ) -> IndexResult<SaveOutcome> {
        let mut stripped = index.clone();
        let metrics_summary = stripped.metrics.take();
        let payload = CachePayload {
            schema_version: SCHEMA_VERSION,
            project_root: descriptor.project_root.clone(),
            formatter_version: descriptor.formatter_version.clone(),
            plugin_version: descriptor.plugin_version.clone(),
            manifest_mtimes: descriptor.fingerprints.manifest_mtimes.clone(),
            source_mtimes: descriptor.fingerprints.source_mtimes.clone(),
            metrics_summary,
            project_index: stripped,
        };

        let text = serde_json::to_string(&payload)?;
        let bytes = text.len() as u64;
        if bytes > self.max_payload_bytes {
            tracing::debug!(
                "cache payload of {bytes} bytes exceeds cap of {} bytes, skipping write",
                self.max_payload_bytes
            );
            return Ok(SaveOutcome::Skipped {
                reason: SkipReason::PayloadTooLarge {
                    bytes,
                    max: self.max_payload_bytes,
                },
            });
        }

        let path = self.cache_path(&descriptor.project_root);
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.fs.create_dir_all(&dir).map_err(|e| IndexError::FileWrite {
            path: dir.clone(),
            source: e,
        })?;

        let suffix = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp = path.with_extension(format!("json.{}.{suffix}.tmp", std::process::id()));
        if let Err(e) = self.fs.write(&temp, &text) {
            let _ = self.fs.remove_file(&temp);
            return Err(IndexError::FileWrite {
                path: temp,
                source: e,
            });
        }
        if let Err(e) = self.fs.rename(&temp, &path) {
            let _ = self.fs.remove_file(&temp);
            return Err(IndexError::FileWrite {
                path,
                source: e,
            });
        }
        Ok(SaveOutcome::Written { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::fs::OsFileSystem;
    use crate::indexing::descriptor::{BuildDescriptor, Fingerprints};
    use tempfile::TempDir;

    fn store(config: &CacheConfig) -> CacheStore {
        CacheStore::new(Arc::new(OsFileSystem::new()), config)
    }

    fn descriptor(root: &Path) -> BuildDescriptor {
        let mut fingerprints = Fingerprints::default();
        fingerprints
            .manifest_mtimes
            .insert("game.yyp".to_string(), 1000.5);
        fingerprints
            .source_mtimes
            .insert("scripts/scr_a/scr_a.gml".to_string(), 2000.25);
        BuildDescriptor::new(root.to_path_buf(), fingerprints).with_versions("3.3.0", "0.3.2")
    }

    #[test]
    fn missing_file_is_a_miss_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store(&CacheConfig::default());
        let outcome = store.load(&descriptor(dir.path())).unwrap();
        assert!(matches!(
            outcome,
            LoadOutcome::Miss(MissReason::CacheFileMissing)
        ));
    }

    #[test]
    fn round_trip_hits_with_unchanged_descriptor() {
        let dir = TempDir::new().unwrap();
        let store = store(&CacheConfig::default());
        let descriptor = descriptor(dir.path());
        let index = ProjectIndex::new(dir.path().to_path_buf());

        let saved = store.save(&descriptor, &index).unwrap();
        assert!(matches!(saved, SaveOutcome::Written { .. }));

        match store.load(&descriptor).unwrap() {
            LoadOutcome::Hit(payload) => {
                assert_eq!(payload.project_index, index);
                assert_eq!(payload.schema_version, SCHEMA_VERSION);
            }
            LoadOutcome::Miss(reason) => panic!("expected hit, got miss: {reason:?}"),
        }
    }

    #[test]
    fn each_field_mismatch_has_its_own_reason() {
        let dir = TempDir::new().unwrap();
        let store = store(&CacheConfig::default());
        let descriptor = descriptor(dir.path());
        let index = ProjectIndex::new(dir.path().to_path_buf());
        store.save(&descriptor, &index).unwrap();

        let mut other_root = descriptor.clone();
        other_root.project_root = dir.path().join("elsewhere");
        // The override keeps both descriptors pointing at the same file.
        let pinned = CacheStore::new(
            Arc::new(OsFileSystem::new()),
            &CacheConfig {
                path: Some(store.cache_path(dir.path())),
                ..CacheConfig::default()
            },
        );
        assert!(matches!(
            pinned.load(&other_root).unwrap(),
            LoadOutcome::Miss(MissReason::ProjectRootMismatch)
        ));

        let mut other_version = descriptor.clone();
        other_version.plugin_version = "9.9.9".to_string();
        assert!(matches!(
            store.load(&other_version).unwrap(),
            LoadOutcome::Miss(MissReason::ToolVersionMismatch)
        ));

        let mut manifest_touched = descriptor.clone();
        manifest_touched
            .fingerprints
            .manifest_mtimes
            .insert("game.yyp".to_string(), 1000.75);
        assert!(matches!(
            store.load(&manifest_touched).unwrap(),
            LoadOutcome::Miss(MissReason::ManifestMtimesMismatch)
        ));

        let mut source_added = descriptor.clone();
        source_added
            .fingerprints
            .source_mtimes
            .insert("scripts/scr_b/scr_b.gml".to_string(), 3000.0);
        assert!(matches!(
            store.load(&source_added).unwrap(),
            LoadOutcome::Miss(MissReason::SourceMtimesMismatch)
        ));
    }

    #[test]
    fn schema_version_mismatch_invalidates() {
        let dir = TempDir::new().unwrap();
        let store = store(&CacheConfig::default());
        let descriptor = descriptor(dir.path());
        let index = ProjectIndex::new(dir.path().to_path_buf());
        store.save(&descriptor, &index).unwrap();

        let path = store.cache_path(dir.path());
        let text = std::fs::read_to_string(&path).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&text).unwrap();
        value["schemaVersion"] = serde_json::json!(SCHEMA_VERSION + 1);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        assert!(matches!(
            store.load(&descriptor).unwrap(),
            LoadOutcome::Miss(MissReason::SchemaVersionMismatch)
        ));
    }

    #[test]
    fn invalid_json_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let store = store(&CacheConfig::default());
        let path = store.cache_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{definitely not json").unwrap();

        assert!(matches!(
            store.load(&descriptor(dir.path())).unwrap(),
            LoadOutcome::Miss(MissReason::InvalidPayload)
        ));
    }

    #[test]
    fn oversized_payload_is_skipped_without_writing() {
        let dir = TempDir::new().unwrap();
        let store = store(&CacheConfig {
            max_payload_bytes: 8,
            ..CacheConfig::default()
        });
        let descriptor = descriptor(dir.path());
        let index = ProjectIndex::new(dir.path().to_path_buf());

        let outcome = store.save(&descriptor, &index).unwrap();
        assert!(matches!(
            outcome,
            SaveOutcome::Skipped {
                reason: SkipReason::PayloadTooLarge { .. }
            }
        ));
        assert!(!store.cache_path(dir.path()).exists());
    }

    #[test]
    fn save_leaves_no_temp_files_behind() {
        let dir = TempDir::new().unwrap();
        let store = store(&CacheConfig::default());
        let descriptor = descriptor(dir.path());
        let index = ProjectIndex::new(dir.path().to_path_buf());
        store.save(&descriptor, &index).unwrap();

        let cache_dir = dir.path().join(DEFAULT_CACHE_DIR);
        let leftovers: Vec<_> = std::fs::read_dir(&cache_dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "tmp")
            })
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn metrics_are_hoisted_and_reattached() {
        let dir = TempDir::new().unwrap();
        let store = store(&CacheConfig::default());
        let descriptor = descriptor(dir.path());
        let mut index = ProjectIndex::new(dir.path().to_path_buf());
        index.metrics = Some(BuildMetrics {
            manifest_files: 1,
            source_files: 1,
            resources: 1,
            scopes: 1,
            identifiers: 1,
            elapsed_ms: 7,
        });

        store.save(&descriptor, &index).unwrap();

        let text = std::fs::read_to_string(store.cache_path(dir.path())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value["metricsSummary"].is_object());
        assert!(value["projectIndex"].get("metrics").is_none());

        match store.load(&descriptor).unwrap() {
            LoadOutcome::Hit(payload) => {
                assert_eq!(payload.project_index.metrics, index.metrics);
            }
            LoadOutcome::Miss(reason) => panic!("expected hit, got {reason:?}"),
        }
    }
}
