//! Resource manifest analysis.
//!
//! Each `.yyp`/`.yy` manifest yields one resource record, scope
//! descriptors for scripts and object event handlers, and candidate asset
//! references pulled from the manifest's JSON structure. Manifests are
//! hand-edited files in practice, so one that fails to parse is skipped
//! rather than aborting the run.

use crate::error::{IndexError, IndexResult};
use crate::fs::{FileSystem, is_not_found};
use crate::index::{AssetReference, ResourceRecord};
use crate::indexing::scanner::{PROJECT_MANIFEST_EXT, ScannedFile, SOURCE_EXT};
use crate::types::{EventRef, ResourceKind, ScopeId, ScopeKind};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where a source file's identifiers belong, derived from manifests
/// before any source file is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeDescriptor {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub name: String,
    pub resource_path: Option<String>,
    pub event: Option<EventRef>,
    /// Relative source path this scope expects to be realized by.
    pub source_path: String,
}

#[derive(Debug, Default)]
pub struct ManifestAnalysis {
    /// Resource records keyed by manifest-relative path.
    pub resources: BTreeMap<String, ResourceRecord>,
    /// Scope descriptors keyed by the relative source path realizing them.
    pub scopes_by_source: BTreeMap<String, ScopeDescriptor>,
    /// All candidate asset references, target kinds attributed.
    pub asset_references: Vec<AssetReference>,
    /// Script name → scope id, for call resolution.
    pub script_scopes: BTreeMap<String, ScopeId>,
    /// Script name → owning resource path.
    pub script_resources: BTreeMap<String, String>,
}

pub struct ManifestAnalyzer {
    fs: Arc<dyn FileSystem>,
}

impl ManifestAnalyzer {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn analyze(&self, manifest_files: &[ScannedFile]) -> IndexResult<ManifestAnalysis> {
        let mut analysis = ManifestAnalysis::default();
        let mut raw_references: Vec<AssetReference> = Vec::new();

        for file in manifest_files {
            let text = match self.fs.read_to_string(&file.absolute) {
                Ok(text) => text,
                Err(e) if is_not_found(&e) => continue,
                Err(e) => {
                    return Err(IndexError::FileRead {
                        path: file.absolute.clone(),
                        source: e,
                    });
                }
            };
            let value: Value = match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("skipping malformed manifest {}: {e}", file.relative);
                    continue;
                }
            };

            self.analyze_manifest(file, &value, &mut analysis);
            collect_path_references(&file.relative, &value, String::new(), &mut raw_references);
        }

        // Target kinds are attributed in a second pass because a resource
        // may be declared after it is referenced.
        for mut reference in raw_references {
            reference.target_kind = analysis
                .resources
                .get(&reference.target_path)
                .map(|r| r.kind.clone());
            if let Some(resource) = analysis.resources.get_mut(&reference.source_path) {
                resource.asset_references.push(reference.clone());
            }
            analysis.asset_references.push(reference);
        }

        Ok(analysis)
    }

    fn analyze_manifest(&self, file: &ScannedFile, value: &Value, analysis: &mut ManifestAnalysis) {
        let stem = file
            .relative
            .rsplit('/')
            .next()
            .and_then(|name| name.split('.').next())
            .unwrap_or(&file.relative)
            .to_string();
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or(stem);
        let kind = match value.get("resourceType").and_then(Value::as_str) {
            Some(resource_type) => ResourceKind::from_manifest(resource_type),
            None if file.relative.ends_with(PROJECT_MANIFEST_EXT) => ResourceKind::Project,
            None => ResourceKind::Other("unknown".to_string()),
        };

        let record = analysis
            .resources
            .entry(file.relative.clone())
            .or_insert_with(|| ResourceRecord {
                path: file.relative.clone(),
                name: name.clone(),
                kind: kind.clone(),
                scopes: Vec::new(),
                source_files: Vec::new(),
                asset_references: Vec::new(),
            });
        record.name = name.clone();
        record.kind = kind.clone();

        let resource_dir = match file.relative.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => String::new(),
        };

        match kind {
            ResourceKind::Script => {
                let source_path = join_relative(&resource_dir, &format!("{name}.{SOURCE_EXT}"));
                let descriptor = ScopeDescriptor {
                    id: ScopeId::script(&name),
                    kind: ScopeKind::Script,
                    name: name.clone(),
                    resource_path: Some(file.relative.clone()),
                    event: None,
                    source_path: source_path.clone(),
                };
                register_scope(analysis, file, descriptor, source_path);
                analysis
                    .script_scopes
                    .insert(name.clone(), ScopeId::script(&name));
                analysis
                    .script_resources
                    .insert(name, file.relative.clone());
            }
            ResourceKind::Object => {
                let Some(events) = value.get("eventList").and_then(Value::as_array) else {
                    return;
                };
                for event in events {
                    let event_type = event.get("eventType").and_then(Value::as_i64);
                    let event_num = event.get("eventNum").and_then(Value::as_i64);
                    let event_name = event
                        .get("name")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty());

                    let display = match (event_name, event_type, event_num) {
                        (Some(event_name), _, _) => event_name.to_string(),
                        (None, None, None) => "event".to_string(),
                        (None, t, n) => format!("{}_{}", t.unwrap_or(0), n.unwrap_or(0)),
                    };
                    let event_ref = (event_type.is_some() || event_num.is_some()).then(|| EventRef {
                        event_type: event_type.unwrap_or(0),
                        event_num: event_num.unwrap_or(0),
                    });
                    let source_path = match event.get("path").and_then(Value::as_str) {
                        Some(path) => normalize_path(path),
                        None => join_relative(&resource_dir, &format!("{display}.{SOURCE_EXT}")),
                    };

                    let descriptor = ScopeDescriptor {
                        id: ScopeId::object_event(&name, &display),
                        kind: ScopeKind::ObjectEvent,
                        name: format!("{name}:{display}"),
                        resource_path: Some(file.relative.clone()),
                        event: event_ref,
                        source_path: source_path.clone(),
                    };
                    register_scope(analysis, file, descriptor, source_path);
                }
            }
            _ => {}
        }
    }
}

fn register_scope(
    analysis: &mut ManifestAnalysis,
    file: &ScannedFile,
    descriptor: ScopeDescriptor,
    source_path: String,
) {
    if let Some(record) = analysis.resources.get_mut(&file.relative) {
        if !record.scopes.contains(&descriptor.id) {
            record.scopes.push(descriptor.id.clone());
        }
        if !record.source_files.contains(&source_path) {
            record.source_files.push(source_path.clone());
        }
    }
    analysis.scopes_by_source.entry(source_path).or_insert(descriptor);
}

fn join_relative(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Generic walk over manifest JSON: every object node carrying a string
/// `path` field becomes a candidate asset reference. This is a structural
/// heuristic, not a declared schema, and intentionally over-collects;
/// consumers filter as needed.
fn collect_path_references(
    manifest_path: &str,
    value: &Value,
    pointer: String,
    out: &mut Vec<AssetReference>,
) {
    match value {
        Value::Object(map) => {
            if let Some(target) = map.get("path").and_then(Value::as_str) {
                out.push(AssetReference {
                    source_path: manifest_path.to_string(),
                    property_path: pointer.clone(),
                    target_path: normalize_path(target),
                    target_name: map
                        .get("name")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    target_kind: None,
                });
            }
            for (key, child) in map {
                collect_path_references(manifest_path, child, format!("{pointer}/{key}"), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_path_references(manifest_path, child, format!("{pointer}/{i}"), out);
            }
        }
        _ => {}
    }
}
