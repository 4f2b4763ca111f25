//! The ProjectIndex aggregate and its records.
//!
//! Everything here is plain serializable data. Maps are BTreeMaps so the
//! serialized form is canonical: a rebuild of an unchanged project
//! produces a byte-identical payload, which is what the cache layer's
//! equality checks and diffable test fixtures rely on.

use crate::parsing::DeclarationSite;
use crate::types::{
    EventRef, IdentRoles, IdentifierId, LocationKey, ResourceKind, ScopeId, ScopeKind, Span,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single textual appearance of a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierOccurrence {
    pub name: String,
    /// None only for synthetic occurrences invented by the indexer.
    pub span: Option<Span>,
    /// Relative path of the file the occurrence appears in.
    pub file: String,
    pub scope: ScopeId,
    pub roles: IdentRoles,
    pub declaration: Option<DeclarationSite>,
    pub is_builtin: bool,
    pub synthetic: bool,
}

impl IdentifierOccurrence {
    /// Dedup key: exact source location (file + start offset). Synthetic
    /// occurrences have no location and never participate.
    pub fn location_key(&self) -> Option<LocationKey> {
        self.span
            .map(|span| LocationKey::new(self.file.clone(), span.start))
    }
}

/// A call edge from a scope to a script name, resolved or not.
///
/// Unresolved edges are retained: a call to a name no script declares is
/// exactly what "possibly dead or external" diagnostics want to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCall {
    pub from_scope: ScopeId,
    pub name: String,
    pub target_scope: Option<ScopeId>,
    pub is_resolved: bool,
    pub file: String,
    pub span: Span,
}

/// A cross-resource asset reference extracted from manifest structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReference {
    /// Manifest-relative path of the referencing resource.
    pub source_path: String,
    /// JSON-pointer-style location of the `path` field within the manifest.
    pub property_path: String,
    pub target_path: String,
    pub target_name: Option<String>,
    /// Attributed in a second pass once all resources are known.
    pub target_kind: Option<ResourceKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub path: String,
    pub name: String,
    pub kind: ResourceKind,
    pub scopes: Vec<ScopeId>,
    pub source_files: Vec<String>,
    pub asset_references: Vec<AssetReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRecord {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub name: String,
    pub resource_path: Option<String>,
    pub event: Option<EventRef>,
    /// Source files realizing this scope. Usually one; object events may
    /// gain synthetic fallbacks.
    pub files: Vec<String>,
    pub declarations: Vec<IdentifierOccurrence>,
    pub references: Vec<IdentifierOccurrence>,
    pub ignored: Vec<IdentifierOccurrence>,
    pub calls: Vec<ScriptCall>,
}

impl ScopeRecord {
    pub fn new(id: ScopeId, kind: ScopeKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            resource_path: None,
            event: None,
            files: Vec::new(),
            declarations: Vec::new(),
            references: Vec::new(),
            ignored: Vec::new(),
            calls: Vec::new(),
        }
    }
}

/// File-level view of one source file's occurrences. Mirrors the owning
/// scope's lists but stays file-local, since one scope may be realized by
/// several files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub path: String,
    pub scope: ScopeId,
    pub declarations: Vec<IdentifierOccurrence>,
    pub references: Vec<IdentifierOccurrence>,
    pub ignored: Vec<IdentifierOccurrence>,
    pub calls: Vec<ScriptCall>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, scope: ScopeId) -> Self {
        Self {
            path: path.into(),
            scope,
            declarations: Vec::new(),
            references: Vec::new(),
            ignored: Vec::new(),
            calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationships {
    pub script_calls: Vec<ScriptCall>,
    pub asset_references: Vec<AssetReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptEntry {
    pub id: IdentifierId,
    pub name: String,
    pub scope: ScopeId,
    pub resource_path: Option<String>,
    pub declarations: Vec<IdentifierOccurrence>,
    pub references: Vec<IdentifierOccurrence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroEntry {
    pub id: IdentifierId,
    pub name: String,
    pub declarations: Vec<IdentifierOccurrence>,
    pub references: Vec<IdentifierOccurrence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumEntry {
    pub id: IdentifierId,
    /// Display name resolved from the declaration site; stays None when
    /// only an unresolvable reference was seen.
    pub name: Option<String>,
    pub key: LocationKey,
    pub declarations: Vec<IdentifierOccurrence>,
    pub references: Vec<IdentifierOccurrence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumMemberEntry {
    pub id: IdentifierId,
    pub name: Option<String>,
    pub key: LocationKey,
    /// Declaration-location key of the owning enum, when known.
    pub enum_key: Option<LocationKey>,
    pub declarations: Vec<IdentifierOccurrence>,
    pub references: Vec<IdentifierOccurrence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalEntry {
    pub id: IdentifierId,
    pub name: String,
    pub declarations: Vec<IdentifierOccurrence>,
    pub references: Vec<IdentifierOccurrence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceVariableEntry {
    pub id: IdentifierId,
    pub name: String,
    pub scope: ScopeId,
    pub resource_path: Option<String>,
    pub declarations: Vec<IdentifierOccurrence>,
    pub references: Vec<IdentifierOccurrence>,
}

/// The six typed identifier collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierCollections {
    pub scripts: BTreeMap<IdentifierId, ScriptEntry>,
    pub macros: BTreeMap<IdentifierId, MacroEntry>,
    pub enums: BTreeMap<IdentifierId, EnumEntry>,
    pub enum_members: BTreeMap<IdentifierId, EnumMemberEntry>,
    pub global_variables: BTreeMap<IdentifierId, GlobalEntry>,
    pub instance_variables: BTreeMap<IdentifierId, InstanceVariableEntry>,
}

impl IdentifierCollections {
    pub fn total_entries(&self) -> usize {
        self.scripts.len()
            + self.macros.len()
            + self.enums.len()
            + self.enum_members.len()
            + self.global_variables.len()
            + self.instance_variables.len()
    }

    /// True when a name appears anywhere in the six collections. Used by
    /// the built-in-exclusion tests.
    pub fn contains_name(&self, name: &str) -> bool {
        self.scripts.values().any(|e| e.name == name)
            || self.macros.values().any(|e| e.name == name)
            || self.enums.values().any(|e| e.name.as_deref() == Some(name))
            || self
                .enum_members
                .values()
                .any(|e| e.name.as_deref() == Some(name))
            || self.global_variables.values().any(|e| e.name == name)
            || self.instance_variables.values().any(|e| e.name == name)
    }
}

/// Summary attached to the index and hoisted into the cache payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMetrics {
    pub manifest_files: usize,
    pub source_files: usize,
    pub resources: usize,
    pub scopes: usize,
    pub identifiers: usize,
    pub elapsed_ms: u64,
}

/// Root aggregate. Immutable once returned from a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectIndex {
    pub project_root: PathBuf,
    pub resources: BTreeMap<String, ResourceRecord>,
    pub scopes: BTreeMap<ScopeId, ScopeRecord>,
    pub files: BTreeMap<String, FileRecord>,
    pub relationships: Relationships,
    pub identifiers: IdentifierCollections,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BuildMetrics>,
}

impl ProjectIndex {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            resources: BTreeMap::new(),
            scopes: BTreeMap::new(),
            files: BTreeMap::new(),
            relationships: Relationships::default(),
            identifiers: IdentifierCollections::default(),
            metrics: None,
        }
    }

    /// Sort every interleaving-dependent list so output ordering is
    /// deterministic regardless of how analysis workers were scheduled.
    pub fn sort_canonical(&mut self) {
        for resource in self.resources.values_mut() {
            resource.scopes.sort();
            resource.source_files.sort();
            sort_asset_references(&mut resource.asset_references);
        }
        for scope in self.scopes.values_mut() {
            scope.files.sort();
            sort_occurrences(&mut scope.declarations);
            sort_occurrences(&mut scope.references);
            sort_occurrences(&mut scope.ignored);
            sort_calls(&mut scope.calls);
        }
        for file in self.files.values_mut() {
            sort_occurrences(&mut file.declarations);
            sort_occurrences(&mut file.references);
            sort_occurrences(&mut file.ignored);
            sort_calls(&mut file.calls);
        }
        sort_calls(&mut self.relationships.script_calls);
        sort_asset_references(&mut self.relationships.asset_references);
        for entry in self.identifiers.scripts.values_mut() {
            sort_occurrences(&mut entry.declarations);
            sort_occurrences(&mut entry.references);
        }
        for entry in self.identifiers.macros.values_mut() {
            sort_occurrences(&mut entry.declarations);
            sort_occurrences(&mut entry.references);
        }
        for entry in self.identifiers.enums.values_mut() {
            sort_occurrences(&mut entry.declarations);
            sort_occurrences(&mut entry.references);
        }
        for entry in self.identifiers.enum_members.values_mut() {
            sort_occurrences(&mut entry.declarations);
            sort_occurrences(&mut entry.references);
        }
        for entry in self.identifiers.global_variables.values_mut() {
            sort_occurrences(&mut entry.declarations);
            sort_occurrences(&mut entry.references);
        }
        for entry in self.identifiers.instance_variables.values_mut() {
            sort_occurrences(&mut entry.declarations);
            sort_occurrences(&mut entry.references);
        }
    }
}

fn sort_occurrences(list: &mut [IdentifierOccurrence]) {
    list.sort_by(|a, b| {
        (a.file.as_str(), a.span.map(|s| s.start), a.name.as_str()).cmp(&(
            b.file.as_str(),
            b.span.map(|s| s.start),
            b.name.as_str(),
        ))
    });
}

fn sort_calls(list: &mut [ScriptCall]) {
    list.sort_by(|a, b| {
        (a.file.as_str(), a.span.start, a.name.as_str()).cmp(&(
            b.file.as_str(),
            b.span.start,
            b.name.as_str(),
        ))
    });
}

fn sort_asset_references(list: &mut [AssetReference]) {
    list.sort_by(|a, b| {
        (
            a.source_path.as_str(),
            a.property_path.as_str(),
            a.target_path.as_str(),
        )
            .cmp(&(
                b.source_path.as_str(),
                b.property_path.as_str(),
                b.target_path.as_str(),
            ))
    });
}
