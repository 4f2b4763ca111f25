//! Core identifier and location types shared across the indexer.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A lexical scope identifier of the form `scope:<kind>:<qualifying-parts>`.
///
/// Scope ids are derived from resource metadata, never from processing
/// order, so an unchanged project always yields the same ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn script(name: &str) -> Self {
        Self(format!("scope:script:{name}"))
    }

    pub fn object_event(object_name: &str, event: &str) -> Self {
        Self(format!("scope:objectEvent:{object_name}:{event}"))
    }

    pub fn file(relative_path: &str) -> Self {
        Self(format!("scope:file:{relative_path}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stable identifier-collection entry id of the form `<category>:<value>`.
///
/// Reproducible from the same inputs regardless of processing order: the
/// value part is a scope id for scripts, a bare name for macros and
/// globals, a declaration location for enums and enum members, and
/// `<scopeId>:<name>` for instance variables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierId(String);

impl IdentifierId {
    pub fn script(scope: &ScopeId) -> Self {
        Self(format!("script:{scope}"))
    }

    pub fn macro_(name: &str) -> Self {
        Self(format!("macro:{name}"))
    }

    pub fn enum_(key: &LocationKey) -> Self {
        Self(format!("enum:{}:{}", key.file, key.offset))
    }

    pub fn enum_member(key: &LocationKey) -> Self {
        Self(format!("enumMember:{}:{}", key.file, key.offset))
    }

    pub fn global(name: &str) -> Self {
        Self(format!("global:{name}"))
    }

    pub fn instance(scope: &ScopeId, name: &str) -> Self {
        Self(format!("instance:{scope}:{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentifierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Byte-offset span of an identifier occurrence within its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// A declaration-site key: relative file path plus start offset.
///
/// Enum and enum-member identity is keyed by declaration location because
/// enum names are not project-unique.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationKey {
    pub file: String,
    pub offset: u32,
}

impl LocationKey {
    pub fn new(file: impl Into<String>, offset: u32) -> Self {
        Self {
            file: file.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeKind {
    Script,
    ObjectEvent,
    File,
}

/// Resource type as declared in its manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Project,
    Script,
    Object,
    Room,
    Sprite,
    Other(String),
}

impl ResourceKind {
    /// Map a manifest `resourceType` token to a kind.
    pub fn from_manifest(resource_type: &str) -> Self {
        match resource_type {
            "GMProject" => Self::Project,
            "GMScript" => Self::Script,
            "GMObject" => Self::Object,
            "GMRoom" => Self::Room,
            "GMSprite" => Self::Sprite,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Event metadata for object-event scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRef {
    pub event_type: i64,
    pub event_num: i64,
}

bitflags! {
    /// Role tags attached to an identifier occurrence by the parser.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct IdentRoles: u16 {
        const DECLARATION = 1 << 0;
        const REFERENCE   = 1 << 1;
        const SCRIPT      = 1 << 2;
        const MACRO       = 1 << 3;
        const ENUM        = 1 << 4;
        const ENUM_MEMBER = 1 << 5;
        const GLOBAL      = 1 << 6;
        const INSTANCE    = 1 << 7;
        const VARIABLE    = 1 << 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_id_formats() {
        assert_eq!(ScopeId::script("scr_a").as_str(), "scope:script:scr_a");
        assert_eq!(
            ScopeId::object_event("obj_door", "Create_0").as_str(),
            "scope:objectEvent:obj_door:Create_0"
        );
        assert_eq!(
            ScopeId::file("scripts/loose.gml").as_str(),
            "scope:file:scripts/loose.gml"
        );
    }

    #[test]
    fn identifier_id_is_content_derived() {
        let scope = ScopeId::script("scr_a");
        assert_eq!(
            IdentifierId::script(&scope).as_str(),
            "script:scope:script:scr_a"
        );
        let key = LocationKey::new("scripts/scr_a/scr_a.gml", 12);
        assert_eq!(
            IdentifierId::enum_(&key).as_str(),
            "enum:scripts/scr_a/scr_a.gml:12"
        );
        assert_eq!(
            IdentifierId::instance(&ScopeId::object_event("obj_a", "Step_0"), "hp").as_str(),
            "instance:scope:objectEvent:obj_a:Step_0:hp"
        );
    }

    #[test]
    fn resource_kind_mapping() {
        assert_eq!(ResourceKind::from_manifest("GMScript"), ResourceKind::Script);
        assert_eq!(ResourceKind::from_manifest("GMObject"), ResourceKind::Object);
        assert_eq!(
            ResourceKind::from_manifest("GMSound"),
            ResourceKind::Other("GMSound".to_string())
        );
    }

    #[test]
    fn roles_combine() {
        let roles = IdentRoles::DECLARATION | IdentRoles::SCRIPT;
        assert!(roles.contains(IdentRoles::DECLARATION));
        assert!(!roles.contains(IdentRoles::REFERENCE));
    }
}
