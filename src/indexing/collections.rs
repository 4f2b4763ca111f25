//! Identifier collection builder.
//!
//! Pure aggregation: the source analyzer emits typed `CollectionEvent`s,
//! and this builder folds them into the six identifier collections.
//! Entry ids are content-derived, so the result is independent of the
//! order events arrive in.

use crate::index::{
    EnumEntry, EnumMemberEntry, GlobalEntry, IdentifierCollections, IdentifierOccurrence,
    InstanceVariableEntry, MacroEntry, ScriptEntry,
};
use crate::types::{IdentifierId, LocationKey, ScopeId};

/// One registration into an identifier collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionEvent {
    Script {
        scope: ScopeId,
        name: String,
        resource_path: Option<String>,
        occurrence: IdentifierOccurrence,
        is_declaration: bool,
    },
    Macro {
        name: String,
        occurrence: IdentifierOccurrence,
        is_declaration: bool,
    },
    Enum {
        key: LocationKey,
        name: Option<String>,
        occurrence: IdentifierOccurrence,
        is_declaration: bool,
    },
    EnumMember {
        key: LocationKey,
        enum_key: Option<LocationKey>,
        name: Option<String>,
        occurrence: IdentifierOccurrence,
        is_declaration: bool,
    },
    Global {
        name: String,
        occurrence: IdentifierOccurrence,
        is_declaration: bool,
    },
    Instance {
        scope: ScopeId,
        name: String,
        resource_path: Option<String>,
        occurrence: IdentifierOccurrence,
        is_declaration: bool,
    },
}

#[derive(Debug, Default)]
pub struct CollectionBuilder {
    collections: IdentifierCollections,
}

impl CollectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: CollectionEvent) {
        match event {
            CollectionEvent::Script {
                scope,
                name,
                resource_path,
                occurrence,
                is_declaration,
            } => {
                let id = IdentifierId::script(&scope);
                let entry = self
                    .collections
                    .scripts
                    .entry(id.clone())
                    .or_insert_with(|| ScriptEntry {
                        id,
                        name,
                        scope,
                        resource_path: None,
                        declarations: Vec::new(),
                        references: Vec::new(),
                    });
                if entry.resource_path.is_none() {
                    entry.resource_path = resource_path;
                }
                push_occurrence(
                    &mut entry.declarations,
                    &mut entry.references,
                    occurrence,
                    is_declaration,
                );
            }
            CollectionEvent::Macro {
                name,
                occurrence,
                is_declaration,
            } => {
                let id = IdentifierId::macro_(&name);
                let entry = self
                    .collections
                    .macros
                    .entry(id.clone())
                    .or_insert_with(|| MacroEntry {
                        id,
                        name,
                        declarations: Vec::new(),
                        references: Vec::new(),
                    });
                push_occurrence(
                    &mut entry.declarations,
                    &mut entry.references,
                    occurrence,
                    is_declaration,
                );
            }
            CollectionEvent::Enum {
                key,
                name,
                occurrence,
                is_declaration,
            } => {
                let id = IdentifierId::enum_(&key);
                let entry = self
                    .collections
                    .enums
                    .entry(id.clone())
                    .or_insert_with(|| EnumEntry {
                        id,
                        name: None,
                        key,
                        declarations: Vec::new(),
                        references: Vec::new(),
                    });
                if entry.name.is_none() {
                    entry.name = name;
                }
                push_occurrence(
                    &mut entry.declarations,
                    &mut entry.references,
                    occurrence,
                    is_declaration,
                );
            }
            CollectionEvent::EnumMember {
                key,
                enum_key,
                name,
                occurrence,
                is_declaration,
            } => {
                let id = IdentifierId::enum_member(&key);
                let entry = self
                    .collections
                    .enum_members
                    .entry(id.clone())
                    .or_insert_with(|| EnumMemberEntry {
                        id,
                        name: None,
                        key,
                        enum_key: None,
                        declarations: Vec::new(),
                        references: Vec::new(),
                    });
                if entry.name.is_none() {
                    entry.name = name;
                }
                if entry.enum_key.is_none() {
                    entry.enum_key = enum_key;
                }
                push_occurrence(
                    &mut entry.declarations,
                    &mut entry.references,
                    occurrence,
                    is_declaration,
                );
            }
            CollectionEvent::Global {
                name,
                occurrence,
                is_declaration,
            } => {
                let id = IdentifierId::global(&name);
                let entry = self
                    .collections
                    .global_variables
                    .entry(id.clone())
                    .or_insert_with(|| GlobalEntry {
                        id,
                        name,
                        declarations: Vec::new(),
                        references: Vec::new(),
                    });
                push_occurrence(
                    &mut entry.declarations,
                    &mut entry.references,
                    occurrence,
                    is_declaration,
                );
            }
            CollectionEvent::Instance {
                scope,
                name,
                resource_path,
                occurrence,
                is_declaration,
            } => {
                let id = IdentifierId::instance(&scope, &name);
                let entry = self
                    .collections
                    .instance_variables
                    .entry(id.clone())
                    .or_insert_with(|| InstanceVariableEntry {
                        id,
                        name,
                        scope,
                        resource_path: None,
                        declarations: Vec::new(),
                        references: Vec::new(),
                    });
                if entry.resource_path.is_none() {
                    entry.resource_path = resource_path;
                }
                push_occurrence(
                    &mut entry.declarations,
                    &mut entry.references,
                    occurrence,
                    is_declaration,
                );
            }
        }
    }

    pub fn finish(self) -> IdentifierCollections {
        self.collections
    }
}

/// Append an occurrence to the right list. A declaration is only added if
/// no existing declaration shares its exact `(file, start)` key: the
/// same site can be revisited through several code paths (the general
/// identifier pass and the implicit-assignment pass, for example).
/// Span-less synthetic declarations are injected at most once per entry.
fn push_occurrence(
    declarations: &mut Vec<IdentifierOccurrence>,
    references: &mut Vec<IdentifierOccurrence>,
    occurrence: IdentifierOccurrence,
    is_declaration: bool,
) {
    if !is_declaration {
        references.push(occurrence);
        return;
    }
    match occurrence.location_key() {
        Some(key) => {
            if declarations
                .iter()
                .any(|existing| existing.location_key().as_ref() == Some(&key))
            {
                return;
            }
        }
        None => {
            if declarations.iter().any(|existing| existing.synthetic) {
                return;
            }
        }
    }
    declarations.push(occurrence);
}
