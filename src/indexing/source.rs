//! Source file analysis.
//!
//! Classifies every identifier occurrence in one parsed source file,
//! detects script-call edges, and applies the implicit instance-variable
//! heuristic. Analysis is per-worker local: it returns a `SourceAnalysis`
//! and never touches shared records, so the bounded pool can run files in
//! parallel and a single-threaded merge applies the results afterwards.

use crate::index::{IdentifierOccurrence, ScriptCall};
use crate::indexing::collections::CollectionEvent;
use crate::indexing::manifest::ScopeDescriptor;
use crate::parsing::{AssignTarget, Callee, IdentifierNode, SyntaxNode, SyntaxTree};
use crate::types::{IdentRoles, LocationKey, ScopeId, ScopeKind};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Lookup tables shared by all files of one build.
pub struct SourceContext<'a> {
    pub builtins: &'a HashSet<String>,
    pub script_scopes: &'a BTreeMap<String, ScopeId>,
    pub script_resources: &'a BTreeMap<String, String>,
}

/// Everything one file contributed, to be merged after the pool drains.
#[derive(Debug, Default)]
pub struct SourceAnalysis {
    pub file: String,
    pub declarations: Vec<IdentifierOccurrence>,
    pub references: Vec<IdentifierOccurrence>,
    pub ignored: Vec<IdentifierOccurrence>,
    pub calls: Vec<ScriptCall>,
    pub events: Vec<CollectionEvent>,
}

/// Enum display names are resolved by declaration location: occurrence
/// records for enum references only carry the declaration's offsets, so a
/// pre-pass over the tree maps those offsets back to names.
#[derive(Default)]
struct EnumTables {
    /// enum-name declaration offset → enum display name
    enums: HashMap<u32, String>,
    /// member declaration offset → (member name, owning enum offset)
    members: HashMap<u32, (String, u32)>,
}

pub fn analyze_source(
    ctx: &SourceContext<'_>,
    file: &str,
    scope: &ScopeDescriptor,
    tree: &SyntaxTree,
) -> SourceAnalysis {
    let mut tables = EnumTables::default();
    for node in &tree.nodes {
        collect_enum_tables(node, &mut tables);
    }

    let mut analyzer = Analyzer {
        ctx,
        file,
        scope,
        tables,
        out: SourceAnalysis {
            file: file.to_string(),
            ..SourceAnalysis::default()
        },
    };
    for node in &tree.nodes {
        analyzer.visit(node);
    }
    analyzer.out
}

fn collect_enum_tables(node: &SyntaxNode, tables: &mut EnumTables) {
    match node {
        SyntaxNode::EnumDeclaration { name, members } => {
            tables.enums.insert(name.span.start, name.name.clone());
            for member in members {
                tables
                    .members
                    .insert(member.span.start, (member.name.clone(), name.span.start));
            }
        }
        SyntaxNode::Block(children) => {
            for child in children {
                collect_enum_tables(child, tables);
            }
        }
        SyntaxNode::Call { callee, arguments, .. } => {
            if let Callee::Expression(inner) = callee {
                collect_enum_tables(inner, tables);
            }
            for argument in arguments {
                collect_enum_tables(argument, tables);
            }
        }
        SyntaxNode::Assignment { target, value } => {
            if let AssignTarget::Expression(inner) = target {
                collect_enum_tables(inner, tables);
            }
            if let Some(value) = value {
                collect_enum_tables(value, tables);
            }
        }
        SyntaxNode::Identifier(_) => {}
    }
}

struct Analyzer<'a> {
    ctx: &'a SourceContext<'a>,
    file: &'a str,
    scope: &'a ScopeDescriptor,
    tables: EnumTables,
    out: SourceAnalysis,
}

impl Analyzer<'_> {
    fn visit(&mut self, node: &SyntaxNode) {
        match node {
            SyntaxNode::Identifier(ident) => {
                self.classify(ident);
            }
            SyntaxNode::Call {
                callee, arguments, ..
            } => {
                match callee {
                    Callee::Name(ident) => {
                        self.detect_call(ident);
                        self.classify(ident);
                    }
                    Callee::Expression(inner) => self.visit(inner),
                }
                for argument in arguments {
                    self.visit(argument);
                }
            }
            SyntaxNode::Assignment { target, value } => {
                match target {
                    AssignTarget::Name(ident) => {
                        self.classify(ident);
                        self.detect_implicit_instance(ident);
                    }
                    AssignTarget::Expression(inner) => self.visit(inner),
                }
                if let Some(value) = value {
                    self.visit(value);
                }
            }
            SyntaxNode::EnumDeclaration { name, members } => {
                self.classify(name);
                for member in members {
                    self.classify(member);
                }
            }
            SyntaxNode::Block(children) => {
                for child in children {
                    self.visit(child);
                }
            }
        }
    }

    fn occurrence(&self, ident: &IdentifierNode, is_builtin: bool) -> IdentifierOccurrence {
        IdentifierOccurrence {
            name: ident.name.clone(),
            span: Some(ident.span),
            file: self.file.to_string(),
            scope: self.scope.id.clone(),
            roles: ident.roles,
            declaration: ident.declaration.clone(),
            is_builtin,
            synthetic: false,
        }
    }

    fn is_global(ident: &IdentifierNode) -> bool {
        ident.is_global || ident.roles.contains(IdentRoles::GLOBAL)
    }

    fn classify(&mut self, ident: &IdentifierNode) {
        if self.ctx.builtins.contains(&ident.name) {
            self.out.ignored.push(self.occurrence(ident, true));
            return;
        }

        let occurrence = self.occurrence(ident, false);
        if ident.roles.contains(IdentRoles::DECLARATION) {
            self.out.declarations.push(occurrence.clone());
            self.register(ident, occurrence.clone(), true);
        }
        if ident.roles.contains(IdentRoles::REFERENCE) {
            self.out.references.push(occurrence.clone());
            self.register(ident, occurrence, false);
        }
    }

    fn register(
        &mut self,
        ident: &IdentifierNode,
        occurrence: IdentifierOccurrence,
        is_declaration: bool,
    ) {
        let roles = ident.roles;
        if roles.contains(IdentRoles::SCRIPT) {
            // Scripts are keyed by scope id; a reference resolves through
            // the manifest-derived name table.
            let scope = self.ctx.script_scopes.get(&ident.name).cloned().or_else(|| {
                (is_declaration && self.scope.kind == ScopeKind::Script)
                    .then(|| self.scope.id.clone())
            });
            if let Some(scope) = scope {
                self.out.events.push(CollectionEvent::Script {
                    resource_path: self.ctx.script_resources.get(&ident.name).cloned(),
                    name: ident.name.clone(),
                    scope,
                    occurrence,
                    is_declaration,
                });
            }
            return;
        }
        if roles.contains(IdentRoles::MACRO) {
            self.out.events.push(CollectionEvent::Macro {
                name: ident.name.clone(),
                occurrence,
                is_declaration,
            });
            return;
        }
        if roles.contains(IdentRoles::ENUM) {
            // References carry only the declaration's location; use it as
            // the identity key so all occurrences of one enum meet in one
            // entry.
            let Some(offset) = self.declaration_offset(ident, is_declaration) else {
                return;
            };
            self.out.events.push(CollectionEvent::Enum {
                key: LocationKey::new(self.file, offset),
                name: self.tables.enums.get(&offset).cloned(),
                occurrence,
                is_declaration,
            });
            return;
        }
        if roles.contains(IdentRoles::ENUM_MEMBER) {
            let Some(offset) = self.declaration_offset(ident, is_declaration) else {
                return;
            };
            let member = self.tables.members.get(&offset);
            self.out.events.push(CollectionEvent::EnumMember {
                key: LocationKey::new(self.file, offset),
                enum_key: member.map(|(_, enum_offset)| LocationKey::new(self.file, *enum_offset)),
                name: member.map(|(name, _)| name.clone()),
                occurrence,
                is_declaration,
            });
            return;
        }
        if roles.contains(IdentRoles::INSTANCE) {
            self.out.events.push(CollectionEvent::Instance {
                scope: self.scope.id.clone(),
                name: ident.name.clone(),
                resource_path: self.scope.resource_path.clone(),
                occurrence,
                is_declaration,
            });
            return;
        }
        if Self::is_global(ident) {
            self.out.events.push(CollectionEvent::Global {
                name: ident.name.clone(),
                occurrence,
                is_declaration,
            });
        }
    }

    /// Declaration-site offset used as the enum/enum-member identity key:
    /// a declaration keys by its own location, a reference by its
    /// back-reference. References without a resolved declaration cannot
    /// be keyed and register nowhere.
    fn declaration_offset(&self, ident: &IdentifierNode, is_declaration: bool) -> Option<u32> {
        if is_declaration {
            Some(ident.span.start)
        } else {
            ident.declaration.as_ref().map(|decl| decl.start)
        }
    }

    fn detect_call(&mut self, callee: &IdentifierNode) {
        if self.ctx.builtins.contains(&callee.name) {
            return;
        }
        let target = self.ctx.script_scopes.get(&callee.name).cloned();
        self.out.calls.push(ScriptCall {
            from_scope: self.scope.id.clone(),
            name: callee.name.clone(),
            is_resolved: target.is_some(),
            target_scope: target,
            file: self.file.to_string(),
            span: callee.span,
        });
    }

    /// Implicit instance-variable detection, object-event scopes only: an
    /// assignment to a bare identifier that is reference-classified, not
    /// global, has no resolved declaration, and is not a built-in is
    /// treated as declaring an instance variable. This is the one place
    /// the analyzer infers a declaration instead of reading a tag.
    fn detect_implicit_instance(&mut self, target: &IdentifierNode) {
        if self.scope.kind != ScopeKind::ObjectEvent {
            return;
        }
        if !target.roles.contains(IdentRoles::REFERENCE)
            || Self::is_global(target)
            || target.declaration.is_some()
            || self.ctx.builtins.contains(&target.name)
        {
            return;
        }

        let mut occurrence = self.occurrence(target, false);
        occurrence.roles |= IdentRoles::DECLARATION | IdentRoles::INSTANCE;
        self.out.declarations.push(occurrence.clone());
        self.out.events.push(CollectionEvent::Instance {
            scope: self.scope.id.clone(),
            name: target.name.clone(),
            resource_path: self.scope.resource_path.clone(),
            occurrence,
            is_declaration: true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::DeclarationSite;
    use crate::types::Span;

    fn script_scope(name: &str) -> ScopeDescriptor {
        ScopeDescriptor {
            id: ScopeId::script(name),
            kind: ScopeKind::Script,
            name: name.to_string(),
            resource_path: Some(format!("scripts/{name}/{name}.yy")),
            event: None,
            source_path: format!("scripts/{name}/{name}.gml"),
        }
    }

    fn event_scope(object: &str, event: &str) -> ScopeDescriptor {
        ScopeDescriptor {
            id: ScopeId::object_event(object, event),
            kind: ScopeKind::ObjectEvent,
            name: format!("{object}:{event}"),
            resource_path: Some(format!("objects/{object}/{object}.yy")),
            event: None,
            source_path: format!("objects/{object}/{event}.gml"),
        }
    }

    fn ident(name: &str, start: u32, roles: IdentRoles) -> IdentifierNode {
        IdentifierNode::new(name, Span::new(start, start + name.len() as u32), roles)
    }

    fn context<'a>(
        builtins: &'a HashSet<String>,
        script_scopes: &'a BTreeMap<String, ScopeId>,
        script_resources: &'a BTreeMap<String, String>,
    ) -> SourceContext<'a> {
        SourceContext {
            builtins,
            script_scopes,
            script_resources,
        }
    }

    #[test]
    fn builtins_only_land_on_the_ignored_list() {
        let builtins: HashSet<String> = ["show_debug_message".to_string()].into();
        let scopes = BTreeMap::new();
        let resources = BTreeMap::new();
        let ctx = context(&builtins, &scopes, &resources);
        let tree = SyntaxTree::new(vec![SyntaxNode::Identifier(ident(
            "show_debug_message",
            0,
            IdentRoles::REFERENCE,
        ))]);

        let analysis = analyze_source(&ctx, "a.gml", &script_scope("scr_a"), &tree);
        assert_eq!(analysis.ignored.len(), 1);
        assert!(analysis.ignored[0].is_builtin);
        assert!(analysis.references.is_empty());
        assert!(analysis.events.is_empty());
    }

    #[test]
    fn call_to_known_script_resolves() {
        let builtins = HashSet::new();
        let mut scopes = BTreeMap::new();
        scopes.insert("scr_b".to_string(), ScopeId::script("scr_b"));
        let resources = BTreeMap::new();
        let ctx = context(&builtins, &scopes, &resources);
        let tree = SyntaxTree::new(vec![SyntaxNode::Call {
            callee: Callee::Name(ident(
                "scr_b",
                4,
                IdentRoles::REFERENCE | IdentRoles::SCRIPT,
            )),
            arguments: vec![],
            span: Span::new(4, 12),
        }]);

        let analysis = analyze_source(&ctx, "a.gml", &script_scope("scr_a"), &tree);
        assert_eq!(analysis.calls.len(), 1);
        let call = &analysis.calls[0];
        assert!(call.is_resolved);
        assert_eq!(call.target_scope, Some(ScopeId::script("scr_b")));
        // The callee identifier is also an ordinary reference occurrence.
        assert_eq!(analysis.references.len(), 1);
        assert!(matches!(
            analysis.events[0],
            CollectionEvent::Script { is_declaration: false, .. }
        ));
    }

    #[test]
    fn call_to_unknown_name_is_retained_unresolved() {
        let builtins = HashSet::new();
        let scopes = BTreeMap::new();
        let resources = BTreeMap::new();
        let ctx = context(&builtins, &scopes, &resources);
        let tree = SyntaxTree::new(vec![SyntaxNode::Call {
            callee: Callee::Name(ident("scr_missing", 0, IdentRoles::REFERENCE)),
            arguments: vec![],
            span: Span::new(0, 13),
        }]);

        let analysis = analyze_source(&ctx, "a.gml", &script_scope("scr_a"), &tree);
        assert_eq!(analysis.calls.len(), 1);
        assert!(!analysis.calls[0].is_resolved);
        assert_eq!(analysis.calls[0].target_scope, None);
    }

    #[test]
    fn builtin_callee_produces_no_call_edge() {
        let builtins: HashSet<String> = ["instance_create".to_string()].into();
        let scopes = BTreeMap::new();
        let resources = BTreeMap::new();
        let ctx = context(&builtins, &scopes, &resources);
        let tree = SyntaxTree::new(vec![SyntaxNode::Call {
            callee: Callee::Name(ident("instance_create", 0, IdentRoles::REFERENCE)),
            arguments: vec![],
            span: Span::new(0, 17),
        }]);

        let analysis = analyze_source(&ctx, "a.gml", &script_scope("scr_a"), &tree);
        assert!(analysis.calls.is_empty());
        assert_eq!(analysis.ignored.len(), 1);
    }

    #[test]
    fn enum_reference_registers_by_declaration_location() {
        let builtins = HashSet::new();
        let scopes = BTreeMap::new();
        let resources = BTreeMap::new();
        let ctx = context(&builtins, &scopes, &resources);

        let enum_name = ident("Color", 5, IdentRoles::DECLARATION | IdentRoles::ENUM);
        let member = ident("Red", 13, IdentRoles::DECLARATION | IdentRoles::ENUM_MEMBER);
        let reference = ident("Color", 40, IdentRoles::REFERENCE | IdentRoles::ENUM)
            .with_declaration(DeclarationSite::new(5, 10));
        let tree = SyntaxTree::new(vec![
            SyntaxNode::EnumDeclaration {
                name: enum_name,
                members: vec![member],
            },
            SyntaxNode::Identifier(reference),
        ]);

        let analysis = analyze_source(&ctx, "a.gml", &script_scope("scr_a"), &tree);
        let enum_events: Vec<_> = analysis
            .events
            .iter()
            .filter_map(|event| match event {
                CollectionEvent::Enum { key, name, is_declaration, .. } => {
                    Some((key.clone(), name.clone(), *is_declaration))
                }
                _ => None,
            })
            .collect();
        assert_eq!(enum_events.len(), 2);
        // Declaration and reference share one identity key.
        assert_eq!(enum_events[0].0, enum_events[1].0);
        assert_eq!(enum_events[0].0, LocationKey::new("a.gml", 5));
        // Both resolve the display name via the pre-pass table.
        assert_eq!(enum_events[0].1.as_deref(), Some("Color"));
        assert_eq!(enum_events[1].1.as_deref(), Some("Color"));

        let member_event = analysis
            .events
            .iter()
            .find_map(|event| match event {
                CollectionEvent::EnumMember { key, enum_key, name, .. } => {
                    Some((key.clone(), enum_key.clone(), name.clone()))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(member_event.0, LocationKey::new("a.gml", 13));
        assert_eq!(member_event.1, Some(LocationKey::new("a.gml", 5)));
        assert_eq!(member_event.2.as_deref(), Some("Red"));
    }

    #[test]
    fn implicit_instance_assignment_in_event_scope() {
        let builtins = HashSet::new();
        let scopes = BTreeMap::new();
        let resources = BTreeMap::new();
        let ctx = context(&builtins, &scopes, &resources);
        let tree = SyntaxTree::new(vec![SyntaxNode::Assignment {
            target: AssignTarget::Name(ident("hp", 0, IdentRoles::REFERENCE)),
            value: None,
        }]);

        let analysis = analyze_source(&ctx, "objects/obj_a/Create_0.gml", &event_scope("obj_a", "Create_0"), &tree);
        // The general pass records a reference, the heuristic adds the
        // inferred declaration.
        assert_eq!(analysis.references.len(), 1);
        assert_eq!(analysis.declarations.len(), 1);
        assert!(analysis.declarations[0].roles.contains(IdentRoles::DECLARATION));
        assert!(analysis
            .events
            .iter()
            .any(|e| matches!(e, CollectionEvent::Instance { is_declaration: true, .. })));
    }

    #[test]
    fn implicit_instance_heuristic_requires_all_four_conditions() {
        let builtins: HashSet<String> = ["speed".to_string()].into();
        let scopes = BTreeMap::new();
        let resources = BTreeMap::new();
        let ctx = context(&builtins, &scopes, &resources);
        let scope = event_scope("obj_a", "Step_0");

        // Global-tagged target: no inference.
        let global_assign = SyntaxTree::new(vec![SyntaxNode::Assignment {
            target: AssignTarget::Name(ident("score", 0, IdentRoles::REFERENCE).global()),
            value: None,
        }]);
        let analysis = analyze_source(&ctx, "f.gml", &scope, &global_assign);
        assert!(!analysis
            .events
            .iter()
            .any(|e| matches!(e, CollectionEvent::Instance { .. })));

        // Resolved declaration (a local): no inference.
        let local_assign = SyntaxTree::new(vec![SyntaxNode::Assignment {
            target: AssignTarget::Name(
                ident("tmp", 0, IdentRoles::REFERENCE)
                    .with_declaration(DeclarationSite::new(0, 3)),
            ),
            value: None,
        }]);
        let analysis = analyze_source(&ctx, "f.gml", &scope, &local_assign);
        assert!(!analysis
            .events
            .iter()
            .any(|e| matches!(e, CollectionEvent::Instance { .. })));

        // Built-in target: no inference.
        let builtin_assign = SyntaxTree::new(vec![SyntaxNode::Assignment {
            target: AssignTarget::Name(ident("speed", 0, IdentRoles::REFERENCE)),
            value: None,
        }]);
        let analysis = analyze_source(&ctx, "f.gml", &scope, &builtin_assign);
        assert!(!analysis
            .events
            .iter()
            .any(|e| matches!(e, CollectionEvent::Instance { .. })));

        // Declaration-classified target (not reference-classified): no inference.
        let decl_assign = SyntaxTree::new(vec![SyntaxNode::Assignment {
            target: AssignTarget::Name(ident("x2", 0, IdentRoles::DECLARATION)),
            value: None,
        }]);
        let analysis = analyze_source(&ctx, "f.gml", &scope, &decl_assign);
        assert!(!analysis
            .events
            .iter()
            .any(|e| matches!(e, CollectionEvent::Instance { .. })));
    }

    #[test]
    fn implicit_instance_never_fires_in_script_scopes() {
        let builtins = HashSet::new();
        let scopes = BTreeMap::new();
        let resources = BTreeMap::new();
        let ctx = context(&builtins, &scopes, &resources);
        let tree = SyntaxTree::new(vec![SyntaxNode::Assignment {
            target: AssignTarget::Name(ident("hp", 0, IdentRoles::REFERENCE)),
            value: None,
        }]);

        let analysis = analyze_source(&ctx, "a.gml", &script_scope("scr_a"), &tree);
        assert!(analysis.declarations.is_empty());
        assert!(!analysis
            .events
            .iter()
            .any(|e| matches!(e, CollectionEvent::Instance { .. })));
    }

    #[test]
    fn global_variable_registration() {
        let builtins = HashSet::new();
        let scopes = BTreeMap::new();
        let resources = BTreeMap::new();
        let ctx = context(&builtins, &scopes, &resources);
        let tree = SyntaxTree::new(vec![
            SyntaxNode::Identifier(
                ident(
                    "score",
                    8,
                    IdentRoles::DECLARATION | IdentRoles::VARIABLE | IdentRoles::GLOBAL,
                ),
            ),
            SyntaxNode::Identifier(ident("score", 30, IdentRoles::REFERENCE).global()),
        ]);

        let analysis = analyze_source(&ctx, "a.gml", &script_scope("scr_a"), &tree);
        let globals: Vec<_> = analysis
            .events
            .iter()
            .filter(|e| matches!(e, CollectionEvent::Global { .. }))
            .collect();
        assert_eq!(globals.len(), 2);
    }
}
