//! Annotated syntax-tree node types.
//!
//! A closed tagged-variant shape instead of a duck-typed tree: the
//! analyzer only ever needs identifiers, calls, assignments, and enum
//! declarations, so those are the only structural variants; everything
//! else arrives as an opaque `Block` of children.

use crate::types::{IdentRoles, Span};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    pub fn new(nodes: Vec<SyntaxNode>) -> Self {
        Self { nodes }
    }
}

/// One identifier occurrence as annotated by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierNode {
    pub name: String,
    pub span: Span,
    pub roles: IdentRoles,
    /// Back-reference to the resolved declaration site, when the parser
    /// could resolve one.
    pub declaration: Option<DeclarationSite>,
    pub is_global: bool,
}

impl IdentifierNode {
    pub fn new(name: impl Into<String>, span: Span, roles: IdentRoles) -> Self {
        Self {
            name: name.into(),
            span,
            roles,
            declaration: None,
            is_global: false,
        }
    }

    pub fn with_declaration(mut self, declaration: DeclarationSite) -> Self {
        self.declaration = Some(declaration);
        self
    }

    pub fn global(mut self) -> Self {
        self.is_global = true;
        self
    }
}

/// Location of a declaration a reference points back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationSite {
    pub start: u32,
    pub end: u32,
    /// Scope the declaration lives in, when the parser knows it.
    pub scope: Option<String>,
}

impl DeclarationSite {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            scope: None,
        }
    }
}

/// Callee of a call expression. Only bare-identifier callees participate
/// in script-call detection; anything else is walked for identifiers and
/// otherwise ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    Name(IdentifierNode),
    Expression(Box<SyntaxNode>),
}

/// Assignment target. Bare-identifier targets feed the implicit
/// instance-variable heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AssignTarget {
    Name(IdentifierNode),
    Expression(Box<SyntaxNode>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyntaxNode {
    Identifier(IdentifierNode),
    Call {
        callee: Callee,
        arguments: Vec<SyntaxNode>,
        span: Span,
    },
    Assignment {
        target: AssignTarget,
        value: Option<Box<SyntaxNode>>,
    },
    EnumDeclaration {
        name: IdentifierNode,
        members: Vec<IdentifierNode>,
    },
    Block(Vec<SyntaxNode>),
}
