//! Boundary to the external source-language parser.
//!
//! The indexer consumes the parser as a black box: it hands over source
//! text and gets back an annotated syntax tree whose identifier nodes
//! carry role tags, locations, and declaration back-references. Parse
//! failures abort the build of the file's project (the coordinator owns
//! that policy).

pub mod tree;

pub use tree::{
    AssignTarget, Callee, DeclarationSite, IdentifierNode, SyntaxNode, SyntaxTree,
};

use thiserror::Error;

/// Options passed through to the parser. The indexer always requests
/// locations and identifier roles; the flags exist so other consumers of
/// the same parser can opt out.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub request_locations: bool,
    pub request_identifier_roles: bool,
}

impl ParseOptions {
    pub fn for_indexing() -> Self {
        Self {
            request_locations: true,
            request_identifier_roles: true,
        }
    }
}

#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub offset: Option<u32>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
        }
    }

    pub fn at(message: impl Into<String>, offset: u32) -> Self {
        Self {
            message: message.into(),
            offset: Some(offset),
        }
    }
}

/// The external parser seam.
pub trait ScriptParser: Send + Sync {
    fn parse(&self, source: &str, options: &ParseOptions) -> Result<SyntaxTree, ParseError>;
}
