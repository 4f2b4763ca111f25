//! Semantic project indexing for GameMaker-style scripting projects.
//!
//! Given a project root containing resource manifests (`.yyp`, `.yy`)
//! and script sources (`.gml`), gmindex produces a queryable
//! [`ProjectIndex`]: every resource, lexical scope, per-file
//! declaration/reference, cross-script call edge, and cross-resource
//! asset reference, partitioned into six typed identifier collections.
//! A cache store persists the index keyed by content fingerprints, and
//! the [`BuildCoordinator`] collapses concurrent requests for the same
//! root into one in-flight build.

pub mod config;
pub mod error;
pub mod fs;
pub mod index;
pub mod indexing;
pub mod logging;
pub mod parsing;
pub mod storage;
pub mod types;

pub use config::Settings;
pub use error::{IndexError, IndexResult};
pub use fs::{FileSystem, OsFileSystem};
pub use index::{IdentifierCollections, IdentifierOccurrence, ProjectIndex};
pub use indexing::{
    BuildCoordinator, BuildDescriptor, BuiltinRegistry, EnsureReady, Fingerprints, IndexSource,
    build_project_index,
};
pub use parsing::{ParseError, ParseOptions, ScriptParser, SyntaxTree};
pub use storage::{CachePayload, CacheStore, LoadOutcome, MissReason, SaveOutcome};
pub use types::{IdentRoles, IdentifierId, LocationKey, ResourceKind, ScopeId, ScopeKind, Span};
