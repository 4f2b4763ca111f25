pub mod builder;
pub mod builtins;
pub mod collections;
pub mod coordinator;
pub mod descriptor;
pub mod manifest;
pub mod scanner;
pub mod source;

pub use builder::build_project_index;
pub use builtins::BuiltinRegistry;
pub use collections::{CollectionBuilder, CollectionEvent};
pub use coordinator::{BuildCoordinator, EnsureReady, IndexSource};
pub use descriptor::{BuildDescriptor, Fingerprints};
pub use manifest::{ManifestAnalysis, ManifestAnalyzer, ScopeDescriptor};
pub use scanner::{DirectoryScanner, ProjectScan, ScannedFile};
pub use source::{SourceAnalysis, SourceContext, analyze_source};
