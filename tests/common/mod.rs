//! Shared fixtures: an on-disk project builder and a stub parser.
//!
//! The real parser is an external collaborator; tests register the
//! annotated tree they want returned for each source text, which keeps
//! scenarios deterministic and focused on indexing semantics.
#![allow(dead_code)]

use gmindex::config::Settings;
use gmindex::fs::OsFileSystem;
use gmindex::indexing::{BuildCoordinator, BuildDescriptor, Fingerprints};
use gmindex::parsing::{
    Callee, IdentifierNode, ParseError, ParseOptions, ScriptParser, SyntaxNode, SyntaxTree,
};
use gmindex::types::{IdentRoles, Span};
use gmindex::FileSystem;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Parser double: returns pre-registered trees keyed by exact source
/// text, counts invocations, and can be made to fail on demand.
pub struct StubParser {
    trees: HashMap<String, SyntaxTree>,
    fail_on: Option<String>,
    delay: Option<std::time::Duration>,
    parse_count: AtomicUsize,
}

impl StubParser {
    pub fn new(trees: HashMap<String, SyntaxTree>) -> Self {
        Self {
            trees,
            fail_on: None,
            delay: None,
            parse_count: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, source: impl Into<String>) -> Self {
        self.fail_on = Some(source.into());
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn parse_count(&self) -> usize {
        self.parse_count.load(Ordering::SeqCst)
    }
}

impl ScriptParser for StubParser {
    fn parse(&self, source: &str, _options: &ParseOptions) -> Result<SyntaxTree, ParseError> {
        self.parse_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_on.as_deref() == Some(source) {
            return Err(ParseError::at("unexpected token", 0));
        }
        Ok(self.trees.get(source).cloned().unwrap_or_default())
    }
}

pub fn ident(name: &str, start: u32, roles: IdentRoles) -> IdentifierNode {
    IdentifierNode::new(name, Span::new(start, start + name.len() as u32), roles)
}

/// A call expression with a bare-identifier callee, as the parser tags it.
pub fn script_call(name: &str, start: u32) -> SyntaxNode {
    SyntaxNode::Call {
        callee: Callee::Name(ident(
            name,
            start,
            IdentRoles::REFERENCE | IdentRoles::SCRIPT,
        )),
        arguments: vec![],
        span: Span::new(start, start + name.len() as u32 + 2),
    }
}

pub struct EventSpec {
    pub name: &'static str,
    pub event_type: i64,
    pub event_num: i64,
    pub body: String,
    pub tree: SyntaxTree,
}

/// Builds a GameMaker-style project tree in a TempDir and accumulates
/// the stub parser's tree registrations.
pub struct ProjectFixture {
    pub dir: TempDir,
    trees: HashMap<String, SyntaxTree>,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create fixture dir"),
            trees: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, relative: &str, contents: &str) {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    /// A script resource: manifest plus conventional source file.
    pub fn add_script(&mut self, name: &str, body: &str, tree: SyntaxTree) {
        let manifest = json!({ "resourceType": "GMScript", "name": name });
        self.write_file(
            &format!("scripts/{name}/{name}.yy"),
            &serde_json::to_string_pretty(&manifest).unwrap(),
        );
        self.write_file(&format!("scripts/{name}/{name}.gml"), body);
        self.trees.insert(body.to_string(), tree);
    }

    /// An object resource with one source file per event.
    pub fn add_object(&mut self, name: &str, events: Vec<EventSpec>) {
        let event_list: Vec<_> = events
            .iter()
            .map(|event| {
                json!({
                    "name": event.name,
                    "eventType": event.event_type,
                    "eventNum": event.event_num,
                })
            })
            .collect();
        let manifest = json!({
            "resourceType": "GMObject",
            "name": name,
            "eventList": event_list,
        });
        self.write_file(
            &format!("objects/{name}/{name}.yy"),
            &serde_json::to_string_pretty(&manifest).unwrap(),
        );
        for event in events {
            self.write_file(&format!("objects/{name}/{}.gml", event.name), &event.body);
            self.trees.insert(event.body, event.tree);
        }
    }

    pub fn parser(&self) -> StubParser {
        StubParser::new(self.trees.clone())
    }

    pub fn fingerprints(&self) -> Fingerprints {
        let fs: Arc<dyn FileSystem> = Arc::new(OsFileSystem::new());
        Fingerprints::collect(&fs, self.root()).expect("collect fingerprints")
    }

    pub fn descriptor(&self) -> BuildDescriptor {
        BuildDescriptor::new(self.root().to_path_buf(), self.fingerprints())
            .with_versions("3.3.0", "0.3.2")
    }
}

pub fn settings_with(builtins_path: Option<PathBuf>, cache_enabled: bool) -> Settings {
    let mut settings = Settings::default();
    settings.indexing.builtins_path = builtins_path;
    settings.cache.enabled = cache_enabled;
    settings
}

pub fn coordinator(parser: Arc<StubParser>, settings: Settings) -> BuildCoordinator {
    BuildCoordinator::new(Arc::new(OsFileSystem::new()), parser, Arc::new(settings))
}
