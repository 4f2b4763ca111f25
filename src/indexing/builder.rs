//! The full build pipeline: scan → manifest analysis → bounded source
//! analysis pool → single-threaded merge → canonical sort.
//!
//! Workers never write to shared records. Each returns its per-file
//! `SourceAnalysis` and the merge step applies them one at a time, so
//! files sharing a scope (object events of one object) and the shared
//! relationship lists see no interleaved writes.

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::fs::{FileSystem, is_not_found};
use crate::index::{
    BuildMetrics, FileRecord, IdentifierOccurrence, ProjectIndex, ScopeRecord,
};
use crate::indexing::builtins::BuiltinRegistry;
use crate::indexing::collections::{CollectionBuilder, CollectionEvent};
use crate::indexing::descriptor::BuildDescriptor;
use crate::indexing::manifest::{ManifestAnalysis, ManifestAnalyzer, ScopeDescriptor};
use crate::indexing::scanner::{DirectoryScanner, ScannedFile};
use crate::indexing::source::{SourceAnalysis, SourceContext, analyze_source};
use crate::parsing::{ParseOptions, ScriptParser};
use crate::types::{IdentRoles, ScopeId, ScopeKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

pub fn build_project_index(
    fs: &Arc<dyn FileSystem>,
    parser: &Arc<dyn ScriptParser>,
    builtins: &BuiltinRegistry,
    settings: &Settings,
    descriptor: &BuildDescriptor,
) -> IndexResult<ProjectIndex> {
    let start = Instant::now();
    let root = &descriptor.project_root;

    let scan = DirectoryScanner::new(Arc::clone(fs)).scan(root)?;
    let manifests = ManifestAnalyzer::new(Arc::clone(fs)).analyze(&scan.manifest_files)?;
    let builtin_set = builtins.load();

    // Pair every source file with its owning scope up front; files no
    // manifest claims get a file-backed scope of their own.
    let tasks: Vec<(ScannedFile, ScopeDescriptor)> = scan
        .source_files
        .iter()
        .map(|file| {
            let scope = manifests
                .scopes_by_source
                .get(&file.relative)
                .cloned()
                .unwrap_or_else(|| file_scope(&file.relative));
            (file.clone(), scope)
        })
        .collect();

    let analyses = run_analysis_pool(fs, parser, settings, &manifests, &builtin_set, &tasks)?;

    let mut index = assemble(descriptor, &scan, manifests, &tasks, analyses);
    let elapsed_ms = start.elapsed().as_millis() as u64;
    index.metrics = Some(BuildMetrics {
        manifest_files: scan.manifest_files.len(),
        source_files: scan.source_files.len(),
        resources: index.resources.len(),
        scopes: index.scopes.len(),
        identifiers: index.identifiers.total_entries(),
        elapsed_ms,
    });
    index.sort_canonical();

    tracing::info!(
        "indexed {} manifests, {} sources, {} identifiers in {}ms",
        scan.manifest_files.len(),
        scan.source_files.len(),
        index.identifiers.total_entries(),
        elapsed_ms
    );
    Ok(index)
}

fn file_scope(relative: &str) -> ScopeDescriptor {
    let stem = relative
        .rsplit('/')
        .next()
        .and_then(|name| name.split('.').next())
        .unwrap_or(relative)
        .to_string();
    ScopeDescriptor {
        id: ScopeId::file(relative),
        kind: ScopeKind::File,
        name: stem,
        resource_path: None,
        event: None,
        source_path: relative.to_string(),
    }
}

/// Bounded worker pool over the source files. Workers pull from a shared
/// channel, accumulate locally, and hand their batch back when the queue
/// drains. A missing file is skipped; a parse failure aborts the build.
fn run_analysis_pool(
    fs: &Arc<dyn FileSystem>,
    parser: &Arc<dyn ScriptParser>,
    settings: &Settings,
    manifests: &ManifestAnalysis,
    builtin_set: &std::collections::HashSet<String>,
    tasks: &[(ScannedFile, ScopeDescriptor)],
) -> IndexResult<Vec<SourceAnalysis>> {
    if tasks.is_empty() {
        return Ok(Vec::new());
    }
    let workers = settings.effective_parallelism().min(tasks.len());

    let (task_tx, task_rx) = crossbeam_channel::bounded::<&(ScannedFile, ScopeDescriptor)>(tasks.len());
    for task in tasks {
        // Queue sized to the task list; send cannot block.
        let _ = task_tx.send(task);
    }
    drop(task_tx);

    let options = ParseOptions::for_indexing();
    let mut batches: Vec<IndexResult<Vec<SourceAnalysis>>> = Vec::new();
    thread::scope(|scope| {
        let mut handles = Vec::new();
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            handles.push(scope.spawn(move || -> IndexResult<Vec<SourceAnalysis>> {
                let ctx = SourceContext {
                    builtins: builtin_set,
                    script_scopes: &manifests.script_scopes,
                    script_resources: &manifests.script_resources,
                };
                let mut local = Vec::new();
                for (file, scope_descriptor) in task_rx {
                    let text = match fs.read_to_string(&file.absolute) {
                        Ok(text) => text,
                        Err(e) if is_not_found(&e) => continue,
                        Err(e) => {
                            return Err(IndexError::FileRead {
                                path: file.absolute.clone(),
                                source: e,
                            });
                        }
                    };
                    let tree = parser.parse(&text, &options).map_err(|e| IndexError::Parse {
                        path: file.absolute.clone(),
                        message: e.to_string(),
                    })?;
                    local.push(analyze_source(&ctx, &file.relative, scope_descriptor, &tree));
                }
                Ok(local)
            }));
        }
        for handle in handles {
            batches.push(handle.join().unwrap_or(Err(IndexError::WorkerPanic)));
        }
    });

    let mut analyses = Vec::new();
    for batch in batches {
        analyses.extend(batch?);
    }
    // Worker interleaving is arbitrary; merge in file order so every run
    // applies analyses identically.
    analyses.sort_by(|a, b| a.file.cmp(&b.file));
    Ok(analyses)
}

fn assemble(
    descriptor: &BuildDescriptor,
    scan: &crate::indexing::scanner::ProjectScan,
    manifests: ManifestAnalysis,
    tasks: &[(ScannedFile, ScopeDescriptor)],
    analyses: Vec<SourceAnalysis>,
) -> ProjectIndex {
    let mut index = ProjectIndex::new(descriptor.project_root.clone());
    index.resources = manifests.resources;
    index.relationships.asset_references = manifests.asset_references;

    // Scopes come from manifests plus the file-backed fallbacks; the
    // files map mirrors the scan exactly.
    let mut scope_records: BTreeMap<ScopeId, ScopeRecord> = BTreeMap::new();
    let mut expected_paths: BTreeMap<ScopeId, String> = BTreeMap::new();
    for scope_descriptor in manifests.scopes_by_source.values() {
        scope_records
            .entry(scope_descriptor.id.clone())
            .or_insert_with(|| scope_record(scope_descriptor));
        expected_paths
            .entry(scope_descriptor.id.clone())
            .or_insert_with(|| scope_descriptor.source_path.clone());
    }
    let scanned: std::collections::BTreeSet<&str> = scan
        .source_files
        .iter()
        .map(|file| file.relative.as_str())
        .collect();
    for (file, scope_descriptor) in tasks {
        let record = scope_records
            .entry(scope_descriptor.id.clone())
            .or_insert_with(|| scope_record(scope_descriptor));
        if !record.files.contains(&file.relative) {
            record.files.push(file.relative.clone());
        }
        index
            .files
            .insert(file.relative.clone(), FileRecord::new(&file.relative, scope_descriptor.id.clone()));
    }
    // A manifest-declared scope whose conventional source file exists on
    // disk but was claimed by another descriptor first still lists only
    // real files.
    for scope_descriptor in manifests.scopes_by_source.values() {
        if scanned.contains(scope_descriptor.source_path.as_str()) {
            if let Some(record) = scope_records.get_mut(&scope_descriptor.id) {
                if !record.files.contains(&scope_descriptor.source_path) {
                    record.files.push(scope_descriptor.source_path.clone());
                }
            }
        }
    }

    let mut collections = CollectionBuilder::new();
    for analysis in analyses {
        if let Some(file_record) = index.files.get_mut(&analysis.file) {
            file_record.declarations.extend(analysis.declarations.iter().cloned());
            file_record.references.extend(analysis.references.iter().cloned());
            file_record.ignored.extend(analysis.ignored.iter().cloned());
            file_record.calls.extend(analysis.calls.iter().cloned());
        }
        if let Some(scope_record) = index
            .files
            .get(&analysis.file)
            .map(|f| f.scope.clone())
            .and_then(|scope| scope_records.get_mut(&scope))
        {
            scope_record.declarations.extend(analysis.declarations);
            scope_record.references.extend(analysis.references);
            scope_record.ignored.extend(analysis.ignored);
            scope_record.calls.extend(analysis.calls.iter().cloned());
        }
        index.relationships.script_calls.extend(analysis.calls);
        for event in analysis.events {
            collections.apply(event);
        }
    }

    // Every script scope carries a synthetic declaration of its own name,
    // so the script exists as a "script" identifier even when its body
    // never spells it.
    for record in scope_records.values_mut() {
        if record.kind != ScopeKind::Script {
            continue;
        }
        let file = record
            .files
            .first()
            .or_else(|| expected_paths.get(&record.id))
            .cloned()
            .unwrap_or_default();
        let occurrence = IdentifierOccurrence {
            name: record.name.clone(),
            span: None,
            file,
            scope: record.id.clone(),
            roles: IdentRoles::DECLARATION | IdentRoles::SCRIPT,
            declaration: None,
            is_builtin: false,
            synthetic: true,
        };
        record.declarations.push(occurrence.clone());
        collections.apply(CollectionEvent::Script {
            scope: record.id.clone(),
            name: record.name.clone(),
            resource_path: record.resource_path.clone(),
            occurrence,
            is_declaration: true,
        });
    }

    index.scopes = scope_records;
    index.identifiers = collections.finish();
    index
}

fn scope_record(descriptor: &ScopeDescriptor) -> ScopeRecord {
    let mut record = ScopeRecord::new(descriptor.id.clone(), descriptor.kind, descriptor.name.clone());
    record.resource_path = descriptor.resource_path.clone();
    record.event = descriptor.event;
    record
}
