//! Build coordination: cache-then-build-then-persist, with concurrent
//! requests for the same project root collapsed into one in-flight build.

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::fs::FileSystem;
use crate::index::ProjectIndex;
use crate::indexing::builder::build_project_index;
use crate::indexing::builtins::BuiltinRegistry;
use crate::indexing::descriptor::BuildDescriptor;
use crate::parsing::ScriptParser;
use crate::storage::cache::{CacheStore, LoadOutcome, SaveOutcome, SkipReason};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Cache,
    Build,
}

/// What `ensure_ready` hands back: where the index came from, the index
/// itself, and (for fresh builds) how persisting it went. A failed
/// cache write never fails the call; it only shows up here.
#[derive(Debug, Clone)]
pub struct EnsureReady {
    pub source: IndexSource,
    pub index: Arc<ProjectIndex>,
    pub save: Option<SaveOutcome>,
}

type SharedOutcome = Result<EnsureReady, Arc<IndexError>>;

/// One pending build; waiters block on the condvar until the builder
/// publishes the shared outcome.
struct InFlight {
    done: Mutex<Option<SharedOutcome>>,
    cond: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            done: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    fn publish(&self, outcome: SharedOutcome) {
        *self.done.lock() = Some(outcome);
        self.cond.notify_all();
    }

    fn wait(&self) -> SharedOutcome {
        let mut guard = self.done.lock();
        while guard.is_none() {
            self.cond.wait(&mut guard);
        }
        guard.clone().expect("outcome published")
    }
}

pub struct BuildCoordinator {
    fs: Arc<dyn FileSystem>,
    parser: Arc<dyn ScriptParser>,
    builtins: BuiltinRegistry,
    settings: Arc<Settings>,
    cache: CacheStore,
    in_flight: Mutex<HashMap<PathBuf, Arc<InFlight>>>,
    disposed: AtomicBool,
}

impl BuildCoordinator {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        parser: Arc<dyn ScriptParser>,
        settings: Arc<Settings>,
    ) -> Self {
        let builtins = BuiltinRegistry::new(
            Arc::clone(&fs),
            settings.indexing.builtins_path.clone(),
        );
        let cache = CacheStore::new(Arc::clone(&fs), &settings.cache);
        Self {
            fs,
            parser,
            builtins,
            settings,
            cache,
            in_flight: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Return a ready ProjectIndex for `descriptor`, from cache when the
    /// fingerprints still match, otherwise from a fresh build. Concurrent
    /// callers for the same root share a single underlying build.
    pub fn ensure_ready(&self, descriptor: &BuildDescriptor) -> IndexResult<EnsureReady> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(IndexError::Disposed);
        }

        let root = descriptor.project_root.clone();
        let (slot, is_builder) = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&root) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot = Arc::new(InFlight::new());
                    in_flight.insert(root.clone(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if !is_builder {
            return slot.wait().map_err(IndexError::Shared);
        }

        let outcome = self
            .perform(descriptor)
            .map_err(IndexError::into_shared);
        slot.publish(outcome.clone());
        self.in_flight.lock().remove(&root);
        outcome.map_err(IndexError::Shared)
    }

    fn perform(&self, descriptor: &BuildDescriptor) -> IndexResult<EnsureReady> {
        if self.settings.cache.enabled {
            if let LoadOutcome::Hit(payload) = self.cache.load(descriptor)? {
                tracing::debug!("cache hit for {}", descriptor.project_root.display());
                return Ok(EnsureReady {
                    source: IndexSource::Cache,
                    index: Arc::new(payload.project_index),
                    save: None,
                });
            }
        }

        let index = build_project_index(
            &self.fs,
            &self.parser,
            &self.builtins,
            &self.settings,
            descriptor,
        )?;

        let save = if self.settings.cache.enabled {
            match self.cache.save(descriptor, &index) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::warn!("cache write failed: {e}");
                    Some(SaveOutcome::Failed {
                        message: e.to_string(),
                    })
                }
            }
        } else {
            Some(SaveOutcome::Skipped {
                reason: SkipReason::CacheDisabled,
            })
        };

        Ok(EnsureReady {
            source: IndexSource::Build,
            index: Arc::new(index),
            save,
        })
    }

    /// Access to the injected built-in registry (for host-driven refresh).
    pub fn builtins(&self) -> &BuiltinRegistry {
        &self.builtins
    }

    /// Fail all future `ensure_ready` calls fast. Builds already in
    /// flight run to completion.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}
