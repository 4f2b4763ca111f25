//! Built-in identifier registry.
//!
//! Loads the set of names belonging to the language's standard library so
//! they can be excluded from the project's identifier space. The set is
//! memoized against the backing data file's own mtime: every `load`
//! re-stats the file and only reparses when the stamp moved. Built-in
//! filtering is best-effort, so every failure path degrades to an empty
//! set instead of propagating.
//!
//! An explicit object with its own lifecycle, injected into the build;
//! there is no process-global slot to leak across tests.

use crate::fs::FileSystem;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

struct CachedBuiltins {
    mtime_ms: f64,
    names: Arc<HashSet<String>>,
}

pub struct BuiltinRegistry {
    fs: Arc<dyn FileSystem>,
    data_path: Option<PathBuf>,
    state: Mutex<Option<CachedBuiltins>>,
}

impl BuiltinRegistry {
    pub fn new(fs: Arc<dyn FileSystem>, data_path: Option<PathBuf>) -> Self {
        Self {
            fs,
            data_path,
            state: Mutex::new(None),
        }
    }

    /// Current built-in name set. Never fails; a missing or unreadable
    /// data file means "no built-ins".
    pub fn load(&self) -> Arc<HashSet<String>> {
        let Some(path) = &self.data_path else {
            return Arc::new(HashSet::new());
        };

        let stat = match self.fs.stat(path) {
            Ok(stat) => stat,
            Err(e) => {
                tracing::debug!("builtins data file unavailable ({e}), using empty set");
                return Arc::new(HashSet::new());
            }
        };

        let mut state = self.state.lock();
        if let Some(cached) = state.as_ref() {
            if cached.mtime_ms == stat.mtime_ms {
                return Arc::clone(&cached.names);
            }
            tracing::debug!("builtins data file changed, reloading");
        }

        let names = match self.fs.read_to_string(path) {
            Ok(text) => Arc::new(parse_builtins(&text)),
            Err(e) => {
                tracing::warn!("failed to read builtins data file {}: {e}", path.display());
                Arc::new(HashSet::new())
            }
        };
        *state = Some(CachedBuiltins {
            mtime_ms: stat.mtime_ms,
            names: Arc::clone(&names),
        });
        names
    }

    /// Drop the memoized set; the next `load` reads fresh.
    pub fn refresh(&self) {
        *self.state.lock() = None;
    }
}

/// One identifier per line; blank lines are skipped.
fn parse_builtins(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
