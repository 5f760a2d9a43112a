//! Last-known-good fallback for configuration consumers
//!
//! Persisting the cache is left to the implementor; this crate only defines
//! the seam and the fallback rule: a backend failure falls back to the cached
//! values, anything else is returned as is.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::warn;

use crate::model::DependencySet;
use crate::state::ConsulState;
use crate::ConsulObserver;
use crate::Result;

pub type FlatValues = BTreeMap<String, String>;

pub trait EmergencyCache: Send + Sync {
    fn save(
        &self,
        values: &FlatValues,
    ) -> Result<()>;

    /// `None` when nothing was ever saved or the saved copy is unusable
    fn try_load(&self) -> Option<FlatValues>;
}

/// Process-local cache, mostly useful in tests
#[derive(Debug, Default)]
pub struct MemoryEmergencyCache {
    values: RwLock<Option<FlatValues>>,
}

impl MemoryEmergencyCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EmergencyCache for MemoryEmergencyCache {
    fn save(
        &self,
        values: &FlatValues,
    ) -> Result<()> {
        *self.values.write() = Some(values.clone());
        Ok(())
    }

    fn try_load(&self) -> Option<FlatValues> {
        self.values.read().clone()
    }
}

/// Resolve `deps` once and project the snapshot with `project`.
///
/// A successful projection refreshes `cache`. When the backend cannot be used
/// the cached values are returned instead, if there are any.
pub async fn resolve_with_fallback<F>(
    observer: &ConsulObserver,
    deps: DependencySet,
    cache: &dyn EmergencyCache,
    project: F,
) -> Result<FlatValues>
where
    F: FnOnce(&ConsulState) -> FlatValues,
{
    match observer.get_dependencies(deps).await {
        Ok(state) => {
            let values = project(&state);
            if let Err(e) = cache.save(&values) {
                warn!(error = %e, "failed to refresh emergency cache");
            }
            Ok(values)
        }
        Err(e) if e.is_backend_failure() => match cache.try_load() {
            Some(values) => {
                warn!(error = %e, "backend unavailable, using emergency cache");
                Ok(values)
            }
            None => Err(e),
        },
        Err(e) => Err(e),
    }
}
