use std::sync::Arc;

use crate::model::DependencySet;
use crate::state::ConsulState;

/// Decides which folded snapshots reach the consumer.
///
/// Nothing passes until a snapshot resolves every dependency. That first
/// snapshot always passes; after it, only snapshots produced by a change that
/// still resolve every dependency do.
#[derive(Debug, Clone)]
pub struct DependencyGate {
    deps: DependencySet,
    satisfied: bool,
}

impl DependencyGate {
    pub fn new(deps: DependencySet) -> Self {
        Self { deps, satisfied: false }
    }

    pub fn dependencies(&self) -> &DependencySet {
        &self.deps
    }

    /// True once a snapshot has been let through
    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    pub fn offer(
        &mut self,
        changed: bool,
        state: &Arc<ConsulState>,
    ) -> Option<Arc<ConsulState>> {
        if !state.satisfies_all(&self.deps) {
            return None;
        }

        if !self.satisfied {
            self.satisfied = true;
            return Some(Arc::clone(state));
        }

        changed.then(|| Arc::clone(state))
    }
}
