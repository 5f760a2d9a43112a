use std::collections::HashSet;
use std::sync::Arc;

use super::KeyValueStore;
use crate::collection::TrackedMap;
use crate::model::is_under_prefix;
use crate::model::normalize_key;
use crate::model::normalize_prefix;
use crate::model::DependencySet;
use crate::model::KeyValueNode;
use crate::model::Observation;
use crate::model::Service;
use crate::model::KEY_DELIMITER;

fn service_key(service: &Service) -> String {
    normalize_key(&service.name)
}

fn prefix_key(prefix: &String) -> String {
    normalize_prefix(prefix)
}

fn resolved_key(key: &String) -> String {
    normalize_key(key)
}

/// Immutable snapshot of every service and KV node observed so far
///
/// Update operations never mutate in place: they return `(changed, snapshot)`
/// where `snapshot` is the very same `Arc` when nothing changed. A published
/// snapshot can therefore be shared with any number of readers.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsulState {
    services: TrackedMap<Service>,
    kv_store: KeyValueStore,
    missing_key_prefixes: TrackedMap<String>,
    // Keys answered by their own watch, present or not. Kept apart from the
    // KV store so a not-found key never shows up as a child of a prefix.
    resolved_keys: TrackedMap<String>,
}

impl Default for ConsulState {
    fn default() -> Self {
        Self {
            services: TrackedMap::new(service_key),
            kv_store: KeyValueStore::new(),
            missing_key_prefixes: TrackedMap::new(prefix_key),
            resolved_keys: TrackedMap::new(resolved_key),
        }
    }
}

impl ConsulState {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn service(
        &self,
        name: &str,
    ) -> Option<&Service> {
        self.services.get(&normalize_key(name))
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn kv_store(&self) -> &KeyValueStore {
        &self.kv_store
    }

    pub fn missing_key_prefixes(&self) -> impl Iterator<Item = &str> {
        self.missing_key_prefixes.values().map(String::as_str)
    }

    /// Whether `prefix` is in the missing set.
    ///
    /// The entry is advisory: a prefix may still be listed here after children
    /// arrived through another watch; [`ConsulState::satisfies_all`] checks both.
    pub fn is_key_prefix_missing(
        &self,
        prefix: &str,
    ) -> bool {
        self.missing_key_prefixes.contains_key(&normalize_prefix(prefix))
    }

    pub fn update_service(
        self: &Arc<Self>,
        service: Service,
    ) -> (bool, Arc<Self>) {
        match self.services.try_update(service) {
            Some(services) => (
                true,
                Arc::new(Self {
                    services,
                    kv_store: self.kv_store.clone(),
                    missing_key_prefixes: self.missing_key_prefixes.clone(),
                    resolved_keys: self.resolved_keys.clone(),
                }),
            ),
            None => (false, Arc::clone(self)),
        }
    }

    pub fn update_kv_node(
        self: &Arc<Self>,
        node: KeyValueNode,
    ) -> (bool, Arc<Self>) {
        self.update_kv_nodes(vec![node])
    }

    /// Changed if any node in the batch is new or differs from the stored one
    pub fn update_kv_nodes(
        self: &Arc<Self>,
        nodes: Vec<KeyValueNode>,
    ) -> (bool, Arc<Self>) {
        let kv_store = self.kv_store.try_update_all(nodes);
        self.with_kv_store(kv_store)
    }

    /// Fold a full recursive listing of `prefix`.
    ///
    /// Stores every listed node under the prefix and evicts nodes under the
    /// prefix the listing no longer contains. Listed keys outside the prefix
    /// subtree are ignored. An empty listing marks the prefix as missing.
    pub fn update_kv_tree(
        self: &Arc<Self>,
        prefix: &str,
        nodes: Vec<KeyValueNode>,
    ) -> (bool, Arc<Self>) {
        let normalized = normalize_prefix(prefix);
        let nodes: Vec<KeyValueNode> = nodes
            .into_iter()
            .filter(|node| is_under_prefix(&normalize_key(&node.full_key), &normalized))
            .collect();

        if nodes.is_empty() {
            return self.mark_key_prefix_as_missing_or_empty(prefix);
        }

        let listed: HashSet<String> = nodes.iter().map(|node| normalize_key(&node.full_key)).collect();
        let updated = self.kv_store.try_update_all(nodes);
        let base = updated.as_ref().unwrap_or(&self.kv_store);
        let pruned = base.remove_from_tree(&normalized, |key| !listed.contains(key));

        self.with_kv_store(pruned.or(updated))
    }

    /// Record that `prefix` has no children and evict whatever was stored under it.
    ///
    /// Changed iff the prefix was not marked yet or nodes were removed.
    pub fn mark_key_prefix_as_missing_or_empty(
        self: &Arc<Self>,
        prefix: &str,
    ) -> (bool, Arc<Self>) {
        let normalized = normalize_prefix(prefix);

        let kv_store = self.kv_store.remove_from_tree(&normalized, |_| true);
        let missing_key_prefixes = if self.missing_key_prefixes.contains_key(&normalized) {
            None
        } else {
            self.missing_key_prefixes
                .try_update(prefix.trim_end_matches(KEY_DELIMITER).to_string())
        };

        if kv_store.is_none() && missing_key_prefixes.is_none() {
            return (false, Arc::clone(self));
        }

        (
            true,
            Arc::new(Self {
                services: self.services.clone(),
                kv_store: kv_store.unwrap_or_else(|| self.kv_store.clone()),
                missing_key_prefixes: missing_key_prefixes.unwrap_or_else(|| self.missing_key_prefixes.clone()),
                resolved_keys: self.resolved_keys.clone(),
            }),
        )
    }

    /// Fold the answer of a single-key watch.
    ///
    /// A present value is stored like [`ConsulState::update_kv_node`]. An
    /// absent one removes any stored node for the key instead of storing a
    /// placeholder. Either way the key counts as resolved from now on.
    pub fn update_key(
        self: &Arc<Self>,
        key: &str,
        value: Option<KeyValueNode>,
    ) -> (bool, Arc<Self>) {
        let normalized = normalize_key(key);
        let resolved_keys = if self.resolved_keys.contains_key(&normalized) {
            None
        } else {
            self.resolved_keys.try_update(key.to_string())
        };

        let kv_store = match value {
            Some(node) => self.kv_store.try_update_all([node]),
            None => self.kv_store.remove_from_tree(&normalized, |stored| stored == normalized),
        };

        if resolved_keys.is_none() && kv_store.is_none() {
            return (false, Arc::clone(self));
        }

        let (_, next) = self.with_kv_store(kv_store);
        match resolved_keys {
            Some(resolved_keys) => (true, Arc::new(Self { resolved_keys, ..(*next).clone() })),
            None => (true, next),
        }
    }

    /// Fold one observation into the snapshot
    pub fn apply(
        self: &Arc<Self>,
        observation: &Observation,
    ) -> (bool, Arc<Self>) {
        match observation {
            Observation::Service(o) => self.update_service(o.to_service()),
            Observation::Key(o) => self.update_key(&o.key, o.value.clone()),
            Observation::KeyRecursive(o) => self.update_kv_tree(&o.key_prefix, o.nodes.clone()),
        }
    }

    /// True once every dependency has been resolved at least once.
    ///
    /// A key stays resolved after its watch answered even if a prefix listing
    /// later evicted its node.
    pub fn satisfies_all(
        &self,
        deps: &DependencySet,
    ) -> bool {
        deps.services().all(|name| self.services.contains_key(&normalize_key(name)))
            && deps
                .keys()
                .all(|key| self.resolved_keys.contains_key(&normalize_key(key)) || self.kv_store.contains_key(key))
            && deps
                .key_prefixes()
                .all(|prefix| self.kv_store.contains_key_starting_with(prefix) || self.is_key_prefix_missing(prefix))
    }

    // Installs a changed KV store and drops missing-prefix entries that now
    // have children.
    fn with_kv_store(
        self: &Arc<Self>,
        kv_store: Option<KeyValueStore>,
    ) -> (bool, Arc<Self>) {
        let Some(kv_store) = kv_store else {
            return (false, Arc::clone(self));
        };

        let missing_key_prefixes = self
            .missing_key_prefixes
            .remove_where(|prefix, _| kv_store.has_node_under(prefix))
            .unwrap_or_else(|| self.missing_key_prefixes.clone());

        (
            true,
            Arc::new(Self {
                services: self.services.clone(),
                kv_store,
                missing_key_prefixes,
                resolved_keys: self.resolved_keys.clone(),
            }),
        )
    }
}
