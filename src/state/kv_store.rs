use crate::collection::TrackedMap;
use crate::model::is_under_prefix;
use crate::model::normalize_key;
use crate::model::normalize_prefix;
use crate::model::KeyValueNode;

fn node_key(node: &KeyValueNode) -> String {
    normalize_key(&node.full_key)
}

/// Hierarchical, case-insensitive view over flat `/`-delimited keys
///
/// Subtree queries are delimiter-aware: `apps/my` does not contain
/// `apps/myapp/x`. A trailing `/` on a prefix is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueStore {
    nodes: TrackedMap<KeyValueNode>,
}

impl Default for KeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self {
            nodes: TrackedMap::new(node_key),
        }
    }

    /// Exact match on the full key
    pub fn get_value(
        &self,
        full_key: &str,
    ) -> Option<&KeyValueNode> {
        self.nodes.get(&normalize_key(full_key))
    }

    pub fn contains_key(
        &self,
        full_key: &str,
    ) -> bool {
        self.nodes.contains_key(&normalize_key(full_key))
    }

    /// Direct children: nodes whose parent key equals `prefix`
    pub fn get_children(
        &self,
        prefix: &str,
    ) -> Vec<&KeyValueNode> {
        let prefix = normalize_prefix(prefix);
        self.subtree(&prefix)
            .filter(|node| normalize_key(node.parent_key()) == prefix)
            .collect()
    }

    /// Every descendant of `prefix`, at any depth, in key order
    pub fn get_tree(
        &self,
        prefix: &str,
    ) -> Vec<&KeyValueNode> {
        self.subtree(&normalize_prefix(prefix)).collect()
    }

    pub fn contains_key_starting_with(
        &self,
        prefix: &str,
    ) -> bool {
        self.subtree(&normalize_prefix(prefix)).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValueNode> {
        self.nodes.values()
    }

    pub fn ptr_eq(
        &self,
        other: &Self,
    ) -> bool {
        self.nodes.ptr_eq(&other.nodes)
    }

    pub(crate) fn try_update_all<I>(
        &self,
        nodes: I,
    ) -> Option<Self>
    where
        I: IntoIterator<Item = KeyValueNode>,
    {
        self.nodes.try_update_all(nodes).map(|nodes| Self { nodes })
    }

    /// Drop nodes under `normalized_prefix` for which `evict` returns true
    pub(crate) fn remove_from_tree<F>(
        &self,
        normalized_prefix: &str,
        mut evict: F,
    ) -> Option<Self>
    where
        F: FnMut(&str) -> bool,
    {
        self.nodes
            .remove_where(|key, _| is_under_prefix(key, normalized_prefix) && evict(key))
            .map(|nodes| Self { nodes })
    }

    pub(crate) fn has_node_under(
        &self,
        normalized_prefix: &str,
    ) -> bool {
        self.subtree(normalized_prefix).next().is_some()
    }

    // Keys sharing a string prefix are contiguous in the ordered map, so the
    // scan stops at the first key past the prefix range.
    fn subtree<'a, 'p>(
        &'a self,
        normalized_prefix: &'p str,
    ) -> impl Iterator<Item = &'a KeyValueNode> + 'p
    where
        'a: 'p,
    {
        self.nodes
            .range_from(normalized_prefix)
            .take_while(move |(key, _)| key.starts_with(normalized_prefix))
            .filter(move |(key, _)| is_under_prefix(key, normalized_prefix))
            .map(|(_, node)| node)
    }
}
