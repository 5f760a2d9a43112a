use std::collections::BTreeMap;

use super::kv::normalize_key;
use super::WatchItem;

/// Services, keys and key prefixes a consumer needs before its view is complete
///
/// Built once per watch session. Entries are deduplicated case-insensitively;
/// the first spelling seen is the one that gets watched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    services: BTreeMap<String, String>,
    keys: BTreeMap<String, String>,
    key_prefixes: BTreeMap<String, String>,
}

fn insert_once(
    set: &mut BTreeMap<String, String>,
    value: String,
) {
    set.entry(normalize_key(&value)).or_insert(value);
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        insert_once(&mut self.services, name.into());
        self
    }

    pub fn with_services<I, S>(
        self,
        names: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().fold(self, |deps, name| deps.with_service(name))
    }

    pub fn with_key(
        mut self,
        key: impl Into<String>,
    ) -> Self {
        insert_once(&mut self.keys, key.into());
        self
    }

    pub fn with_keys<I, S>(
        self,
        keys: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        keys.into_iter().fold(self, |deps, key| deps.with_key(key))
    }

    pub fn with_key_prefix(
        mut self,
        prefix: impl Into<String>,
    ) -> Self {
        insert_once(&mut self.key_prefixes, prefix.into());
        self
    }

    pub fn with_key_prefixes<I, S>(
        self,
        prefixes: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        prefixes.into_iter().fold(self, |deps, prefix| deps.with_key_prefix(prefix))
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.values().map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.values().map(String::as_str)
    }

    pub fn key_prefixes(&self) -> impl Iterator<Item = &str> {
        self.key_prefixes.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services.len() + self.keys.len() + self.key_prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One watch item per dependency: services first, then keys, then prefixes
    pub fn watch_items(&self) -> Vec<WatchItem> {
        self.services()
            .map(|s| WatchItem::Service(s.to_string()))
            .chain(self.keys().map(|k| WatchItem::Key(k.to_string())))
            .chain(self.key_prefixes().map(|p| WatchItem::KeyPrefix(p.to_string())))
            .collect()
    }
}
