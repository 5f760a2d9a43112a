use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

/// Extracts the map key from a stored value
pub type KeySelector<T> = fn(&T) -> String;

/// Immutable keyed map with structural update detection
///
/// Every update returns `Some(new_map)` when at least one entry changed and
/// `None` for a no-op, leaving `self` untouched. Unchanged maps share storage,
/// so cloning is an `Arc` bump.
pub struct TrackedMap<T> {
    entries: Arc<BTreeMap<String, T>>,
    key_selector: KeySelector<T>,
}

impl<T> Clone for TrackedMap<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            key_selector: self.key_selector,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TrackedMap<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<T: PartialEq> PartialEq for TrackedMap<T> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.entries == other.entries
    }
}

impl<T> TrackedMap<T> {
    pub fn new(key_selector: KeySelector<T>) -> Self {
        Self {
            entries: Arc::new(BTreeMap::new()),
            key_selector,
        }
    }

    pub fn key_of(
        &self,
        value: &T,
    ) -> String {
        (self.key_selector)(value)
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn contains_key(
        &self,
        key: &str,
    ) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Entries whose key sorts at or after `start`, in key order
    pub fn range_from<'a>(
        &'a self,
        start: &str,
    ) -> impl Iterator<Item = (&'a str, &'a T)> {
        self.entries
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// True when both maps share the same storage
    pub fn ptr_eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<T: Clone + PartialEq> TrackedMap<T> {
    /// Insert or replace one value; `None` when an equal value is already stored
    pub fn try_update(
        &self,
        value: T,
    ) -> Option<Self> {
        self.try_update_all(std::iter::once(value))
    }

    /// Insert or replace every value; `None` when none of them differ
    ///
    /// Later values win over earlier ones with the same key.
    pub fn try_update_all<I>(
        &self,
        values: I,
    ) -> Option<Self>
    where
        I: IntoIterator<Item = T>,
    {
        let mut next: Option<BTreeMap<String, T>> = None;

        for value in values {
            let key = (self.key_selector)(&value);
            let unchanged = next.as_ref().unwrap_or(&*self.entries).get(&key) == Some(&value);
            if unchanged {
                continue;
            }
            next.get_or_insert_with(|| (*self.entries).clone()).insert(key, value);
        }

        next.map(|entries| Self {
            entries: Arc::new(entries),
            key_selector: self.key_selector,
        })
    }

    /// Drop every entry matching `predicate`; `None` when nothing matched
    pub fn remove_where<F>(
        &self,
        mut predicate: F,
    ) -> Option<Self>
    where
        F: FnMut(&str, &T) -> bool,
    {
        if !self.entries.iter().any(|(k, v)| predicate(k.as_str(), v)) {
            return None;
        }

        let entries = self
            .entries
            .iter()
            .filter(|(k, v)| !predicate(k.as_str(), *v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Self {
            entries: Arc::new(entries),
            key_selector: self.key_selector,
        })
    }
}
