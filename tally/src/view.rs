//! The hierarchical key-value view counters are persisted into.
//!
//! Keys are `/`-separated paths. [`StorageView::list`] returns the immediate
//! children of a prefix: leaf records by name, and folders by name with a
//! trailing `/`. An empty listing and a missing key are ordinary results, not
//! errors.
//!
//! Two backends ship with the crate:
//!
//! - [`MemoryView`] — an in-process `BTreeMap`
//! - [`FileView`](crate::fs_view::FileView) — one file per record under a directory
//!
//! [`SubView`] scopes any view to a fixed prefix.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use crate::error::ViewError;

/// Hierarchical key-value storage.
///
/// Calls block until complete. Implementations own their retry policy; callers
/// in this crate propagate every error unchanged.
pub trait StorageView: Send + Sync {
    /// Lists the immediate children of `prefix`.
    ///
    /// `prefix` is empty or ends with `/`. Folder children carry a trailing
    /// `/`. Returns an empty vector when nothing lives under `prefix`. Order is
    /// unspecified.
    ///
    /// # Errors
    ///
    /// Returns a [`ViewError`] if the backend cannot be read.
    fn list(&self, prefix: &str) -> Result<Vec<String>, ViewError>;

    /// Reads the record at `key`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`ViewError`] if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ViewError>;

    /// Creates or fully replaces the record at `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`ViewError`] if the record cannot be written.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), ViewError>;
}

impl<V: StorageView + ?Sized> StorageView for &V {
    fn list(&self, prefix: &str) -> Result<Vec<String>, ViewError> {
        (**self).list(prefix)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ViewError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), ViewError> {
        (**self).put(key, value)
    }
}

impl<V: StorageView + ?Sized> StorageView for Arc<V> {
    fn list(&self, prefix: &str) -> Result<Vec<String>, ViewError> {
        (**self).list(prefix)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ViewError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), ViewError> {
        (**self).put(key, value)
    }
}

impl<V: StorageView + ?Sized> StorageView for Box<V> {
    fn list(&self, prefix: &str) -> Result<Vec<String>, ViewError> {
        (**self).list(prefix)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ViewError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), ViewError> {
        (**self).put(key, value)
    }
}

/// A view of everything under a fixed prefix of another view.
///
/// Every key and prefix passed to a `SubView` is joined onto its own prefix
/// before reaching the parent, so callers never see or construct the full
/// path.
#[derive(Debug, Clone)]
pub struct SubView<V> {
    parent: V,
    prefix: String,
}

impl<V: StorageView> SubView<V> {
    /// Scopes `parent` to `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::InvalidKey`] unless `prefix` is non-empty, ends with
    /// `/` and does not start with `/`.
    pub fn new(parent: V, prefix: impl Into<String>) -> Result<Self, ViewError> {
        let prefix = prefix.into();
        if prefix.is_empty() || !prefix.ends_with('/') || prefix.starts_with('/') {
            return Err(ViewError::InvalidKey {
                key: prefix,
                reason: "sub-view prefix must be a relative folder ending in '/'",
            });
        }
        Ok(Self { parent, prefix })
    }

    /// Scopes `parent` to a prefix known to be well formed.
    pub(crate) fn namespaced(parent: V, prefix: &'static str) -> Self {
        debug_assert!(prefix.ends_with('/') && !prefix.starts_with('/'));
        Self {
            parent,
            prefix: prefix.to_string(),
        }
    }

    /// The prefix this view is scoped to.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The unscoped parent view.
    pub fn parent(&self) -> &V {
        &self.parent
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

impl<V: StorageView> StorageView for SubView<V> {
    fn list(&self, prefix: &str) -> Result<Vec<String>, ViewError> {
        self.parent.list(&self.scoped(prefix))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ViewError> {
        self.parent.get(&self.scoped(key))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), ViewError> {
        self.parent.put(&self.scoped(key), value)
    }
}

/// An in-process view backed by a sorted map.
///
/// Listings come back sorted. Contents are lost when the view is dropped.
#[derive(Debug, Default)]
pub struct MemoryView {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryView {
    /// Creates an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Poisoned`] if a writer panicked.
    pub fn len(&self) -> Result<usize, ViewError> {
        Ok(self.entries.read().map_err(|_| ViewError::Poisoned)?.len())
    }

    /// Whether no records are stored.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Poisoned`] if a writer panicked.
    pub fn is_empty(&self) -> Result<bool, ViewError> {
        Ok(self.len()? == 0)
    }
}

impl StorageView for MemoryView {
    fn list(&self, prefix: &str) -> Result<Vec<String>, ViewError> {
        let entries = self.entries.read().map_err(|_| ViewError::Poisoned)?;

        let mut children = BTreeSet::new();
        for key in entries.range(prefix.to_string()..).map(|(k, _)| k) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            let child = match rest.find('/') {
                Some(idx) => &rest[..=idx],
                None => rest,
            };
            children.insert(child.to_string());
        }

        Ok(children.into_iter().collect())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ViewError> {
        let entries = self.entries.read().map_err(|_| ViewError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), ViewError> {
        if key.is_empty() || key.ends_with('/') {
            return Err(ViewError::InvalidKey {
                key: key.to_string(),
                reason: "record keys must name a leaf",
            });
        }
        let mut entries = self.entries.write().map_err(|_| ViewError::Poisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
