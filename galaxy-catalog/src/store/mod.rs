//! Read-only access to the hierarchical file that backs a catalog.
//!
//! The file format itself is owned by an external collaborator. This module
//! only fixes the capabilities the catalog needs from it:
//!
//! - open a store read-only by path ([`StoreOpener`])
//! - enumerate the children of a group and tell leaves from groups
//! - materialize a leaf's full value
//! - read scalar attributes of a leaf or a group
//!
//! Paths are `/`-separated and relative to the file root; a leading `/` is
//! ignored and the empty path names the root group.

pub mod memory;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::column::{AttrValue, Column};
use crate::error::{CatalogError, Result};

pub use memory::{MemoryFile, SnapshotOpener};

/// Scalar attributes of a node, keyed by attribute name.
pub type Attributes = BTreeMap<String, AttrValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    /// A data-bearing leaf.
    Dataset,
}

pub trait Hierarchy {
    /// Kind of the node at `path`, or `None` if nothing is stored there.
    fn kind(&self, path: &str) -> Option<NodeKind>;

    /// Names (not paths) of the direct children of the group at `path`, sorted.
    fn children(&self, path: &str) -> Result<Vec<String>>;

    /// Full materialized contents of the leaf at `path`.
    fn dataset(&self, path: &str) -> Result<Column>;

    /// Scalar attributes of the node at `path`.
    fn attributes(&self, path: &str) -> Result<Attributes>;

    fn contains(&self, path: &str) -> bool {
        self.kind(path).is_some()
    }

    /// Paths of every data-bearing leaf below `root`, relative to `root`.
    ///
    /// Intermediate groups are walked but never reported.
    fn leaf_datasets(&self, root: &str) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![String::new()];
        while let Some(prefix) = pending.pop() {
            for name in self.children(&join(root, &prefix))? {
                let relative = join(&prefix, &name);
                match self.kind(&join(root, &relative)) {
                    Some(NodeKind::Dataset) => found.push(relative),
                    Some(NodeKind::Group) => pending.push(relative),
                    None => {}
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

impl<H: Hierarchy + ?Sized> Hierarchy for Arc<H> {
    fn kind(&self, path: &str) -> Option<NodeKind> {
        (**self).kind(path)
    }

    fn children(&self, path: &str) -> Result<Vec<String>> {
        (**self).children(path)
    }

    fn dataset(&self, path: &str) -> Result<Column> {
        (**self).dataset(path)
    }

    fn attributes(&self, path: &str) -> Result<Attributes> {
        (**self).attributes(path)
    }
}

/// Opens a catalog file read-only.
///
/// A catalog calls [`open`](StoreOpener::open) once per walk and drops the
/// returned handle when the walk ends, so no handle outlives a single read.
pub trait StoreOpener {
    type Store: Hierarchy;

    fn open(&self, path: &Path) -> Result<Self::Store>;

    /// Whether `path` names an openable catalog file.
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// An already-loaded file shared behind an `Arc`; every open is a cheap clone.
impl<H: Hierarchy> StoreOpener for Arc<H> {
    type Store = Arc<H>;

    fn open(&self, _path: &Path) -> Result<Self::Store> {
        Ok(Arc::clone(self))
    }

    fn exists(&self, _path: &Path) -> bool {
        true
    }
}

/// Joins two path fragments with a single `/`, skipping empty fragments.
pub fn join(base: &str, name: &str) -> String {
    let base = base.trim_matches('/');
    let name = name.trim_matches('/');
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, name),
    }
}

/// Reads a scalar dataset as `f64`, failing if it is absent or not numeric.
pub(crate) fn read_scalar_f64<H: Hierarchy + ?Sized>(store: &H, path: &str) -> Result<f64> {
    if store.kind(path) != Some(NodeKind::Dataset) {
        return Err(CatalogError::MissingColumn {
            path: path.to_string(),
        });
    }
    store
        .dataset(path)?
        .scalar_f64()
        .ok_or_else(|| CatalogError::store(path, "expected a numeric scalar"))
}
