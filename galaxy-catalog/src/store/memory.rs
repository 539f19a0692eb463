//! In-memory hierarchical file and a JSON snapshot opener.
//!
//! [`MemoryFile`] holds a tree of groups and datasets with attributes on both.
//! It is built with the `with_*` methods, or deserialized from a JSON
//! snapshot by [`SnapshotOpener`]. A snapshot looks like:
//!
//! ```json
//! {
//!   "attrs": {},
//!   "children": {
//!     "galaxyProperties": {
//!       "node": "group",
//!       "children": {
//!         "ra": {
//!           "node": "dataset",
//!           "data": { "type": "float", "values": [10.5, 11.0] },
//!           "attrs": { "units": "deg", "description": "None given" }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Attributes, Hierarchy, NodeKind, StoreOpener};
use crate::column::{AttrValue, Column};
use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Group {
    #[serde(default)]
    attrs: Attributes,
    #[serde(default)]
    children: BTreeMap<String, Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Dataset {
    data: Column,
    #[serde(default)]
    attrs: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "lowercase")]
enum Node {
    Group(Group),
    Dataset(Dataset),
}

impl Node {
    fn attrs(&self) -> &Attributes {
        match self {
            Node::Group(g) => &g.attrs,
            Node::Dataset(d) => &d.attrs,
        }
    }

    fn attrs_mut(&mut self) -> &mut Attributes {
        match self {
            Node::Group(g) => &mut g.attrs,
            Node::Dataset(d) => &mut d.attrs,
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// A hierarchical file held entirely in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFile {
    #[serde(flatten)]
    root: Group,
}

impl MemoryFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON snapshot.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Stores `data` at `path`, creating intermediate groups.
    ///
    /// Anything previously stored at `path` is replaced.
    pub fn with_dataset(mut self, path: &str, data: impl Into<Column>) -> Self {
        let (parent, name) = split_last(path);
        let group = self.group_entry(parent);
        group.children.insert(
            name.to_string(),
            Node::Dataset(Dataset {
                data: data.into(),
                attrs: Attributes::new(),
            }),
        );
        self
    }

    /// Ensures a (possibly empty) group exists at `path`.
    pub fn with_group(mut self, path: &str) -> Self {
        self.group_entry(path);
        self
    }

    /// Sets one attribute on the node at `path`, creating a group there if
    /// nothing is stored yet.
    pub fn with_attr(mut self, path: &str, key: &str, value: impl Into<AttrValue>) -> Self {
        let value = value.into();
        if self.node(path).is_none() {
            self.group_entry(path);
        }
        match self.node_mut(path) {
            Some(node) => {
                node.attrs_mut().insert(key.to_string(), value);
            }
            None => {
                self.root.attrs.insert(key.to_string(), value);
            }
        }
        self
    }

    fn group_entry(&mut self, path: &str) -> &mut Group {
        let mut group = &mut self.root;
        for segment in segments(path) {
            let slot = group
                .children
                .entry(segment.to_string())
                .or_insert_with(|| Node::Group(Group::default()));
            if let Node::Dataset(_) = slot {
                *slot = Node::Group(Group::default());
            }
            group = match slot {
                Node::Group(g) => g,
                Node::Dataset(_) => unreachable!("dataset replaced by group above"),
            };
        }
        group
    }

    fn node(&self, path: &str) -> Option<NodeRef<'_>> {
        let mut current = NodeRef::Group(&self.root);
        for segment in segments(path) {
            let group = match current {
                NodeRef::Group(g) => g,
                NodeRef::Node(Node::Group(g)) => g,
                NodeRef::Node(Node::Dataset(_)) => return None,
            };
            current = NodeRef::Node(group.children.get(segment)?);
        }
        Some(current)
    }

    fn node_mut(&mut self, path: &str) -> Option<&mut Node> {
        let (parent, name) = split_last(path);
        if name.is_empty() {
            return None;
        }
        let mut group = &mut self.root;
        for segment in segments(parent) {
            group = match group.children.get_mut(segment)? {
                Node::Group(g) => g,
                Node::Dataset(_) => return None,
            };
        }
        group.children.get_mut(name)
    }
}

/// Borrowed view of either the root group or a child node.
#[derive(Clone, Copy)]
enum NodeRef<'a> {
    Group(&'a Group),
    Node(&'a Node),
}

impl<'a> NodeRef<'a> {
    fn as_group(self) -> Option<&'a Group> {
        match self {
            NodeRef::Group(g) | NodeRef::Node(Node::Group(g)) => Some(g),
            NodeRef::Node(Node::Dataset(_)) => None,
        }
    }

    fn attrs(self) -> &'a Attributes {
        match self {
            NodeRef::Group(g) => &g.attrs,
            NodeRef::Node(n) => n.attrs(),
        }
    }
}

fn split_last(path: &str) -> (&str, &str) {
    let trimmed = path.trim_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", trimmed),
    }
}

impl Hierarchy for MemoryFile {
    fn kind(&self, path: &str) -> Option<NodeKind> {
        match self.node(path)? {
            NodeRef::Node(Node::Dataset(_)) => Some(NodeKind::Dataset),
            _ => Some(NodeKind::Group),
        }
    }

    fn children(&self, path: &str) -> Result<Vec<String>> {
        let group = self
            .node(path)
            .and_then(NodeRef::as_group)
            .ok_or_else(|| CatalogError::store(path, "not a group"))?;
        Ok(group.children.keys().cloned().collect())
    }

    fn dataset(&self, path: &str) -> Result<Column> {
        match self.node(path) {
            Some(NodeRef::Node(Node::Dataset(d))) => Ok(d.data.clone()),
            Some(_) => Err(CatalogError::store(path, "not a dataset")),
            None => Err(CatalogError::MissingColumn {
                path: path.to_string(),
            }),
        }
    }

    fn attributes(&self, path: &str) -> Result<Attributes> {
        self.node(path)
            .map(|n| n.attrs().clone())
            .ok_or_else(|| CatalogError::store(path, "no such node"))
    }
}

/// Opens JSON snapshots of hierarchical files from disk.
///
/// Every call re-reads the file, so each walk sees its own handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotOpener;

impl StoreOpener for SnapshotOpener {
    type Store = MemoryFile;

    fn open(&self, path: &Path) -> Result<MemoryFile> {
        let text = fs::read_to_string(path)?;
        MemoryFile::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> MemoryFile {
        MemoryFile::new()
            .with_dataset("galaxyProperties/ra", vec![10.5, 11.0])
            .with_attr("galaxyProperties/ra", "units", "deg")
            .with_dataset("galaxyProperties/isCentral", vec![0i64, 1])
            .with_attr("halo_7", "halo_mass", 3.0e14)
    }

    #[test]
    fn kinds_and_children() {
        let file = sample();
        assert_eq!(file.kind(""), Some(NodeKind::Group));
        assert_eq!(file.kind("galaxyProperties"), Some(NodeKind::Group));
        assert_eq!(file.kind("/galaxyProperties/ra"), Some(NodeKind::Dataset));
        assert_eq!(file.kind("galaxyProperties/ra/x"), None);
        assert_eq!(file.kind("nothing"), None);
        assert_eq!(file.children("").unwrap(), vec!["galaxyProperties", "halo_7"]);
        assert!(file.children("galaxyProperties/ra").is_err());
    }

    #[test]
    fn dataset_errors() {
        let file = sample();
        assert_eq!(
            file.dataset("galaxyProperties/ra").unwrap(),
            Column::Float(vec![10.5, 11.0])
        );
        assert!(matches!(
            file.dataset("galaxyProperties/dec"),
            Err(CatalogError::MissingColumn { .. })
        ));
        assert!(matches!(
            file.dataset("galaxyProperties"),
            Err(CatalogError::Store { .. })
        ));
    }

    #[test]
    fn attributes_on_groups_and_leaves() {
        let file = sample();
        let leaf = file.attributes("galaxyProperties/ra").unwrap();
        assert_eq!(leaf.get("units"), Some(&AttrValue::Text("deg".into())));
        let group = file.attributes("halo_7").unwrap();
        assert_eq!(group.get("halo_mass").and_then(AttrValue::as_f64), Some(3.0e14));
    }

    #[test]
    fn dataset_replaces_group_path() {
        let file = MemoryFile::new()
            .with_dataset("a/b", vec![1i64])
            .with_dataset("a/b/c", vec![2i64]);
        assert_eq!(file.kind("a/b"), Some(NodeKind::Group));
        assert_eq!(file.kind("a/b/c"), Some(NodeKind::Dataset));
    }

    #[test]
    fn snapshot_opener_reads_json() {
        let json = sample().to_json().unwrap();
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(json.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let opened = SnapshotOpener.open(tmp.path()).unwrap();
        assert_eq!(opened, sample());
    }

    #[test]
    fn snapshot_opener_missing_file() {
        let result = SnapshotOpener.open(Path::new("/nonexistent/catalog.json"));
        assert!(matches!(result, Err(CatalogError::Io(_))));
    }

    #[test]
    fn snapshot_literal() {
        let text = r#"{
            "children": {
                "galaxyProperties": {
                    "node": "group",
                    "children": {
                        "ra": {
                            "node": "dataset",
                            "data": { "type": "float", "values": [10.5] },
                            "attrs": { "units": "deg" }
                        }
                    }
                }
            }
        }"#;
        let file = MemoryFile::from_json(text).unwrap();
        assert_eq!(
            file.dataset("galaxyProperties/ra").unwrap(),
            Column::Float(vec![10.5])
        );
    }
}
