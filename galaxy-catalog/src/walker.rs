//! Walking the physical partitions of a catalog file.
//!
//! A [`NativeWalker`] is chosen when the catalog is opened:
//!
//! - [`Flat`](NativeWalker::Flat): the whole file is one implicit partition
//!   and native paths are fetched as-is. Native filters are rejected.
//! - [`Partitioned`](NativeWalker::Partitioned): every top-level group (one
//!   per halo) is a partition. Its scalar attributes are checked against the
//!   native filters before any of its columns are read.
//!
//! Walking is single-pass and forward-only. Partitions borrow the store
//! handle, so none can outlive the walk that produced them.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::column::{AttrValue, Column};
use crate::error::{CatalogError, Result};
use crate::store::{join, Attributes, Hierarchy, NodeKind};

type Predicate = dyn Fn(&[AttrValue]) -> bool + Send + Sync;

/// A predicate over partition-level attributes, with the attribute names
/// whose values are passed to it, in order.
///
/// ```
/// use galaxy_catalog::NativeFilter;
///
/// let massive = NativeFilter::new(&["sod_halo_mass"], |v| {
///     v[0].as_f64().is_some_and(|m| m > 1e14)
/// });
/// assert_eq!(massive.attributes(), ["sod_halo_mass"]);
/// ```
#[derive(Clone)]
pub struct NativeFilter {
    predicate: Arc<Predicate>,
    attributes: Vec<String>,
}

impl NativeFilter {
    pub fn new<F>(attributes: &[&str], predicate: F) -> Self
    where
        F: Fn(&[AttrValue]) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Evaluates the predicate on the named attributes of one partition.
    pub fn evaluate(&self, partition: &str, attrs: &Attributes) -> Result<bool> {
        let values = self
            .attributes
            .iter()
            .map(|name| {
                attrs
                    .get(name)
                    .cloned()
                    .ok_or_else(|| CatalogError::MissingAttribute {
                        partition: partition.to_string(),
                        attribute: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((self.predicate)(&values))
    }
}

impl fmt::Debug for NativeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFilter")
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeWalker {
    /// Single implicit partition. `data_root` is the group whose leaves are
    /// the catalog's native quantities.
    Flat { data_root: String },
    /// One partition per top-level group, except the `reserved` ones.
    Partitioned { reserved: Vec<String> },
}

impl NativeWalker {
    pub fn flat(data_root: impl Into<String>) -> Self {
        NativeWalker::Flat {
            data_root: data_root.into(),
        }
    }

    pub fn partitioned(reserved: &[&str]) -> Self {
        NativeWalker::Partitioned {
            reserved: reserved.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn supports_filters(&self) -> bool {
        matches!(self, NativeWalker::Partitioned { .. })
    }

    /// Keys of every partition in the file, in storage order.
    fn partition_keys<H: Hierarchy + ?Sized>(&self, store: &H) -> Result<Vec<String>> {
        match self {
            NativeWalker::Flat { .. } => Ok(vec![String::new()]),
            NativeWalker::Partitioned { reserved } => Ok(store
                .children("")?
                .into_iter()
                .filter(|key| !reserved.contains(key))
                .filter(|key| store.kind(key) == Some(NodeKind::Group))
                .collect()),
        }
    }

    pub(crate) fn cursor<H: Hierarchy + ?Sized>(
        &self,
        store: &H,
        filters: &[NativeFilter],
    ) -> Result<PartitionCursor> {
        if !filters.is_empty() && !self.supports_filters() {
            return Err(CatalogError::FilterUnsupported);
        }
        Ok(PartitionCursor {
            partitioned: self.supports_filters(),
            keys: self.partition_keys(store)?.into_iter(),
            filters: filters.to_vec(),
        })
    }

    /// Starts a walk over `store`, skipping partitions that fail `filters`.
    pub fn iter<'s, H: Hierarchy + ?Sized>(
        &self,
        store: &'s H,
        filters: &[NativeFilter],
    ) -> Result<Partitions<'s, H>> {
        Ok(Partitions {
            store,
            cursor: self.cursor(store, filters)?,
        })
    }

    /// Every data-bearing leaf reachable through a partition getter.
    ///
    /// For a partitioned file the first partition is taken as representative.
    pub fn native_quantities<H: Hierarchy + ?Sized>(&self, store: &H) -> Result<BTreeSet<String>> {
        match self {
            NativeWalker::Flat { data_root } => {
                if !store.contains(data_root) {
                    return Ok(BTreeSet::new());
                }
                Ok(store
                    .leaf_datasets(data_root)?
                    .into_iter()
                    .map(|leaf| join(data_root, &leaf))
                    .collect())
            }
            NativeWalker::Partitioned { .. } => match self.partition_keys(store)?.first() {
                Some(key) => Ok(store.leaf_datasets(key)?.into_iter().collect()),
                None => Ok(BTreeSet::new()),
            },
        }
    }

    /// Attribute names native filters may refer to (those of the first
    /// partition). Always empty for a flat walker.
    pub fn filter_quantities<H: Hierarchy + ?Sized>(&self, store: &H) -> Result<BTreeSet<String>> {
        match self {
            NativeWalker::Flat { .. } => Ok(BTreeSet::new()),
            NativeWalker::Partitioned { .. } => match self.partition_keys(store)?.first() {
                Some(key) => Ok(store.attributes(key)?.into_keys().collect()),
                None => Ok(BTreeSet::new()),
            },
        }
    }

    /// Full store path of `native` for metadata lookups.
    ///
    /// Partitions are searched in storage order; the first one holding
    /// `native` wins. If none does, the path inside the first partition is
    /// returned.
    pub(crate) fn metadata_path<H: Hierarchy + ?Sized>(
        &self,
        store: &H,
        native: &str,
    ) -> Result<Option<String>> {
        match self {
            NativeWalker::Flat { .. } => Ok(Some(native.trim_matches('/').to_string())),
            NativeWalker::Partitioned { .. } => {
                let keys = self.partition_keys(store)?;
                Ok(keys
                    .iter()
                    .map(|key| join(key, native))
                    .find(|path| store.contains(path))
                    .or_else(|| keys.first().map(|key| join(key, native))))
            }
        }
    }
}

/// Walk state that does not borrow the store, so an owner of the store can
/// drive it.
pub(crate) struct PartitionCursor {
    partitioned: bool,
    keys: std::vec::IntoIter<String>,
    filters: Vec<NativeFilter>,
}

impl PartitionCursor {
    fn admits<H: Hierarchy + ?Sized>(&self, store: &H, key: &str) -> Result<bool> {
        if self.filters.is_empty() {
            return Ok(true);
        }
        let attrs = store.attributes(key)?;
        for filter in &self.filters {
            if !filter.evaluate(key, &attrs)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn next_partition<'s, H: Hierarchy + ?Sized>(
        &mut self,
        store: &'s H,
    ) -> Option<Result<Partition<'s, H>>> {
        while let Some(key) = self.keys.next() {
            match self.admits(store, &key) {
                Ok(true) => {
                    return Some(Ok(Partition {
                        store,
                        key,
                        partitioned: self.partitioned,
                    }))
                }
                Ok(false) => debug!("skipping partition {} (native filter)", key),
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Lazy sequence of partitions of one store handle.
pub struct Partitions<'s, H: ?Sized> {
    store: &'s H,
    cursor: PartitionCursor,
}

impl<'s, H: Hierarchy + ?Sized> Iterator for Partitions<'s, H> {
    type Item = Result<Partition<'s, H>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_partition(self.store)
    }
}

/// Getter for the native columns of one partition.
pub struct Partition<'s, H: ?Sized> {
    store: &'s H,
    key: String,
    partitioned: bool,
}

impl<'s, H: Hierarchy + ?Sized> Partition<'s, H> {
    /// Group name of the partition; empty for a flat catalog.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Partition-level scalar attributes.
    pub fn attributes(&self) -> Result<Attributes> {
        self.store.attributes(&self.key)
    }

    /// Materializes one native column of this partition.
    ///
    /// A path naming a group inside a partition cannot be served through
    /// this getter and yields [`CatalogError::NotImplemented`], distinct
    /// from [`CatalogError::MissingColumn`] for paths that are absent.
    pub fn fetch(&self, native: &str) -> Result<Column> {
        let path = join(&self.key, native);
        match self.store.kind(&path) {
            Some(NodeKind::Dataset) => self.store.dataset(&path),
            Some(NodeKind::Group) if self.partitioned => Err(CatalogError::NotImplemented {
                partition: self.key.clone(),
                column: native.to_string(),
            }),
            _ => Err(CatalogError::MissingColumn { path }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryFile;

    fn cluster_file() -> MemoryFile {
        MemoryFile::new()
            .with_dataset("metaData/versionMajor", vec![2i64])
            .with_dataset("halo_1/galaxyProperties/ra", vec![1.0, 2.0])
            .with_dataset("halo_1/galaxyProperties/morphology/diskSersicIndex", vec![1.0, 4.0])
            .with_attr("halo_1", "sod_halo_mass", 2.0e14)
            .with_attr("halo_1", "halo_z", 0.3)
            .with_dataset("halo_2/galaxyProperties/ra", vec![3.0])
            .with_dataset("halo_2/galaxyProperties/morphology/diskSersicIndex", vec![2.0])
            .with_attr("halo_2", "sod_halo_mass", 5.0e13)
            .with_attr("halo_2", "halo_z", 0.7)
    }

    fn keys<H: Hierarchy>(walker: &NativeWalker, store: &H, filters: &[NativeFilter]) -> Vec<String> {
        walker
            .iter(store, filters)
            .unwrap()
            .map(|p| p.unwrap().key().to_string())
            .collect()
    }

    #[test]
    fn flat_rejects_filters() {
        let file = MemoryFile::new().with_dataset("galaxyProperties/ra", vec![1.0]);
        let walker = NativeWalker::flat("galaxyProperties");
        let filter = NativeFilter::new(&["halo_z"], |_| true);
        assert!(matches!(
            walker.iter(&file, &[filter]),
            Err(CatalogError::FilterUnsupported)
        ));
    }

    #[test]
    fn flat_single_partition_fetches_full_paths() {
        let file = MemoryFile::new().with_dataset("galaxyProperties/ra", vec![1.0]);
        let walker = NativeWalker::flat("galaxyProperties");
        let partitions: Vec<_> = walker.iter(&file, &[]).unwrap().collect();
        assert_eq!(partitions.len(), 1);
        let partition = partitions[0].as_ref().unwrap();
        assert_eq!(partition.key(), "");
        assert_eq!(
            partition.fetch("galaxyProperties/ra").unwrap(),
            Column::Float(vec![1.0])
        );
        assert!(matches!(
            partition.fetch("galaxyProperties/dec"),
            Err(CatalogError::MissingColumn { .. })
        ));
        assert!(matches!(
            partition.fetch("galaxyProperties"),
            Err(CatalogError::MissingColumn { .. })
        ));
    }

    #[test]
    fn partitioned_skips_reserved_groups() {
        let walker = NativeWalker::partitioned(&["metaData"]);
        assert_eq!(keys(&walker, &cluster_file(), &[]), vec!["halo_1", "halo_2"]);
    }

    #[test]
    fn partitioned_filters_on_attributes() {
        let walker = NativeWalker::partitioned(&["metaData"]);
        let massive = NativeFilter::new(&["sod_halo_mass"], |v| {
            v[0].as_f64().is_some_and(|m| m > 1e14)
        });
        assert_eq!(keys(&walker, &cluster_file(), &[massive]), vec!["halo_1"]);

        let two_args = NativeFilter::new(&["sod_halo_mass", "halo_z"], |v| {
            v[0].as_f64().unwrap_or(0.0) < 1e14 && v[1].as_f64().unwrap_or(0.0) > 0.5
        });
        assert_eq!(keys(&walker, &cluster_file(), &[two_args]), vec!["halo_2"]);

        let none = NativeFilter::new(&["halo_z"], |_| false);
        assert!(keys(&walker, &cluster_file(), &[none]).is_empty());
    }

    #[test]
    fn filter_on_missing_attribute_fails() {
        let walker = NativeWalker::partitioned(&["metaData"]);
        let file = cluster_file();
        let filter = NativeFilter::new(&["fof_halo_tag"], |_| true);
        let first = walker.iter(&file, &[filter]).unwrap().next().unwrap();
        assert!(matches!(
            first,
            Err(CatalogError::MissingAttribute { ref attribute, .. }) if attribute == "fof_halo_tag"
        ));
    }

    #[test]
    fn partition_fetch_group_is_not_implemented() {
        let walker = NativeWalker::partitioned(&["metaData"]);
        let file = cluster_file();
        let partition = walker.iter(&file, &[]).unwrap().next().unwrap().unwrap();
        assert_eq!(
            partition.fetch("galaxyProperties/ra").unwrap(),
            Column::Float(vec![1.0, 2.0])
        );
        assert!(matches!(
            partition.fetch("galaxyProperties/morphology"),
            Err(CatalogError::NotImplemented { .. })
        ));
        assert!(matches!(
            partition.fetch("galaxyProperties/dec"),
            Err(CatalogError::MissingColumn { .. })
        ));
        assert_eq!(
            partition.attributes().unwrap().get("halo_z"),
            Some(&AttrValue::Float(0.3))
        );
    }

    #[test]
    fn walks_are_independent() {
        let walker = NativeWalker::partitioned(&["metaData"]);
        let file = cluster_file();
        let mut first = walker.iter(&file, &[]).unwrap();
        first.next();
        assert_eq!(keys(&walker, &file, &[]), vec!["halo_1", "halo_2"]);
        assert_eq!(first.next().unwrap().unwrap().key(), "halo_2");
        assert!(first.next().is_none());
    }

    #[test]
    fn native_quantities_by_layout() {
        let flat = MemoryFile::new()
            .with_dataset("galaxyProperties/ra", vec![1.0])
            .with_dataset("galaxyProperties/morphology/diskHalfLightRadius", vec![1.0])
            .with_dataset("metaData/versionMajor", vec![2i64]);
        let names = NativeWalker::flat("galaxyProperties")
            .native_quantities(&flat)
            .unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec![
                "galaxyProperties/morphology/diskHalfLightRadius",
                "galaxyProperties/ra"
            ]
        );

        let walker = NativeWalker::partitioned(&["metaData"]);
        let names = walker.native_quantities(&cluster_file()).unwrap();
        assert!(names.contains("galaxyProperties/ra"));
        assert!(names.contains("galaxyProperties/morphology/diskSersicIndex"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn filter_quantities_from_first_partition() {
        let walker = NativeWalker::partitioned(&["metaData"]);
        let names = walker.filter_quantities(&cluster_file()).unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["halo_z", "sod_halo_mass"]
        );
        assert!(NativeWalker::flat("galaxyProperties")
            .filter_quantities(&cluster_file())
            .unwrap()
            .is_empty());
    }
}
