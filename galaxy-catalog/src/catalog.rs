//! Catalog facade: opening, quantity resolution, and reads.
//!
//! Open a catalog with [`GalaxyCatalog::open`], then read canonical
//! quantities with [`GalaxyCatalog::read`] or, one partition at a time, with
//! [`GalaxyCatalog::iter_quantities`].
//!
//! Opening validates the stored schema version against the configured one
//! and resolves the recipe registry for that version. No column data is read
//! until a quantity is requested, and every read opens its own store handle
//! and releases it when the read finishes or fails.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::debug;

use crate::alphaq::{self, SimulationParameters};
use crate::column::Column;
use crate::config::{CatalogConfig, Layout};
use crate::describe::{self, QuantityInfo};
use crate::error::{CatalogError, Result};
use crate::recipe::{QuantityRecipe, Registry};
use crate::store::{Hierarchy, StoreOpener};
use crate::version::{check_version, CatalogVersion, Schema};
use crate::walker::{NativeFilter, NativeWalker, PartitionCursor};

/// Quantity name to values, for one partition or a whole read.
pub type QuantityMap = BTreeMap<String, Column>;

fn walker_for(layout: Layout) -> NativeWalker {
    match layout {
        Layout::Galaxy => NativeWalker::flat(alphaq::DATA_ROOT),
        Layout::Cluster => NativeWalker::partitioned(&[alphaq::METADATA_GROUP]),
    }
}

/// An opened AlphaQ galaxy or cluster catalog.
///
/// Everything held here is fixed at open time; reads never mutate it.
pub struct GalaxyCatalog<O: StoreOpener> {
    path: PathBuf,
    opener: O,
    lightcone: bool,
    version: CatalogVersion,
    registry: Registry,
    walker: NativeWalker,
    simulation: SimulationParameters,
    filter_quantities: BTreeSet<String>,
}

impl<O: StoreOpener> GalaxyCatalog<O> {
    /// Opens a catalog with the AlphaQ schema.
    ///
    /// # Errors
    /// Fails if the file does not exist, its stored version differs from
    /// `config.version`, or its simulation metadata cannot be read.
    pub fn open(config: &CatalogConfig, opener: O) -> Result<Self> {
        Self::open_with_schema(config, opener, &alphaq::schema()?)
    }

    pub fn open_with_schema(config: &CatalogConfig, opener: O, schema: &Schema) -> Result<Self> {
        let expected = config.expected_version()?;
        if !opener.exists(&config.filename) {
            return Err(CatalogError::CatalogNotFound(config.filename.clone()));
        }

        let walker = walker_for(config.layout);
        let store = opener.open(&config.filename)?;
        let version = alphaq::read_version(&store)?;
        check_version(version, expected)?;
        let simulation = SimulationParameters::read(&store)?;
        let filter_quantities = walker.filter_quantities(&store)?;
        drop(store);

        let registry = schema.resolve(version);
        debug!(
            "opened {:?}: version {}, {:?} layout, {} quantities",
            config.filename,
            version,
            config.layout,
            registry.len()
        );

        Ok(Self {
            path: config.filename.clone(),
            opener,
            lightcone: config.lightcone,
            version,
            registry,
            walker,
            simulation,
            filter_quantities,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> CatalogVersion {
        self.version
    }

    pub fn lightcone(&self) -> bool {
        self.lightcone
    }

    pub fn simulation_parameters(&self) -> &SimulationParameters {
        &self.simulation
    }

    /// Resolved recipes for this catalog's version.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn quantity_modifier(&self, name: &str) -> Option<&QuantityRecipe> {
        self.registry.resolve(name)
    }

    pub fn has_quantity(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Canonical quantity names, sorted.
    pub fn list_all_quantities(&self) -> impl Iterator<Item = &str> {
        self.registry.names()
    }

    /// Attribute names usable in native filters. Empty for flat catalogs.
    pub fn native_filter_quantities(&self) -> &BTreeSet<String> {
        &self.filter_quantities
    }

    /// Native column paths physically present in the file.
    pub fn native_quantities(&self) -> Result<BTreeSet<String>> {
        let store = self.opener.open(&self.path)?;
        self.walker.native_quantities(&store)
    }

    /// Canonical names whose recipes reference at least one native column
    /// that is not in the file, with the missing paths.
    pub fn unavailable_quantities(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let native = self.native_quantities()?;
        Ok(self
            .registry
            .iter()
            .filter_map(|(name, recipe)| {
                let missing: Vec<String> = recipe
                    .sources()
                    .into_iter()
                    .filter(|source| !native.contains(*source))
                    .map(str::to_string)
                    .collect();
                (!missing.is_empty()).then(|| (name.to_string(), missing))
            })
            .collect())
    }

    /// Starts a lazy read yielding one [`QuantityMap`] per partition.
    ///
    /// Unknown names and unsupported filters fail here, before any column is
    /// read. The returned iterator owns the store handle; dropping it closes
    /// the handle.
    pub fn iter_quantities(
        &self,
        names: &[&str],
        filters: &[NativeFilter],
    ) -> Result<QuantityChunks<O::Store>> {
        let plan = names
            .iter()
            .map(|&name| {
                self.registry
                    .resolve(name)
                    .map(|recipe| (name.to_string(), recipe.clone()))
                    .ok_or_else(|| CatalogError::UnknownQuantity(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let store = self.opener.open(&self.path)?;
        let cursor = self.walker.cursor(&store, filters)?;
        Ok(QuantityChunks {
            store,
            cursor,
            plan,
        })
    }

    /// Reads `names`, concatenating values across all partitions that pass
    /// `filters`.
    ///
    /// # Returns
    ///
    /// One column per requested name. When no partition matches, each column
    /// is empty and typed by [`QuantityRecipe::empty_column`]: booleans for
    /// flag coercions, floats otherwise.
    pub fn read(&self, names: &[&str], filters: &[NativeFilter]) -> Result<QuantityMap> {
        let mut merged: BTreeMap<String, Option<Column>> =
            names.iter().map(|n| (n.to_string(), None)).collect();

        for chunk in self.iter_quantities(names, filters)? {
            for (name, column) in chunk? {
                match merged.get_mut(&name) {
                    Some(Some(acc)) => acc.extend(column)?,
                    Some(slot) => *slot = Some(column),
                    None => {}
                }
            }
        }

        merged
            .into_iter()
            .map(|(name, column)| {
                let column = match (column, self.registry.resolve(&name)) {
                    (Some(column), _) => column,
                    (None, Some(recipe)) => recipe.empty_column()?,
                    (None, None) => return Err(CatalogError::UnknownQuantity(name)),
                };
                Ok((name, column))
            })
            .collect()
    }

    /// Units and description of `name`, when they can be known.
    pub fn describe(&self, name: &str) -> Result<QuantityInfo> {
        let store = self.opener.open(&self.path)?;
        describe::describe(&self.registry, &self.walker, &store, name)
    }
}

/// Per-partition results of [`GalaxyCatalog::iter_quantities`].
pub struct QuantityChunks<S: Hierarchy> {
    store: S,
    cursor: PartitionCursor,
    plan: Vec<(String, QuantityRecipe)>,
}

impl<S: Hierarchy> QuantityChunks<S> {
    fn resolve_partition(&mut self) -> Option<Result<QuantityMap>> {
        let partition = match self.cursor.next_partition(&self.store)? {
            Ok(p) => p,
            Err(e) => return Some(Err(e)),
        };

        // Native columns shared by several recipes are fetched once per partition.
        let mut fetched: BTreeMap<&str, Column> = BTreeMap::new();
        let mut chunk = QuantityMap::new();
        for (name, recipe) in &self.plan {
            let result = (|| -> Result<Column> {
                for source in recipe.sources() {
                    if !fetched.contains_key(source) {
                        fetched.insert(source, partition.fetch(source)?);
                    }
                }
                match recipe {
                    QuantityRecipe::Direct(path) => Ok(fetched[path.as_str()].clone()),
                    QuantityRecipe::Derived(d) => {
                        let args: Vec<Column> = d
                            .sources()
                            .iter()
                            .map(|s| fetched[s.as_str()].clone())
                            .collect();
                        d.transform().apply(&args)
                    }
                }
            })();
            match result {
                Ok(column) => {
                    chunk.insert(name.clone(), column);
                }
                Err(e) => return Some(Err(e)),
            }
        }
        Some(Ok(chunk))
    }
}

impl<S: Hierarchy> Iterator for QuantityChunks<S> {
    type Item = Result<QuantityMap>;

    fn next(&mut self) -> Option<Self::Item> {
        self.resolve_partition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryFile;
    use std::sync::Arc;

    fn galaxy_file(major: i64, minor: i64, minor_minor: i64) -> MemoryFile {
        MemoryFile::new()
            .with_dataset("metaData/versionMajor", vec![major])
            .with_dataset("metaData/versionMinor", vec![minor])
            .with_dataset("metaData/versionMinorMinor", vec![minor_minor])
            .with_dataset("metaData/simulationParameters/H_0", vec![71.0])
            .with_dataset("metaData/simulationParameters/Omega_matter", vec![0.2648])
            .with_dataset("metaData/simulationParameters/Omega_b", vec![0.0448])
            .with_dataset("galaxyProperties/ra", vec![10.0, 20.0])
            .with_dataset("galaxyProperties/isCentral", vec![1i64, 0])
            .with_dataset("galaxyProperties/morphology/positionAngle", vec![0.01, 0.02])
            .with_dataset("galaxyProperties/morphology/totalEllipticity2", vec![0.1, 0.2])
    }

    fn open(file: MemoryFile, version: &str) -> Result<GalaxyCatalog<Arc<MemoryFile>>> {
        GalaxyCatalog::open(&CatalogConfig::new("alphaq.json", version), Arc::new(file))
    }

    #[test]
    fn open_reads_metadata() {
        let catalog = open(galaxy_file(2, 1, 1), "2.1.1").unwrap();
        assert_eq!(catalog.version(), CatalogVersion::new(2, 1, 1));
        assert_eq!(catalog.simulation_parameters().h0, 71.0);
        assert!(!catalog.lightcone());
        assert!(catalog.native_filter_quantities().is_empty());
        assert!(catalog.has_quantity("ellipticity_1"));
    }

    #[test]
    fn open_rejects_version_mismatch() {
        let err = open(galaxy_file(2, 1, 1), "2.1").err().unwrap();
        assert!(matches!(err, CatalogError::VersionMismatch { .. }));
    }

    #[test]
    fn unknown_quantity_fails_before_reading() {
        let catalog = open(galaxy_file(2, 1, 1), "2.1.1").unwrap();
        let err = catalog.read(&["ra", "sfr"], &[]).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownQuantity(ref n) if n == "sfr"));
    }

    #[test]
    fn shared_sources_are_read_once_and_reused() {
        let catalog = open(galaxy_file(2, 1, 1), "2.1.1").unwrap();
        let out = catalog
            .read(&["ellipticity_1", "ellipticity_2", "position_angle"], &[])
            .unwrap();
        assert_eq!(out["ellipticity_2"], Column::Float(vec![0.1, 0.2]));
        assert_eq!(out["ellipticity_1"].len(), 2);
        assert_eq!(out["position_angle"].len(), 2);
    }

    #[test]
    fn missing_native_column_is_lazy() {
        let catalog = open(galaxy_file(2, 1, 1), "2.1.1").unwrap();
        assert!(catalog.read(&["ra"], &[]).is_ok());
        let err = catalog.read(&["stellar_mass"], &[]).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::MissingColumn { ref path } if path == "galaxyProperties/totalMassStellar"
        ));
    }

    #[test]
    fn flat_catalog_rejects_filters() {
        let catalog = open(galaxy_file(2, 1, 1), "2.1.1").unwrap();
        let filter = NativeFilter::new(&["halo_z"], |_| true);
        assert!(matches!(
            catalog.read(&["ra"], &[filter]),
            Err(CatalogError::FilterUnsupported)
        ));
    }

    #[test]
    fn unavailable_quantities_lists_missing_sources() {
        let catalog = open(galaxy_file(2, 1, 1), "2.1.1").unwrap();
        let missing = catalog.unavailable_quantities().unwrap();
        assert!(!missing.contains_key("ra"));
        assert!(!missing.contains_key("ellipticity_1"));
        assert_eq!(
            missing["stellar_mass"],
            vec!["galaxyProperties/totalMassStellar".to_string()]
        );
    }

    #[test]
    fn quantity_modifier_exposes_recipe() {
        let catalog = open(galaxy_file(2, 0, 0), "2.0").unwrap();
        let recipe = catalog.quantity_modifier("ra").unwrap();
        assert_eq!(recipe.to_string(), "arcsec_to_deg(galaxyProperties/ra)");
        assert!(catalog.quantity_modifier("ellipticity_1").is_none());
    }
}
