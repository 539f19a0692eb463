//! Read-only reader for the AlphaQ galaxy and cluster simulation catalogs.
//!
//! A catalog file stores galaxy properties under its own native column
//! names, with a layout that changed between releases. This crate exposes
//! those columns under stable canonical names: each canonical quantity is a
//! recipe (a native path, or a transform over several native paths), and the
//! recipe set is resolved once per file from the schema version the file
//! declares.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | [`GalaxyCatalog`] facade: open, read, describe |
//! | [`alphaq`] | AlphaQ recipes, version gates, version and cosmology readers |
//! | [`recipe`] | [`QuantityRecipe`], [`Transform`], the [`Registry`] |
//! | [`transforms`] | Value-changing transforms used by the recipes |
//! | [`version`] | [`CatalogVersion`], version-gated [`Schema`] resolution |
//! | [`walker`] | Flat and per-halo partition walks, [`NativeFilter`] |
//! | [`describe`] | Units and descriptions of native columns |
//! | [`store`] | [`Hierarchy`] and [`StoreOpener`] seams, JSON snapshots |
//! | [`column`] | [`Column`] values and scalar [`AttrValue`]s |
//! | [`config`] | TOML [`CatalogConfig`] |
//! | [`error`] | [`CatalogError`] |
//!
//! # Quick Start
//!
//! ```ignore
//! use galaxy_catalog::{CatalogConfig, GalaxyCatalog, SnapshotOpener};
//!
//! let config = CatalogConfig::from_file("alphaq.toml")?;
//! let catalog = GalaxyCatalog::open(&config, SnapshotOpener)?;
//!
//! let data = catalog.read(&["ra", "dec", "is_central"], &[])?;
//! println!("{} galaxies", data["ra"].len());
//! ```
//!
//! Cluster catalogs accept native filters on halo attributes:
//!
//! ```ignore
//! let massive = NativeFilter::new(&["sod_halo_mass"], |v| {
//!     v[0].as_f64().is_some_and(|m| m > 3e14)
//! });
//! for chunk in catalog.iter_quantities(&["stellar_mass"], &[massive])? {
//!     let chunk = chunk?;
//!     // one map per halo
//! }
//! ```

pub mod alphaq;
pub mod catalog;
pub mod column;
pub mod config;
pub mod describe;
pub mod error;
pub mod recipe;
pub mod store;
pub mod transforms;
pub mod version;
pub mod walker;

pub use alphaq::SimulationParameters;
pub use catalog::{GalaxyCatalog, QuantityChunks, QuantityMap};
pub use column::{AttrValue, Column};
pub use config::{CatalogConfig, Layout};
pub use describe::{NativeInfo, QuantityInfo};
pub use error::{CatalogError, Result};
pub use recipe::{QuantityRecipe, Registry, Transform};
pub use store::{Hierarchy, MemoryFile, SnapshotOpener, StoreOpener};
pub use version::{CatalogVersion, Schema};
pub use walker::{NativeFilter, NativeWalker, Partition};
