//! The AlphaQ galaxy and cluster catalog schema.
//!
//! Both layouts share one set of recipes. The galaxy catalog stores every
//! native column under `galaxyProperties/`. The cluster catalog has one group
//! per halo above 1e14 M_sun/h, each holding the same `galaxyProperties/`
//! subtree restricted to the halo's member galaxies, with halo-wide
//! quantities (`sod_halo_mass`, `halo_z`, `fof_halo_tag`, ...) stored as
//! group attributes.
//!
//! Schema history:
//!
//! | Version | Difference from the base schema |
//! |---------|---------------------------------|
//! | `< 2.1.1` | Sérsic indices live at the top level; no ellipticities |
//! | `2.0` | positions are stored in arcseconds |

use crate::error::{CatalogError, Result};
use crate::recipe::{QuantityRecipe, Registry, Transform};
use crate::store::{join, read_scalar_f64, Hierarchy, NodeKind};
use crate::transforms::{ARCSEC_TO_DEG, ELLIPTICITY_1, POSITION_ANGLE, TO_BOOL};
use crate::version::{CatalogVersion, Schema, VersionGate, VersionPredicate};

/// Group holding the per-galaxy native columns.
pub const DATA_ROOT: &str = "galaxyProperties";

/// Group holding version and simulation metadata; never a partition.
pub const METADATA_GROUP: &str = "metaData";

/// Scalar datasets holding the version components, most significant first.
pub const VERSION_DATASETS: [&str; 3] = [
    "metaData/versionMajor",
    "metaData/versionMinor",
    "metaData/versionMinorMinor",
];

/// Version assumed when a file stores no version at all.
pub const DEFAULT_VERSION: CatalogVersion = CatalogVersion::new(2, 0, 0);

const SIMULATION_PARAMETERS: &str = "metaData/simulationParameters";

/// Photometric bands shared by the LSST and SDSS filter sets.
const BANDS: [char; 5] = ['u', 'g', 'r', 'i', 'z'];

fn native(path: &str) -> String {
    join(DATA_ROOT, path)
}

fn direct(path: &str) -> QuantityRecipe {
    QuantityRecipe::direct(native(path))
}

fn derived(transform: Transform, sources: &[&str]) -> Result<QuantityRecipe> {
    let rooted: Vec<String> = sources.iter().map(|s| native(s)).collect();
    let rooted: Vec<&str> = rooted.iter().map(String::as_str).collect();
    QuantityRecipe::derived(transform, &rooted)
}

fn magnitude(filter_set: &str, band: char, frame: &str) -> QuantityRecipe {
    direct(&format!(
        "{set}_filters/magnitude:{set}_{band}:{frame}",
        set = filter_set,
        band = band,
        frame = frame
    ))
}

/// Recipes of the current (2.1.1 and later) schema.
pub fn base_registry() -> Result<Registry> {
    let mut registry = Registry::new()
        .with("galaxy_id", direct("galaxyID"))
        .with("ra", direct("ra"))
        .with("dec", direct("dec"))
        .with("ra_true", direct("ra_true"))
        .with("dec_true", direct("dec_true"))
        .with("redshift", direct("redshift"))
        .with("redshift_true", direct("redshiftHubble"))
        .with("shear_1", direct("shear1"))
        .with("shear_2", direct("shear2"))
        .with("convergence", direct("convergence"))
        .with("magnification", direct("magnification"))
        .with("halo_id", direct("hostIndex"))
        .with("halo_mass", direct("hostHaloMass"))
        .with("is_central", derived(TO_BOOL, &["isCentral"])?)
        .with("stellar_mass", direct("totalMassStellar"))
        .with("size_disk_true", direct("morphology/diskHalfLightRadius"))
        .with("size_bulge_true", direct("morphology/spheroidHalfLightRadius"))
        .with("disk_sersic_index", direct("morphology/diskSersicIndex"))
        .with("bulge_sersic_index", direct("morphology/spheroidSersicIndex"))
        .with(
            "position_angle",
            derived(POSITION_ANGLE, &["morphology/positionAngle"])?,
        )
        .with(
            "ellipticity_1",
            derived(
                ELLIPTICITY_1,
                &["morphology/totalEllipticity2", "morphology/positionAngle"],
            )?,
        )
        .with("ellipticity_2", direct("morphology/totalEllipticity2"))
        .with("position_x", direct("x"))
        .with("position_y", direct("y"))
        .with("position_z", direct("z"))
        .with("velocity_x", direct("vx"))
        .with("velocity_y", direct("vy"))
        .with("velocity_z", direct("vz"));

    for band in BANDS {
        registry = registry
            .with(format!("mag_{}_lsst", band), magnitude("LSST", band, "observed"))
            .with(format!("mag_{}_sdss", band), magnitude("SDSS", band, "observed"))
            .with(format!("Mag_true_{}_lsst_z0", band), magnitude("LSST", band, "rest"))
            .with(format!("Mag_true_{}_sdss_z0", band), magnitude("SDSS", band, "rest"));
    }

    // LSST y band is published under an upper-case canonical name.
    Ok(registry
        .with("mag_Y_lsst", magnitude("LSST", 'y', "observed"))
        .with("Mag_true_Y_lsst_z0", magnitude("LSST", 'y', "rest")))
}

/// Patches for historical schema versions, in application order.
pub fn version_gates() -> Result<Vec<VersionGate>> {
    let before_morphology = VersionGate::new(VersionPredicate::Below(CatalogVersion::new(2, 1, 1)))
        .set("disk_sersic_index", direct("diskSersicIndex"))
        .set("bulge_sersic_index", direct("spheroidSersicIndex"))
        .remove("ellipticity_1")
        .remove("ellipticity_2");

    let mut arcseconds = VersionGate::new(VersionPredicate::Exactly(DEFAULT_VERSION));
    for name in ["ra", "ra_true", "dec", "dec_true"] {
        arcseconds = arcseconds.set(name, derived(ARCSEC_TO_DEG, &[name])?);
    }

    Ok(vec![before_morphology, arcseconds])
}

pub fn schema() -> Result<Schema> {
    Ok(Schema::new(base_registry()?, version_gates()?))
}

/// Reads the stored version triple, stopping at the first missing component.
pub fn read_version<H: Hierarchy + ?Sized>(store: &H) -> Result<CatalogVersion> {
    let mut components = Vec::with_capacity(VERSION_DATASETS.len());
    for path in VERSION_DATASETS {
        if store.kind(path) != Some(NodeKind::Dataset) {
            break;
        }
        let value = store
            .dataset(path)?
            .scalar_i64()
            .ok_or_else(|| CatalogError::store(path, "expected an integer version component"))?;
        components.push(value);
    }
    CatalogVersion::from_components(&components, DEFAULT_VERSION)
}

/// Cosmological parameters of the simulation the catalog was built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParameters {
    /// Hubble constant, in km/s/Mpc.
    pub h0: f64,
    pub omega_matter: f64,
    pub omega_b: f64,
}

impl SimulationParameters {
    pub fn read<H: Hierarchy + ?Sized>(store: &H) -> Result<Self> {
        let param = |name: &str| read_scalar_f64(store, &join(SIMULATION_PARAMETERS, name));
        Ok(Self {
            h0: param("H_0")?,
            omega_matter: param("Omega_matter")?,
            omega_b: param("Omega_b")?,
        })
    }
}
