//! Catalog schema versions and version-gated registry patches.
//!
//! A catalog file declares its schema as a dotted triple. Older schemas are
//! described as an ordered list of [`VersionGate`]s, each a predicate on the
//! version plus edits to apply to a copy of the base [`Registry`]. Resolution
//! is a pure function of `(version, base, gates)`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{CatalogError, Result};
use crate::recipe::{QuantityRecipe, Registry};

/// `major.minor.minor-minor`. Missing trailing components are zero, so
/// `2`, `2.0` and `2.0.0` are the same version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CatalogVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl CatalogVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Builds a version from the leading components actually present.
    ///
    /// An empty slice yields `fallback`. More than three components, or a
    /// negative one, is an error.
    pub fn from_components(components: &[i64], fallback: CatalogVersion) -> Result<Self> {
        if components.is_empty() {
            return Ok(fallback);
        }
        if components.len() > 3 {
            return Err(CatalogError::InvalidVersion(join_components(components)));
        }
        let mut parts = [0u32; 3];
        for (slot, &c) in parts.iter_mut().zip(components) {
            *slot = u32::try_from(c)
                .map_err(|_| CatalogError::InvalidVersion(join_components(components)))?;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

fn join_components(components: &[i64]) -> String {
    components
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

impl FromStr for CatalogVersion {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CatalogError::InvalidVersion(s.to_string());
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }
        let components = trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<i64>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_components(&components, Self::default()).map_err(|_| invalid())
    }
}

impl Default for CatalogVersion {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl fmt::Display for CatalogVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

/// Fails unless the stored and configured versions are identical.
pub fn check_version(catalog: CatalogVersion, config: CatalogVersion) -> Result<()> {
    if catalog != config {
        return Err(CatalogError::VersionMismatch { catalog, config });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPredicate {
    Any,
    Below(CatalogVersion),
    AtLeast(CatalogVersion),
    Exactly(CatalogVersion),
}

impl VersionPredicate {
    pub fn matches(&self, version: CatalogVersion) -> bool {
        match self {
            VersionPredicate::Any => true,
            VersionPredicate::Below(v) => version.cmp(v) == Ordering::Less,
            VersionPredicate::AtLeast(v) => version.cmp(v) != Ordering::Less,
            VersionPredicate::Exactly(v) => version == *v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Adds or overwrites one entry.
    Set(String, QuantityRecipe),
    Remove(String),
}

/// Edits applied to the registry when `predicate` holds.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionGate {
    predicate: VersionPredicate,
    ops: Vec<PatchOp>,
}

impl VersionGate {
    pub fn new(predicate: VersionPredicate) -> Self {
        Self {
            predicate,
            ops: Vec::new(),
        }
    }

    pub fn set(mut self, name: impl Into<String>, recipe: QuantityRecipe) -> Self {
        self.ops.push(PatchOp::Set(name.into(), recipe));
        self
    }

    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.ops.push(PatchOp::Remove(name.into()));
        self
    }

    pub fn predicate(&self) -> VersionPredicate {
        self.predicate
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }
}

/// Applies every gate whose predicate matches `version`, in declared order,
/// to a copy of `base`. Later gates win over earlier ones for the same name.
pub fn resolve_recipes(
    version: CatalogVersion,
    base: &Registry,
    gates: &[VersionGate],
) -> Registry {
    let mut working = base.clone();
    for gate in gates.iter().filter(|g| g.predicate.matches(version)) {
        for op in &gate.ops {
            match op {
                PatchOp::Set(name, recipe) => working.insert(name.clone(), recipe.clone()),
                PatchOp::Remove(name) => working.remove(name),
            }
        }
    }
    working
}

/// A base registry together with the gates that derive older schemas from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub base: Registry,
    pub gates: Vec<VersionGate>,
}

impl Schema {
    pub fn new(base: Registry, gates: Vec<VersionGate>) -> Self {
        Self { base, gates }
    }

    pub fn resolve(&self, version: CatalogVersion) -> Registry {
        resolve_recipes(version, &self.base, &self.gates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms;

    fn v(s: &str) -> CatalogVersion {
        s.parse().unwrap()
    }

    #[test]
    fn parse_short_forms() {
        assert_eq!(v("2"), CatalogVersion::new(2, 0, 0));
        assert_eq!(v("2.0"), v("2.0.0"));
        assert_eq!(v("2.1.1"), CatalogVersion::new(2, 1, 1));
        assert_eq!(v(" 3.4 "), CatalogVersion::new(3, 4, 0));
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "2.", ".1", "2.x", "1.2.3.4", "-1", "v2"] {
            assert!(
                matches!(bad.parse::<CatalogVersion>(), Err(CatalogError::InvalidVersion(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(v("2.0") < v("2.1.1"));
        assert!(v("2.1") < v("2.1.1"));
        assert!(v("2.10") > v("2.9.9"));
        assert!(v("10") > v("9.9.9"));
    }

    #[test]
    fn display_drops_zero_patch() {
        assert_eq!(v("2").to_string(), "2.0");
        assert_eq!(v("2.1.1").to_string(), "2.1.1");
    }

    #[test]
    fn components_fallback() {
        let fallback = CatalogVersion::new(2, 0, 0);
        assert_eq!(CatalogVersion::from_components(&[], fallback).unwrap(), fallback);
        assert_eq!(
            CatalogVersion::from_components(&[3], fallback).unwrap(),
            CatalogVersion::new(3, 0, 0)
        );
        assert!(CatalogVersion::from_components(&[2, -1], fallback).is_err());
    }

    #[test]
    fn mismatch_is_fatal() {
        assert!(check_version(v("2.0"), v("2")).is_ok());
        let err = check_version(v("2.1.1"), v("2.1")).unwrap_err();
        assert!(matches!(err, CatalogError::VersionMismatch { .. }));
    }

    #[test]
    fn predicates() {
        assert!(VersionPredicate::Below(v("2.1.1")).matches(v("2.1")));
        assert!(!VersionPredicate::Below(v("2.1.1")).matches(v("2.1.1")));
        assert!(VersionPredicate::AtLeast(v("2.1.1")).matches(v("2.1.1")));
        assert!(VersionPredicate::Exactly(v("2.0")).matches(v("2")));
        assert!(!VersionPredicate::Exactly(v("2.0")).matches(v("2.0.1")));
        assert!(VersionPredicate::Any.matches(v("0")));
    }

    fn base() -> Registry {
        Registry::new()
            .with("ra", QuantityRecipe::direct("ra"))
            .with("ellipticity_2", QuantityRecipe::direct("morphology/totalEllipticity2"))
    }

    fn gates() -> Vec<VersionGate> {
        vec![
            VersionGate::new(VersionPredicate::Below(v("2.1.1")))
                .remove("ellipticity_2")
                .set("ra", QuantityRecipe::direct("ra_old")),
            VersionGate::new(VersionPredicate::Exactly(v("2.0"))).set(
                "ra",
                QuantityRecipe::derived(transforms::ARCSEC_TO_DEG, &["ra"]).unwrap(),
            ),
        ]
    }

    #[test]
    fn later_gates_win() {
        let resolved = resolve_recipes(v("2.0"), &base(), &gates());
        assert!(resolved.resolve("ra").unwrap().is_derived());
        assert!(!resolved.contains("ellipticity_2"));

        let middle = resolve_recipes(v("2.1"), &base(), &gates());
        assert_eq!(middle.resolve("ra"), Some(&QuantityRecipe::direct("ra_old")));
    }

    #[test]
    fn base_is_untouched() {
        let base = base();
        let resolved = resolve_recipes(v("2.0"), &base, &gates());
        assert_ne!(resolved, base);
        assert_eq!(base.resolve("ra"), Some(&QuantityRecipe::direct("ra")));
        assert_eq!(resolve_recipes(v("3.0"), &base, &gates()), base);
    }

    #[test]
    fn resolution_is_deterministic() {
        for version in ["2.0", "2.1", "2.1.1", "3"] {
            let first = resolve_recipes(v(version), &base(), &gates());
            let second = resolve_recipes(v(version), &base(), &gates());
            assert_eq!(first, second, "version {}", version);
        }
    }
}
