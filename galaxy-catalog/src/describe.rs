//! Best-effort metadata for catalog quantities.
//!
//! Only passthrough quantities have metadata: the attributes stored next to
//! the native column. A quantity computed by a transform has no knowable
//! units, so it is reported as [`QuantityInfo::UnitsUnknown`] and a warning
//! is logged; that outcome is not an error.

use log::warn;

use crate::column::AttrValue;
use crate::error::Result;
use crate::recipe::{QuantityRecipe, Registry};
use crate::store::{Attributes, Hierarchy};
use crate::walker::NativeWalker;

/// Description text that files use to mean "no description".
pub const NO_DESCRIPTION: &str = "None given";

/// Attributes stored alongside a native column.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeInfo {
    path: String,
    attributes: Attributes,
}

impl NativeInfo {
    fn new(path: String, mut attributes: Attributes) -> Self {
        if attributes.get("description").and_then(AttrValue::as_str) == Some(NO_DESCRIPTION) {
            attributes.remove("description");
        }
        Self { path, attributes }
    }

    /// Store path the metadata was read from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn units(&self) -> Option<&str> {
        self.get("units")
            .or_else(|| self.get("unit"))
            .and_then(AttrValue::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.get("description").and_then(AttrValue::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuantityInfo {
    Native(NativeInfo),
    /// The quantity is computed by a transform of native columns.
    UnitsUnknown,
    /// Nothing is stored at the quantity's native path.
    NotFound,
}

impl QuantityInfo {
    pub fn native(&self) -> Option<&NativeInfo> {
        match self {
            QuantityInfo::Native(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, QuantityInfo::Native(_))
    }
}

/// Looks up metadata for `quantity`.
///
/// Names without a recipe are treated as native paths. In a partitioned
/// file the first partition that stores the column supplies its metadata.
pub(crate) fn describe<H: Hierarchy + ?Sized>(
    registry: &Registry,
    walker: &NativeWalker,
    store: &H,
    quantity: &str,
) -> Result<QuantityInfo> {
    let native = match registry.resolve(quantity) {
        Some(QuantityRecipe::Derived(recipe)) => {
            warn!(
                "{} is composed by {} from native quantities; its units are unknown",
                quantity,
                recipe.transform().name()
            );
            return Ok(QuantityInfo::UnitsUnknown);
        }
        Some(QuantityRecipe::Direct(path)) => path.as_str(),
        None => quantity,
    };

    let Some(path) = walker.metadata_path(store, native)? else {
        return Ok(QuantityInfo::NotFound);
    };
    if !store.contains(&path) {
        return Ok(QuantityInfo::NotFound);
    }
    let attributes = store.attributes(&path)?;
    Ok(QuantityInfo::Native(NativeInfo::new(path, attributes)))
}
