//! Error types for catalog access.
//!
//! Every failure surfaces to the caller as a [`CatalogError`]; nothing is
//! downgraded to a default or empty value. The one non-fatal condition,
//! "units unknown for a derived quantity", is not an error at all and is
//! reported through [`QuantityInfo::UnitsUnknown`](crate::QuantityInfo::UnitsUnknown).
//!
//! # Error Categories
//!
//! | Variant | Raised when | Data error? |
//! |---------|-------------|-------------|
//! | [`VersionMismatch`](CatalogError::VersionMismatch) | stored and configured versions differ | No |
//! | [`UnknownQuantity`](CatalogError::UnknownQuantity) | canonical name not in the resolved registry | No |
//! | [`MissingColumn`](CatalogError::MissingColumn) | a recipe's native path is absent from the file | Yes |
//! | [`FilterUnsupported`](CatalogError::FilterUnsupported) | native filters given to a flat catalog | No |
//! | [`NotImplemented`](CatalogError::NotImplemented) | a partition cannot serve a column through its getter | Yes |
//! | [`MissingAttribute`](CatalogError::MissingAttribute) | a filter names an attribute the partition lacks | Yes |

use std::path::PathBuf;

use thiserror::Error;

use crate::version::CatalogVersion;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// The file declares a different schema version than the caller expects.
    #[error("Catalog file version {catalog} does not match config version {config}")]
    VersionMismatch {
        catalog: CatalogVersion,
        config: CatalogVersion,
    },

    #[error("Invalid catalog version string: {0:?}")]
    InvalidVersion(String),

    #[error("Unknown quantity: {0}")]
    UnknownQuantity(String),

    #[error("Native column not found: {path}")]
    MissingColumn { path: String },

    /// Flat catalogs have a single implicit partition and nothing to filter on.
    #[error("Native filters are not supported by this catalog layout")]
    FilterUnsupported,

    /// The column may exist, but not through this partition's access path.
    #[error("Partition {partition} cannot serve native column {column}")]
    NotImplemented { partition: String, column: String },

    #[error("Partition {partition} has no attribute {attribute}")]
    MissingAttribute { partition: String, attribute: String },

    #[error("Transform {transform} expects {expected} source column(s), got {got}")]
    ArityMismatch {
        transform: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Transform {transform} failed: {message}")]
    Transform {
        transform: &'static str,
        message: String,
    },

    #[error("Column type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Catalog file {0:?} does not exist")]
    CatalogNotFound(PathBuf),

    /// Failure reported by the hierarchical-file collaborator.
    #[error("Store error at {path}: {message}")]
    Store { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    pub fn transform(transform: &'static str, message: impl Into<String>) -> Self {
        Self::Transform {
            transform,
            message: message.into(),
        }
    }

    pub fn store(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for failures shaped by what is (or is not) stored in the
    /// file, as opposed to a bad request or a bad configuration.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. }
                | Self::NotImplemented { .. }
                | Self::MissingAttribute { .. }
                | Self::Store { .. }
                | Self::Io(_)
                | Self::Json(_)
        )
    }
}
