//! Native column values and partition-level attributes.
//!
//! A [`Column`] is the fully materialized contents of one data-bearing leaf.
//! An [`AttrValue`] is a scalar attribute stored on a group or a leaf (units,
//! descriptions, halo-wide quantities).

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Materialized values of a single native column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum Column {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Bool(Vec<bool>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Float(_) => "float",
            Column::Int(_) => "int",
            Column::Bool(_) => "bool",
            Column::Text(_) => "text",
        }
    }

    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            Column::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<&[i64]> {
        match self {
            Column::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&[bool]> {
        match self {
            Column::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view of the column, widening integers and booleans to `f64`.
    ///
    /// Returns `None` for text columns.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Column::Float(v) => Some(v.clone()),
            Column::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Column::Bool(v) => Some(v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect()),
            Column::Text(_) => None,
        }
    }

    /// First element as `f64`, for scalar metadata datasets.
    pub fn scalar_f64(&self) -> Option<f64> {
        match self {
            Column::Float(v) => v.first().copied(),
            Column::Int(v) => v.first().map(|&x| x as f64),
            _ => None,
        }
    }

    pub fn scalar_i64(&self) -> Option<i64> {
        match self {
            Column::Int(v) => v.first().copied(),
            Column::Float(v) => v.first().filter(|x| x.fract() == 0.0).map(|&x| x as i64),
            _ => None,
        }
    }

    /// Appends `other` in place. Both columns must hold the same element type.
    pub fn extend(&mut self, other: Column) -> Result<()> {
        match (self, other) {
            (Column::Float(a), Column::Float(b)) => a.extend(b),
            (Column::Int(a), Column::Int(b)) => a.extend(b),
            (Column::Bool(a), Column::Bool(b)) => a.extend(b),
            (Column::Text(a), Column::Text(b)) => a.extend(b),
            (this, other) => {
                return Err(CatalogError::TypeMismatch {
                    expected: this.type_name(),
                    actual: other.type_name(),
                })
            }
        }
        Ok(())
    }
}

impl From<Vec<f64>> for Column {
    fn from(v: Vec<f64>) -> Self {
        Column::Float(v)
    }
}

impl From<Vec<i64>> for Column {
    fn from(v: Vec<i64>) -> Self {
        Column::Int(v)
    }
}

impl From<Vec<bool>> for Column {
    fn from(v: Vec<bool>) -> Self {
        Column::Bool(v)
    }
}

/// Scalar attribute attached to a node of the hierarchical file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}
