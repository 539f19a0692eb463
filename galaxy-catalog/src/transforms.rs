//! Transforms used by catalog recipes.
//!
//! All functions are pure and operate element-wise. Numeric transforms
//! accept float, int, or bool columns and always return floats.

use std::f64::consts::PI;

use crate::column::Column;
use crate::error::{CatalogError, Result};
use crate::recipe::Transform;

const RAD_TO_DEG: f64 = 180.0 / PI;
const ARCSEC_PER_DEG: f64 = 3600.0;

/// Coerces a 0/1 flag column to booleans (non-zero is `true`).
pub const TO_BOOL: Transform = Transform::unary("to_bool", to_bool);

/// Legacy arcsecond-valued coordinates to degrees.
pub const ARCSEC_TO_DEG: Transform = Transform::unary("arcsec_to_deg", arcsec_to_deg);

/// Position angle scaled by `(180/π)^2`, as the catalog documents it.
pub const POSITION_ANGLE: Transform = Transform::unary("position_angle", position_angle);

/// `e2 / tan(2 * pa * 180/π)` from (total ellipticity 2, position angle).
pub const ELLIPTICITY_1: Transform = Transform::binary("ellipticity_1", ellipticity_1);

fn numeric(transform: &'static str, column: &Column) -> Result<Vec<f64>> {
    column.to_f64_vec().ok_or_else(|| {
        CatalogError::transform(
            transform,
            format!("expected a numeric column, got {}", column.type_name()),
        )
    })
}

fn to_bool(column: &Column) -> Result<Column> {
    let flags = match column {
        Column::Bool(v) => v.clone(),
        Column::Int(v) => v.iter().map(|&x| x != 0).collect(),
        Column::Float(v) => v.iter().map(|&x| x != 0.0).collect(),
        Column::Text(_) => {
            return Err(CatalogError::transform(
                "to_bool",
                "cannot coerce a text column to booleans",
            ))
        }
    };
    Ok(Column::Bool(flags))
}

fn arcsec_to_deg(column: &Column) -> Result<Column> {
    let values = numeric("arcsec_to_deg", column)?;
    Ok(Column::Float(
        values.into_iter().map(|x| x / ARCSEC_PER_DEG).collect(),
    ))
}

fn position_angle(column: &Column) -> Result<Column> {
    let values = numeric("position_angle", column)?;
    Ok(Column::Float(
        values
            .into_iter()
            .map(|pa| pa * RAD_TO_DEG * RAD_TO_DEG)
            .collect(),
    ))
}

// The factor inside tan() is kept as the catalog documentation states it,
// even though it mixes radians and degrees.
fn ellipticity_1(ellipticity_2: &Column, position_angle: &Column) -> Result<Column> {
    let e2 = numeric("ellipticity_1", ellipticity_2)?;
    let pa = numeric("ellipticity_1", position_angle)?;
    if e2.len() != pa.len() {
        return Err(CatalogError::transform(
            "ellipticity_1",
            format!("source lengths differ: {} vs {}", e2.len(), pa.len()),
        ));
    }
    Ok(Column::Float(
        e2.iter()
            .zip(&pa)
            .map(|(e, p)| e / (2.0 * p * RAD_TO_DEG).tan())
            .collect(),
    ))
}
