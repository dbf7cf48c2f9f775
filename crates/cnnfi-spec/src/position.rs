//! Tensor positions and field validation

use crate::bits::BitWidth;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Dimensions of a weight or activation tensor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct TensorShape(Vec<usize>);

impl TensorShape {
    pub fn new(dims: Vec<usize>) -> Result<Self, ValidationError> {
        if dims.is_empty() || dims.contains(&0) {
            return Err(ValidationError::InvalidShape(dims));
        }
        Ok(Self(dims))
    }

    /// Built-in shapes that are non-empty and non-zero by construction
    pub(crate) fn from_known(dims: Vec<usize>) -> Self {
        debug_assert!(!dims.is_empty() && !dims.contains(&0));
        Self(dims)
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of addressable elements
    pub fn num_elements(&self) -> usize {
        self.0.iter().product()
    }

    /// All-zeros position of matching rank
    pub fn origin(&self) -> Position {
        Position(vec![0; self.rank()])
    }
}

impl TryFrom<Vec<usize>> for TensorShape {
    type Error = ValidationError;

    fn try_from(dims: Vec<usize>) -> Result<Self, Self::Error> {
        TensorShape::new(dims)
    }
}

impl From<TensorShape> for Vec<usize> {
    fn from(shape: TensorShape) -> Vec<usize> {
        shape.0
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "[{}]", dims.join(" x "))
    }
}

/// A coordinate known to be addressable within some [`TensorShape`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(Vec<usize>);

impl Position {
    /// Validate raw coordinates against `shape`
    pub fn checked(raw: &[i64], shape: &TensorShape) -> Result<Self, ValidationError> {
        if !validate_position(raw, shape) {
            return Err(ValidationError::InvalidPosition {
                position: raw.to_vec(),
                shape: shape.dims().to_vec(),
            });
        }
        Ok(Self(raw.iter().map(|&p| p as usize).collect()))
    }

    pub fn coords(&self) -> &[usize] {
        &self.0
    }

    pub fn to_raw(&self) -> Vec<i64> {
        self.0.iter().map(|&p| p as i64).collect()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let coords: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "({})", coords.join(", "))
    }
}

/// True iff `position` has the shape's rank and every axis is in bounds
pub fn validate_position(position: &[i64], shape: &TensorShape) -> bool {
    position.len() == shape.rank()
        && position
            .iter()
            .zip(shape.dims())
            .all(|(&p, &dim)| p >= 0 && (p as u64) < dim as u64)
}

/// True iff every index addresses a bit of `width`. Duplicates are allowed.
pub fn validate_bits(bit_indices: &[i64], width: BitWidth) -> bool {
    bit_indices.iter().all(|&i| width.contains(i))
}

/// Check that each of `required` is present in `entry`, not null, not an
/// empty string and not NaN. Fails on the first offending field.
pub fn required_fields_present(
    entry: &Map<String, Value>,
    required: &[&str],
) -> Result<(), ValidationError> {
    for &field in required {
        match entry.get(field) {
            None | Some(Value::Null) => {
                return Err(ValidationError::MissingField(field.to_string()))
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(ValidationError::EmptyField(field.to_string()))
            }
            Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("nan") => {
                return Err(ValidationError::NanField(field.to_string()))
            }
            Some(Value::Number(n)) if n.as_f64().is_some_and(f64::is_nan) => {
                return Err(ValidationError::NanField(field.to_string()))
            }
            Some(Value::Array(items)) if items.is_empty() => {
                return Err(ValidationError::EmptyField(field.to_string()))
            }
            Some(_) => {}
        }
    }
    Ok(())
}
