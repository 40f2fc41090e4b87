//! Magnitudes tagged with a unit.

use super::conversion::Unit;
use super::UnitError;
use crate::timeseries::FloatValue;
use ndarray::Array1;
use num::Float;
use std::fmt;

/// Something that can be carried by a [`Quantity`]: a scalar or a series.
pub trait Magnitude: Clone {
    /// Multiplies every element by `factor`.
    #[must_use]
    fn scale(&self, factor: FloatValue) -> Self;

    /// Returns true if no element is NaN or infinite.
    fn all_finite(&self) -> bool;
}

impl Magnitude for FloatValue {
    fn scale(&self, factor: FloatValue) -> Self {
        self * factor
    }

    fn all_finite(&self) -> bool {
        self.is_finite()
    }
}

impl Magnitude for Array1<FloatValue> {
    fn scale(&self, factor: FloatValue) -> Self {
        self * factor
    }

    fn all_finite(&self) -> bool {
        self.iter().all(|v| v.is_finite())
    }
}

/// A physical quantity.
///
/// Conversion is always explicit: there is no arithmetic between
/// quantities of different units, callers convert with [`Quantity::to`]
/// first.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity<M = FloatValue> {
    magnitude: M,
    unit: Unit,
}

impl<M: Magnitude> Quantity<M> {
    pub fn new(magnitude: M, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    pub fn magnitude(&self) -> &M {
        &self.magnitude
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn into_parts(self) -> (M, Unit) {
        (self.magnitude, self.unit)
    }

    /// Converts the quantity into `target`.
    ///
    /// # Errors
    ///
    /// [`UnitError::IncompatibleDimensions`] if `target` measures something else.
    pub fn to(&self, target: &Unit) -> Result<Self, UnitError> {
        Ok(Self::new(self.magnitude_in(target)?, target.clone()))
    }

    /// The magnitude expressed in `target`.
    pub fn magnitude_in(&self, target: &Unit) -> Result<M, UnitError> {
        let factor = self.unit.conversion_factor(target)?;
        if factor == 1.0 {
            Ok(self.magnitude.clone())
        } else {
            Ok(self.magnitude.scale(factor))
        }
    }
}

impl Quantity<FloatValue> {
    /// Compares two scalar quantities after converting `other` into this
    /// quantity's unit. Incompatible quantities are never equal.
    pub fn approx_eq(&self, other: &Self, rtol: FloatValue) -> bool {
        match other.magnitude_in(&self.unit) {
            Ok(value) => {
                let diff = (self.magnitude - value).abs();
                diff <= rtol * self.magnitude.abs().max(value.abs()) || diff < FloatValue::epsilon()
            }
            Err(_) => false,
        }
    }
}

impl fmt::Display for Quantity<FloatValue> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit)
    }
}
