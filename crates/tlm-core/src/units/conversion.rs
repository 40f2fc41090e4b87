//! Resolved units and conversion factors.
//!
//! ```
//! use tlm_core::units::UnitRegistry;
//!
//! let registry = UnitRegistry::new();
//! let u1 = registry.parse("W/m^2").unwrap();
//! let u2 = registry.parse("W / m ^ 2").unwrap();
//! assert_eq!(u1, u2);
//!
//! let yr = registry.parse("yr").unwrap();
//! let month = registry.parse("month").unwrap();
//! assert!((yr.convert_to(1.0, &month).unwrap() - 12.0).abs() < 1e-12);
//! ```

use super::dimension::Dimension;
use super::parser::ParsedUnit;
use super::UnitError;
use std::fmt;

/// A unit expression resolved against a [`UnitRegistry`](super::UnitRegistry).
///
/// The dimension and SI factor are fixed when the unit is parsed, so a
/// `Unit` never needs the registry again.
///
/// # Equality
///
/// Two units are equal if they have the same normalized representation,
/// so `W/m^2`, `W / m ^ 2` and `W m^-2` compare equal. `kW/m^2` and `W/m^2`
/// are compatible but not equal.
#[derive(Debug, Clone)]
pub struct Unit {
    original: String,
    parsed: ParsedUnit,
    dimension: Dimension,
    to_si_factor: f64,
}

impl Unit {
    pub(crate) fn new(
        original: &str,
        parsed: ParsedUnit,
        dimension: Dimension,
        to_si_factor: f64,
    ) -> Self {
        Self {
            original: original.trim().to_string(),
            parsed,
            dimension,
            to_si_factor,
        }
    }

    /// The string the unit was parsed from.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    #[must_use]
    pub fn normalized(&self) -> String {
        self.parsed.normalized()
    }

    #[must_use]
    pub fn parsed(&self) -> &ParsedUnit {
        &self.parsed
    }

    #[must_use]
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Multiplier taking a value in this unit to SI base units.
    #[must_use]
    pub fn to_si_factor(&self) -> f64 {
        self.to_si_factor
    }

    #[must_use]
    pub fn is_dimensionless(&self) -> bool {
        self.dimension.is_dimensionless()
    }

    /// Returns true if values in this unit can be converted to `other`.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.dimension.is_compatible(&other.dimension)
    }

    /// Multiplier taking a value in `self` to a value in `other`.
    ///
    /// # Errors
    ///
    /// [`UnitError::IncompatibleDimensions`] if the dimensions differ.
    pub fn conversion_factor(&self, other: &Self) -> Result<f64, UnitError> {
        if !self.is_compatible(other) {
            return Err(UnitError::IncompatibleDimensions {
                from: self.dimension,
                to: other.dimension,
                from_unit: self.original.clone(),
                to_unit: other.original.clone(),
            });
        }

        // value_other = value_self * (factor_self / factor_other)
        Ok(self.to_si_factor / other.to_si_factor)
    }

    pub fn convert_to(&self, value: f64, other: &Self) -> Result<f64, UnitError> {
        Ok(value * self.conversion_factor(other)?)
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.parsed == other.parsed
    }
}

impl Eq for Unit {}

impl std::hash::Hash for Unit {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized())
    }
}
