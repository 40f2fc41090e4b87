//! Physical units for model inputs and outputs.
//!
//! Unit strings are parsed against an explicit [`UnitRegistry`] into
//! [`Unit`]s that know their [`Dimension`] and SI factor. Values are carried
//! around as [`Quantity`]s and converted explicitly; converting between
//! units of different dimensions is an error, never a silent coercion.
//!
//! ```
//! use tlm_core::units::UnitRegistry;
//!
//! let registry = UnitRegistry::new();
//! let forcing = registry.quantity(2.0e-3, "kW/m^2").unwrap();
//! let w_m2 = registry.parse("W/m^2").unwrap();
//! assert!((forcing.magnitude_in(&w_m2).unwrap() - 2.0).abs() < 1e-12);
//!
//! // Total power is not a flux
//! let watts = registry.parse("W").unwrap();
//! assert!(!watts.is_compatible(&w_m2));
//! ```
//!
//! # Supported syntax
//!
//! | Notation | Meaning |
//! |----------|---------|
//! | `m^2`, `m**2`, `m2` | Square metres |
//! | `W/m^2`, `W m^-2`, `W per m^2` | Watts per square metre |
//! | `kg m`, `kg*m`, `kg·m` | Kilogram-metres |
//! | `W/m^2/delta_degC` | Feedback parameter |

pub mod conversion;
pub mod dimension;
pub mod parser;
pub mod quantity;
pub mod registry;

pub use conversion::Unit;
pub use dimension::Dimension;
pub use parser::ParsedUnit;
pub use quantity::{Magnitude, Quantity};
pub use registry::{UnitInfo, UnitRegistry};

use thiserror::Error;

/// Errors raised while parsing or converting units.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("empty unit string")]
    EmptyUnit,
    #[error("unknown unit: '{0}'")]
    UnknownUnit(String),
    #[error("invalid exponent: '{0}'")]
    InvalidExponent(String),
    #[error("failed to parse unit '{input}': {reason}")]
    Parse { input: String, reason: String },
    #[error(
        "cannot convert from '{from_unit}' to '{to_unit}': incompatible dimensions ({from} vs {to})"
    )]
    IncompatibleDimensions {
        from: Dimension,
        to: Dimension,
        from_unit: String,
        to_unit: String,
    },
    #[error("unit of '{variable}' is not unique, found: {found:?}")]
    NotUnique { variable: String, found: Vec<String> },
}
