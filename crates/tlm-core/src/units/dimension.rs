//! Physical dimensions used to validate unit conversions.
//!
//! A dimension is a vector of integer exponents over the seven SI base
//! quantities. Two units can only be converted into one another when their
//! dimensions are identical.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exponents of the SI base quantities.
///
/// Radiative forcing (W/m²) is `M T⁻³`, a temperature difference is `Θ`
/// and a timestep is `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Dimension {
    /// Mass exponent (M)
    pub mass: i8,
    /// Length exponent (L)
    pub length: i8,
    /// Time exponent (T)
    pub time: i8,
    /// Temperature exponent (Θ)
    pub temperature: i8,
    /// Amount of substance exponent (N)
    pub amount: i8,
    /// Electric current exponent (I)
    pub current: i8,
    /// Luminous intensity exponent (J)
    pub luminosity: i8,
}

impl Dimension {
    /// A quantity without physical dimension (ratios, efficacies).
    #[must_use]
    pub const fn dimensionless() -> Self {
        Self::new(0, 0, 0, 0, 0, 0, 0)
    }

    #[must_use]
    pub const fn new(
        mass: i8,
        length: i8,
        time: i8,
        temperature: i8,
        amount: i8,
        current: i8,
        luminosity: i8,
    ) -> Self {
        Self {
            mass,
            length,
            time,
            temperature,
            amount,
            current,
            luminosity,
        }
    }

    pub const MASS: Self = Self::new(1, 0, 0, 0, 0, 0, 0);
    pub const LENGTH: Self = Self::new(0, 1, 0, 0, 0, 0, 0);
    pub const TIME: Self = Self::new(0, 0, 1, 0, 0, 0, 0);
    pub const TEMPERATURE: Self = Self::new(0, 0, 0, 1, 0, 0, 0);
    pub const AMOUNT: Self = Self::new(0, 0, 0, 0, 1, 0, 0);
    pub const CURRENT: Self = Self::new(0, 0, 0, 0, 0, 1, 0);
    pub const LUMINOSITY: Self = Self::new(0, 0, 0, 0, 0, 0, 1);

    /// Area (L²).
    pub const AREA: Self = Self::new(0, 2, 0, 0, 0, 0, 0);
    /// Energy (M L² T⁻²).
    pub const ENERGY: Self = Self::new(1, 2, -2, 0, 0, 0, 0);
    /// Power (M L² T⁻³).
    pub const POWER: Self = Self::new(1, 2, -3, 0, 0, 0, 0);
    /// Radiative flux (M T⁻³), the dimension of W/m².
    pub const RADIATIVE_FLUX: Self = Self::new(1, 0, -3, 0, 0, 0, 0);

    fn exponents(&self) -> [i8; 7] {
        [
            self.mass,
            self.length,
            self.time,
            self.temperature,
            self.amount,
            self.current,
            self.luminosity,
        ]
    }

    fn from_exponents(e: [i8; 7]) -> Self {
        Self::new(e[0], e[1], e[2], e[3], e[4], e[5], e[6])
    }

    fn combine(self, other: Self, op: impl Fn(i8, i8) -> Option<i8>) -> Option<Self> {
        let a = self.exponents();
        let b = other.exponents();
        let mut out = [0i8; 7];
        for i in 0..7 {
            out[i] = op(a[i], b[i])?;
        }
        Some(Self::from_exponents(out))
    }

    #[must_use]
    pub fn is_dimensionless(&self) -> bool {
        self.exponents().iter().all(|&e| e == 0)
    }

    /// Dimensions are compatible for conversion only when they are identical.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self == other
    }

    /// Raises the dimension to an integer power.
    ///
    /// Returns `None` if an exponent leaves the `i8` range.
    #[must_use]
    pub fn checked_pow(&self, exp: i8) -> Option<Self> {
        self.combine(Self::dimensionless(), |a, _| a.checked_mul(exp))
    }

    /// Product of two dimensions, `None` on exponent overflow.
    #[must_use]
    pub fn checked_mul(&self, rhs: &Self) -> Option<Self> {
        self.combine(*rhs, i8::checked_add)
    }

    /// Quotient of two dimensions, `None` on exponent overflow.
    #[must_use]
    pub fn checked_div(&self, rhs: &Self) -> Option<Self> {
        self.combine(*rhs, i8::checked_sub)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }

        let symbols = ["M", "L", "T", "Θ", "N", "I", "J"];
        let parts: Vec<String> = self
            .exponents()
            .iter()
            .zip(symbols)
            .filter(|(exp, _)| **exp != 0)
            .map(|(exp, sym)| match exp {
                1 => sym.to_string(),
                _ => format!("{sym}^{exp}"),
            })
            .collect();

        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensionless() {
        let dim = Dimension::dimensionless();
        assert!(dim.is_dimensionless());
        assert_eq!(dim.to_string(), "dimensionless");
    }

    #[test]
    fn test_radiative_flux_is_power_per_area() {
        assert_eq!(
            Dimension::POWER.checked_div(&Dimension::AREA),
            Some(Dimension::RADIATIVE_FLUX)
        );
    }

    #[test]
    fn test_power_is_energy_per_time() {
        assert_eq!(
            Dimension::ENERGY.checked_div(&Dimension::TIME),
            Some(Dimension::POWER)
        );
        assert_eq!(
            Dimension::POWER.checked_mul(&Dimension::TIME),
            Some(Dimension::ENERGY)
        );
    }

    #[test]
    fn test_pow() {
        assert_eq!(Dimension::LENGTH.checked_pow(2), Some(Dimension::AREA));
        assert_eq!(Dimension::TIME.checked_pow(-1).map(|d| d.time), Some(-1));
    }

    #[test]
    fn test_exponent_overflow() {
        // W is M L^2 T^-3
        assert_eq!(Dimension::POWER.checked_pow(50), None);
        let length_100 = Dimension::LENGTH.checked_pow(100).unwrap();
        assert_eq!(length_100.checked_mul(&length_100), None);
        assert_eq!(Dimension::TIME.checked_pow(-128).map(|d| d.time), Some(-128));
    }

    #[test]
    fn test_compatibility() {
        assert!(Dimension::TEMPERATURE.is_compatible(&Dimension::TEMPERATURE));
        assert!(!Dimension::POWER.is_compatible(&Dimension::RADIATIVE_FLUX));
    }

    #[test]
    fn test_display() {
        assert_eq!(Dimension::RADIATIVE_FLUX.to_string(), "M T^-3");
        assert_eq!(Dimension::AREA.to_string(), "L^2");
        assert_eq!(Dimension::TEMPERATURE.to_string(), "Θ");
    }
}
