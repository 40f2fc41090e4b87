//! Registry of known units.
//!
//! Every registered unit carries its [`Dimension`] and the factor that
//! converts a value in that unit into SI base units. Prefixed symbols
//! (`kW`, `GtC`, `km`) are resolved on lookup.
//!
//! There is no process-wide registry. Callers build one (usually once) and
//! hand it to whatever needs to parse units, typically behind an `Arc`
//! when it is shared between scenario runs.
//!
//! ```
//! use tlm_core::units::UnitRegistry;
//!
//! let registry = UnitRegistry::new();
//! let forcing = registry.parse("kW/m^2").unwrap();
//! let target = registry.parse("W/m^2").unwrap();
//! assert_eq!(forcing.conversion_factor(&target).unwrap(), 1000.0);
//! ```

use super::conversion::Unit;
use super::dimension::Dimension;
use super::parser::ParsedUnit;
use super::quantity::{Magnitude, Quantity};
use super::UnitError;
use std::collections::HashMap;

/// Seconds per year (365.25 days).
pub const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;
/// Seconds per month, defined as a twelfth of a year.
pub const SECONDS_PER_MONTH: f64 = SECONDS_PER_YEAR / 12.0;
pub const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;
pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Molecular weight ratio C/CO2 = 12/44.
pub const C_TO_CO2_RATIO: f64 = 12.0 / 44.0;

/// A registered unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInfo {
    pub symbol: String,
    pub dimension: Dimension,
    /// Multiplier taking a value in this unit to SI base units.
    pub to_si_factor: f64,
}

impl UnitInfo {
    fn new(symbol: &str, dimension: Dimension, to_si_factor: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            dimension,
            to_si_factor,
        }
    }
}

/// SI prefixes, longest symbol first so that `da` wins over `d`.
const SI_PREFIXES: &[(&str, f64)] = &[
    ("da", 1e1),
    ("Y", 1e24),
    ("Z", 1e21),
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
    ("a", 1e-18),
];

/// Known units and aliases, used to parse unit strings into [`Unit`]s.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    units: HashMap<String, UnitInfo>,
    aliases: HashMap<String, String>,
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitRegistry {
    /// Creates a registry populated with the units used by climate models.
    pub fn new() -> Self {
        let mut registry = Self {
            units: HashMap::new(),
            aliases: HashMap::new(),
        };
        registry.register_base_units();
        registry.register_time_units();
        registry.register_energy_units();
        registry.register_temperature_units();
        registry.register_carbon_units();
        registry.register_concentration_units();
        registry
    }

    /// Registers an additional unit.
    ///
    /// An existing unit with the same symbol is replaced.
    pub fn define(&mut self, symbol: &str, dimension: Dimension, to_si_factor: f64) -> &mut Self {
        self.units.insert(
            symbol.to_string(),
            UnitInfo::new(symbol, dimension, to_si_factor),
        );
        self
    }

    /// Registers an alternative spelling of an existing unit.
    pub fn alias(&mut self, alias: &str, canonical: &str) -> &mut Self {
        self.aliases
            .insert(alias.to_string(), canonical.to_string());
        self
    }

    /// Looks up a unit symbol, resolving aliases and SI prefixes.
    pub fn lookup(&self, symbol: &str) -> Option<UnitInfo> {
        if let Some(info) = self.lookup_exact(symbol) {
            return Some(info.clone());
        }

        SI_PREFIXES.iter().find_map(|(prefix, factor)| {
            let base = symbol.strip_prefix(prefix)?;
            let info = self.lookup_exact(base)?;
            Some(UnitInfo {
                symbol: symbol.to_string(),
                dimension: info.dimension,
                to_si_factor: info.to_si_factor * factor,
            })
        })
    }

    fn lookup_exact(&self, symbol: &str) -> Option<&UnitInfo> {
        self.units.get(symbol).or_else(|| {
            self.aliases
                .get(symbol)
                .and_then(|canonical| self.units.get(canonical))
        })
    }

    /// Returns true if the symbol resolves to a known unit.
    pub fn contains(&self, symbol: &str) -> bool {
        self.lookup(symbol).is_some()
    }

    /// Parses a unit string and resolves it against this registry.
    ///
    /// # Errors
    ///
    /// Returns a [`UnitError`] if the string is malformed or refers to an
    /// unknown unit.
    pub fn parse(&self, input: &str) -> Result<Unit, UnitError> {
        let parsed = ParsedUnit::parse(input, self)?;
        let (dimension, to_si_factor) = parsed.resolve(self)?;
        Ok(Unit::new(input, parsed, dimension, to_si_factor))
    }

    /// Builds a quantity from a magnitude and a unit string.
    pub fn quantity<M: Magnitude>(&self, magnitude: M, unit: &str) -> Result<Quantity<M>, UnitError> {
        Ok(Quantity::new(magnitude, self.parse(unit)?))
    }

    fn register_base_units(&mut self) {
        self.define("kg", Dimension::MASS, 1.0)
            .define("g", Dimension::MASS, 1e-3)
            .define("t", Dimension::MASS, 1e3)
            .define("m", Dimension::LENGTH, 1.0)
            .define("s", Dimension::TIME, 1.0)
            .define("K", Dimension::TEMPERATURE, 1.0)
            .define("mol", Dimension::AMOUNT, 1.0)
            .define("A", Dimension::CURRENT, 1.0)
            .define("cd", Dimension::LUMINOSITY, 1.0)
            .define("1", Dimension::dimensionless(), 1.0)
            .alias("dimensionless", "1");
    }

    fn register_time_units(&mut self) {
        self.define("yr", Dimension::TIME, SECONDS_PER_YEAR)
            .define("month", Dimension::TIME, SECONDS_PER_MONTH)
            .define("day", Dimension::TIME, SECONDS_PER_DAY)
            .define("h", Dimension::TIME, SECONDS_PER_HOUR)
            .define("min", Dimension::TIME, SECONDS_PER_MINUTE)
            .alias("year", "yr")
            .alias("years", "yr")
            .alias("a", "yr")
            .alias("months", "month")
            .alias("days", "day")
            .alias("hour", "h")
            .alias("hours", "h")
            .alias("sec", "s");
    }

    fn register_energy_units(&mut self) {
        self.define("J", Dimension::ENERGY, 1.0)
            .define("W", Dimension::POWER, 1.0);
    }

    /// Celsius units are registered as temperature differences.
    fn register_temperature_units(&mut self) {
        self.define("degC", Dimension::TEMPERATURE, 1.0)
            .define("delta_degC", Dimension::TEMPERATURE, 1.0)
            .alias("celsius", "degC")
            .alias("deg_C", "degC");
    }

    /// Carbon and CO2 share the mass dimension; CO2 is scaled by 12/44 so
    /// both convert through kilograms of carbon.
    fn register_carbon_units(&mut self) {
        self.define("C", Dimension::MASS, 1.0)
            .define("tC", Dimension::MASS, 1e3)
            .define("MtC", Dimension::MASS, 1e9)
            .define("GtC", Dimension::MASS, 1e12)
            .define("CO2", Dimension::MASS, C_TO_CO2_RATIO)
            .define("tCO2", Dimension::MASS, 1e3 * C_TO_CO2_RATIO)
            .define("MtCO2", Dimension::MASS, 1e9 * C_TO_CO2_RATIO)
            .define("GtCO2", Dimension::MASS, 1e12 * C_TO_CO2_RATIO);
    }

    fn register_concentration_units(&mut self) {
        self.define("ppm", Dimension::dimensionless(), 1e-6)
            .define("ppb", Dimension::dimensionless(), 1e-9)
            .define("ppt", Dimension::dimensionless(), 1e-12);
    }
}
