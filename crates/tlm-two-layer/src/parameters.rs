//! Two-layer Model Parameters
//!
//! Physical constants of the two-layer energy balance model. Values are
//! stored in canonical units; [`TwoLayerParameters::set_quantity`] converts
//! from any compatible unit.

use serde::{Deserialize, Serialize};
use tlm_core::errors::{TLMError, TLMResult};
use tlm_core::timeseries::FloatValue;
use tlm_core::units::registry::SECONDS_PER_YEAR;
use tlm_core::units::{Quantity, UnitRegistry};

/// Density of sea water (kg/m^3).
pub const DENSITY_WATER: FloatValue = 1000.0;

/// Specific heat capacity of sea water (J/kg/delta_degC).
pub const HEAT_CAPACITY_WATER: FloatValue = 4181.0;

/// Names and canonical units of the configurable parameters.
pub const PARAMETER_UNITS: [(&str, &str); 6] = [
    ("du", "m"),
    ("dl", "m"),
    ("lambda0", "W/m^2/delta_degC"),
    ("a", "W/m^2/delta_degC^2"),
    ("efficacy", "dimensionless"),
    ("eta", "W/m^2/delta_degC"),
];

/// Parameters for the two-layer model.
///
/// An upper (mixed) ocean layer exchanges heat with the atmosphere and with
/// a lower (deep) ocean layer:
///
/// $$ C_u \frac{dT_u}{dt} = F - (\lambda_0 - a T_u) T_u - \epsilon \eta (T_u - T_l) $$
/// $$ C_l \frac{dT_l}{dt} = \eta (T_u - T_l) $$
///
/// Missing fields take their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoLayerParameters {
    /// Depth of the upper ocean layer (m).
    /// Default: 50.0
    pub du: FloatValue,

    /// Depth of the lower ocean layer (m).
    /// Default: 1200.0
    pub dl: FloatValue,

    /// Linear climate feedback parameter (W/m^2/delta_degC).
    /// Default: 3.74 / 3.0
    pub lambda0: FloatValue,

    /// State-dependent feedback coefficient (W/m^2/delta_degC^2).
    /// The effective feedback is `lambda0 - a * T_u`.
    /// Default: 0.0
    pub a: FloatValue,

    /// Efficacy of ocean heat uptake (dimensionless).
    /// Default: 1.0
    pub efficacy: FloatValue,

    /// Heat transport efficiency between the layers (W/m^2/delta_degC).
    /// Default: 0.8
    pub eta: FloatValue,
}

impl Default for TwoLayerParameters {
    fn default() -> Self {
        Self {
            du: 50.0,
            dl: 1200.0,
            lambda0: 3.74 / 3.0,
            a: 0.0,
            efficacy: 1.0,
            eta: 0.8,
        }
    }
}

impl TwoLayerParameters {
    /// Parses parameters from TOML. Missing keys keep their defaults.
    ///
    /// ```
    /// use tlm_two_layer::parameters::TwoLayerParameters;
    ///
    /// let parameters = TwoLayerParameters::from_toml_str("eta = 0.7\ndu = 60.0").unwrap();
    /// assert_eq!(parameters.eta, 0.7);
    /// assert_eq!(parameters.dl, 1200.0);
    /// ```
    pub fn from_toml_str(config: &str) -> TLMResult<Self> {
        let parameters: Self =
            toml::from_str(config).map_err(|e| TLMError::Config(e.to_string()))?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn to_toml_string(&self) -> TLMResult<String> {
        toml::to_string(self).map_err(|e| TLMError::Config(e.to_string()))
    }

    /// Checks that the parameters describe a physical system.
    ///
    /// # Errors
    ///
    /// [`TLMError::InvalidParameter`] if a depth, `eta` or `efficacy` is not
    /// strictly positive, or any value is not finite.
    pub fn validate(&self) -> TLMResult<()> {
        let strictly_positive = [
            ("du", self.du),
            ("dl", self.dl),
            ("efficacy", self.efficacy),
            ("eta", self.eta),
        ];
        for (name, value) in strictly_positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(TLMError::InvalidParameter {
                    name: name.to_string(),
                    reason: format!("must be finite and strictly positive, got {value}"),
                });
            }
        }
        for (name, value) in [("lambda0", self.lambda0), ("a", self.a)] {
            if !value.is_finite() {
                return Err(TLMError::InvalidParameter {
                    name: name.to_string(),
                    reason: format!("must be finite, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Sets a parameter from a quantity, converting to its canonical unit.
    ///
    /// # Errors
    ///
    /// - [`TLMError::UnknownParameter`] if `name` is not a parameter
    /// - [`TLMError::Unit`] if the quantity cannot be expressed in the
    ///   canonical unit
    /// - [`TLMError::InvalidParameter`] if the converted value fails validation
    pub fn set_quantity(
        &mut self,
        name: &str,
        value: &Quantity<FloatValue>,
        registry: &UnitRegistry,
    ) -> TLMResult<()> {
        let canonical = registry.parse(canonical_unit(name)?)?;
        let magnitude = value.magnitude_in(&canonical)?;

        let mut updated = self.clone();
        *updated.field_mut(name)? = magnitude;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// A parameter as a quantity in its canonical unit.
    pub fn get_quantity(&self, name: &str, registry: &UnitRegistry) -> TLMResult<Quantity<FloatValue>> {
        let value = match name {
            "du" => self.du,
            "dl" => self.dl,
            "lambda0" => self.lambda0,
            "a" => self.a,
            "efficacy" => self.efficacy,
            "eta" => self.eta,
            _ => return Err(TLMError::UnknownParameter(name.to_string())),
        };
        Ok(registry.quantity(value, canonical_unit(name)?)?)
    }

    fn field_mut(&mut self, name: &str) -> TLMResult<&mut FloatValue> {
        match name {
            "du" => Ok(&mut self.du),
            "dl" => Ok(&mut self.dl),
            "lambda0" => Ok(&mut self.lambda0),
            "a" => Ok(&mut self.a),
            "efficacy" => Ok(&mut self.efficacy),
            "eta" => Ok(&mut self.eta),
            _ => Err(TLMError::UnknownParameter(name.to_string())),
        }
    }

    /// Heat capacity of the upper layer (W yr/m^2/delta_degC).
    pub fn heat_capacity_upper(&self) -> FloatValue {
        layer_heat_capacity(self.du)
    }

    /// Heat capacity of the lower layer (W yr/m^2/delta_degC).
    pub fn heat_capacity_lower(&self) -> FloatValue {
        layer_heat_capacity(self.dl)
    }

    /// Fast and slow e-folding timescales (yr) of the linearised system.
    ///
    /// Returns `None` unless both modes decay, which requires `lambda0 > 0`.
    pub fn timescales(&self) -> Option<(FloatValue, FloatValue)> {
        let cu = self.heat_capacity_upper();
        let cl = self.heat_capacity_lower();
        let exchange = self.efficacy * self.eta;

        // Eigenvalues of [[-(lambda0 + eps eta)/cu, eps eta/cu], [eta/cl, -eta/cl]]
        let trace = -(self.lambda0 + exchange) / cu - self.eta / cl;
        let determinant = self.lambda0 * self.eta / (cu * cl);
        let discriminant = trace * trace - 4.0 * determinant;
        if determinant <= 0.0 || discriminant < 0.0 {
            return None;
        }

        let fast = (trace - discriminant.sqrt()) / 2.0;
        let slow = (trace + discriminant.sqrt()) / 2.0;
        (slow < 0.0).then(|| (-1.0 / fast, -1.0 / slow))
    }

    /// Equilibrium warming of both layers (delta_degC) under constant forcing.
    ///
    /// With `a != 0` this is the smaller root of `F = (lambda0 - a T) T`.
    /// Returns `None` when no stable equilibrium exists.
    pub fn equilibrium_warming(&self, forcing: FloatValue) -> Option<FloatValue> {
        if self.a == 0.0 {
            return (self.lambda0 > 0.0).then(|| forcing / self.lambda0);
        }
        let discriminant = self.lambda0 * self.lambda0 - 4.0 * self.a * forcing;
        if discriminant < 0.0 {
            return None;
        }
        let warming = (self.lambda0 - discriminant.sqrt()) / (2.0 * self.a);
        // The feedback must still be stabilising at the equilibrium
        (self.lambda0 - 2.0 * self.a * warming > 0.0).then_some(warming)
    }
}

fn canonical_unit(name: &str) -> TLMResult<&'static str> {
    PARAMETER_UNITS
        .iter()
        .find(|(parameter, _)| *parameter == name)
        .map(|(_, unit)| *unit)
        .ok_or_else(|| TLMError::UnknownParameter(name.to_string()))
}

fn layer_heat_capacity(depth: FloatValue) -> FloatValue {
    depth * DENSITY_WATER * HEAT_CAPACITY_WATER / SECONDS_PER_YEAR
}
