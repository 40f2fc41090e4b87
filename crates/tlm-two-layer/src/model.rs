//! A single run of the two-layer model.
//!
//! ```
//! use std::sync::Arc;
//! use ndarray::Array1;
//! use tlm_core::timeseries::TimeAxis;
//! use tlm_core::units::UnitRegistry;
//! use tlm_two_layer::model::{DriverSeries, TwoLayerModel};
//! use tlm_two_layer::parameters::TwoLayerParameters;
//!
//! let registry = Arc::new(UnitRegistry::new());
//! let mut model = TwoLayerModel::new(TwoLayerParameters::default(), registry.clone()).unwrap();
//!
//! let time_axis = TimeAxis::annual(1750, 1850);
//! let forcing = registry
//!     .quantity(Array1::linspace(0.0, 4.0, time_axis.len()), "W/m^2")
//!     .unwrap();
//! model.set_drivers(DriverSeries::new(forcing, time_axis).unwrap()).unwrap();
//! model.run().unwrap();
//!
//! assert_eq!(model.temp_upper().len(), 101);
//! assert!(model.temp_upper()[100] > model.temp_lower()[100]);
//! ```

use crate::engine::{heat_uptake, LayerState, TwoLayerIntegrator};
use crate::parameters::TwoLayerParameters;
use ndarray::{Array1, ArrayView1};
use std::sync::Arc;
use tlm_core::errors::{TLMError, TLMResult};
use tlm_core::timeseries::{FloatValue, Time, TimeAxis};
use tlm_core::units::{Magnitude, Quantity, UnitRegistry};

/// Unit in which forcing is integrated.
pub const FORCING_UNIT: &str = "W/m^2";
/// Unit of the layer temperatures.
pub const TEMPERATURE_UNIT: &str = "delta_degC";
/// Unit of the heat uptake.
pub const HEAT_UPTAKE_UNIT: &str = "W/m^2";

const STEP_TOLERANCE: Time = 1e-6;

/// Forcing values and the time points they apply to.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSeries {
    forcing: Quantity<Array1<FloatValue>>,
    time_axis: TimeAxis,
}

impl DriverSeries {
    /// # Errors
    ///
    /// [`TLMError::ShapeMismatch`] if there is not one forcing value per
    /// time point.
    pub fn new(forcing: Quantity<Array1<FloatValue>>, time_axis: TimeAxis) -> TLMResult<Self> {
        if forcing.magnitude().len() != time_axis.len() {
            return Err(TLMError::ShapeMismatch {
                context: "driver series".to_string(),
                expected: time_axis.len(),
                actual: forcing.magnitude().len(),
            });
        }
        Ok(Self { forcing, time_axis })
    }

    pub fn forcing(&self) -> &Quantity<Array1<FloatValue>> {
        &self.forcing
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }
}

/// The timestep as a duration: `1 yr` for annual spacing, `1 month` for
/// monthly spacing, otherwise `step` years.
pub fn timestep_quantity(registry: &UnitRegistry, step: Time) -> TLMResult<Quantity<FloatValue>> {
    let quantity = if (step - 1.0).abs() < STEP_TOLERANCE {
        registry.quantity(1.0, "yr")?
    } else if (step - 1.0 / 12.0).abs() < STEP_TOLERANCE {
        registry.quantity(1.0, "month")?
    } else {
        registry.quantity(step, "yr")?
    };
    Ok(quantity)
}

/// Drivers after unit conversion, with everything derived from them.
#[derive(Debug, Clone)]
struct LoadedDrivers {
    /// Forcing in W/m^2
    erf: Array1<FloatValue>,
    time_axis: TimeAxis,
    delta_t: Quantity<FloatValue>,
    integrator: TwoLayerIntegrator,
}

#[derive(Debug, Clone, Default)]
struct ModelState {
    temp_upper: Vec<FloatValue>,
    temp_lower: Vec<FloatValue>,
    heat_uptake: Vec<FloatValue>,
}

impl ModelState {
    fn with_capacity(n: usize) -> Self {
        Self {
            temp_upper: Vec::with_capacity(n),
            temp_lower: Vec::with_capacity(n),
            heat_uptake: Vec::with_capacity(n),
        }
    }

    fn len(&self) -> usize {
        self.temp_upper.len()
    }

    fn push(&mut self, state: LayerState, heat_uptake: FloatValue) {
        self.temp_upper.push(state.temp_upper);
        self.temp_lower.push(state.temp_lower);
        self.heat_uptake.push(heat_uptake);
    }

    fn last(&self) -> Option<LayerState> {
        Some(LayerState::new(
            *self.temp_upper.last()?,
            *self.temp_lower.last()?,
        ))
    }
}

/// Two-layer model instance owning its parameters and run state.
///
/// Each entry of the output series corresponds to one driver time point.
/// The first entry is the initial state (zero temperatures, so the heat
/// uptake equals the initial forcing) and entry `i` is reached by stepping
/// from driver value `i - 1` to driver value `i`.
#[derive(Debug, Clone)]
pub struct TwoLayerModel {
    parameters: TwoLayerParameters,
    registry: Arc<UnitRegistry>,
    drivers: Option<LoadedDrivers>,
    state: ModelState,
}

impl TwoLayerModel {
    /// # Errors
    ///
    /// [`TLMError::InvalidParameter`] if the parameters fail validation.
    pub fn new(parameters: TwoLayerParameters, registry: Arc<UnitRegistry>) -> TLMResult<Self> {
        parameters.validate()?;
        Ok(Self {
            parameters,
            registry,
            drivers: None,
            state: ModelState::default(),
        })
    }

    pub fn parameters(&self) -> &TwoLayerParameters {
        &self.parameters
    }

    /// Sets the forcing that drives the model and clears any previous run.
    ///
    /// # Errors
    ///
    /// - [`TLMError::Unit`] if the forcing cannot be expressed in W/m^2
    /// - [`TLMError::InvalidTimeAxis`] if the time points are irregular or
    ///   fewer than two
    /// - [`TLMError::NonFiniteDriver`] if a forcing value is NaN or infinite
    pub fn set_drivers(&mut self, drivers: DriverSeries) -> TLMResult<()> {
        let forcing_unit = self.registry.parse(FORCING_UNIT)?;
        let erf = drivers.forcing.magnitude_in(&forcing_unit)?;

        let step = drivers.time_axis.regular_step()?;
        if !erf.all_finite() {
            let index = erf.iter().position(|v| !v.is_finite()).unwrap_or_default();
            return Err(TLMError::NonFiniteDriver { index });
        }
        let delta_t = timestep_quantity(&self.registry, step)?;
        log::debug!(
            "Set {} driver values ({}) with delta_t = {}",
            erf.len(),
            drivers.forcing.unit(),
            delta_t
        );

        self.drivers = Some(LoadedDrivers {
            erf,
            time_axis: drivers.time_axis,
            delta_t,
            integrator: TwoLayerIntegrator::new(self.parameters.clone(), step),
        });
        self.state = ModelState::default();
        Ok(())
    }

    fn loaded(&self) -> TLMResult<&LoadedDrivers> {
        self.drivers.as_ref().ok_or(TLMError::DriversNotSet)
    }

    /// Returns the model to its initial state, keeping the drivers.
    pub fn reset(&mut self) -> TLMResult<()> {
        let n = self.loaded()?.erf.len();
        self.state = ModelState::with_capacity(n);
        Ok(())
    }

    /// Advances the model by a single driver timestep.
    ///
    /// The first call after [`reset`](Self::reset) records the initial state.
    ///
    /// # Errors
    ///
    /// [`TLMError::DriversNotSet`] without drivers, [`TLMError::RunComplete`]
    /// once every driver timestep has been consumed.
    pub fn step(&mut self) -> TLMResult<()> {
        let drivers = self.drivers.as_ref().ok_or(TLMError::DriversNotSet)?;
        let i = self.state.len();
        if i >= drivers.erf.len() {
            return Err(TLMError::RunComplete);
        }

        match self.state.last() {
            None => {
                let initial = LayerState::default();
                let uptake = heat_uptake(&self.parameters, initial, drivers.erf[0]);
                self.state.push(initial, uptake);
            }
            Some(current) => {
                let result = drivers
                    .integrator
                    .step(current, drivers.erf[i - 1], drivers.erf[i]);
                self.state.push(result.state, result.heat_uptake);
            }
        }
        Ok(())
    }

    /// Runs the model over the whole driver series from its initial state.
    pub fn run(&mut self) -> TLMResult<()> {
        self.reset()?;
        let n = self.loaded()?.erf.len();
        while self.state.len() < n {
            self.step()?;
        }
        Ok(())
    }

    /// True once every driver timestep has been consumed.
    pub fn is_complete(&self) -> bool {
        self.drivers
            .as_ref()
            .is_some_and(|d| self.state.len() == d.erf.len())
    }

    /// Forcing in W/m^2, if drivers are set.
    pub fn erf(&self) -> Option<ArrayView1<FloatValue>> {
        self.drivers.as_ref().map(|d| d.erf.view())
    }

    pub fn time_axis(&self) -> Option<&TimeAxis> {
        self.drivers.as_ref().map(|d| &d.time_axis)
    }

    /// The timestep: `1 yr` for annual drivers, `1 month` for monthly ones.
    pub fn delta_t(&self) -> Option<&Quantity<FloatValue>> {
        self.drivers.as_ref().map(|d| &d.delta_t)
    }

    /// Upper layer temperature (delta_degC) for each completed timestep.
    pub fn temp_upper(&self) -> ArrayView1<FloatValue> {
        ArrayView1::from(self.state.temp_upper.as_slice())
    }

    /// Lower layer temperature (delta_degC) for each completed timestep.
    pub fn temp_lower(&self) -> ArrayView1<FloatValue> {
        ArrayView1::from(self.state.temp_lower.as_slice())
    }

    /// Heat uptake (W/m^2) for each completed timestep.
    pub fn heat_uptake(&self) -> ArrayView1<FloatValue> {
        ArrayView1::from(self.state.heat_uptake.as_slice())
    }

    pub fn temp_upper_quantity(&self) -> TLMResult<Quantity<Array1<FloatValue>>> {
        Ok(self
            .registry
            .quantity(self.temp_upper().to_owned(), TEMPERATURE_UNIT)?)
    }

    pub fn temp_lower_quantity(&self) -> TLMResult<Quantity<Array1<FloatValue>>> {
        Ok(self
            .registry
            .quantity(self.temp_lower().to_owned(), TEMPERATURE_UNIT)?)
    }

    pub fn heat_uptake_quantity(&self) -> TLMResult<Quantity<Array1<FloatValue>>> {
        Ok(self
            .registry
            .quantity(self.heat_uptake().to_owned(), HEAT_UPTAKE_UNIT)?)
    }
}
