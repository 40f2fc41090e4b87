//! Timestepping for the two-layer model.
//!
//! Over a step of length `h` the forcing is taken to vary linearly from its
//! start-of-step value `F0` to its end-of-step value `F1`. With the
//! feedback frozen at its start-of-step value the layer temperatures then
//! obey a linear system, which is solved exactly by augmenting the state
//! with the forcing and its slope:
//!
//! ```text
//! z = [T_u, T_l, F, dF/dt]
//!
//!      | -(lambda + eps eta)/C_u   eps eta/C_u   1/C_u   0 |
//! M =  |  eta/C_l                 -eta/C_l       0       0 |
//!      |  0                        0             0       1 |
//!      |  0                        0             0       0 |
//!
//! z(h) = exp(M h) z(0)
//! ```
//!
//! The scheme is unconditionally stable and exact for piecewise-linear
//! forcing, so annual and monthly runs of a linear ramp agree at the points
//! they share.
//!
//! Heat uptake is the instantaneous energy imbalance at a time point, the
//! forcing minus the radiative response to the warming:
//!
//! ```text
//! N = F - (lambda0 - a T_u) T_u - (eps - 1) eta (T_u - T_l)
//! ```
//!
//! which equals the rate of heat storage `C_u dT_u/dt + C_l dT_l/dt`.

use crate::parameters::TwoLayerParameters;
use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};
use tlm_core::timeseries::{FloatValue, Time};

/// Temperatures of the two layers (delta_degC).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerState {
    pub temp_upper: FloatValue,
    pub temp_lower: FloatValue,
}

impl LayerState {
    pub fn new(temp_upper: FloatValue, temp_lower: FloatValue) -> Self {
        Self {
            temp_upper,
            temp_lower,
        }
    }
}

/// Outcome of advancing the state by one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub state: LayerState,
    /// Heat uptake at the end of the step (W/m^2).
    pub heat_uptake: FloatValue,
}

/// Exact one-step solution operator for a fixed feedback and step length.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagator {
    matrix: Matrix4<FloatValue>,
    delta_t: Time,
}

impl Propagator {
    /// Builds the propagator for feedback `lambda_eff` over `delta_t` years.
    pub fn new(parameters: &TwoLayerParameters, lambda_eff: FloatValue, delta_t: Time) -> Self {
        let cu = parameters.heat_capacity_upper();
        let cl = parameters.heat_capacity_lower();
        let exchange = parameters.efficacy * parameters.eta;

        #[rustfmt::skip]
        let system = Matrix4::new(
            -(lambda_eff + exchange) / cu, exchange / cu,        1.0 / cu, 0.0,
            parameters.eta / cl,           -parameters.eta / cl, 0.0,      0.0,
            0.0,                           0.0,                  0.0,      1.0,
            0.0,                           0.0,                  0.0,      0.0,
        );

        Self {
            matrix: (system * delta_t).exp(),
            delta_t,
        }
    }

    pub fn delta_t(&self) -> Time {
        self.delta_t
    }

    /// Advances `state` with forcing ramping from `forcing_start` to `forcing_end`.
    pub fn apply(
        &self,
        state: LayerState,
        forcing_start: FloatValue,
        forcing_end: FloatValue,
    ) -> LayerState {
        let slope = (forcing_end - forcing_start) / self.delta_t;
        let z = self.matrix
            * Vector4::new(state.temp_upper, state.temp_lower, forcing_start, slope);
        LayerState::new(z[0], z[1])
    }
}

/// Advances the two-layer state by a single step.
pub fn step(
    parameters: &TwoLayerParameters,
    state: LayerState,
    forcing_start: FloatValue,
    forcing_end: FloatValue,
    delta_t: Time,
) -> StepResult {
    let lambda_eff = parameters.lambda0 - parameters.a * state.temp_upper;
    let next = Propagator::new(parameters, lambda_eff, delta_t).apply(
        state,
        forcing_start,
        forcing_end,
    );
    StepResult {
        state: next,
        heat_uptake: heat_uptake(parameters, next, forcing_end),
    }
}

/// Net energy flux into both layers (W/m^2) for `state` under `forcing`.
pub fn heat_uptake(parameters: &TwoLayerParameters, state: LayerState, forcing: FloatValue) -> FloatValue {
    let lambda_eff = parameters.lambda0 - parameters.a * state.temp_upper;
    forcing
        - lambda_eff * state.temp_upper
        - (parameters.efficacy - 1.0) * parameters.eta * (state.temp_upper - state.temp_lower)
}

/// Steps a run with a fixed timestep.
///
/// With a constant feedback (`a == 0`) the propagator only depends on the
/// timestep and is built once.
#[derive(Debug, Clone)]
pub struct TwoLayerIntegrator {
    parameters: TwoLayerParameters,
    delta_t: Time,
    linear: Option<Propagator>,
}

impl TwoLayerIntegrator {
    pub fn new(parameters: TwoLayerParameters, delta_t: Time) -> Self {
        let linear = (parameters.a == 0.0).then(|| {
            log::debug!("Building constant propagator for delta_t={delta_t} yr");
            Propagator::new(&parameters, parameters.lambda0, delta_t)
        });
        Self {
            parameters,
            delta_t,
            linear,
        }
    }

    pub fn delta_t(&self) -> Time {
        self.delta_t
    }

    pub fn parameters(&self) -> &TwoLayerParameters {
        &self.parameters
    }

    pub fn step(
        &self,
        state: LayerState,
        forcing_start: FloatValue,
        forcing_end: FloatValue,
    ) -> StepResult {
        match &self.linear {
            Some(propagator) => {
                let next = propagator.apply(state, forcing_start, forcing_end);
                StepResult {
                    state: next,
                    heat_uptake: heat_uptake(&self.parameters, next, forcing_end),
                }
            }
            None => step(
                &self.parameters,
                state,
                forcing_start,
                forcing_end,
                self.delta_t,
            ),
        }
    }
}
