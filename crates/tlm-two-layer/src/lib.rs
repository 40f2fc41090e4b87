//! Two-layer energy balance model.
//!
//! An upper ocean layer in contact with the atmosphere exchanges heat with a
//! lower, deep ocean layer. Given a radiative forcing timeseries the model
//! produces the temperature of both layers and the ocean heat uptake.
//!
//! - [`parameters`]: physical parameters and their TOML configuration
//! - [`engine`]: the per-step numerical solution
//! - [`model`]: a single run with `set_drivers`, `reset`, `run` and `step`
//! - [`scenarios`]: batch runs over a labelled multi-scenario dataset

pub mod engine;
pub mod model;
pub mod parameters;
pub mod scenarios;

pub use model::{DriverSeries, TwoLayerModel};
pub use parameters::TwoLayerParameters;
pub use scenarios::{ScenarioRunner, DEFAULT_DRIVER_VAR};
