//! Runs the two-layer model over every scenario of a dataset.
//!
//! Each scenario is driven by its global (`World`) timeseries of the driver
//! variable. Scenarios are validated up front, run as independent tasks in
//! parallel and reassembled in order of first appearance, so any failure
//! aborts the batch without partial output.

use crate::model::{
    timestep_quantity, DriverSeries, TwoLayerModel, FORCING_UNIT, HEAT_UPTAKE_UNIT,
    TEMPERATURE_UNIT,
};
use crate::parameters::TwoLayerParameters;
use ndarray::{stack, Array1, ArrayView1, Axis};
use rayon::prelude::*;
use std::sync::Arc;
use tlm_core::dataset::{
    LabeledTimeseries, MetaFilter, Metadata, CLIMATE_MODEL, REGION, SCENARIO, UNIT, VARIABLE,
};
use tlm_core::errors::{TLMError, TLMResult};
use tlm_core::timeseries::{FloatValue, TimeAxis};
use tlm_core::units::{Quantity, Unit, UnitError, UnitRegistry};

/// Variable driving the model unless another is requested.
pub const DEFAULT_DRIVER_VAR: &str = "Effective Radiative Forcing";
/// Region whose driver timeseries is used.
pub const WORLD_REGION: &str = "World";
/// `climate_model` label of the model outputs.
pub const CLIMATE_MODEL_NAME: &str = "two_layer";

pub const TEMP_UPPER_VARIABLE: &str = "Surface Temperature|Upper";
pub const TEMP_LOWER_VARIABLE: &str = "Surface Temperature|Lower";
pub const HEAT_UPTAKE_VARIABLE: &str = "Heat Uptake";

/// Everything needed to run one scenario, detached from the input dataset.
#[derive(Debug, Clone)]
struct ScenarioTask {
    scenario: String,
    driver_metadata: Metadata,
    driver_values: Array1<FloatValue>,
    driver_unit: Unit,
}

#[derive(Debug, Clone)]
struct ScenarioOutput {
    temp_upper: Array1<FloatValue>,
    temp_lower: Array1<FloatValue>,
    heat_uptake: Array1<FloatValue>,
}

/// Runs the two-layer model for each scenario of a labelled dataset.
///
/// The parameters and unit registry are shared read-only by every
/// scenario; each scenario gets its own [`TwoLayerModel`].
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    parameters: TwoLayerParameters,
    registry: Arc<UnitRegistry>,
}

impl Default for ScenarioRunner {
    fn default() -> Self {
        Self {
            parameters: TwoLayerParameters::default(),
            registry: Arc::new(UnitRegistry::new()),
        }
    }
}

impl ScenarioRunner {
    /// # Errors
    ///
    /// [`TLMError::InvalidParameter`] if the parameters fail validation.
    pub fn new(parameters: TwoLayerParameters, registry: Arc<UnitRegistry>) -> TLMResult<Self> {
        parameters.validate()?;
        Ok(Self {
            parameters,
            registry,
        })
    }

    pub fn parameters(&self) -> &TwoLayerParameters {
        &self.parameters
    }

    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.registry
    }

    /// The timestep every scenario of `dataset` is run with, as reported by
    /// [`TwoLayerModel::delta_t`].
    ///
    /// # Errors
    ///
    /// [`TLMError::InvalidTimeAxis`] if the time points are irregular or
    /// fewer than two.
    pub fn delta_t<D: LabeledTimeseries>(&self, dataset: &D) -> TLMResult<Quantity<FloatValue>> {
        let step = dataset.time_axis().regular_step()?;
        timestep_quantity(&self.registry, step)
    }

    /// Runs every scenario driven by [`DEFAULT_DRIVER_VAR`].
    pub fn run_scenarios_default<D: LabeledTimeseries>(&self, dataset: &D) -> TLMResult<D> {
        self.run_scenarios(dataset, DEFAULT_DRIVER_VAR)
    }

    /// Runs every scenario in `dataset` driven by `driver_var`.
    ///
    /// The output holds, per scenario, the driver timeseries as given plus
    /// upper and lower layer temperatures (delta_degC) and heat uptake
    /// (W/m^2) on the input time axis. Outputs keep the driver row's
    /// metadata with `climate_model` set to [`CLIMATE_MODEL_NAME`].
    ///
    /// # Errors
    ///
    /// - [`TLMError::MissingDriver`] if a scenario has no `World` timeseries
    ///   of `driver_var`
    /// - [`TLMError::Unit`] if the driver unit is ambiguous, unknown or not
    ///   convertible to W/m^2
    /// - any error raised while running a scenario
    pub fn run_scenarios<D: LabeledTimeseries>(&self, dataset: &D, driver_var: &str) -> TLMResult<D> {
        let groups = dataset.groupby(SCENARIO)?;
        if groups.is_empty() {
            return Err(missing_driver(driver_var));
        }
        log::info!(
            "Running {} scenario(s) driven by `{driver_var}` over {} time points",
            groups.len(),
            dataset.time_axis().len()
        );

        let tasks = groups
            .iter()
            .map(|(scenario, group)| self.prepare(scenario, group, driver_var))
            .collect::<TLMResult<Vec<_>>>()?;

        let time_axis = dataset.time_axis();
        let outputs = tasks
            .par_iter()
            .map(|task| self.run_task(task, time_axis))
            .collect::<TLMResult<Vec<_>>>()?;

        self.assemble(&tasks, &outputs, time_axis)
    }

    fn prepare<D: LabeledTimeseries>(
        &self,
        scenario: &str,
        group: &D,
        driver_var: &str,
    ) -> TLMResult<ScenarioTask> {
        let variable_rows = group.filter(&MetaFilter::new().field(VARIABLE, driver_var))?;
        let drivers = variable_rows.filter(&MetaFilter::new().field(REGION, WORLD_REGION))?;
        if drivers.is_empty() {
            return Err(missing_driver(driver_var));
        }
        if drivers.len() < variable_rows.len() {
            log::warn!(
                "Ignoring {} non-{WORLD_REGION} `{driver_var}` timeseries in scenario `{scenario}`",
                variable_rows.len() - drivers.len()
            );
        }

        let units = drivers.meta_values(UNIT);
        let unit_name = match units.as_slice() {
            [unit] => unit,
            _ => {
                return Err(UnitError::NotUnique {
                    variable: driver_var.to_string(),
                    found: units.clone(),
                }
                .into())
            }
        };
        let driver_unit = self.registry.parse(unit_name)?;
        driver_unit.conversion_factor(&self.registry.parse(FORCING_UNIT)?)?;

        let driver_values = drivers.single_timeseries()?.to_owned();
        Ok(ScenarioTask {
            scenario: scenario.to_string(),
            driver_metadata: drivers.metadata()[0].clone(),
            driver_values,
            driver_unit,
        })
    }

    fn run_task(&self, task: &ScenarioTask, time_axis: &TimeAxis) -> TLMResult<ScenarioOutput> {
        let mut model = TwoLayerModel::new(self.parameters.clone(), Arc::clone(&self.registry))?;
        let forcing = Quantity::new(task.driver_values.clone(), task.driver_unit.clone());
        model.set_drivers(DriverSeries::new(forcing, time_axis.clone())?)?;
        if let Some(delta_t) = model.delta_t() {
            log::debug!("Running scenario `{}` with delta_t = {delta_t}", task.scenario);
        }
        model.reset()?;
        model.run()?;

        Ok(ScenarioOutput {
            temp_upper: model.temp_upper().to_owned(),
            temp_lower: model.temp_lower().to_owned(),
            heat_uptake: model.heat_uptake().to_owned(),
        })
    }

    fn assemble<D: LabeledTimeseries>(
        &self,
        tasks: &[ScenarioTask],
        outputs: &[ScenarioOutput],
        time_axis: &TimeAxis,
    ) -> TLMResult<D> {
        let mut rows: Vec<ArrayView1<FloatValue>> = Vec::with_capacity(tasks.len() * 4);
        let mut metadata = Vec::with_capacity(tasks.len() * 4);

        for (task, output) in tasks.iter().zip(outputs) {
            let output_row = |variable: &str, unit: &str| {
                task.driver_metadata
                    .clone()
                    .with(VARIABLE, variable)
                    .with(UNIT, unit)
                    .with(CLIMATE_MODEL, CLIMATE_MODEL_NAME)
            };

            rows.push(task.driver_values.view());
            metadata.push(task.driver_metadata.clone());
            rows.push(output.temp_upper.view());
            metadata.push(output_row(TEMP_UPPER_VARIABLE, TEMPERATURE_UNIT));
            rows.push(output.temp_lower.view());
            metadata.push(output_row(TEMP_LOWER_VARIABLE, TEMPERATURE_UNIT));
            rows.push(output.heat_uptake.view());
            metadata.push(output_row(HEAT_UPTAKE_VARIABLE, HEAT_UPTAKE_UNIT));
        }

        let values = stack(Axis(0), &rows).map_err(|e| TLMError::ShapeMismatch {
            context: format!("scenario outputs ({e})"),
            expected: time_axis.len(),
            actual: rows.first().map_or(0, |row| row.len()),
        })?;
        D::from_parts(values, time_axis.clone(), metadata)
    }
}

fn missing_driver(driver_var: &str) -> TLMError {
    TLMError::MissingDriver {
        driver_var: driver_var.to_string(),
    }
}
