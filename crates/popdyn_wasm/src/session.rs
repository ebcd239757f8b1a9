use crate::{parse_model, parse_solver, serialize, to_js_error};
use popdyn_core::models::ModelKind;
use popdyn_core::parameters::{Domain, ParameterSpec, RawParameters, RawValue};
use popdyn_core::simulation::{self, SimulationOutput, SimulationRequest};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// One row of a model's parameter form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ParameterRow {
    name: &'static str,
    default: f64,
    min: Option<f64>,
    max: Option<f64>,
    /// `min` itself is not admissible.
    exclusive_min: bool,
    integer: bool,
}

impl From<&ParameterSpec> for ParameterRow {
    fn from(spec: &ParameterSpec) -> Self {
        let (min, max, exclusive_min) = match spec.domain {
            Domain::Positive => (Some(0.0), None, true),
            Domain::NonNegative => (Some(0.0), None, false),
            Domain::AtLeast(min) => (Some(min), None, false),
            Domain::Between(min, max) => (Some(min), Some(max), false),
        };
        Self {
            name: spec.name,
            default: spec.default,
            min,
            max,
            exclusive_min,
            integer: spec.integer,
        }
    }
}

/// Form state of one dashboard page. Every `run` is an independent request built
/// from the current inputs; nothing from a previous run is reused.
#[wasm_bindgen]
pub struct WasmDashboard {
    request: SimulationRequest,
}

#[wasm_bindgen]
impl WasmDashboard {
    #[wasm_bindgen(constructor)]
    pub fn new(model: &str) -> Result<WasmDashboard, JsValue> {
        console_error_panic_hook::set_once();
        let model = parse_model(model).map_err(to_js_error)?;
        Ok(WasmDashboard::for_model(model))
    }

    pub fn model(&self) -> String {
        self.request.model.to_string()
    }

    pub fn set_parameter(&mut self, name: &str, value: f64) {
        self.request
            .parameters
            .insert(name.to_string(), Some(RawValue::Number(value)));
    }

    /// Stores the text exactly as typed; the validator decides what it means.
    pub fn set_parameter_text(&mut self, name: &str, text: &str) {
        self.request
            .parameters
            .insert(name.to_string(), Some(RawValue::Text(text.to_string())));
    }

    pub fn clear_parameter(&mut self, name: &str) {
        self.request.parameters.insert(name.to_string(), None);
    }

    /// Changes the population. For the explicit-state SIR the initial
    /// compartments are rescaled to the new total on the next run.
    pub fn set_population(&mut self, population: f64) {
        self.set_parameter("N", population);
    }

    pub fn set_expressions(&mut self, dx: &str, dy: &str) {
        self.request.expressions.dx = Some(dx.to_string());
        self.request.expressions.dy = Some(dy.to_string());
    }

    pub fn set_solver(&mut self, name: &str) -> Result<(), JsValue> {
        self.request.settings.solver = parse_solver(name).map_err(to_js_error)?;
        Ok(())
    }

    pub fn set_horizon(&mut self, t_max: f64) {
        self.request.grid.t_max = Some(t_max);
    }

    /// Restores the model's default parameters, expressions and solver.
    pub fn reset(&mut self) {
        *self = WasmDashboard::for_model(self.request.model);
    }

    pub fn parameters(&self) -> Result<JsValue, JsValue> {
        serialize(&self.request.parameters)
    }

    pub fn run(&self) -> Result<JsValue, JsValue> {
        serialize(&self.simulate())
    }
}

impl WasmDashboard {
    fn for_model(model: ModelKind) -> Self {
        let parameters: RawParameters = model.default_parameters().to_raw();
        Self {
            request: SimulationRequest {
                parameters,
                ..SimulationRequest::new(model)
            },
        }
    }

    pub(crate) fn simulate(&self) -> SimulationOutput {
        simulation::simulate(&self.request)
    }
}
