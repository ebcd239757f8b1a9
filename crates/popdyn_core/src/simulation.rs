//! The request/response boundary: raw dashboard input in, a well-formed report
//! out. Nothing in here returns an error to the caller.

use crate::error::{Result, SimulationError};
use crate::grid::{GridSpec, Resolution, TimeGrid};
use crate::integrator::SolverKind;
use crate::metrics::Metrics;
use crate::models::{CohortSir, Exponential, Logistic, Model, ModelKind, RumorSir, Seir, Sir};
use crate::parameters::{
    validate, Adjustment, AdjustmentReason, ModelParameters, RawParameters, RawValue,
    ValidatedParameters,
};
use crate::settings::{AdaptiveSettings, SimulationSettings};
use crate::trajectory::Trajectory;
use crate::vector_field::{self, FieldExpressions, FieldExtent, FieldSystem, VectorField};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub model: ModelKind,
    #[serde(default)]
    pub parameters: RawParameters,
    /// Only read by the vector field.
    #[serde(default)]
    pub expressions: FieldExpressions,
    #[serde(default)]
    pub grid: GridSpec,
    #[serde(default)]
    pub settings: SimulationSettings,
}

impl SimulationRequest {
    pub fn new(model: ModelKind) -> Self {
        Self {
            model,
            parameters: RawParameters::new(),
            expressions: FieldExpressions::default(),
            grid: GridSpec::default(),
            settings: SimulationSettings::default(),
        }
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<RawValue>) -> Self {
        self.parameters.insert(name.to_string(), Some(value.into()));
        self
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.settings.solver = Some(solver);
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.grid.resolution = Some(resolution);
        self
    }

    pub fn with_expressions(mut self, dx: &str, dy: &str) -> Self {
        self.expressions = FieldExpressions::new(dx, dy);
        self
    }
}

/// Time-series result. On failure `trajectory` is flat zero and `failure` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesReport {
    pub model: ModelKind,
    pub parameters: ModelParameters,
    pub adjustments: Vec<Adjustment>,
    /// `None` when the closed-form solution was evaluated.
    pub solver: Option<SolverKind>,
    pub trajectory: Trajectory,
    pub metrics: Option<Metrics>,
    pub failure: Option<String>,
}

/// Vector-field result. On failure `field` is all zeros and `failure` says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub dx: String,
    pub dy: String,
    pub parameters: ModelParameters,
    pub adjustments: Vec<Adjustment>,
    pub field: VectorField,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimulationOutput {
    Series(SeriesReport),
    Field(FieldReport),
}

impl SimulationOutput {
    pub fn failure(&self) -> Option<&str> {
        match self {
            SimulationOutput::Series(report) => report.failure.as_deref(),
            SimulationOutput::Field(report) => report.failure.as_deref(),
        }
    }

    pub fn adjustments(&self) -> &[Adjustment] {
        match self {
            SimulationOutput::Series(report) => &report.adjustments,
            SimulationOutput::Field(report) => &report.adjustments,
        }
    }

    pub fn series(&self) -> Option<&SeriesReport> {
        match self {
            SimulationOutput::Series(report) => Some(report),
            SimulationOutput::Field(_) => None,
        }
    }

    pub fn field(&self) -> Option<&FieldReport> {
        match self {
            SimulationOutput::Field(report) => Some(report),
            SimulationOutput::Series(_) => None,
        }
    }
}

/// Validates the request, runs the model and extracts metrics.
///
/// Recoverable problems never escape: invalid inputs are repaired and listed in
/// `adjustments`, and a failed run yields a degenerate result with a reason.
pub fn simulate(request: &SimulationRequest) -> SimulationOutput {
    let mut raw = request.parameters.clone();
    if let Some(t_max) = request.grid.t_max {
        raw.insert("t_max".to_string(), Some(RawValue::Number(t_max)));
    }
    let validated = validate(request.model, &raw);

    let output = match request.model {
        ModelKind::VectorField => {
            SimulationOutput::Field(run_field(validated, &request.expressions))
        }
        kind => SimulationOutput::Series(run_series(kind, validated, request)),
    };
    if let Some(reason) = output.failure() {
        log::warn!("{} run degraded: {reason}", request.model);
    }
    output
}

struct Run {
    trajectory: Trajectory,
    metrics: Option<Metrics>,
    failure: Option<String>,
}

fn run<M: Model>(
    parameters: &ModelParameters,
    grid: &TimeGrid,
    solver: Option<SolverKind>,
    settings: &AdaptiveSettings,
) -> Result<Run> {
    let model = M::from_parameters(parameters)?;
    let trajectory = model.solve(grid, solver, settings)?;
    Ok(match model.metrics(&trajectory) {
        Ok(metrics) => Run {
            trajectory,
            metrics: Some(metrics),
            failure: None,
        },
        Err(err) => Run {
            trajectory,
            metrics: None,
            failure: Some(err.to_string()),
        },
    })
}

fn dispatch(
    kind: ModelKind,
    parameters: &ModelParameters,
    grid: &TimeGrid,
    solver: Option<SolverKind>,
    settings: &AdaptiveSettings,
) -> Result<Run> {
    match kind {
        ModelKind::Exponential => run::<Exponential>(parameters, grid, solver, settings),
        ModelKind::Logistic => run::<Logistic>(parameters, grid, solver, settings),
        ModelKind::Sir => run::<Sir>(parameters, grid, solver, settings),
        ModelKind::Seir => run::<Seir>(parameters, grid, solver, settings),
        ModelKind::CohortSir => run::<CohortSir>(parameters, grid, solver, settings),
        ModelKind::RumorSir => run::<RumorSir>(parameters, grid, solver, settings),
        ModelKind::VectorField => Err(SimulationError::InvalidParameter {
            name: "model".to_string(),
            reason: "a vector field is not a time series".to_string(),
        }),
    }
}

/// Grid for the run; an unusable requested resolution falls back to the model default.
fn resolve_grid(
    kind: ModelKind,
    t_max: f64,
    requested: Option<Resolution>,
    max_points: usize,
    adjustments: &mut Vec<Adjustment>,
) -> Result<TimeGrid> {
    let fallback = kind.default_resolution();
    let Some(resolution) = requested else {
        return fallback.grid(t_max, max_points);
    };
    match resolution.grid(t_max, max_points) {
        Ok(grid) => Ok(grid),
        Err(err) => {
            let grid = fallback.grid(t_max, max_points)?;
            log::warn!("{kind}: {err}; using {} points", grid.len());
            adjustments.push(Adjustment {
                parameter: "resolution".to_string(),
                original: None,
                value: grid.len() as f64,
                reason: AdjustmentReason::OutOfDomain,
            });
            Ok(grid)
        }
    }
}

fn run_series(
    kind: ModelKind,
    validated: ValidatedParameters,
    request: &SimulationRequest,
) -> SeriesReport {
    let ValidatedParameters {
        parameters,
        mut adjustments,
    } = validated;
    let settings = &request.settings;
    let solver = settings.solver.or(kind.default_solver());
    let t_max = parameters.get("t_max").unwrap_or(f64::NAN);

    let (grid, outcome) = match resolve_grid(
        kind,
        t_max,
        request.grid.resolution,
        settings.max_grid_points,
        &mut adjustments,
    ) {
        Ok(grid) => {
            let outcome = dispatch(kind, &parameters, &grid, solver, &settings.adaptive);
            (grid, outcome)
        }
        Err(err) => (TimeGrid::coarse(t_max), Err(err)),
    };

    let run = outcome.unwrap_or_else(|err| Run {
        trajectory: Trajectory::flat(&grid, kind.compartments()),
        metrics: None,
        failure: Some(err.to_string()),
    });
    log::debug!(
        "{kind}: {} points over [0, {}] with {solver:?}",
        run.trajectory.len(),
        grid.end()
    );

    SeriesReport {
        model: kind,
        parameters,
        adjustments,
        solver,
        trajectory: run.trajectory,
        metrics: run.metrics,
        failure: run.failure,
    }
}

fn run_field(validated: ValidatedParameters, expressions: &FieldExpressions) -> FieldReport {
    let ValidatedParameters {
        parameters,
        adjustments,
    } = validated;
    let (dx, dy) = expressions.resolved();

    let outcome = FieldExtent::from_parameters(&parameters).and_then(|extent| {
        let system = FieldSystem::compile(expressions)?;
        vector_field::evaluate(&system, &extent)
    });
    let (field, failure) = match outcome {
        Ok(field) => (field, None),
        Err(err) => {
            let extent = FieldExtent::from_parameters(&parameters).unwrap_or_default();
            (vector_field::zero_field(&extent), Some(err.to_string()))
        }
    };

    FieldReport {
        dx: dx.to_string(),
        dy: dy.to_string(),
        parameters,
        adjustments,
        field,
        failure,
    }
}
