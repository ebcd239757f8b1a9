//! The model catalogue: right-hand sides, parameter tables and the metrics each
//! model reports.

pub mod epidemic;
pub mod growth;
pub mod rumor;

pub use epidemic::{CohortSir, Seir, Sir};
pub use growth::{Exponential, Logistic};
pub use rumor::RumorSir;

use crate::error::{Result, SimulationError};
use crate::grid::{Resolution, TimeGrid};
use crate::integrator::{integrate, ClampPolicy, SolverKind};
use crate::metrics::Metrics;
use crate::parameters::{ModelParameters, ParameterSpec};
use crate::settings::AdaptiveSettings;
use crate::traits::DynamicalSystem;
use crate::trajectory::Trajectory;
use crate::vector_field;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Exponential,
    Logistic,
    VectorField,
    Sir,
    CohortSir,
    Seir,
    RumorSir,
}

impl ModelKind {
    pub const ALL: [ModelKind; 7] = [
        ModelKind::Exponential,
        ModelKind::Logistic,
        ModelKind::VectorField,
        ModelKind::Sir,
        ModelKind::CohortSir,
        ModelKind::Seir,
        ModelKind::RumorSir,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ModelKind::Exponential => "exponential",
            ModelKind::Logistic => "logistic",
            ModelKind::VectorField => "vector_field",
            ModelKind::Sir => "sir",
            ModelKind::CohortSir => "cohort_sir",
            ModelKind::Seir => "seir",
            ModelKind::RumorSir => "rumor_sir",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ModelKind::Exponential => "Exponential growth",
            ModelKind::Logistic => "Logistic growth",
            ModelKind::VectorField => "Vector field",
            ModelKind::Sir => "SIR epidemic",
            ModelKind::CohortSir => "SIR from an explicit initial state",
            ModelKind::Seir => "SEIR epidemic",
            ModelKind::RumorSir => "Rumor spreading",
        }
    }

    /// State variable names in state-vector order.
    pub fn compartments(self) -> &'static [&'static str] {
        match self {
            ModelKind::Exponential | ModelKind::Logistic => &["P"],
            ModelKind::VectorField => &["x", "y"],
            ModelKind::Sir | ModelKind::CohortSir | ModelKind::RumorSir => &["S", "I", "R"],
            ModelKind::Seir => &["S", "E", "I", "R"],
        }
    }

    pub fn parameter_specs(self) -> &'static [ParameterSpec] {
        match self {
            ModelKind::Exponential => growth::EXPONENTIAL_PARAMETERS,
            ModelKind::Logistic => growth::LOGISTIC_PARAMETERS,
            ModelKind::VectorField => vector_field::PARAMETERS,
            ModelKind::Sir => epidemic::SIR_PARAMETERS,
            ModelKind::CohortSir => epidemic::COHORT_PARAMETERS,
            ModelKind::Seir => epidemic::SEIR_PARAMETERS,
            ModelKind::RumorSir => rumor::PARAMETERS,
        }
    }

    pub fn default_parameters(self) -> ModelParameters {
        self.parameter_specs()
            .iter()
            .map(|spec| (spec.name.to_string(), spec.default))
            .collect()
    }

    pub fn default_resolution(self) -> Resolution {
        match self {
            ModelKind::Exponential => Resolution::Points(100),
            ModelKind::Logistic => Resolution::Points(200),
            ModelKind::VectorField => Resolution::Points(2),
            ModelKind::Sir | ModelKind::Seir => Resolution::Step(1.0),
            ModelKind::RumorSir => Resolution::Points(500),
            ModelKind::CohortSir => Resolution::Points(1000),
        }
    }

    /// Solver used when the request does not pick one; `None` means the
    /// closed-form solution is evaluated instead.
    pub fn default_solver(self) -> Option<SolverKind> {
        match self {
            ModelKind::Exponential | ModelKind::Logistic | ModelKind::VectorField => None,
            ModelKind::Sir | ModelKind::CohortSir | ModelKind::Seir | ModelKind::RumorSir => {
                Some(SolverKind::Adaptive)
            }
        }
    }

    pub fn is_time_series(self) -> bool {
        self != ModelKind::VectorField
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelKind {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        let id = s.trim().to_ascii_lowercase();
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.id() == id)
            .ok_or_else(|| SimulationError::InvalidParameter {
                name: "model".to_string(),
                reason: format!("unknown model '{s}'"),
            })
    }
}

/// A time-series model built from validated parameters.
pub trait Model: DynamicalSystem<f64> + Sized {
    const KIND: ModelKind;

    fn from_parameters(parameters: &ModelParameters) -> Result<Self>;

    fn initial_state(&self) -> Vec<f64>;

    fn clamp_policy(&self) -> ClampPolicy {
        ClampPolicy::None
    }

    /// Produces the trajectory over `grid`. `None` selects the model's
    /// default method.
    fn solve(
        &self,
        grid: &TimeGrid,
        solver: Option<SolverKind>,
        settings: &AdaptiveSettings,
    ) -> Result<Trajectory> {
        integrate(
            self,
            Self::KIND.compartments(),
            &self.initial_state(),
            grid,
            solver.unwrap_or(SolverKind::Adaptive),
            self.clamp_policy(),
            settings,
        )
    }

    fn metrics(&self, trajectory: &Trajectory) -> Result<Metrics>;
}
