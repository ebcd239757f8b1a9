//! Frequency-dependent compartmental epidemics (`βSI/N` incidence).

use crate::error::{Result, SimulationError};
use crate::integrator::ClampPolicy;
use crate::metrics::{
    reproduction_number, EpidemicMetrics, ExposureMetrics, Metrics, ReachMetrics,
};
use crate::models::{Model, ModelKind};
use crate::parameters::{Domain, ModelParameters, ParameterSpec};
use crate::traits::{constant, DynamicalSystem, Scalar};
use crate::trajectory::Trajectory;

pub const SIR_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::new("N", 1000.0, Domain::AtLeast(1.0)),
    ParameterSpec::new("beta", 0.24, Domain::Between(0.0, 1.0)).clamped(),
    ParameterSpec::new("gamma", 0.1, Domain::Between(0.0, 1.0)).clamped(),
    ParameterSpec::new("I0", 1.0, Domain::NonNegative),
    ParameterSpec::new("R0", 0.0, Domain::NonNegative),
    ParameterSpec::new("t_max", 100.0, Domain::AtLeast(10.0)),
];

pub const SEIR_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::new("N", 1000.0, Domain::AtLeast(1.0)),
    ParameterSpec::new("beta", 0.5, Domain::Between(0.01, 1.0)).clamped(),
    ParameterSpec::new("sigma", 0.2, Domain::Between(0.01, 1.0)).clamped(),
    ParameterSpec::new("gamma", 0.1, Domain::Between(0.01, 1.0)).clamped(),
    ParameterSpec::new("E0", 1.0, Domain::NonNegative),
    ParameterSpec::new("I0", 0.0, Domain::NonNegative),
    ParameterSpec::new("t_max", 150.0, Domain::AtLeast(10.0)),
];

/// `N` only rescales the initial compartments; the dynamics use `S₀ + I₀ + R₀`.
pub const COHORT_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::new("N", 100_000.0, Domain::AtLeast(1.0)),
    ParameterSpec::new("S0", 99_500.0, Domain::NonNegative),
    ParameterSpec::new("I0", 500.0, Domain::NonNegative),
    ParameterSpec::new("R0", 0.0, Domain::NonNegative),
    ParameterSpec::new("beta", 0.1143, Domain::NonNegative),
    ParameterSpec::new("gamma", 0.0286, Domain::NonNegative),
    ParameterSpec::new("t_max", 365.0, Domain::AtLeast(10.0)),
];

fn population(parameters: &ModelParameters) -> Result<f64> {
    let n = parameters.require("N")?;
    if n <= 0.0 {
        return Err(SimulationError::SingularRate {
            quantity: "incidence",
            divisor: "N",
        });
    }
    Ok(n)
}

/// Kermack–McKendrick SIR.
///
/// ```text
/// dS/dt = −β·S·I/N
/// dI/dt =  β·S·I/N − γ·I
/// dR/dt =  γ·I
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sir {
    pub population: f64,
    pub beta: f64,
    pub gamma: f64,
    pub infected: f64,
    pub recovered: f64,
}

impl Sir {
    pub fn susceptible(&self) -> f64 {
        self.population - self.infected - self.recovered
    }
}

impl<T: Scalar> DynamicalSystem<T> for Sir {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let beta = constant::<T>(self.beta);
        let gamma = constant::<T>(self.gamma);
        let n = constant::<T>(self.population);
        let (s, i) = (x[0], x[1]);

        let incidence = beta * s * i / n;
        let recovery = gamma * i;
        out[0] = -incidence;
        out[1] = incidence - recovery;
        out[2] = recovery;
    }
}

impl Model for Sir {
    const KIND: ModelKind = ModelKind::Sir;

    fn from_parameters(parameters: &ModelParameters) -> Result<Self> {
        Ok(Self {
            population: population(parameters)?,
            beta: parameters.require("beta")?,
            gamma: parameters.require("gamma")?,
            infected: parameters.require("I0")?,
            recovered: parameters.get("R0").unwrap_or(0.0),
        })
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.susceptible(), self.infected, self.recovered]
    }

    fn metrics(&self, trajectory: &Trajectory) -> Result<Metrics> {
        let r0 = reproduction_number(self.beta, self.gamma);
        Ok(Metrics {
            epidemic: Some(EpidemicMetrics::from_trajectory(
                trajectory,
                self.population,
                Some(r0),
            )?),
            ..Metrics::summary(trajectory)
        })
    }
}

/// SIR started from an explicit `(S₀, I₀, R₀)`; the population is their sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohortSir {
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl CohortSir {
    pub fn population(&self) -> f64 {
        self.susceptible + self.infected + self.recovered
    }

    fn dynamics(&self) -> Sir {
        Sir {
            population: self.population(),
            beta: self.beta,
            gamma: self.gamma,
            infected: self.infected,
            recovered: self.recovered,
        }
    }
}

impl<T: Scalar> DynamicalSystem<T> for CohortSir {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        DynamicalSystem::<T>::apply(&self.dynamics(), t, x, out);
    }
}

impl Model for CohortSir {
    const KIND: ModelKind = ModelKind::CohortSir;

    fn from_parameters(parameters: &ModelParameters) -> Result<Self> {
        let model = Self {
            susceptible: parameters.require("S0")?,
            infected: parameters.require("I0")?,
            recovered: parameters.require("R0")?,
            beta: parameters.require("beta")?,
            gamma: parameters.require("gamma")?,
        };
        if !(model.population() > 0.0) {
            return Err(SimulationError::SingularRate {
                quantity: "incidence",
                divisor: "S0 + I0 + R0",
            });
        }
        Ok(model)
    }

    fn initial_state(&self) -> Vec<f64> {
        vec![self.susceptible, self.infected, self.recovered]
    }

    fn metrics(&self, trajectory: &Trajectory) -> Result<Metrics> {
        let population = self.population();
        let r0 = reproduction_number(self.beta, self.gamma);
        Ok(Metrics {
            epidemic: Some(EpidemicMetrics::from_trajectory(
                trajectory,
                population,
                Some(r0),
            )?),
            reach: Some(ReachMetrics::from_trajectory(trajectory, population)?),
            ..Metrics::summary(trajectory)
        })
    }
}

/// SIR with a latent (exposed) stage of mean length `1/σ`.
///
/// ```text
/// dS/dt = −β·S·I/N
/// dE/dt =  β·S·I/N − σ·E
/// dI/dt =  σ·E − γ·I
/// dR/dt =  γ·I
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seir {
    pub population: f64,
    pub beta: f64,
    pub sigma: f64,
    pub gamma: f64,
    pub exposed: f64,
    pub infected: f64,
}

impl<T: Scalar> DynamicalSystem<T> for Seir {
    fn dimension(&self) -> usize {
        4
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let beta = constant::<T>(self.beta);
        let sigma = constant::<T>(self.sigma);
        let gamma = constant::<T>(self.gamma);
        let n = constant::<T>(self.population);
        let (s, e, i) = (x[0], x[1], x[2]);

        let incidence = beta * s * i / n;
        let onset = sigma * e;
        let recovery = gamma * i;
        out[0] = -incidence;
        out[1] = incidence - onset;
        out[2] = onset - recovery;
        out[3] = recovery;
    }
}

impl Model for Seir {
    const KIND: ModelKind = ModelKind::Seir;

    fn from_parameters(parameters: &ModelParameters) -> Result<Self> {
        Ok(Self {
            population: population(parameters)?,
            beta: parameters.require("beta")?,
            sigma: parameters.require("sigma")?,
            gamma: parameters.require("gamma")?,
            exposed: parameters.require("E0")?,
            infected: parameters.require("I0")?,
        })
    }

    fn initial_state(&self) -> Vec<f64> {
        let susceptible = self.population - self.exposed - self.infected;
        vec![susceptible, self.exposed, self.infected, 0.0]
    }

    fn clamp_policy(&self) -> ClampPolicy {
        ClampPolicy::NonNegative
    }

    fn metrics(&self, trajectory: &Trajectory) -> Result<Metrics> {
        let r0 = reproduction_number(self.beta, self.gamma);
        Ok(Metrics {
            epidemic: Some(EpidemicMetrics::from_trajectory(
                trajectory,
                self.population,
                Some(r0),
            )?),
            exposure: Some(ExposureMetrics::from_trajectory(trajectory, self.sigma)?),
            ..Metrics::summary(trajectory)
        })
    }
}
