pub mod equation_engine;
pub mod error;
pub mod grid;
pub mod integrator;
pub mod metrics;
pub mod models;
pub mod parameters;
pub mod settings;
pub mod simulation;
pub mod solvers;
/// The `popdyn_core` crate is the simulation engine behind the population dynamics dashboard.
/// Every call is a pure function of its inputs: raw parameters go in, a trajectory and its
/// metrics come out.
///
/// Key components:
/// - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (ODE right-hand sides), `Steppable` (fixed-step solvers).
/// - **Models**: exponential, logistic, SIR (from `N` or from an explicit initial state), SEIR and rumor-spreading systems with their parameter tables.
/// - **Solvers**: Euler, RK4 and an adaptive Dormand–Prince 5(4) integrator sampled on a `TimeGrid`.
/// - **Equation Engine**: a whitelisted expression grammar compiled to bytecode for vector fields.
/// - **Simulation**: validation, dispatch and metric extraction behind `simulate`.
pub mod traits;
pub mod trajectory;
pub mod vector_field;
