use crate::error::{Result, SimulationError};
use crate::grid::TimeGrid;
use crate::settings::AdaptiveSettings;
use crate::solvers::{Dopri5, Euler, RK4};
use crate::traits::{all_finite, DynamicalSystem, Steppable};
use crate::trajectory::Trajectory;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    Euler,
    Rk4,
    Adaptive,
}

impl SolverKind {
    fn build(self, dim: usize) -> InternalStepper {
        match self {
            SolverKind::Euler => InternalStepper::Euler(Euler::new(dim)),
            SolverKind::Rk4 => InternalStepper::Rk4(RK4::new(dim)),
            SolverKind::Adaptive => InternalStepper::Adaptive(Dopri5::new(dim)),
        }
    }
}

/// What happens to negative compartments after each output step.
///
/// Clamping acts on the state stored at each grid point, which is also the
/// state the next output step starts from. Steps taken inside one output
/// interval (RK4 stages, adaptive sub-steps) see the unclamped state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClampPolicy {
    #[default]
    None,
    NonNegative,
}

impl ClampPolicy {
    fn apply(self, state: &mut [f64]) {
        if let ClampPolicy::NonNegative = self {
            for value in state.iter_mut() {
                *value = value.max(0.0);
            }
        }
    }
}

enum InternalStepper {
    Euler(Euler<f64>),
    Rk4(RK4<f64>),
    Adaptive(Dopri5<f64>),
}

impl InternalStepper {
    fn advance(
        &mut self,
        system: &(impl DynamicalSystem<f64> + ?Sized),
        t: &mut f64,
        state: &mut [f64],
        t_next: f64,
        settings: &AdaptiveSettings,
    ) -> Result<()> {
        let dt = t_next - *t;
        match self {
            InternalStepper::Euler(s) => s.step(system, t, state, dt),
            InternalStepper::Rk4(s) => s.step(system, t, state, dt),
            InternalStepper::Adaptive(s) => {
                s.advance_to(system, t, state, t_next, settings)?;
            }
        }
        // Snap to the grid so rounding in t += dt never accumulates.
        *t = t_next;
        Ok(())
    }
}

/// Integrates `system` from `initial` over every point of `grid`.
///
/// Fails fast with [`SimulationError::IntegrationFailure`] as soon as the state
/// stops being finite; callers decide what to show instead.
pub fn integrate<S>(
    system: &S,
    compartments: &[&str],
    initial: &[f64],
    grid: &TimeGrid,
    solver: SolverKind,
    clamp: ClampPolicy,
    settings: &AdaptiveSettings,
) -> Result<Trajectory>
where
    S: DynamicalSystem<f64> + ?Sized,
{
    let dim = system.dimension();
    if initial.len() != dim {
        return Err(SimulationError::DimensionMismatch {
            expected: dim,
            found: initial.len(),
        });
    }
    if compartments.len() != dim {
        return Err(SimulationError::DimensionMismatch {
            expected: dim,
            found: compartments.len(),
        });
    }
    if !all_finite(initial) {
        return Err(SimulationError::IntegrationFailure {
            time: grid.start(),
            reason: "initial state is not finite".to_string(),
        });
    }

    let settings = settings.sanitized();
    let mut stepper = solver.build(dim);
    let mut trajectory = Trajectory::with_capacity(compartments, grid.len());
    let mut state = initial.to_vec();
    let mut t = grid.start();
    trajectory.push(t, &state);

    for i in 1..grid.len() {
        let t_next = grid.time(i);
        stepper.advance(system, &mut t, &mut state, t_next, &settings)?;
        if !all_finite(&state) {
            return Err(SimulationError::non_finite(grid.time(i - 1)));
        }
        clamp.apply(&mut state);
        trajectory.push(t, &state);
    }

    log::debug!(
        "integrated {dim}-dimensional system over {} points with {solver:?}",
        grid.len()
    );
    Ok(trajectory)
}
