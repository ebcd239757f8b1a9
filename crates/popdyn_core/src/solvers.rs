use crate::error::{Result, SimulationError};
use crate::settings::AdaptiveSettings;
use crate::traits::{all_finite, constant, DynamicalSystem, Scalar, Steppable};

/// Explicit (forward) Euler solver.
pub struct Euler<T: Scalar> {
    deriv: Vec<T>,
}

impl<T: Scalar> Euler<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            deriv: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for Euler<T> {
    fn step(
        &mut self,
        system: &(impl DynamicalSystem<T> + ?Sized),
        t: &mut T,
        state: &mut [T],
        dt: T,
    ) {
        // y_next = y + dt * f(t, y)
        system.apply(*t, state, &mut self.deriv);
        for (x, dx) in state.iter_mut().zip(&self.deriv) {
            *x = *x + dt * *dx;
        }
        *t = *t + dt;
    }
}

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(
        &mut self,
        system: &(impl DynamicalSystem<T> + ?Sized),
        t: &mut T,
        state: &mut [T],
        dt: T,
    ) {
        let half = constant::<T>(0.5);
        let sixth = constant::<T>(1.0 / 6.0);
        let two = constant::<T>(2.0);

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// Dormand-Prince 5(4) solver with embedded error estimate and step-size control.
///
/// Unlike the fixed-step solvers it is driven to an output time with
/// [`Dopri5::advance_to`]; internal steps are truncated so the output time is
/// hit exactly. The last accepted step size is carried over between calls.
pub struct Dopri5<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
    y_new: Vec<T>,
    h: T,
}

impl<T: Scalar> Dopri5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
            y_new: vec![z; dim],
            h: z,
        }
    }

    /// Integrates from `*t` to `t_end`, returning the number of internal steps taken
    /// (accepted and rejected).
    pub fn advance_to(
        &mut self,
        system: &(impl DynamicalSystem<T> + ?Sized),
        t: &mut T,
        state: &mut [T],
        t_end: T,
        settings: &AdaptiveSettings,
    ) -> Result<usize> {
        let n = state.len();
        if n == 0 || t_end <= *t {
            return Ok(0);
        }

        let rtol = constant::<T>(settings.rtol);
        let atol = constant::<T>(settings.atol);
        let h_min = constant::<T>(settings.h_min);
        let safety = constant::<T>(0.9);
        let min_factor = constant::<T>(0.2);
        let max_factor = constant::<T>(5.0);
        let exponent = constant::<T>(-0.2);

        if self.h <= T::zero() {
            self.h = ((t_end - *t) * constant(1e-2)).max(h_min);
        }

        let mut steps = 0usize;
        while *t < t_end {
            if steps >= settings.max_steps {
                return Err(SimulationError::IntegrationFailure {
                    time: to_f64(*t),
                    reason: format!(
                        "exceeded {} internal steps before reaching t = {}",
                        settings.max_steps,
                        to_f64(t_end)
                    ),
                });
            }
            steps += 1;

            let remaining = t_end - *t;
            let mut h = self.h.max(h_min);
            let last = h >= remaining;
            if last {
                h = remaining;
            }

            self.stages(system, *t, state, h);
            if !self.stages_finite() {
                // An oversized trial step can overflow; only a minimal one is fatal.
                if h <= h_min {
                    return Err(SimulationError::non_finite(to_f64(*t)));
                }
                self.h = h * min_factor;
                continue;
            }

            let err = self.error_norm(state, h, rtol, atol);
            let factor = if err == T::zero() {
                max_factor
            } else {
                (safety * err.powf(exponent)).max(min_factor).min(max_factor)
            };

            if err <= T::one() {
                *t = if last { t_end } else { *t + h };
                state.copy_from_slice(&self.y_new);
                // Truncated final steps leave the step-size suggestion alone.
                if !(last && h < self.h) {
                    self.h = h * factor;
                }
            } else {
                if h <= h_min {
                    return Err(SimulationError::IntegrationFailure {
                        time: to_f64(*t),
                        reason: "step size fell below the minimum".to_string(),
                    });
                }
                self.h = h * factor;
            }
        }

        Ok(steps)
    }

    fn stages(&mut self, system: &(impl DynamicalSystem<T> + ?Sized), t0: T, state: &[T], h: T) {
        let c2 = constant::<T>(1.0 / 5.0);
        let c3 = constant::<T>(3.0 / 10.0);
        let c4 = constant::<T>(4.0 / 5.0);
        let c5 = constant::<T>(8.0 / 9.0);

        let a21 = constant::<T>(1.0 / 5.0);

        let a31 = constant::<T>(3.0 / 40.0);
        let a32 = constant::<T>(9.0 / 40.0);

        let a41 = constant::<T>(44.0 / 45.0);
        let a42 = constant::<T>(-56.0 / 15.0);
        let a43 = constant::<T>(32.0 / 9.0);

        let a51 = constant::<T>(19372.0 / 6561.0);
        let a52 = constant::<T>(-25360.0 / 2187.0);
        let a53 = constant::<T>(64448.0 / 6561.0);
        let a54 = constant::<T>(-212.0 / 729.0);

        let a61 = constant::<T>(9017.0 / 3168.0);
        let a62 = constant::<T>(-355.0 / 33.0);
        let a63 = constant::<T>(46732.0 / 5247.0);
        let a64 = constant::<T>(49.0 / 176.0);
        let a65 = constant::<T>(-5103.0 / 18656.0);

        // b coefficients (5th order, used to advance)
        let b1 = constant::<T>(35.0 / 384.0);
        let b3 = constant::<T>(500.0 / 1113.0);
        let b4 = constant::<T>(125.0 / 192.0);
        let b5 = constant::<T>(-2187.0 / 6784.0);
        let b6 = constant::<T>(11.0 / 84.0);

        let n = state.len();

        // k1
        system.apply(t0, state, &mut self.k1);

        // k2
        for i in 0..n {
            self.tmp[i] = state[i] + h * (a21 * self.k1[i]);
        }
        system.apply(t0 + c2 * h, &self.tmp, &mut self.k2);

        // k3
        for i in 0..n {
            self.tmp[i] = state[i] + h * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        system.apply(t0 + c3 * h, &self.tmp, &mut self.k3);

        // k4
        for i in 0..n {
            self.tmp[i] = state[i] + h * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        system.apply(t0 + c4 * h, &self.tmp, &mut self.k4);

        // k5
        for i in 0..n {
            self.tmp[i] = state[i]
                + h * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        system.apply(t0 + c5 * h, &self.tmp, &mut self.k5);

        // k6
        for i in 0..n {
            self.tmp[i] = state[i]
                + h * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        system.apply(t0 + h, &self.tmp, &mut self.k6);

        // Candidate state
        for i in 0..n {
            self.y_new[i] = state[i]
                + h * (b1 * self.k1[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }

        // k7, evaluated at the candidate
        system.apply(t0 + h, &self.y_new, &mut self.k7);
    }

    fn stages_finite(&self) -> bool {
        [
            &self.k1, &self.k2, &self.k3, &self.k4, &self.k5, &self.k6, &self.k7, &self.y_new,
        ]
        .iter()
        .all(|values| all_finite(values))
    }

    /// RMS of the scaled difference between the 5th and embedded 4th order solutions.
    fn error_norm(&self, state: &[T], h: T, rtol: T, atol: T) -> T {
        // e_i = b_i - b*_i
        let e1 = constant::<T>(35.0 / 384.0 - 5179.0 / 57600.0);
        let e3 = constant::<T>(500.0 / 1113.0 - 7571.0 / 16695.0);
        let e4 = constant::<T>(125.0 / 192.0 - 393.0 / 640.0);
        let e5 = constant::<T>(-2187.0 / 6784.0 + 92097.0 / 339200.0);
        let e6 = constant::<T>(11.0 / 84.0 - 187.0 / 2100.0);
        let e7 = constant::<T>(-1.0 / 40.0);

        let mut sum = T::zero();
        for i in 0..state.len() {
            let ei = h
                * (e1 * self.k1[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
            let scale = atol + rtol * state[i].abs().max(self.y_new[i].abs());
            let ratio = ei / scale;
            sum = sum + ratio * ratio;
        }
        let n = constant::<T>(state.len() as f64);
        (sum / n).sqrt()
    }
}

fn to_f64<T: Scalar>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
