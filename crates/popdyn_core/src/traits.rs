use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Numeric type the models and solvers are generic over (`f64` in production,
/// `f32` in a few tests).
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Converts an `f64` constant into the scalar type.
/// Unrepresentable values become NaN so they trip the finiteness checks downstream.
pub fn constant<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// Returns true when every component is a finite number.
pub fn all_finite<T: Scalar>(values: &[T]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Right-hand side of an autonomous or time-dependent ODE `dx/dt = f(t, x)`.
pub trait DynamicalSystem<T: Scalar> {
    /// Number of compartments (state variables).
    fn dimension(&self) -> usize;

    /// Writes `f(t, x)` into `out`, which has `dimension()` entries.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// Fixed-step integration scheme.
pub trait Steppable<T: Scalar> {
    /// Advances `state` and `t` by one step of size `dt`.
    fn step(
        &mut self,
        system: &(impl DynamicalSystem<T> + ?Sized),
        t: &mut T,
        state: &mut [T],
        dt: T,
    );
}
