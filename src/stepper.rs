//! One-step methods for autonomous systems _y' = f(y)_.
//!
//! All steppers implement [`TimeStepper`], which advances the state in place
//! by one step. Explicit methods evaluate the right-hand side directly.
//! Implicit methods build a residual [expression](crate::Expr) once, and each
//! step only updates its [`Constant`](crate::Constant) and
//! [`Parameter`](crate::Parameter) leaves before handing it to
//! [`Newton`](crate::newton::Newton) with the current state as the initial
//! guess.
//!
//! * [`ExplicitEuler`], [`ImprovedEuler`]
//! * [`ImplicitEuler`], [`CrankNicolson`]
//! * [`ExplicitRungeKutta`], [`ImplicitRungeKutta`] for any
//!   [`ButcherTableau`]
//!
//! Second order mechanical systems with a possibly singular mass matrix are
//! integrated by [`GeneralizedAlpha`] instead.
//!
//! ```rust
//! use odeon::nalgebra::dvector;
//! use odeon::stepper::{integrate, ImplicitEuler};
//! # use odeon::nalgebra as na;
//! # use odeon::Function;
//! #
//! # struct Decay;
//! #
//! # impl Function for Decay {
//! #     fn dim_x(&self) -> usize { 1 }
//! #     fn dim_f(&self) -> usize { 1 }
//! #     fn eval(&self, x: &na::DVector<f64>, fx: &mut na::DVector<f64>) {
//! #         fx[0] = -x[0];
//! #     }
//! #     fn eval_deriv(&self, _x: &na::DVector<f64>, jac: &mut na::DMatrix<f64>) {
//! #         jac[(0, 0)] = -1.0;
//! #     }
//! # }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut stepper = ImplicitEuler::new(Decay)?;
//! let mut y = dvector![1.0];
//!
//! integrate(&mut stepper, 0.1, 10, &mut y, |t, y| {
//!     println!("t = {:.1}\ty = {}", t, y[0]);
//! })?;
//!
//! assert!(y[0] > 0.0 && y[0] < 1.0);
//! # Ok(())
//! # }
//! ```

mod alpha;
mod euler;
mod implicit;
mod runge_kutta;
mod tableau;

use log::debug;
use nalgebra::DVector;
use thiserror::Error;

use crate::newton::NewtonError;

pub use alpha::*;
pub use euler::*;
pub use implicit::*;
pub use runge_kutta::*;
pub use tableau::*;

/// Error returned from [`TimeStepper::do_step`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    /// The state does not have the dimension of the stepper.
    #[error("invalid state dimension: expected {expected}, found {found}")]
    InvalidDimensionality {
        /// Dimension of the system.
        expected: usize,
        /// Dimension of the given state.
        found: usize,
    },
    /// Newton solve of an implicit step failed.
    #[error(transparent)]
    Newton(#[from] NewtonError),
}

/// Common interface of all one-step methods.
pub trait TimeStepper {
    /// Name of the method.
    const NAME: &'static str;

    /// Dimension of the state.
    fn dim(&self) -> usize;

    /// Advances `y` in place by one step of size `tau`.
    ///
    /// On error, the content of `y` is unspecified.
    fn do_step(&mut self, tau: f64, y: &mut DVector<f64>) -> Result<(), StepError>;
}

pub(crate) fn check_state(expected: usize, y: &DVector<f64>) -> Result<(), StepError> {
    if y.len() != expected {
        return Err(StepError::InvalidDimensionality {
            expected,
            found: y.len(),
        });
    }

    Ok(())
}

/// Runs `steps` steps of size `tau`, calling `observer` with the time and the
/// state after every step.
pub fn integrate<S, O>(
    stepper: &mut S,
    tau: f64,
    steps: usize,
    y: &mut DVector<f64>,
    mut observer: O,
) -> Result<(), StepError>
where
    S: TimeStepper,
    O: FnMut(f64, &DVector<f64>),
{
    for i in 1..=steps {
        stepper.do_step(tau, y)?;

        let t = i as f64 * tau;
        debug!("{}: t = {}", S::NAME, t);
        observer(t, y);
    }

    Ok(())
}
