//! Constrained mass-spring systems.
//!
//! A [`MassSpringSystem`] is assembled from fixes, point masses, springs and
//! rigid distance constraints, and then integrated in time by the
//! [generalized-alpha](crate::stepper::GeneralizedAlpha) method.
//!
//! With the default [Lagrange](ConstraintFormulation::Lagrange) formulation,
//! every distance constraint adds one multiplier to the unknowns. The state
//! vector is
//!
//! ```text
//! (p(m0), p(m1), …, λ0, λ1, …)
//! ```
//!
//! with _D_ position components per mass. The mass operator is zero in the
//! multiplier rows, which turns them into algebraic equations and the whole
//! problem into an index-1 DAE.
//!
//! ```rust
//! use odeon::mechanics::{Connector, DistanceConstraint, Mass, MassSpringSystem};
//!
//! # fn main() -> Result<(), odeon::mechanics::MechanicsError> {
//! // A pendulum.
//! let mut system = MassSpringSystem::<2>::new();
//! system.set_gravity([0.0, -9.81]);
//!
//! let anchor = system.add_fix([0.0, 0.0]);
//! let bob = system.add_mass(Mass::new(1.0, [1.0, 0.0]));
//! system.add_distance_constraint(DistanceConstraint::new([anchor, bob], 1.0))?;
//!
//! system.simulate(0.5, 50)?;
//!
//! let p = system.position(bob)?;
//! assert!((p.norm() - 1.0).abs() < 1e-3);
//! assert!(p[1] < 0.0);
//! # Ok(())
//! # }
//! ```

mod entity;
mod residual;
mod system;

use getset::{CopyGetters, Setters};
use thiserror::Error;

use crate::core::ConfigError;
use crate::newton::NewtonOptions;
use crate::stepper::{AlphaOptions, GeneralizedAlpha, StepError};

pub use entity::*;
pub use residual::*;
pub use system::*;

/// Distances below this are treated as coincident endpoints, for which
/// springs and constraints contribute nothing.
pub const DEGENERATE_LENGTH: f64 = 1e-12;

/// Error returned from [`MassSpringSystem`] operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MechanicsError {
    /// A connector refers to a fix or mass that does not exist.
    #[error("unknown connector {0}")]
    UnknownConnector(Connector),
    /// State vectors are too short for the system.
    #[error("state vectors need at least {expected} components, found {found}")]
    InvalidDimensionality {
        /// Required length.
        expected: usize,
        /// Given length.
        found: usize,
    },
    /// Time interval or number of steps is not usable.
    #[error("invalid stepping: t_end = {t_end}, steps = {steps}")]
    InvalidSteps {
        /// End time.
        t_end: f64,
        /// Number of steps.
        steps: usize,
    },
    /// The integrator could not be set up.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A time step failed.
    #[error(transparent)]
    Step(#[from] StepError),
}

/// How distance constraints are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ConstraintFormulation {
    /// Exactly, by one Lagrange multiplier per constraint.
    #[default]
    Lagrange,
    /// Approximately, by a stiff spring with given stiffness. No multipliers
    /// are added to the state.
    Penalty {
        /// Stiffness of the penalty spring.
        stiffness: f64,
    },
}

/// Options for [`MassSpringSystem::simulate_with`].
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct SimulationOptions {
    /// Coefficients of the time integration. Default: `ρ∞ = 0.8`.
    alpha: AlphaOptions,
    /// Newton options for each step. Default:
    /// [`GeneralizedAlpha::default_newton`].
    newton: NewtonOptions,
    /// Treatment of distance constraints. Default: Lagrange multipliers.
    formulation: ConstraintFormulation,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            alpha: AlphaOptions::default(),
            newton: GeneralizedAlpha::default_newton(),
            formulation: ConstraintFormulation::default(),
        }
    }
}
