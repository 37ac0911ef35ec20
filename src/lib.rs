#![allow(clippy::many_single_char_names)]
#![warn(missing_docs)]

//! # Odeon
//!
//! A pure Rust framework for implicit time stepping of ordinary differential
//! equations and index-1 differential-algebraic equations.
//!
//! Implicit methods need to solve a nonlinear equation in every step. Odeon
//! builds these equations declaratively from a small set of
//! [expressions](Expr) with exact Jacobians, solves them with
//! [Newton's method](newton) and reuses the very same expression in every
//! step by only updating its [`Constant`] and [`Parameter`] leaves.
//!
//! ## Modules
//!
//! * [Expressions](Expr) -- Composable residual functions with analytic
//!   derivatives.
//! * [Newton](newton) -- Root finding for square systems.
//! * [Steppers](stepper) -- Explicit and implicit Euler, Crank–Nicolson,
//!   explicit and implicit Runge–Kutta, and the generalized-alpha method for
//!   second order systems with singular mass matrix.
//! * [Mechanics](mechanics) -- Mass-spring systems with rigid distance
//!   constraints enforced by Lagrange multipliers.
//! * [Trajectory](trajectory) -- Recording and CSV export.
//!
//! ## Problem
//!
//! A right-hand side _f_ of _y' = f(y)_, as well as any other nonlinear
//! function entering an expression, is a type implementing [`Function`]. It
//! provides the values together with the Jacobian matrix.
//!
//! ```rust
//! // Odeon is based on `nalgebra` crate.
//! use odeon::nalgebra as na;
//! use odeon::Function;
//!
//! // Van der Pol oscillator.
//! struct VanDerPol {
//!     mu: f64,
//! }
//!
//! impl Function for VanDerPol {
//!     fn dim_x(&self) -> usize {
//!         2
//!     }
//!
//!     fn dim_f(&self) -> usize {
//!         2
//!     }
//!
//!     fn eval(&self, x: &na::DVector<f64>, fx: &mut na::DVector<f64>) {
//!         fx[0] = x[1];
//!         fx[1] = self.mu * (1.0 - x[0] * x[0]) * x[1] - x[0];
//!     }
//!
//!     fn eval_deriv(&self, x: &na::DVector<f64>, jac: &mut na::DMatrix<f64>) {
//!         jac[(0, 0)] = 0.0;
//!         jac[(0, 1)] = 1.0;
//!         jac[(1, 0)] = -2.0 * self.mu * x[0] * x[1] - 1.0;
//!         jac[(1, 1)] = self.mu * (1.0 - x[0] * x[0]);
//!     }
//! }
//! ```
//!
//! ## Stepping
//!
//! Any [`TimeStepper`](stepper::TimeStepper) advances the state in place.
//!
//! ```rust
//! use odeon::nalgebra::dvector;
//! use odeon::stepper::{CrankNicolson, TimeStepper};
//! # use odeon::nalgebra as na;
//! # use odeon::Function;
//! #
//! # struct VanDerPol {
//! #     mu: f64,
//! # }
//! #
//! # impl Function for VanDerPol {
//! #     fn dim_x(&self) -> usize { 2 }
//! #     fn dim_f(&self) -> usize { 2 }
//! #     fn eval(&self, x: &na::DVector<f64>, fx: &mut na::DVector<f64>) {
//! #         fx[0] = x[1];
//! #         fx[1] = self.mu * (1.0 - x[0] * x[0]) * x[1] - x[0];
//! #     }
//! #     fn eval_deriv(&self, x: &na::DVector<f64>, jac: &mut na::DMatrix<f64>) {
//! #         jac[(0, 0)] = 0.0;
//! #         jac[(0, 1)] = 1.0;
//! #         jac[(1, 0)] = -2.0 * self.mu * x[0] * x[1] - 1.0;
//! #         jac[(1, 1)] = self.mu * (1.0 - x[0] * x[0]);
//! #     }
//! # }
//!
//! let f = VanDerPol { mu: 5.0 };
//! let mut stepper = CrankNicolson::new(f).expect("square system");
//! let mut y = dvector![2.0, 0.0];
//!
//! for step in 1..=100 {
//!     stepper.do_step(0.01, &mut y).expect("newton failed");
//!     println!("t = {:.2}\tx = {}\tv = {}", step as f64 * 0.01, y[0], y[1]);
//! }
//! ```
//!
//! ## License
//!
//! Licensed under MIT.

mod core;
pub mod derivatives;
pub mod mechanics;
pub mod newton;
pub mod stepper;
pub mod trajectory;

pub use core::*;
pub use newton::{Newton, NewtonError, NewtonOptions};

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(not(feature = "testing"))]
pub(crate) mod testing;

pub use nalgebra;
