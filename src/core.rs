//! Core abstractions of odeon.
//!
//! *Users* are mainly interested in implementing the [`Function`] trait for
//! their physical laws and wiring them into residual equations with the
//! [`Expr`] builders.
//!
//! Stepper *developers* build the residual of an implicit scheme once, keep
//! handles to its mutable leaves ([`Parameter`] and [`Constant`]) and update
//! those between the steps.

mod error;
mod expr;
mod function;

pub use error::*;
pub use expr::*;
pub use function::*;
