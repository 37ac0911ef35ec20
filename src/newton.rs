//! Newton's method for square systems of nonlinear equations.
//!
//! Given a residual _F_ with as many outputs as inputs and an initial guess
//! _x_, the method repeats
//!
//! ```text
//! x <- x - F'(x)^-1 F(x)
//! ```
//!
//! until _|| F(x) || < tolerance_ or the maximum number of iterations is
//! reached. Optionally, the iteration also stops once the step becomes small
//! relative to the iterate, _|| Δx || < step_tolerance (1 + || x ||)_. That
//! is needed for residuals whose scale makes the absolute tolerance
//! unreachable in floating point arithmetic. The full step is always taken (no damping, no line search), so a
//! reasonable initial guess is expected. In time stepping this is the state
//! from the previous step.
//!
//! ```rust
//! use odeon::nalgebra::dvector;
//! use odeon::{newton, Constant, Expr};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // x - c = 0
//! let c = Constant::new(dvector![3.0, -1.0]);
//! let equ = Expr::sub(&Expr::identity(2), &Expr::constant(&c))?;
//!
//! let mut x = dvector![0.0, 0.0];
//! newton::solve(&equ, &mut x, 1e-10, 10)?;
//! assert_eq!(x, dvector![3.0, -1.0]);
//! # Ok(())
//! # }
//! ```

use getset::{CopyGetters, Setters};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::core::Function;

/// Options for [`Newton`] solver.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct NewtonOptions {
    /// Absolute tolerance for the norm of the residuals. Default: `1e-10`.
    tolerance: f64,
    /// Maximum number of iterations. Default: `20`.
    max_iters: usize,
    /// Relative tolerance for the norm of the step. Zero disables the
    /// criterion. Default: `0`.
    step_tolerance: f64,
}

impl NewtonOptions {
    /// Creates options with given tolerance and iteration limit.
    pub fn new(tolerance: f64, max_iters: usize) -> Self {
        Self {
            tolerance,
            max_iters,
            step_tolerance: 0.0,
        }
    }

    /// Returns the options with the step criterion set to `step_tolerance`.
    pub fn with_step_tolerance(mut self, step_tolerance: f64) -> Self {
        self.step_tolerance = step_tolerance;
        self
    }
}

impl Default for NewtonOptions {
    fn default() -> Self {
        Self::new(1e-10, 20)
    }
}

/// Error returned from [`Newton`] solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NewtonError {
    /// The residual is not square or the initial guess has a wrong dimension.
    #[error("invalid dimensionality: {dim_x} unknowns, {dim_f} residuals, {len} initial values")]
    InvalidDimensionality {
        /// Number of inputs of the residual.
        dim_x: usize,
        /// Number of outputs of the residual.
        dim_f: usize,
        /// Dimension of the initial guess.
        len: usize,
    },
    /// The Jacobian matrix is (numerically) singular.
    #[error("singular Jacobian matrix in iteration {iter}")]
    Singular {
        /// Iteration in which the linear solve failed.
        iter: usize,
    },
    /// The tolerance was not reached within the iteration limit.
    #[error("no convergence in {iters} iterations (|| F(x) || = {norm})")]
    Convergence {
        /// Number of performed iterations.
        iters: usize,
        /// Norm of the residuals at the last iterate.
        norm: f64,
    },
}

/// Summary of a successful [`Newton::solve`].
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct NewtonReport {
    /// Number of performed iterations.
    iters: usize,
    /// Norm of the residuals in the last evaluated point. When the iteration
    /// stopped on the step criterion, that is the point before the last step.
    norm: f64,
}

/// Newton solver. See [module](self) documentation for more details.
///
/// The solver owns the buffers for residuals and the Jacobian matrix, so
/// reusing one instance across many solves of the same dimension does not
/// allocate them again.
#[derive(Debug, Clone)]
pub struct Newton {
    options: NewtonOptions,
    fx: DVector<f64>,
    jac: DMatrix<f64>,
    dx: DVector<f64>,
}

impl Newton {
    /// Initializes Newton solver with default options.
    pub fn new() -> Self {
        Self::with_options(NewtonOptions::default())
    }

    /// Initializes Newton solver with given options.
    pub fn with_options(options: NewtonOptions) -> Self {
        Self {
            options,
            fx: DVector::zeros(0),
            jac: DMatrix::zeros(0, 0),
            dx: DVector::zeros(0),
        }
    }

    /// Returns the options of the solver.
    pub fn options(&self) -> &NewtonOptions {
        &self.options
    }

    /// Returns mutable options of the solver.
    pub fn options_mut(&mut self) -> &mut NewtonOptions {
        &mut self.options
    }

    /// Returns the residuals computed in the last evaluated point.
    pub fn residuals(&self) -> &DVector<f64> {
        &self.fx
    }

    fn prepare<F: Function + ?Sized>(&mut self, f: &F, x: &DVector<f64>) -> Result<(), NewtonError> {
        let n = x.len();

        if f.dim_x() != n || f.dim_f() != n {
            return Err(NewtonError::InvalidDimensionality {
                dim_x: f.dim_x(),
                dim_f: f.dim_f(),
                len: n,
            });
        }

        if self.fx.len() != n {
            self.fx = DVector::zeros(n);
            self.jac = DMatrix::zeros(n, n);
            self.dx = DVector::zeros(n);
        }

        Ok(())
    }

    /// Computes one Newton step from `x`.
    ///
    /// Returns the norm of the residuals in `x` *before* the step was taken.
    /// The `iter` argument is used only for error reporting and logging.
    pub fn solve_next<F: Function + ?Sized>(
        &mut self,
        f: &F,
        x: &mut DVector<f64>,
        iter: usize,
    ) -> Result<f64, NewtonError> {
        self.prepare(f, x)?;
        f.eval(x, &mut self.fx);
        let norm = self.fx.norm();
        self.update(f, x, iter)?;
        Ok(norm)
    }

    fn update<F: Function + ?Sized>(
        &mut self,
        f: &F,
        x: &mut DVector<f64>,
        iter: usize,
    ) -> Result<(), NewtonError> {
        f.eval_deriv(x, &mut self.jac);

        // Only exact zero pivots are rejected. Saddle-point systems of
        // constrained mechanics have pivots spanning many orders of magnitude.
        let lu = self.jac.clone().lu();

        self.dx.copy_from(&self.fx);
        if !lu.solve_mut(&mut self.dx) || self.dx.iter().any(|v| !v.is_finite()) {
            debug!("singular Jacobian in iteration {}", iter);
            return Err(NewtonError::Singular { iter });
        }

        *x -= &self.dx;
        Ok(())
    }

    /// Runs the iteration until the tolerance is reached, modifying `x` in
    /// place. On success, `x` holds the solution.
    pub fn solve<F: Function + ?Sized>(
        &mut self,
        f: &F,
        x: &mut DVector<f64>,
    ) -> Result<NewtonReport, NewtonError> {
        let NewtonOptions {
            tolerance,
            max_iters,
            step_tolerance,
        } = self.options;

        self.prepare(f, x)?;

        let mut iter = 0;

        loop {
            f.eval(x, &mut self.fx);
            let norm = self.fx.norm();
            debug!("iter = {}\t|| F(x) || = {}", iter, norm);

            if norm < tolerance {
                return Ok(NewtonReport { iters: iter, norm });
            }

            if iter == max_iters || !norm.is_finite() {
                warn!(
                    "Newton did not converge in {} iterations (|| F(x) || = {})",
                    iter, norm
                );
                return Err(NewtonError::Convergence { iters: iter, norm });
            }

            self.update(f, x, iter)?;
            iter += 1;

            let step = self.dx.norm();
            if step < step_tolerance * (1.0 + x.norm()) {
                debug!("iter = {}\t|| dx || = {} (step criterion)", iter, step);
                return Ok(NewtonReport { iters: iter, norm });
            }
        }
    }
}

impl Default for Newton {
    fn default() -> Self {
        Self::new()
    }
}

/// Solves `f(x) = 0` starting from `x` with given tolerance and iteration
/// limit. On success, `x` holds the solution.
pub fn solve<F: Function + ?Sized>(
    f: &F,
    x: &mut DVector<f64>,
    tolerance: f64,
    max_iters: usize,
) -> Result<NewtonReport, NewtonError> {
    Newton::with_options(NewtonOptions::new(tolerance, max_iters)).solve(f, x)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::{Constant, Expr, Parameter};
    use crate::testing::Sqrt2;

    use nalgebra::dvector;

    /// `A x - b` for a fixed 2x2 matrix.
    struct Linear2 {
        a: [[f64; 2]; 2],
        b: [f64; 2],
    }

    impl Function for Linear2 {
        fn dim_x(&self) -> usize {
            2
        }

        fn dim_f(&self) -> usize {
            2
        }

        fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
            for i in 0..2 {
                fx[i] = self.a[i][0] * x[0] + self.a[i][1] * x[1] - self.b[i];
            }
        }

        fn eval_deriv(&self, _x: &DVector<f64>, jac: &mut DMatrix<f64>) {
            for i in 0..2 {
                for j in 0..2 {
                    jac[(i, j)] = self.a[i][j];
                }
            }
        }
    }

    /// `x - 1` polluted by noise of size `1e-9` that the derivative ignores.
    struct Noisy;

    impl Function for Noisy {
        fn dim_x(&self) -> usize {
            1
        }

        fn dim_f(&self) -> usize {
            1
        }

        fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
            fx[0] = x[0] - 1.0 + 1e-9 * (1e12 * x[0]).sin();
        }

        fn eval_deriv(&self, _x: &DVector<f64>, jac: &mut DMatrix<f64>) {
            jac[(0, 0)] = 1.0;
        }
    }

    #[test]
    fn sqrt2() {
        let f = Sqrt2;
        let mut x = dvector![1.0];

        let report = solve(&f, &mut x, 1e-12, 10).unwrap();

        assert!((x[0] - 2f64.sqrt()).abs() < 1e-12);
        assert!(report.iters() <= 6);
        assert!(report.norm() < 1e-12);
    }

    #[test]
    fn quadratic_convergence() {
        let f = Sqrt2;
        let root = 2f64.sqrt();
        let mut newton = Newton::new();
        let mut x = dvector![2.0];
        let mut errors = vec![(x[0] - root).abs()];

        for iter in 0..4 {
            newton.solve_next(&f, &mut x, iter).unwrap();
            errors.push((x[0] - root).abs());
        }

        // e_{k+1} ~ e_k^2 / (2 root) near a simple root.
        for k in 1..3 {
            let ratio = errors[k + 1] / errors[k].powi(2);
            assert!(ratio > 0.5 / root * 0.5 && ratio < 0.5 / root * 2.0, "{:?}", errors);
        }
    }

    #[test]
    fn linear_residual_in_one_step() {
        let c = Constant::new(dvector![1.0, 2.0, 3.0]);
        let p = Parameter::new(4.0);
        // 4 x - c = 0
        let equ = Expr::sub(&Expr::scale(&p, &Expr::identity(3)), &Expr::constant(&c)).unwrap();

        let mut x = dvector![10.0, 10.0, 10.0];
        let report = Newton::new().solve(&equ, &mut x).unwrap();

        assert_eq!(report.iters(), 1);
        assert!((x - dvector![0.25, 0.5, 0.75]).norm() < 1e-14);
    }

    #[test]
    fn singular_jacobian() {
        // x^2 - 2 has zero derivative in zero.
        let mut x = dvector![0.0];
        assert_eq!(
            solve(&Sqrt2, &mut x, 1e-10, 10),
            Err(NewtonError::Singular { iter: 0 })
        );

        let mut x = dvector![1.0, 1.0];
        let equ = Expr::constant(&Constant::new(dvector![1.0, 1.0]));
        assert!(matches!(
            solve(&equ, &mut x, 1e-10, 10),
            Err(NewtonError::Singular { .. })
        ));
    }

    #[test]
    fn badly_scaled_saddle_point() {
        // [s 1; 1 0] with s = 2^27 has pivots s and -1/s, yet a well defined
        // solution.
        let s = 2f64.powi(27);
        let f = Linear2 {
            a: [[s, 1.0], [1.0, 0.0]],
            b: [s, 1.0],
        };

        let mut x = dvector![0.0, 3.0];
        let report = solve(&f, &mut x, 1e-10, 10).unwrap();

        assert_eq!(report.iters(), 1);
        assert_eq!(x, dvector![1.0, 0.0]);
    }

    #[test]
    fn step_criterion_on_noisy_residual() {
        let options = NewtonOptions::new(1e-12, 20);

        let mut x = dvector![0.0];
        assert!(matches!(
            Newton::with_options(options).solve(&Noisy, &mut x),
            Err(NewtonError::Convergence { iters: 20, .. })
        ));

        let mut x = dvector![0.0];
        let report = Newton::with_options(options.with_step_tolerance(1e-8))
            .solve(&Noisy, &mut x)
            .unwrap();

        assert!(report.iters() <= 2);
        assert!((x[0] - 1.0).abs() < 1e-8);
    }

    #[test]
    fn convergence_failure() {
        let mut x = dvector![1e6];
        let result = solve(&Sqrt2, &mut x, 1e-12, 3);

        assert!(matches!(
            result,
            Err(NewtonError::Convergence { iters: 3, .. })
        ));
    }

    #[test]
    fn reuse_across_dimensions() {
        let mut newton = Newton::new();

        let mut x = dvector![1.0];
        newton.solve(&Sqrt2, &mut x).unwrap();

        let c = Constant::new(dvector![1.0, -1.0]);
        let equ = Expr::sub(&Expr::identity(2), &Expr::constant(&c)).unwrap();
        let mut y = dvector![0.0, 0.0];
        newton.solve(&equ, &mut y).unwrap();

        assert_eq!(y, dvector![1.0, -1.0]);
        assert_eq!(newton.residuals().len(), 2);
    }

    #[test]
    fn invalid_dimensionality() {
        let mut x = dvector![1.0, 2.0];
        assert_eq!(
            solve(&Sqrt2, &mut x, 1e-10, 10),
            Err(NewtonError::InvalidDimensionality {
                dim_x: 1,
                dim_f: 1,
                len: 2
            })
        );
    }
}
