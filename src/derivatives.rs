//! Finite difference approximations of derivatives.
//!
//! Residual functions in odeon always provide exact Jacobians. The tools here
//! are meant for verifying them.

use std::ops::Deref;

use nalgebra::{DMatrix, DVector};

use crate::core::Function;

/// Cubic root of double precision machine epsilon. This value is a standard
/// constant for step sizes of central difference approximations.
pub const EPSILON_CBRT: f64 = 0.0000060554544523933395;

/// Jacobian matrix of a function approximated by central differences.
#[derive(Debug)]
pub struct Jacobian {
    jac: DMatrix<f64>,
}

impl Jacobian {
    /// Initializes the Jacobian matrix with zeros.
    pub fn zeros<F: Function + ?Sized>(f: &F) -> Self {
        Self {
            jac: DMatrix::zeros(f.dim_f(), f.dim_x()),
        }
    }

    /// Computes the Jacobian matrix of the function in given point. See
    /// [`compute`](Jacobian::compute) for more details.
    pub fn new<F: Function + ?Sized>(f: &F, x: &mut DVector<f64>) -> Self {
        let mut jac = Self::zeros(f);
        jac.compute(f, x);
        jac
    }

    /// Computes the Jacobian matrix of the function in given point.
    ///
    /// The parameter `x` is mutable to allow temporary mutations avoiding
    /// unnecessary allocations, but after this method ends, the content of the
    /// vector is exactly the same as before.
    pub fn compute<F: Function + ?Sized>(&mut self, f: &F, x: &mut DVector<f64>) -> &mut Self {
        let mut forward = DVector::zeros(f.dim_f());
        let mut backward = DVector::zeros(f.dim_f());

        for (j, mut col) in self.jac.column_iter_mut().enumerate() {
            let xj = x[j];

            // Scale the step with the magnitude of the variable, but do not
            // let it vanish for variables close to zero.
            let step = EPSILON_CBRT * xj.abs().max(1.0);

            x[j] = xj + step;
            f.eval(x, &mut forward);

            x[j] = xj - step;
            f.eval(x, &mut backward);

            // J[i, j] = (F(x + e_j * step) - F(x - e_j * step)) / (2 * step).
            col.copy_from(&((&forward - &backward) / (2.0 * step)));

            // Restore the original value.
            x[j] = xj;
        }

        self
    }
}

impl Deref for Jacobian {
    type Target = DMatrix<f64>;

    fn deref(&self) -> &Self::Target {
        &self.jac
    }
}
