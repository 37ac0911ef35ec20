use nalgebra::{DMatrix, DVector};

/// Definition of a differentiable vector function _f: R<sup>n</sup> →
/// R<sup>m</sup>_.
///
/// ## Defining a function
///
/// A function is any type that implements [`Function`]. Both the values and
/// the Jacobian matrix are provided analytically.
///
/// ```rust
/// use odeon::nalgebra as na;
/// use odeon::Function;
///
/// // Harmonic oscillator y'' = -(k / m) y written as a first order system.
/// struct MassSpring {
///     mass: f64,
///     stiffness: f64,
/// }
///
/// impl Function for MassSpring {
///     fn dim_x(&self) -> usize {
///         2
///     }
///
///     fn dim_f(&self) -> usize {
///         2
///     }
///
///     fn eval(&self, x: &na::DVector<f64>, fx: &mut na::DVector<f64>) {
///         fx[0] = x[1];
///         fx[1] = -self.stiffness / self.mass * x[0];
///     }
///
///     fn eval_deriv(&self, _x: &na::DVector<f64>, jac: &mut na::DMatrix<f64>) {
///         jac.fill(0.0);
///         jac[(0, 1)] = 1.0;
///         jac[(1, 0)] = -self.stiffness / self.mass;
///     }
/// }
/// ```
pub trait Function {
    /// Number of inputs.
    fn dim_x(&self) -> usize;

    /// Number of outputs.
    fn dim_f(&self) -> usize;

    /// Evaluates the function in `x`.
    ///
    /// The output buffer `fx` has `dim_f` components and must be overwritten,
    /// not accumulated into.
    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>);

    /// Evaluates the Jacobian matrix in `x`.
    ///
    /// The buffer `jac` has shape `dim_f × dim_x` and must be overwritten, not
    /// accumulated into.
    fn eval_deriv(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>);
}

impl<F: Function + ?Sized> Function for &F {
    fn dim_x(&self) -> usize {
        (**self).dim_x()
    }

    fn dim_f(&self) -> usize {
        (**self).dim_f()
    }

    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
        (**self).eval(x, fx)
    }

    fn eval_deriv(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        (**self).eval_deriv(x, jac)
    }
}

/// Some extension methods for the [`Function`] that may be found useful.
pub trait FunctionExt: Function {
    /// Evaluates the function into a newly allocated vector.
    fn eval_owned(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Evaluates the Jacobian matrix into a newly allocated matrix.
    fn eval_deriv_owned(&self, x: &DVector<f64>) -> DMatrix<f64>;

    /// Evaluates the function and returns the norm of the result.
    fn eval_norm(&self, x: &DVector<f64>, fx: &mut DVector<f64>) -> f64;

    /// Returns true if the function has the same number of inputs and
    /// outputs.
    fn is_square(&self) -> bool;
}

impl<F: Function + ?Sized> FunctionExt for F {
    fn eval_owned(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut fx = DVector::zeros(self.dim_f());
        self.eval(x, &mut fx);
        fx
    }

    fn eval_deriv_owned(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.dim_f(), self.dim_x());
        self.eval_deriv(x, &mut jac);
        jac
    }

    fn eval_norm(&self, x: &DVector<f64>, fx: &mut DVector<f64>) -> f64 {
        self.eval(x, fx);
        fx.norm()
    }

    fn is_square(&self) -> bool {
        self.dim_x() == self.dim_f()
    }
}
