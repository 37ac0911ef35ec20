//! Residual expression graph.
//!
//! Expressions are assembled from a fixed set of combinators whose
//! derivatives are known analytically: identity, constants, parameters,
//! composition, sum and difference, scaling and negation. Anything else
//! enters the graph as a user [`Function`].
//!
//! Nodes are reference counted. Cloning an [`Expr`] clones the handle, never
//! the node, so a leaf shared by several parents is one and the same leaf for
//! all of them. This is what makes the following pattern work:
//!
//! ```rust
//! use odeon::nalgebra::{dvector, DVector};
//! use odeon::{Constant, Expr, Function, FunctionExt, Parameter};
//!
//! # fn main() -> Result<(), odeon::ConfigError> {
//! // unew - uold - tau * unew
//! let uold = Constant::zeros(1);
//! let tau = Parameter::new(0.0);
//! let unew = Expr::identity(1);
//! let equ = Expr::sub(
//!     &Expr::sub(&unew, &Expr::constant(&uold))?,
//!     &Expr::scale(&tau, &unew),
//! )?;
//!
//! uold.set(&dvector![1.0]);
//! tau.set(0.5);
//! assert_eq!(equ.eval_owned(&dvector![2.0]), dvector![0.0]);
//! # Ok(())
//! # }
//! ```
//!
//! Mutating a leaf while a Newton solve on the same graph is in progress is
//! not supported. Leaves are meant to be updated between solves.

use std::{
    cell::{Cell, Ref, RefCell},
    fmt,
    rc::Rc,
};

use nalgebra::{DMatrix, DVector};

use super::{error::ConfigError, function::Function};

/// A scalar that can be reassigned after the expression using it was built.
#[derive(Debug, Clone, Default)]
pub struct Parameter(Rc<Cell<f64>>);

impl Parameter {
    /// Creates a new parameter with given initial value.
    pub fn new(value: f64) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    /// Returns the current value.
    pub fn get(&self) -> f64 {
        self.0.get()
    }

    /// Assigns a new value. The change is visible to every expression that
    /// refers to this parameter.
    pub fn set(&self, value: f64) {
        self.0.set(value);
    }
}

/// A vector that can be reassigned after the expression using it was built.
#[derive(Debug, Clone)]
pub struct Constant(Rc<RefCell<DVector<f64>>>);

impl Constant {
    /// Creates a new constant with given value.
    pub fn new(value: DVector<f64>) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Creates a new zero constant of given dimension.
    pub fn zeros(dim: usize) -> Self {
        Self::new(DVector::zeros(dim))
    }

    /// Dimension of the stored vector.
    pub fn dim(&self) -> usize {
        self.0.borrow().len()
    }

    /// Borrows the current value.
    pub fn value(&self) -> Ref<'_, DVector<f64>> {
        self.0.borrow()
    }

    /// Overwrites the stored vector.
    ///
    /// # Panics
    ///
    /// Panics if `value` does not have the dimension of the constant.
    pub fn set(&self, value: &DVector<f64>) {
        self.0.borrow_mut().copy_from(value);
    }
}

/// Multiplicative factor of [`Expr::scale`].
#[derive(Debug, Clone)]
pub enum Coefficient {
    /// A factor fixed at the time the expression is built.
    Fixed(f64),
    /// A factor that follows a shared [`Parameter`].
    Parameter(Parameter),
}

impl Coefficient {
    /// Returns the current value of the factor.
    pub fn value(&self) -> f64 {
        match self {
            Coefficient::Fixed(value) => *value,
            Coefficient::Parameter(param) => param.get(),
        }
    }
}

impl From<f64> for Coefficient {
    fn from(value: f64) -> Self {
        Coefficient::Fixed(value)
    }
}

impl From<Parameter> for Coefficient {
    fn from(param: Parameter) -> Self {
        Coefficient::Parameter(param)
    }
}

impl From<&Parameter> for Coefficient {
    fn from(param: &Parameter) -> Self {
        Coefficient::Parameter(param.clone())
    }
}

enum Node<'a> {
    Identity(usize),
    Constant(Constant),
    Parameter(Parameter),
    Compose { outer: Expr<'a>, inner: Expr<'a> },
    Sum { lhs: Expr<'a>, rhs: Expr<'a> },
    Difference { lhs: Expr<'a>, rhs: Expr<'a> },
    Scale { factor: Coefficient, inner: Expr<'a> },
    Negate(Expr<'a>),
    Custom(Rc<dyn Function + 'a>),
}

/// Shared handle to a node of a residual expression graph.
///
/// The lifetime allows user functions to borrow data (for example a
/// mechanical system) for as long as the expression lives.
#[derive(Clone)]
pub struct Expr<'a>(Rc<Node<'a>>);

impl<'a> Expr<'a> {
    fn node(node: Node<'a>) -> Self {
        Self(Rc::new(node))
    }

    /// _f(x) = x_ with Jacobian _I_.
    pub fn identity(dim: usize) -> Self {
        Self::node(Node::Identity(dim))
    }

    /// _f(x) = c_ with zero Jacobian. The value follows later
    /// [`Constant::set`] calls.
    pub fn constant(value: &Constant) -> Self {
        Self::node(Node::Constant(value.clone()))
    }

    /// Scalar function without inputs that evaluates to the current value of
    /// the parameter.
    pub fn parameter(param: &Parameter) -> Self {
        Self::node(Node::Parameter(param.clone()))
    }

    /// Wraps a user-defined function into the graph.
    pub fn function<F: Function + 'a>(f: F) -> Self {
        Self::node(Node::Custom(Rc::new(f)))
    }

    /// Wraps an already shared user-defined function into the graph.
    pub fn shared(f: Rc<dyn Function + 'a>) -> Self {
        Self::node(Node::Custom(f))
    }

    /// _outer(inner(x))_, differentiated by the chain rule.
    pub fn compose(outer: &Self, inner: &Self) -> Result<Self, ConfigError> {
        if outer.dim_x() != inner.dim_f() {
            return Err(ConfigError::DimensionMismatch {
                op: "compose",
                expected: outer.dim_x(),
                found: inner.dim_f(),
            });
        }

        Ok(Self::node(Node::Compose {
            outer: outer.clone(),
            inner: inner.clone(),
        }))
    }

    /// _lhs(x) + rhs(x)_.
    pub fn sum(lhs: &Self, rhs: &Self) -> Result<Self, ConfigError> {
        check_same_shape("sum", lhs, rhs)?;
        Ok(Self::node(Node::Sum {
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        }))
    }

    /// _lhs(x) - rhs(x)_.
    pub fn sub(lhs: &Self, rhs: &Self) -> Result<Self, ConfigError> {
        check_same_shape("sub", lhs, rhs)?;
        Ok(Self::node(Node::Difference {
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        }))
    }

    /// _c · inner(x)_ for a fixed or parametric factor _c_.
    pub fn scale(factor: impl Into<Coefficient>, inner: &Self) -> Self {
        Self::node(Node::Scale {
            factor: factor.into(),
            inner: inner.clone(),
        })
    }

    /// _-inner(x)_.
    pub fn neg(inner: &Self) -> Self {
        Self::node(Node::Negate(inner.clone()))
    }
}

fn check_same_shape(op: &'static str, lhs: &Expr<'_>, rhs: &Expr<'_>) -> Result<(), ConfigError> {
    if lhs.dim_x() != rhs.dim_x() {
        return Err(ConfigError::DimensionMismatch {
            op,
            expected: lhs.dim_x(),
            found: rhs.dim_x(),
        });
    }

    if lhs.dim_f() != rhs.dim_f() {
        return Err(ConfigError::DimensionMismatch {
            op,
            expected: lhs.dim_f(),
            found: rhs.dim_f(),
        });
    }

    Ok(())
}

impl Function for Expr<'_> {
    fn dim_x(&self) -> usize {
        match &*self.0 {
            Node::Identity(dim) => *dim,
            Node::Constant(value) => value.dim(),
            Node::Parameter(_) => 0,
            Node::Compose { inner, .. } => inner.dim_x(),
            Node::Sum { lhs, .. } | Node::Difference { lhs, .. } => lhs.dim_x(),
            Node::Scale { inner, .. } | Node::Negate(inner) => inner.dim_x(),
            Node::Custom(f) => f.dim_x(),
        }
    }

    fn dim_f(&self) -> usize {
        match &*self.0 {
            Node::Identity(dim) => *dim,
            Node::Constant(value) => value.dim(),
            Node::Parameter(_) => 1,
            Node::Compose { outer, .. } => outer.dim_f(),
            Node::Sum { lhs, .. } | Node::Difference { lhs, .. } => lhs.dim_f(),
            Node::Scale { inner, .. } | Node::Negate(inner) => inner.dim_f(),
            Node::Custom(f) => f.dim_f(),
        }
    }

    fn eval(&self, x: &DVector<f64>, fx: &mut DVector<f64>) {
        match &*self.0 {
            Node::Identity(_) => fx.copy_from(x),
            Node::Constant(value) => fx.copy_from(&*value.value()),
            Node::Parameter(param) => fx.fill(param.get()),
            Node::Compose { outer, inner } => {
                let mut y = DVector::zeros(inner.dim_f());
                inner.eval(x, &mut y);
                outer.eval(&y, fx);
            }
            Node::Sum { lhs, rhs } => {
                let mut tmp = DVector::zeros(rhs.dim_f());
                lhs.eval(x, fx);
                rhs.eval(x, &mut tmp);
                *fx += tmp;
            }
            Node::Difference { lhs, rhs } => {
                let mut tmp = DVector::zeros(rhs.dim_f());
                lhs.eval(x, fx);
                rhs.eval(x, &mut tmp);
                *fx -= tmp;
            }
            Node::Scale { factor, inner } => {
                inner.eval(x, fx);
                *fx *= factor.value();
            }
            Node::Negate(inner) => {
                inner.eval(x, fx);
                fx.neg_mut();
            }
            Node::Custom(f) => f.eval(x, fx),
        }
    }

    fn eval_deriv(&self, x: &DVector<f64>, jac: &mut DMatrix<f64>) {
        match &*self.0 {
            Node::Identity(_) => jac.fill_with_identity(),
            // Leaves are not functions of x.
            Node::Constant(_) | Node::Parameter(_) => jac.fill(0.0),
            Node::Compose { outer, inner } => {
                let mut y = DVector::zeros(inner.dim_f());
                inner.eval(x, &mut y);

                let mut jac_inner = DMatrix::zeros(inner.dim_f(), inner.dim_x());
                let mut jac_outer = DMatrix::zeros(outer.dim_f(), outer.dim_x());
                inner.eval_deriv(x, &mut jac_inner);
                outer.eval_deriv(&y, &mut jac_outer);

                jac_outer.mul_to(&jac_inner, jac);
            }
            Node::Sum { lhs, rhs } => {
                let mut tmp = DMatrix::zeros(rhs.dim_f(), rhs.dim_x());
                lhs.eval_deriv(x, jac);
                rhs.eval_deriv(x, &mut tmp);
                *jac += tmp;
            }
            Node::Difference { lhs, rhs } => {
                let mut tmp = DMatrix::zeros(rhs.dim_f(), rhs.dim_x());
                lhs.eval_deriv(x, jac);
                rhs.eval_deriv(x, &mut tmp);
                *jac -= tmp;
            }
            Node::Scale { factor, inner } => {
                inner.eval_deriv(x, jac);
                *jac *= factor.value();
            }
            Node::Negate(inner) => {
                inner.eval_deriv(x, jac);
                jac.neg_mut();
            }
            Node::Custom(f) => f.eval_deriv(x, jac),
        }
    }
}

impl fmt::Debug for Expr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            Node::Identity(dim) => write!(f, "Identity({dim})"),
            Node::Constant(value) => write!(f, "Constant({})", value.dim()),
            Node::Parameter(param) => write!(f, "Parameter({})", param.get()),
            Node::Compose { outer, inner } => write!(f, "Compose({outer:?}, {inner:?})"),
            Node::Sum { lhs, rhs } => write!(f, "({lhs:?} + {rhs:?})"),
            Node::Difference { lhs, rhs } => write!(f, "({lhs:?} - {rhs:?})"),
            Node::Scale { factor, inner } => write!(f, "{} * {inner:?}", factor.value()),
            Node::Negate(inner) => write!(f, "-{inner:?}"),
            Node::Custom(func) => write!(f, "Function({} -> {})", func.dim_x(), func.dim_f()),
        }
    }
}
