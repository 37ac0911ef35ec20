use std::fmt;

use nalgebra::SVector;

/// Point mass moving in _D_ dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Mass<const D: usize> {
    /// Mass.
    pub mass: f64,
    /// Position.
    pub pos: SVector<f64, D>,
    /// Velocity.
    pub vel: SVector<f64, D>,
    /// Acceleration.
    pub acc: SVector<f64, D>,
}

impl<const D: usize> Mass<D> {
    /// Creates a mass at rest in given position.
    pub fn new(mass: f64, pos: [f64; D]) -> Self {
        Self {
            mass,
            pos: SVector::from(pos),
            vel: SVector::zeros(),
            acc: SVector::zeros(),
        }
    }

    /// Sets the initial velocity.
    pub fn with_velocity(mut self, vel: [f64; D]) -> Self {
        self.vel = SVector::from(vel);
        self
    }
}

/// Point that never moves.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix<const D: usize> {
    /// Position.
    pub pos: SVector<f64, D>,
}

impl<const D: usize> Fix<D> {
    /// Creates a fix in given position.
    pub fn new(pos: [f64; D]) -> Self {
        Self {
            pos: SVector::from(pos),
        }
    }
}

/// Index of a fix or a mass within its
/// [`MassSpringSystem`](super::MassSpringSystem).
///
/// Connectors are obtained from `add_fix` and `add_mass`. They stay valid
/// because entities are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connector {
    /// Index into the fixes.
    Fix(usize),
    /// Index into the masses.
    Mass(usize),
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connector::Fix(index) => write!(f, "f{index}"),
            Connector::Mass(index) => write!(f, "m{index}"),
        }
    }
}

/// Linear spring between two connectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    /// Length without tension.
    pub rest_length: f64,
    /// Force per unit of elongation.
    pub stiffness: f64,
    /// Endpoints.
    pub connectors: [Connector; 2],
}

impl Spring {
    /// Creates a spring between two connectors.
    pub fn new(rest_length: f64, stiffness: f64, connectors: [Connector; 2]) -> Self {
        Self {
            rest_length,
            stiffness,
            connectors,
        }
    }
}

/// Rigid bar keeping two connectors at a fixed distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceConstraint {
    /// Endpoints.
    pub connectors: [Connector; 2],
    /// Required distance.
    pub rest_length: f64,
}

impl DistanceConstraint {
    /// Creates a constraint between two connectors.
    pub fn new(connectors: [Connector; 2], rest_length: f64) -> Self {
        Self {
            connectors,
            rest_length,
        }
    }
}
