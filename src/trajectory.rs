//! Recording of time series and export to comma-separated values.
//!
//! ```rust
//! use odeon::nalgebra::dvector;
//! use odeon::trajectory::Trajectory;
//!
//! let mut trajectory = Trajectory::new(["x", "v"]);
//! trajectory.push(0.1, 0.0, &dvector![1.0, 0.0]);
//! trajectory.push(0.1, 0.1, &dvector![0.995, -0.1]);
//!
//! let mut csv = Vec::new();
//! trajectory.write_csv(&mut csv).unwrap();
//! assert_eq!(
//!     String::from_utf8(csv).unwrap(),
//!     "tau,t,x,v\n0.1,0,1,0\n0.1,0.1,0.995,-0.1\n"
//! );
//! ```

use std::io::{self, Write};

use nalgebra::DVector;

use crate::stepper::{StepError, TimeStepper};

/// Rows of _(τ, t, y<sub>0</sub>, y<sub>1</sub>, …)_.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Trajectory {
    /// Creates an empty trajectory with given names of the state components.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row.
    pub fn push(&mut self, tau: f64, t: f64, y: &DVector<f64>) {
        let mut row = Vec::with_capacity(y.len() + 2);
        row.push(tau);
        row.push(t);
        row.extend(y.iter().copied());
        self.rows.push(row);
    }

    /// Runs `steps` steps of size `tau` starting from `y` and records the
    /// initial state and the state after every step.
    pub fn record<S: TimeStepper>(
        &mut self,
        stepper: &mut S,
        tau: f64,
        steps: usize,
        y: &mut DVector<f64>,
    ) -> Result<(), StepError> {
        self.push(tau, 0.0, y);
        crate::stepper::integrate(stepper, tau, steps, y, |t, y| self.push(tau, t, y))
    }

    /// Recorded rows.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Names of the columns including `tau` and `t`.
    pub fn header(&self) -> Vec<&str> {
        ["tau", "t"]
            .into_iter()
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }

    /// Writes the header and all rows as comma-separated values.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "{}", self.header().join(","))?;

        for row in &self.rows {
            let line = row
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(",");
            writeln!(writer, "{}", line)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::stepper::ExplicitEuler;
    use crate::testing::HarmonicOscillator;

    use nalgebra::dvector;

    #[test]
    fn record_steps() {
        let mut stepper = ExplicitEuler::new(HarmonicOscillator::default()).unwrap();
        let mut trajectory = Trajectory::new(["x", "v"]);
        let mut y = dvector![1.0, 0.0];

        trajectory.record(&mut stepper, 0.5, 2, &mut y).unwrap();

        assert_eq!(
            trajectory.rows(),
            &[
                vec![0.5, 0.0, 1.0, 0.0],
                vec![0.5, 0.5, 1.0, -0.5],
                vec![0.5, 1.0, 0.75, -1.0],
            ]
        );
    }

    #[test]
    fn csv_header() {
        let trajectory = Trajectory::new(vec!["uc".to_string(), "time".to_string()]);
        let mut out = Vec::new();
        trajectory.write_csv(&mut out).unwrap();
        assert_eq!(out, b"tau,t,uc,time\n");
    }
}
