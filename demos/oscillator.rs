//! Integrates the harmonic oscillator _x'' = -x_ with several one-step methods
//! and step sizes, writing one CSV file per method into the current
//! directory.

use std::error::Error;
use std::f64::consts::PI;
use std::fs::File;
use std::io::BufWriter;

use odeon::nalgebra as na;
use odeon::stepper::{
    ButcherTableau, CrankNicolson, ExplicitEuler, ExplicitRungeKutta, ImplicitEuler,
    ImplicitRungeKutta, ImprovedEuler, TimeStepper,
};
use odeon::trajectory::Trajectory;
use odeon::Function;

const TAUS: [f64; 3] = [0.1, 0.05, 0.01];
const T_END: f64 = 8.0 * PI;

#[derive(Clone, Copy)]
struct MassSpring;

impl Function for MassSpring {
    fn dim_x(&self) -> usize {
        2
    }

    fn dim_f(&self) -> usize {
        2
    }

    fn eval(&self, x: &na::DVector<f64>, fx: &mut na::DVector<f64>) {
        fx[0] = x[1];
        fx[1] = -x[0];
    }

    fn eval_deriv(&self, _x: &na::DVector<f64>, jac: &mut na::DMatrix<f64>) {
        jac.fill(0.0);
        jac[(0, 1)] = 1.0;
        jac[(1, 0)] = -1.0;
    }
}

fn solve_and_write<S: TimeStepper>(
    mut stepper: S,
    filename: &str,
) -> Result<(), Box<dyn Error>> {
    let mut trajectory = Trajectory::new(["x", "v"]);

    for tau in TAUS {
        let steps = (T_END / tau) as usize;
        let mut y = na::dvector![1.0, 0.0];
        trajectory.record(&mut stepper, tau, steps, &mut y)?;

        println!(
            "{:<22} tau = {:<5} x(T) = {:+.6}\tenergy = {:.6}",
            S::NAME,
            tau,
            y[0],
            0.5 * y.norm_squared()
        );
    }

    trajectory.write_csv(BufWriter::new(File::create(filename)?))?;
    println!("wrote {}", filename);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    solve_and_write(ExplicitEuler::new(MassSpring)?, "explicit_euler.csv")?;
    solve_and_write(ImprovedEuler::new(MassSpring)?, "improved_euler.csv")?;
    solve_and_write(ImplicitEuler::new(MassSpring)?, "implicit_euler.csv")?;
    solve_and_write(CrankNicolson::new(MassSpring)?, "crank_nicolson.csv")?;
    solve_and_write(
        ExplicitRungeKutta::new(MassSpring, ButcherTableau::midpoint())?,
        "rk2.csv",
    )?;
    solve_and_write(ExplicitRungeKutta::rk4(MassSpring)?, "rk4.csv")?;
    solve_and_write(
        ImplicitRungeKutta::gauss_legendre2(MassSpring)?,
        "irk_gauss2.csv",
    )?;
    solve_and_write(
        ImplicitRungeKutta::new(MassSpring, ButcherTableau::radau_iia2())?,
        "irk_radau2.csv",
    )?;

    Ok(())
}
