//! Lorentzian line shape and its Levenberg-Marquardt least-squares fit.
//!
//! Model (linear power units):
//!
//! ```text
//! P(λ) = offset + A · γ² / ((λ − λ₀)² + γ²)
//! ```
//!
//! A transmission dip has `A < 0`. The solver follows the classic
//! Marquardt scheme: damped normal equations with the damping scaled by the
//! running maximum of the Jacobian column norms, and the same default
//! tolerances as MINPACK's `lmdif`.

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

/// Relative tolerance on cost reduction, step size and gradient.
const TOLERANCE: f64 = 1.49012e-8;
/// Initial damping factor.
const INITIAL_DAMPING: f64 = 1e-3;
/// Damping above which the step is considered stuck.
const MAX_DAMPING: f64 = 1e16;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Lorentzian parameters. Powers are linear (mW), wavelengths in nm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LorentzianParams {
    pub amplitude: f64,
    pub center_nm: f64,
    /// Half width at half maximum (signed as fitted; use `abs()`).
    pub gamma_nm: f64,
    pub offset: f64,
}

impl LorentzianParams {
    fn to_vector(self) -> Vector4<f64> {
        Vector4::new(self.amplitude, self.center_nm, self.gamma_nm, self.offset)
    }

    fn from_vector(v: &Vector4<f64>) -> Self {
        Self {
            amplitude: v[0],
            center_nm: v[1],
            gamma_nm: v[2],
            offset: v[3],
        }
    }

    /// Evaluate the model at `wavelength_nm`.
    pub fn eval(&self, wavelength_nm: f64) -> f64 {
        let d = wavelength_nm - self.center_nm;
        let g2 = self.gamma_nm * self.gamma_nm;
        self.offset + self.amplitude * g2 / (d * d + g2)
    }

    /// Partial derivatives with respect to (A, λ₀, γ, offset).
    fn gradient(&self, wavelength_nm: f64) -> Vector4<f64> {
        let d = wavelength_nm - self.center_nm;
        let g = self.gamma_nm;
        let g2 = g * g;
        let denom = d * d + g2;
        let denom2 = denom * denom;
        Vector4::new(
            g2 / denom,
            self.amplitude * 2.0 * g2 * d / denom2,
            self.amplitude * 2.0 * g * d * d / denom2,
            1.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Successful least-squares solution.
#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    pub params: LorentzianParams,
    /// Parameter covariance `(JᵀJ)⁻¹ · SSR / (n − 4)`; `None` when the
    /// normal matrix is singular or there are no degrees of freedom.
    pub covariance: Option<Matrix4<f64>>,
    /// Sum of squared residuals.
    pub ssr: f64,
    pub evaluations: usize,
}

/// Why the solver stopped without a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    /// Evaluation budget exhausted (or damping ran away) before convergence.
    NotConverged { evaluations: usize },
    /// The damped normal equations could not be factored.
    Singular,
}

fn sum_squares(params: &LorentzianParams, x: &[f64], y: &[f64]) -> f64 {
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - params.eval(xi);
            r * r
        })
        .sum()
}

/// Normal matrix `JᵀJ` and gradient `Jᵀr` at `params`.
fn normal_equations(
    params: &LorentzianParams,
    x: &[f64],
    y: &[f64],
) -> (Matrix4<f64>, Vector4<f64>) {
    let mut jtj = Matrix4::zeros();
    let mut jtr = Vector4::zeros();
    for (&xi, &yi) in x.iter().zip(y) {
        let g = params.gradient(xi);
        let r = yi - params.eval(xi);
        jtj += g * g.transpose();
        jtr += g * r;
    }
    (jtj, jtr)
}

/// Fit a Lorentzian to `(x, y)` starting from `initial`.
///
/// Each trial of the model over the data counts as one evaluation; the fit
/// fails with [`SolveError::NotConverged`] once `max_evaluations` is spent.
pub fn fit_lorentzian(
    x: &[f64],
    y: &[f64],
    initial: LorentzianParams,
    max_evaluations: usize,
) -> Result<LeastSquaresFit, SolveError> {
    let mut p = initial.to_vector();
    let mut params = initial;
    let mut cost = sum_squares(&params, x, y);
    let mut evaluations = 1;
    let mut damping = INITIAL_DAMPING;
    let mut scale = Vector4::<f64>::zeros();

    loop {
        if cost == 0.0 {
            break;
        }

        let (jtj, jtr) = normal_equations(&params, x, y);

        for i in 0..4 {
            scale[i] = scale[i].max(jtj[(i, i)].sqrt());
        }
        if scale.iter().any(|s| *s == 0.0) {
            return Err(SolveError::Singular);
        }

        // Gradient orthogonality: cos of the angle between r and each column.
        let r_norm = cost.sqrt();
        let gnorm = (0..4)
            .map(|i| jtr[i].abs() / (jtj[(i, i)].sqrt().max(f64::MIN_POSITIVE) * r_norm))
            .fold(0.0f64, f64::max);
        if gnorm <= TOLERANCE {
            break;
        }

        // Inner loop: raise damping until a step lowers the cost.
        let mut accepted = false;
        let mut small_step = false;
        while !accepted {
            if evaluations >= max_evaluations || damping > MAX_DAMPING {
                log::debug!(
                    "Lorentzian fit stopped after {evaluations} evaluations (damping {damping:.1e})"
                );
                return Err(SolveError::NotConverged { evaluations });
            }

            let mut a = jtj;
            for i in 0..4 {
                a[(i, i)] += damping * scale[i] * scale[i];
            }
            let step = match a.cholesky() {
                Some(ch) => ch.solve(&jtr),
                None => return Err(SolveError::Singular),
            };

            let trial = p + step;
            let trial_params = LorentzianParams::from_vector(&trial);
            let trial_cost = sum_squares(&trial_params, x, y);
            evaluations += 1;

            small_step = (0..4).all(|i| step[i].abs() <= TOLERANCE * (p[i].abs() + TOLERANCE));

            if trial_cost.is_finite() && trial_cost < cost {
                let reduction = (cost - trial_cost) / cost;
                p = trial;
                params = trial_params;
                cost = trial_cost;
                damping = (damping / 10.0).max(1e-12);
                accepted = true;
                if reduction <= TOLERANCE {
                    small_step = true;
                }
            } else {
                damping *= 10.0;
                if small_step {
                    break;
                }
            }
        }

        if small_step {
            break;
        }
    }

    let n = x.len();
    let (jtj, _) = normal_equations(&params, x, y);
    let covariance = if n > 4 {
        jtj.try_inverse().map(|inv| inv * (cost / (n - 4) as f64))
    } else {
        None
    };

    Ok(LeastSquaresFit {
        params,
        covariance,
        ssr: cost,
        evaluations,
    })
}
