use std::fmt;

use serde::{Deserialize, Serialize};

use super::lorentzian::{fit_lorentzian, LorentzianParams, SolveError};
use super::peaks::ResonanceCandidate;
use crate::data::model::Spectrum;

/// A fit window must hold at least this many samples.
pub const MIN_FIT_SAMPLES: usize = 10;

// ---------------------------------------------------------------------------
// Fit outcome types
// ---------------------------------------------------------------------------

/// 1-σ standard errors derived from the fit covariance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitUncertainty {
    pub center_nm: f64,
    pub fwhm_nm: f64,
    pub q_factor: f64,
}

/// A resonance whose Lorentzian fit succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedResonance {
    /// Sample index of the originating candidate.
    pub candidate_index: usize,
    pub center_wavelength_nm: f64,
    pub fwhm_nm: f64,
    pub fwhm_pm: f64,
    pub q_factor: f64,
    /// `-10·log10(min/max)` of the measured samples in the fit window.
    pub extinction_ratio_db: f64,
    /// Depth of the fitted line shape, `-10·log10((offset + A) / offset)`;
    /// `None` when the fitted trough is not positive.
    pub fitted_depth_db: Option<f64>,
    pub params: LorentzianParams,
    pub uncertainty: Option<FitUncertainty>,
    pub r_squared: f64,
    /// Wavelength span of the samples used for the fit.
    pub fit_region_nm: (f64, f64),
    pub samples: usize,
    pub evaluations: usize,
}

/// Why a candidate produced no [`FittedResonance`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientSamples { found: usize, required: usize },
    DidNotConverge { evaluations: usize },
    SingularSystem,
    /// The fitted amplitude is not negative, i.e. the window holds no dip.
    NotADip { amplitude: f64 },
    NonPhysicalWidth { gamma_nm: f64 },
    CenterOutsideWindow { center_nm: f64, window_nm: (f64, f64) },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InsufficientSamples { found, required } => {
                write!(f, "fit window holds {found} samples, {required} required")
            }
            SkipReason::DidNotConverge { evaluations } => {
                write!(f, "fit did not converge within {evaluations} evaluations")
            }
            SkipReason::SingularSystem => write!(f, "fit normal equations are singular"),
            SkipReason::NotADip { amplitude } => {
                write!(f, "fitted amplitude {amplitude:.3e} mW is not a dip")
            }
            SkipReason::NonPhysicalWidth { gamma_nm } => {
                write!(f, "fitted half width {gamma_nm} nm is not usable")
            }
            SkipReason::CenterOutsideWindow {
                center_nm,
                window_nm: (lo, hi),
            } => write!(f, "fitted center {center_nm:.4} nm outside window [{lo:.4}, {hi:.4}] nm"),
        }
    }
}

/// A candidate that was dropped, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    pub candidate: ResonanceCandidate,
    pub reason: SkipReason,
}

/// Outcome of fitting one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum ResonanceFit {
    Fitted(FittedResonance),
    Skipped(SkippedCandidate),
}

impl ResonanceFit {
    fn skipped(candidate: &ResonanceCandidate, reason: SkipReason) -> Self {
        ResonanceFit::Skipped(SkippedCandidate {
            candidate: *candidate,
            reason,
        })
    }
}

// ---------------------------------------------------------------------------
// Single-resonance fit
// ---------------------------------------------------------------------------

/// Settings of the fitting step.
#[derive(Debug, Clone, Copy)]
pub struct FitSettings {
    pub window_nm: f64,
    pub initial_gamma_nm: f64,
    pub max_evaluations: usize,
}

/// Wavelength span candidate `i` may be fitted over: ±`window_nm` around it,
/// narrowed to the midpoints toward its neighbouring candidates.
///
/// `candidates` must be ordered by wavelength, as detection returns them.
pub fn fit_bounds(candidates: &[ResonanceCandidate], i: usize, window_nm: f64) -> (f64, f64) {
    let center = candidates[i].wavelength_nm;
    let mut lo = center - window_nm;
    let mut hi = center + window_nm;
    if let Some(prev) = i.checked_sub(1).and_then(|j| candidates.get(j)) {
        lo = lo.max(0.5 * (prev.wavelength_nm + center));
    }
    if let Some(next) = candidates.get(i + 1) {
        hi = hi.min(0.5 * (center + next.wavelength_nm));
    }
    (lo, hi)
}

/// Fit a Lorentzian to the samples within ±`window_nm` of `candidate`,
/// ignoring any other resonance in that span.
///
/// The fit runs on linear power (mW). Every failure mode is reported as
/// [`ResonanceFit::Skipped`] with its reason.
pub fn fit_resonance(
    spectrum: &Spectrum,
    candidate: &ResonanceCandidate,
    settings: &FitSettings,
) -> ResonanceFit {
    let bounds = (
        candidate.wavelength_nm - settings.window_nm,
        candidate.wavelength_nm + settings.window_nm,
    );
    fit_in_bounds(spectrum, &spectrum.power_linear(), candidate, bounds, settings)
}

/// Fit every candidate, each within its [`fit_bounds`], so that no fit can
/// settle on a neighbouring dip.
pub fn fit_resonances(
    spectrum: &Spectrum,
    candidates: &[ResonanceCandidate],
    settings: &FitSettings,
) -> Vec<ResonanceFit> {
    let power_mw = spectrum.power_linear();
    candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let bounds = fit_bounds(candidates, i, settings.window_nm);
            fit_in_bounds(spectrum, &power_mw, candidate, bounds, settings)
        })
        .collect()
}

fn fit_in_bounds(
    spectrum: &Spectrum,
    power_mw: &[f64],
    candidate: &ResonanceCandidate,
    (lo, hi): (f64, f64),
    settings: &FitSettings,
) -> ResonanceFit {
    let range = spectrum.span_indices(lo, hi);
    let found = range.len();
    if found < MIN_FIT_SAMPLES {
        return ResonanceFit::skipped(
            candidate,
            SkipReason::InsufficientSamples {
                found,
                required: MIN_FIT_SAMPLES,
            },
        );
    }

    let x = &spectrum.wavelength_nm()[range.clone()];
    let y = &power_mw[range];

    let (y_min, y_max) = y
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let window = (x[0], x[x.len() - 1]);

    let initial = LorentzianParams {
        amplitude: 0.1 * (y_max - y_min),
        center_nm: candidate.wavelength_nm,
        gamma_nm: settings.initial_gamma_nm,
        offset: y_min,
    };

    let solution = match fit_lorentzian(x, y, initial, settings.max_evaluations) {
        Ok(s) => s,
        Err(SolveError::NotConverged { evaluations }) => {
            return ResonanceFit::skipped(candidate, SkipReason::DidNotConverge { evaluations })
        }
        Err(SolveError::Singular) => {
            return ResonanceFit::skipped(candidate, SkipReason::SingularSystem)
        }
    };

    let p = solution.params;
    let gamma = p.gamma_nm.abs();
    // A line wider than the samples it was fitted to is a baseline trend.
    if !gamma.is_finite() || gamma == 0.0 || 2.0 * gamma > window.1 - window.0 {
        return ResonanceFit::skipped(
            candidate,
            SkipReason::NonPhysicalWidth {
                gamma_nm: p.gamma_nm,
            },
        );
    }
    if !(p.amplitude < 0.0) {
        return ResonanceFit::skipped(candidate, SkipReason::NotADip { amplitude: p.amplitude });
    }
    if !(p.center_nm >= window.0 && p.center_nm <= window.1) {
        return ResonanceFit::skipped(
            candidate,
            SkipReason::CenterOutsideWindow {
                center_nm: p.center_nm,
                window_nm: window,
            },
        );
    }

    let fwhm = 2.0 * gamma;
    let q = p.center_nm / fwhm;

    let uncertainty = solution.covariance.and_then(|cov| {
        let var_center = cov[(1, 1)];
        let var_gamma = cov[(2, 2)];
        if !(var_center >= 0.0 && var_gamma >= 0.0) {
            return None;
        }
        let s_center = var_center.sqrt();
        let s_gamma = var_gamma.sqrt();
        let rel = ((s_center / p.center_nm).powi(2) + (s_gamma / gamma).powi(2)).sqrt();
        Some(FitUncertainty {
            center_nm: s_center,
            fwhm_nm: 2.0 * s_gamma,
            q_factor: q * rel,
        })
    });

    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let sst: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let r_squared = if sst > 0.0 { 1.0 - solution.ssr / sst } else { 1.0 };

    let trough = p.offset + p.amplitude;
    let fitted_depth_db =
        (trough > 0.0 && p.offset > 0.0).then(|| -10.0 * (trough / p.offset).log10());

    log::debug!(
        "resonance at {:.4} nm: Q {:.0}, FWHM {:.2} pm, {} evaluations",
        p.center_nm,
        q,
        fwhm * 1e3,
        solution.evaluations
    );

    ResonanceFit::Fitted(FittedResonance {
        candidate_index: candidate.index,
        center_wavelength_nm: p.center_nm,
        fwhm_nm: fwhm,
        fwhm_pm: fwhm * 1e3,
        q_factor: q,
        extinction_ratio_db: -10.0 * (y_min / y_max).log10(),
        fitted_depth_db,
        params: p,
        uncertainty,
        r_squared,
        fit_region_nm: window,
        samples: found,
        evaluations: solution.evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{ring_spectrum, uniform_grid, LorentzianDip};

    fn settings() -> FitSettings {
        FitSettings {
            window_nm: 1.0,
            initial_gamma_nm: 0.05,
            max_evaluations: 5000,
        }
    }

    fn candidate_at(spectrum: &Spectrum, wavelength_nm: f64) -> ResonanceCandidate {
        let index = spectrum
            .wavelength_nm()
            .partition_point(|&wl| wl < wavelength_nm);
        ResonanceCandidate {
            index,
            wavelength_nm: spectrum.wavelength_nm()[index],
            smoothed_power_dbm: spectrum.power_dbm()[index],
            depth_db: 10.0,
        }
    }

    #[test]
    fn fits_isolated_dip() {
        let grid = uniform_grid(1548.0, 1552.0, 0.002);
        let sp = ring_spectrum(&grid, -20.0, &[LorentzianDip::new(1550.0, 0.05, 10.0)]).unwrap();
        let c = candidate_at(&sp, 1550.003);
        let r = match fit_resonance(&sp, &c, &settings()) {
            ResonanceFit::Fitted(r) => r,
            ResonanceFit::Skipped(s) => panic!("skipped: {}", s.reason),
        };
        assert!((r.center_wavelength_nm - 1550.0).abs() < 1e-4);
        assert!((r.fwhm_nm - 0.1).abs() < 1e-4);
        assert!((r.q_factor - 15500.0).abs() < 20.0);
        assert!(r.extinction_ratio_db > 9.9 && r.extinction_ratio_db < 10.0);
        assert!((r.fitted_depth_db.unwrap() - 10.0).abs() < 0.01);
        assert!(r.r_squared > 0.999999);
        assert!(r.fit_region_nm.0 >= 1548.99 && r.fit_region_nm.1 <= 1551.01);
    }

    #[test]
    fn narrow_window_is_skipped() {
        let grid = uniform_grid(1548.0, 1552.0, 0.05);
        let sp = ring_spectrum(&grid, -20.0, &[LorentzianDip::new(1550.0, 0.25, 10.0)]).unwrap();
        let c = candidate_at(&sp, 1550.0);
        let s = FitSettings {
            window_nm: 0.2,
            ..settings()
        };
        match fit_resonance(&sp, &c, &s) {
            ResonanceFit::Skipped(SkippedCandidate {
                reason: SkipReason::InsufficientSamples { found, required },
                ..
            }) => {
                assert!(found < 10);
                assert_eq!(required, MIN_FIT_SAMPLES);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    fn skip_reason(fit: ResonanceFit) -> SkipReason {
        match fit {
            ResonanceFit::Skipped(s) => s.reason,
            ResonanceFit::Fitted(r) => panic!("fitted at {} nm", r.center_wavelength_nm),
        }
    }

    #[test]
    fn flat_window_is_not_a_dip() {
        let grid = uniform_grid(1548.0, 1552.0, 0.01);
        let sp = Spectrum::new(grid.clone(), vec![-20.0; grid.len()]).unwrap();
        let c = candidate_at(&sp, 1550.0);
        assert_eq!(
            skip_reason(fit_resonance(&sp, &c, &settings())),
            SkipReason::NotADip { amplitude: 0.0 }
        );
    }

    #[test]
    fn peak_is_not_a_dip() {
        // 0.01 mW baseline with a +3 dB Lorentzian peak at 1550 nm.
        let grid = uniform_grid(1548.0, 1552.0, 0.002);
        let power: Vec<f64> = grid
            .iter()
            .map(|&wl| {
                let d = wl - 1550.0;
                let mw = 0.01 * (1.0 + 0.0025 / (d * d + 0.0025));
                10.0 * mw.log10()
            })
            .collect();
        let sp = Spectrum::new(grid, power).unwrap();
        let c = candidate_at(&sp, 1550.0);
        match skip_reason(fit_resonance(&sp, &c, &settings())) {
            SkipReason::NotADip { amplitude } => assert!(amplitude > 0.0),
            other => panic!("unexpected reason: {other}"),
        }
    }

    #[test]
    fn exhausted_budget_is_reported() {
        let grid = uniform_grid(1548.0, 1552.0, 0.002);
        let sp = ring_spectrum(&grid, -20.0, &[LorentzianDip::new(1550.0, 0.05, 10.0)]).unwrap();
        let c = candidate_at(&sp, 1550.0);
        let s = FitSettings {
            max_evaluations: 2,
            ..settings()
        };
        assert_eq!(
            skip_reason(fit_resonance(&sp, &c, &s)),
            SkipReason::DidNotConverge { evaluations: 2 }
        );
    }

    #[test]
    fn center_beyond_bounds_is_rejected() {
        // The span stops 20 pm short of the dip: the fit recovers the true
        // center from the flank, which lies outside the samples used.
        let grid = uniform_grid(1548.0, 1552.0, 0.002);
        let sp = ring_spectrum(&grid, -20.0, &[LorentzianDip::new(1550.0, 0.05, 10.0)]).unwrap();
        let c = candidate_at(&sp, 1549.97);
        let fit = fit_in_bounds(&sp, &sp.power_linear(), &c, (1549.0, 1549.98), &settings());
        match skip_reason(fit) {
            SkipReason::CenterOutsideWindow {
                center_nm,
                window_nm,
            } => {
                assert!(center_nm > window_nm.1);
                assert!(window_nm.1 <= 1549.98);
            }
            other => panic!("unexpected reason: {other}"),
        }
    }

    #[test]
    fn bounds_stop_at_neighbour_midpoints() {
        let grid = uniform_grid(1548.0, 1552.0, 0.002);
        let sp = Spectrum::new(grid.clone(), vec![-20.0; grid.len()]).unwrap();
        let cands = [
            candidate_at(&sp, 1549.0),
            candidate_at(&sp, 1549.4),
            candidate_at(&sp, 1551.0),
        ];
        let (lo, hi) = fit_bounds(&cands, 1, 1.0);
        assert!((lo - 0.5 * (cands[0].wavelength_nm + cands[1].wavelength_nm)).abs() < 1e-12);
        assert!((hi - 0.5 * (cands[1].wavelength_nm + cands[2].wavelength_nm)).abs() < 1e-12);
        let (lo, _) = fit_bounds(&cands, 0, 1.0);
        assert!((lo - (cands[0].wavelength_nm - 1.0)).abs() < 1e-12);
        let (_, hi) = fit_bounds(&cands, 2, 0.5);
        assert!((hi - (cands[2].wavelength_nm + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn dense_comb_fits_each_dip_once() {
        // 0.4 nm spacing: every ±1 nm window holds several dips.
        let grid = uniform_grid(1548.0, 1552.0, 0.002);
        let dips: Vec<LorentzianDip> = (0..8)
            .map(|k| LorentzianDip::new(1548.6 + 0.4 * k as f64, 0.02, 10.0))
            .collect();
        let sp = ring_spectrum(&grid, -20.0, &dips).unwrap();
        let cands: Vec<ResonanceCandidate> =
            dips.iter().map(|d| candidate_at(&sp, d.center_nm)).collect();

        let fits = fit_resonances(&sp, &cands, &settings());
        assert_eq!(fits.len(), dips.len());
        for (fit, dip) in fits.iter().zip(&dips) {
            match fit {
                ResonanceFit::Fitted(r) => {
                    assert!((r.center_wavelength_nm - dip.center_nm).abs() < 1e-3);
                    assert!((r.params.gamma_nm.abs() - 0.02).abs() < 0.004);
                }
                ResonanceFit::Skipped(s) => panic!("skipped: {}", s.reason),
            }
        }
    }

    #[test]
    fn wide_line_is_not_physical() {
        // A 0.6 nm wide dip seen through a 0.4 nm span cannot be resolved.
        let grid = uniform_grid(1548.0, 1552.0, 0.002);
        let sp = ring_spectrum(&grid, -20.0, &[LorentzianDip::new(1550.0, 0.3, 10.0)]).unwrap();
        let c = candidate_at(&sp, 1550.0);
        let s = FitSettings {
            window_nm: 0.2,
            ..settings()
        };
        match skip_reason(fit_resonance(&sp, &c, &s)) {
            SkipReason::NonPhysicalWidth { gamma_nm } => assert!(2.0 * gamma_nm.abs() > 0.4),
            other => panic!("unexpected reason: {other}"),
        }
    }

    #[test]
    fn skip_reasons_render() {
        let r = SkipReason::InsufficientSamples {
            found: 4,
            required: 10,
        };
        assert_eq!(r.to_string(), "fit window holds 4 samples, 10 required");
    }
}
