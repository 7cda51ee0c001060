//! Resonance analysis: detection, line-shape fitting and aggregation.
//!
//! Pipeline:
//! ```text
//!   Spectrum
//!      │
//!      ▼
//!   ┌──────────┐
//!   │  peaks    │  Savitzky-Golay smoothing → dips ≥ min depth, separated
//!   └──────────┘
//!      │ Vec<ResonanceCandidate>
//!      ▼
//!   ┌──────────┐
//!   │  fit      │  Lorentzian (linear power) → Fitted | Skipped{reason}
//!   └──────────┘
//!      │
//!      ▼
//!   ┌───────────┐
//!   │ aggregate  │  Q / ER statistics, FSR, group & effective index
//!   └───────────┘
//!      │
//!      ▼
//!   SpectrumAnalysisResult
//! ```

pub mod aggregate;
pub mod fit;
pub mod lorentzian;
pub mod params;
pub mod peaks;
pub mod smoothing;

use serde::{Deserialize, Serialize};

use crate::data::model::Spectrum;
use crate::error::ParamsError;

use aggregate::{
    free_spectral_range, index_estimate, FreeSpectralRange, IndexEstimate, SampleStats,
};
use fit::{
    fit_resonance, fit_resonances, FitSettings, FittedResonance, ResonanceFit, SkippedCandidate,
};
use params::AnalysisParams;
use peaks::{find_resonances, DetectionSettings, ResonanceCandidate};

// ---------------------------------------------------------------------------
// SpectrumAnalysisResult – everything one analysis call produces
// ---------------------------------------------------------------------------

/// Aggregate result of analysing one spectrum.
///
/// Spectrum-level values that cannot be computed are `None` (serialized as
/// `null`), never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumAnalysisResult {
    /// Candidates produced by detection (fitted + skipped).
    pub candidates_found: usize,
    /// Successful fits, ordered by wavelength.
    pub resonances: Vec<FittedResonance>,
    pub skipped: Vec<SkippedCandidate>,
    pub q_factor: Option<SampleStats>,
    pub extinction_ratio_db: Option<SampleStats>,
    /// Defined only with at least two fitted resonances.
    pub fsr: Option<FreeSpectralRange>,
    /// Defined only when `fsr` is and a ring radius was given.
    pub index: Option<IndexEstimate>,
    pub wavelength_range_nm: Option<(f64, f64)>,
    pub ring_radius_um: Option<f64>,
}

impl SpectrumAnalysisResult {
    /// Number of successfully fitted resonances.
    pub fn resonances_fitted(&self) -> usize {
        self.resonances.len()
    }
}

// ---------------------------------------------------------------------------
// ResonanceSpectrumAnalyzer
// ---------------------------------------------------------------------------

/// Validated analysis parameters bound to the three pipeline stages.
///
/// The analyzer holds no per-spectrum state; one instance may analyse any
/// number of spectra, from any number of threads.
#[derive(Debug, Clone)]
pub struct ResonanceSpectrumAnalyzer {
    params: AnalysisParams,
}

impl ResonanceSpectrumAnalyzer {
    pub fn new(params: AnalysisParams) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    fn detection_settings(&self) -> DetectionSettings {
        DetectionSettings {
            min_depth_db: self.params.min_depth_db,
            min_separation_nm: self.params.min_separation_nm,
            smoothing_window: self.params.smoothing_window,
            smoothing_order: self.params.smoothing_order,
        }
    }

    fn fit_settings(&self) -> FitSettings {
        FitSettings {
            window_nm: self.params.fit_window_nm,
            initial_gamma_nm: self.params.initial_gamma_nm,
            max_evaluations: self.params.max_evaluations,
        }
    }

    /// Resonance candidates of `spectrum`, ordered by wavelength.
    pub fn detect(&self, spectrum: &Spectrum) -> Vec<ResonanceCandidate> {
        find_resonances(spectrum, &self.detection_settings())
    }

    /// Fit one candidate over its full ±`fit_window_nm` window.
    pub fn fit(&self, spectrum: &Spectrum, candidate: &ResonanceCandidate) -> ResonanceFit {
        fit_resonance(spectrum, candidate, &self.fit_settings())
    }

    /// Run detection, fitting and aggregation on `spectrum`.
    ///
    /// Fit windows are narrowed to the midpoints between adjacent candidates,
    /// so each fitted center belongs to its own dip.
    pub fn analyze(&self, spectrum: &Spectrum) -> SpectrumAnalysisResult {
        let candidates = self.detect(spectrum);

        let mut resonances = Vec::with_capacity(candidates.len());
        let mut skipped = Vec::new();
        for fit in fit_resonances(spectrum, &candidates, &self.fit_settings()) {
            match fit {
                ResonanceFit::Fitted(r) => resonances.push(r),
                ResonanceFit::Skipped(s) => {
                    log::warn!(
                        "skipping candidate at {:.4} nm: {}",
                        s.candidate.wavelength_nm,
                        s.reason
                    );
                    skipped.push(s);
                }
            }
        }
        resonances.sort_by(|a, b| a.center_wavelength_nm.total_cmp(&b.center_wavelength_nm));

        let q_values: Vec<f64> = resonances.iter().map(|r| r.q_factor).collect();
        let er_values: Vec<f64> = resonances.iter().map(|r| r.extinction_ratio_db).collect();

        let fsr = free_spectral_range(&resonances);
        let index = match (&fsr, self.params.ring_radius_um) {
            (Some(fsr), Some(radius)) => {
                index_estimate(&resonances, fsr, radius, self.params.dispersion_slope_per_nm)
            }
            _ => None,
        };

        log::info!(
            "{} candidates, {} fitted, {} skipped",
            candidates.len(),
            resonances.len(),
            skipped.len()
        );

        SpectrumAnalysisResult {
            candidates_found: candidates.len(),
            q_factor: SampleStats::from_values(&q_values),
            extinction_ratio_db: SampleStats::from_values(&er_values),
            resonances,
            skipped,
            fsr,
            index,
            wavelength_range_nm: spectrum.wavelength_range(),
            ring_radius_um: self.params.ring_radius_um,
        }
    }
}

/// Validate `params` and analyse `spectrum` in one call.
pub fn analyze_spectrum(
    spectrum: &Spectrum,
    params: &AnalysisParams,
) -> Result<SpectrumAnalysisResult, ParamsError> {
    Ok(ResonanceSpectrumAnalyzer::new(params.clone())?.analyze(spectrum))
}
