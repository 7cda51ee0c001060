use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::fit::FittedResonance;

/// Mean and population standard deviation of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl SampleStats {
    /// `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(SampleStats {
            mean,
            std: var.sqrt(),
            count: values.len(),
        })
    }
}

/// Free spectral range from consecutive resonance spacings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeSpectralRange {
    pub mean_nm: f64,
    pub std_nm: f64,
    pub spacings_nm: Vec<f64>,
}

/// Group and effective index derived from the FSR and ring geometry.
///
/// `n_g = λ² / (FSR · 2πR)`. Without a dispersion slope the effective index
/// is reported equal to the group index, which only holds when dispersion is
/// small; treat it as an approximation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexEstimate {
    pub group_index: f64,
    pub effective_index: f64,
    /// λ used in the formula: mean fitted resonance wavelength.
    pub reference_wavelength_nm: f64,
    pub ring_radius_um: f64,
    /// Whether `effective_index` includes a dispersion correction.
    pub dispersion_corrected: bool,
}

/// FSR from the fitted centers; `None` with fewer than two resonances.
pub fn free_spectral_range(resonances: &[FittedResonance]) -> Option<FreeSpectralRange> {
    if resonances.len() < 2 {
        return None;
    }
    let mut centers: Vec<f64> = resonances.iter().map(|r| r.center_wavelength_nm).collect();
    centers.sort_by(f64::total_cmp);
    let spacings: Vec<f64> = centers.windows(2).map(|w| w[1] - w[0]).collect();
    let stats = SampleStats::from_values(&spacings)?;
    Some(FreeSpectralRange {
        mean_nm: stats.mean,
        std_nm: stats.std,
        spacings_nm: spacings,
    })
}

/// Group index `λ² / (FSR · 2πR)` with R in µm and λ, FSR in nm.
pub fn group_index(reference_wavelength_nm: f64, fsr_nm: f64, ring_radius_um: f64) -> f64 {
    let circumference_nm = 2.0 * PI * ring_radius_um * 1e3;
    reference_wavelength_nm * reference_wavelength_nm / (fsr_nm * circumference_nm)
}

/// Index estimate for a ring of `ring_radius_um`.
///
/// With `dispersion_slope_per_nm` (dn_eff/dλ) the effective index follows
/// from `n_g = n_eff − λ·dn_eff/dλ`.
pub fn index_estimate(
    resonances: &[FittedResonance],
    fsr: &FreeSpectralRange,
    ring_radius_um: f64,
    dispersion_slope_per_nm: Option<f64>,
) -> Option<IndexEstimate> {
    if resonances.is_empty() || !(fsr.mean_nm > 0.0) {
        return None;
    }
    let lambda =
        resonances.iter().map(|r| r.center_wavelength_nm).sum::<f64>() / resonances.len() as f64;
    let n_g = group_index(lambda, fsr.mean_nm, ring_radius_um);
    let n_eff = match dispersion_slope_per_nm {
        Some(slope) => n_g + lambda * slope,
        None => n_g,
    };
    Some(IndexEstimate {
        group_index: n_g,
        effective_index: n_eff,
        reference_wavelength_nm: lambda,
        ring_radius_um,
        dispersion_corrected: dispersion_slope_per_nm.is_some(),
    })
}
