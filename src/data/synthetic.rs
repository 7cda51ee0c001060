use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use super::model::{dbm_to_mw, mw_to_dbm, Spectrum};
use crate::error::SpectrumError;

/// Lowest transmission allowed in a synthetic trace, relative to the baseline.
const MIN_RELATIVE_TRANSMISSION: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Synthetic ring-resonator spectra
// ---------------------------------------------------------------------------

/// One Lorentzian transmission dip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LorentzianDip {
    pub center_nm: f64,
    /// Half width at half maximum (FWHM = 2γ).
    pub gamma_nm: f64,
    /// Depth of the isolated dip below the baseline, in dB.
    pub depth_db: f64,
}

impl LorentzianDip {
    pub fn new(center_nm: f64, gamma_nm: f64, depth_db: f64) -> Self {
        Self {
            center_nm,
            gamma_nm,
            depth_db,
        }
    }

    /// Fractional power removed at the dip center (0..1).
    fn fraction(&self) -> f64 {
        1.0 - 10f64.powf(-self.depth_db / 10.0)
    }

    fn shape(&self, wavelength_nm: f64) -> f64 {
        let d = wavelength_nm - self.center_nm;
        let g2 = self.gamma_nm * self.gamma_nm;
        g2 / (d * d + g2)
    }
}

/// Evenly spaced wavelength grid from `start_nm` to `stop_nm` inclusive.
pub fn uniform_grid(start_nm: f64, stop_nm: f64, step_nm: f64) -> Vec<f64> {
    if step_nm <= 0.0 || stop_nm < start_nm {
        return Vec::new();
    }
    let n = ((stop_nm - start_nm) / step_nm).round() as usize + 1;
    (0..n).map(|i| start_nm + i as f64 * step_nm).collect()
}

/// Ideal transmission spectrum: Lorentzian dips summed (in linear power) onto a
/// flat baseline.
pub fn ring_spectrum(
    wavelengths: &[f64],
    baseline_dbm: f64,
    dips: &[LorentzianDip],
) -> Result<Spectrum, SpectrumError> {
    build(wavelengths, baseline_dbm, dips, |_| 0.0)
}

/// Same as [`ring_spectrum`] with additive Gaussian noise (σ in dB) from a
/// seeded generator, so repeated calls give identical traces.
pub fn noisy_ring_spectrum(
    wavelengths: &[f64],
    baseline_dbm: f64,
    dips: &[LorentzianDip],
    noise_db: f64,
    seed: u64,
) -> Result<Spectrum, SpectrumError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    match Normal::new(0.0, noise_db.abs()) {
        Ok(noise) => build(wavelengths, baseline_dbm, dips, |_| noise.sample(&mut rng)),
        Err(_) => ring_spectrum(wavelengths, baseline_dbm, dips),
    }
}

fn build(
    wavelengths: &[f64],
    baseline_dbm: f64,
    dips: &[LorentzianDip],
    mut noise: impl FnMut(f64) -> f64,
) -> Result<Spectrum, SpectrumError> {
    let base_mw = dbm_to_mw(baseline_dbm);
    let mut samples = Vec::with_capacity(wavelengths.len());
    for &wl in wavelengths {
        let removed: f64 = dips.iter().map(|d| d.fraction() * d.shape(wl)).sum();
        let t = (1.0 - removed).max(MIN_RELATIVE_TRANSMISSION);
        samples.push((wl, mw_to_dbm(base_mw * t) + noise(wl)));
    }
    Spectrum::from_unsorted(samples)
}
