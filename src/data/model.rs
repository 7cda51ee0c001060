use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::SpectrumError;

/// Convert a power level in dBm to milliwatts.
#[inline]
pub fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

/// Convert a power level in milliwatts to dBm.
#[inline]
pub fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}

// ---------------------------------------------------------------------------
// Spectrum – one transmission sweep
// ---------------------------------------------------------------------------

/// A measured transmission spectrum: power (dBm) sampled over wavelength (nm).
///
/// Fields are private so the invariants checked by [`Spectrum::new`] hold for
/// the lifetime of the value:
/// * both axes have the same length,
/// * every sample is finite,
/// * wavelength is strictly increasing.
///
/// An empty or very short spectrum is valid; the analysis degrades to an empty
/// result for it instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpectrum", into = "RawSpectrum")]
pub struct Spectrum {
    wavelength_nm: Vec<f64>,
    power_dbm: Vec<f64>,
}

/// Unvalidated column form, used for (de)serialization.
#[derive(Serialize, Deserialize)]
struct RawSpectrum {
    wavelength_nm: Vec<f64>,
    #[serde(rename = "power_dBm")]
    power_dbm: Vec<f64>,
}

impl TryFrom<RawSpectrum> for Spectrum {
    type Error = SpectrumError;

    fn try_from(raw: RawSpectrum) -> Result<Self, Self::Error> {
        Spectrum::new(raw.wavelength_nm, raw.power_dbm)
    }
}

impl From<Spectrum> for RawSpectrum {
    fn from(sp: Spectrum) -> Self {
        RawSpectrum {
            wavelength_nm: sp.wavelength_nm,
            power_dbm: sp.power_dbm,
        }
    }
}

impl Spectrum {
    /// Validate and wrap the two sample vectors.
    pub fn new(wavelength_nm: Vec<f64>, power_dbm: Vec<f64>) -> Result<Self, SpectrumError> {
        if wavelength_nm.len() != power_dbm.len() {
            return Err(SpectrumError::LengthMismatch {
                wavelengths: wavelength_nm.len(),
                powers: power_dbm.len(),
            });
        }

        for (index, (&wl, &p)) in wavelength_nm.iter().zip(&power_dbm).enumerate() {
            if !wl.is_finite() || !p.is_finite() {
                return Err(SpectrumError::NonFinite {
                    index,
                    wavelength_nm: wl,
                    power_dbm: p,
                });
            }
        }

        if let Some(index) = wavelength_nm.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SpectrumError::NotIncreasing {
                index: index + 1,
                previous_nm: wavelength_nm[index],
                current_nm: wavelength_nm[index + 1],
            });
        }

        Ok(Spectrum {
            wavelength_nm,
            power_dbm,
        })
    }

    /// Build a spectrum from unordered `(wavelength, power)` pairs, sorting by
    /// wavelength first. Duplicate wavelengths are still rejected.
    pub fn from_unsorted(mut samples: Vec<(f64, f64)>) -> Result<Self, SpectrumError> {
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (wavelength_nm, power_dbm) = samples.into_iter().unzip();
        Spectrum::new(wavelength_nm, power_dbm)
    }

    /// Wavelength axis in nm.
    pub fn wavelength_nm(&self) -> &[f64] {
        &self.wavelength_nm
    }

    /// Power axis in dBm.
    pub fn power_dbm(&self) -> &[f64] {
        &self.power_dbm
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.wavelength_nm.len()
    }

    /// Whether the spectrum holds no samples.
    pub fn is_empty(&self) -> bool {
        self.wavelength_nm.is_empty()
    }

    /// First and last wavelength, or `None` for an empty spectrum.
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        match (self.wavelength_nm.first(), self.wavelength_nm.last()) {
            (Some(&lo), Some(&hi)) => Some((lo, hi)),
            _ => None,
        }
    }

    /// Average sampling interval in nm (needs at least two samples).
    pub fn mean_step_nm(&self) -> Option<f64> {
        let (lo, hi) = self.wavelength_range()?;
        let n = self.len();
        (n >= 2).then(|| (hi - lo) / (n - 1) as f64)
    }

    /// Power converted to linear units (mW).
    pub fn power_linear(&self) -> Vec<f64> {
        self.power_dbm.iter().map(|&p| dbm_to_mw(p)).collect()
    }

    /// Index range of the samples with `center - half_width <= λ <= center + half_width`.
    pub fn window_indices(&self, center_nm: f64, half_width_nm: f64) -> Range<usize> {
        self.span_indices(center_nm - half_width_nm, center_nm + half_width_nm)
    }

    /// Index range of the samples with `lo <= λ <= hi`; empty when `lo > hi`.
    pub fn span_indices(&self, lo_nm: f64, hi_nm: f64) -> Range<usize> {
        let start = self.wavelength_nm.partition_point(|&wl| wl < lo_nm);
        let end = self.wavelength_nm.partition_point(|&wl| wl <= hi_nm);
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_mismatch() {
        let err = Spectrum::new(vec![1.0, 2.0], vec![0.0]).unwrap_err();
        assert_eq!(
            err,
            SpectrumError::LengthMismatch {
                wavelengths: 2,
                powers: 1
            }
        );
    }

    #[test]
    fn rejects_non_increasing_wavelength() {
        let err = Spectrum::new(vec![1.0, 2.0, 2.0], vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, SpectrumError::NotIncreasing { index: 2, .. }));
    }

    #[test]
    fn rejects_nan_power() {
        let err = Spectrum::new(vec![1.0, 2.0], vec![0.0, f64::NAN]).unwrap_err();
        assert!(matches!(err, SpectrumError::NonFinite { index: 1, .. }));
    }

    #[test]
    fn empty_spectrum_is_valid() {
        let sp = Spectrum::new(Vec::new(), Vec::new()).unwrap();
        assert!(sp.is_empty());
        assert_eq!(sp.wavelength_range(), None);
        assert_eq!(sp.mean_step_nm(), None);
    }

    #[test]
    fn from_unsorted_sorts_descending_sweep() {
        let sp = Spectrum::from_unsorted(vec![(3.0, -1.0), (1.0, -3.0), (2.0, -2.0)]).unwrap();
        assert_eq!(sp.wavelength_nm(), &[1.0, 2.0, 3.0]);
        assert_eq!(sp.power_dbm(), &[-3.0, -2.0, -1.0]);
    }

    #[test]
    fn window_indices_are_inclusive() {
        let wl: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let sp = Spectrum::new(wl, vec![0.0; 11]).unwrap();
        assert_eq!(sp.window_indices(5.0, 2.0), 3..8);
        assert_eq!(sp.window_indices(0.0, 1.5), 0..2);
        assert_eq!(sp.window_indices(20.0, 1.0), 11..11);
        assert_eq!(sp.span_indices(2.5, 4.0), 3..5);
        assert!(sp.span_indices(4.0, 2.5).is_empty());
    }

    #[test]
    fn dbm_conversion() {
        assert!((dbm_to_mw(-20.0) - 0.01).abs() < 1e-15);
        assert!((mw_to_dbm(1.0)).abs() < 1e-15);
        let sp = Spectrum::new(vec![1.0], vec![10.0]).unwrap();
        assert!((sp.power_linear()[0] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn serde_round_trip_validates() {
        let bad = r#"{"wavelength_nm":[2.0,1.0],"power_dBm":[0.0,0.0]}"#;
        assert!(serde_json::from_str::<Spectrum>(bad).is_err());
        let good = r#"{"wavelength_nm":[1.0,2.0],"power_dBm":[-1.0,-2.0]}"#;
        let sp: Spectrum = serde_json::from_str(good).unwrap();
        assert_eq!(sp.len(), 2);
    }
}
