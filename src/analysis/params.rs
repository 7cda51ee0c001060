use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ParamsError;

// ---------------------------------------------------------------------------
// AnalysisParams – every tunable of one analysis call
// ---------------------------------------------------------------------------

/// Parameters of a resonance analysis.
///
/// All fields have defaults, so a parameter file only needs the values it
/// changes:
///
/// ```json
/// { "min_separation_nm": 0.5, "ring_radius_um": 10.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisParams {
    /// Minimum dip depth below the neighbouring maxima, in dB.
    pub min_depth_db: f64,
    /// Minimum wavelength spacing between accepted candidates, in nm.
    pub min_separation_nm: f64,
    /// Half width of the fit window around each candidate, in nm.
    pub fit_window_nm: f64,
    /// Savitzky-Golay window length (odd, >= 5).
    pub smoothing_window: usize,
    /// Savitzky-Golay polynomial order (< window).
    pub smoothing_order: usize,
    /// Starting Lorentzian half width γ, in nm.
    pub initial_gamma_nm: f64,
    /// Model evaluations allowed per fit before giving up.
    pub max_evaluations: usize,
    /// Ring radius in µm; group/effective index are only derived when set.
    pub ring_radius_um: Option<f64>,
    /// dn_eff/dλ in 1/nm. When absent, n_eff is approximated by n_g.
    pub dispersion_slope_per_nm: Option<f64>,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            min_depth_db: 3.0,
            min_separation_nm: 0.1,
            fit_window_nm: 1.0,
            smoothing_window: 11,
            smoothing_order: 3,
            initial_gamma_nm: 0.05,
            max_evaluations: 5000,
            ring_radius_um: None,
            dispersion_slope_per_nm: None,
        }
    }
}

impl AnalysisParams {
    /// Same parameters with a ring radius (µm) for index derivation.
    pub fn with_ring_radius(mut self, radius_um: f64) -> Self {
        self.ring_radius_um = Some(radius_um);
        self
    }

    /// Check every field; the analysis itself assumes valid parameters.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.smoothing_window < 5 || self.smoothing_window % 2 == 0 {
            return Err(ParamsError::SmoothingWindow(self.smoothing_window));
        }
        if self.smoothing_order >= self.smoothing_window {
            return Err(ParamsError::SmoothingOrder {
                order: self.smoothing_order,
                window: self.smoothing_window,
            });
        }
        positive("min_depth_db", self.min_depth_db)?;
        positive("min_separation_nm", self.min_separation_nm)?;
        positive("fit_window_nm", self.fit_window_nm)?;
        positive("initial_gamma_nm", self.initial_gamma_nm)?;
        if let Some(r) = self.ring_radius_um {
            positive("ring_radius_um", r)?;
        }
        if let Some(slope) = self.dispersion_slope_per_nm {
            if !slope.is_finite() {
                return Err(ParamsError::DispersionSlope(slope));
            }
        }
        if self.max_evaluations == 0 {
            return Err(ParamsError::ZeroEvaluations);
        }
        Ok(())
    }

    /// Load parameters from a JSON file and validate them.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading parameter file {}", path.display()))?;
        let params: AnalysisParams = serde_json::from_str(&text)
            .with_context(|| format!("parsing parameter file {}", path.display()))?;
        params.validate().context("invalid analysis parameters")?;
        Ok(params)
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParamsError::NotPositive { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AnalysisParams::default().validate().is_ok());
    }

    #[test]
    fn even_window_rejected() {
        let p = AnalysisParams {
            smoothing_window: 10,
            ..Default::default()
        };
        assert_eq!(p.validate(), Err(ParamsError::SmoothingWindow(10)));
    }

    #[test]
    fn order_must_be_below_window() {
        let p = AnalysisParams {
            smoothing_window: 5,
            smoothing_order: 5,
            ..Default::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ParamsError::SmoothingOrder { order: 5, window: 5 })
        ));
    }

    #[test]
    fn negative_radius_rejected() {
        let p = AnalysisParams::default().with_ring_radius(-1.0);
        assert!(matches!(
            p.validate(),
            Err(ParamsError::NotPositive {
                name: "ring_radius_um",
                ..
            })
        ));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let p: AnalysisParams =
            serde_json::from_str(r#"{"min_separation_nm": 0.5, "ring_radius_um": 10.0}"#).unwrap();
        assert_eq!(p.min_separation_nm, 0.5);
        assert_eq!(p.ring_radius_um, Some(10.0));
        assert_eq!(p.smoothing_window, 11);
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(serde_json::from_str::<AnalysisParams>(r#"{"radius": 10.0}"#).is_err());
    }
}
