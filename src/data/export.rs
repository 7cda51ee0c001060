use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::analysis::SpectrumAnalysisResult;

/// Flat per-resonance row for the CSV table.
#[derive(Debug, Serialize)]
struct ResonanceRow {
    resonance_wavelength_nm: f64,
    fwhm_nm: f64,
    fwhm_pm: f64,
    q_factor: f64,
    q_factor_stderr: Option<f64>,
    extinction_ratio_db: f64,
    fitted_depth_db: Option<f64>,
    r_squared: f64,
    fit_region_start_nm: f64,
    fit_region_end_nm: f64,
}

/// Write the full analysis result as pretty-printed JSON.
pub fn write_json(result: &SpectrumAnalysisResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("serializing analysis result")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

/// Write one CSV row per fitted resonance.
pub fn write_resonance_csv(result: &SpectrumAnalysisResult, path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for r in &result.resonances {
        writer
            .serialize(ResonanceRow {
                resonance_wavelength_nm: r.center_wavelength_nm,
                fwhm_nm: r.fwhm_nm,
                fwhm_pm: r.fwhm_pm,
                q_factor: r.q_factor,
                q_factor_stderr: r.uncertainty.map(|u| u.q_factor),
                extinction_ratio_db: r.extinction_ratio_db,
                fitted_depth_db: r.fitted_depth_db,
                r_squared: r.r_squared,
                fit_region_start_nm: r.fit_region_nm.0,
                fit_region_end_nm: r.fit_region_nm.1,
            })
            .context("writing resonance row")?;
    }
    writer.flush().with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}
