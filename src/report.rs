use std::fmt::Write;

use crate::analysis::SpectrumAnalysisResult;

// ---------------------------------------------------------------------------
// Plain-text report
// ---------------------------------------------------------------------------

/// Per-resonance table, one line per fitted resonance.
pub fn resonance_table(result: &SpectrumAnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>9} | {:>15} | {:>9} | {:>9} | {:>9}",
        "Resonance", "Wavelength (nm)", "FWHM (pm)", "Q-factor", "ER (dB)"
    );
    let _ = writeln!(out, "{}", "-".repeat(63));
    for (i, r) in result.resonances.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>9} | {:>15.3} | {:>9.1} | {:>9.0} | {:>9.2}",
            i + 1,
            r.center_wavelength_nm,
            r.fwhm_pm,
            r.q_factor,
            r.extinction_ratio_db
        );
    }
    out
}

/// Spectrum-level summary. Undefined quantities print as `N/A`.
pub fn summary(result: &SpectrumAnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Resonances: {} found, {} fitted, {} skipped",
        result.candidates_found,
        result.resonances_fitted(),
        result.skipped.len()
    );

    match &result.q_factor {
        Some(q) => {
            let _ = writeln!(out, "Mean Q-factor: {:.0} ± {:.0}", q.mean, q.std);
        }
        None => {
            let _ = writeln!(out, "Mean Q-factor: N/A");
        }
    }
    match &result.extinction_ratio_db {
        Some(er) => {
            let _ = writeln!(out, "Mean ER: {:.1} dB", er.mean);
        }
        None => {
            let _ = writeln!(out, "Mean ER: N/A");
        }
    }
    match &result.fsr {
        Some(fsr) => {
            let _ = writeln!(out, "Free Spectral Range: {:.3} ± {:.3} nm", fsr.mean_nm, fsr.std_nm);
        }
        None => {
            let _ = writeln!(out, "Free Spectral Range: N/A (fewer than 2 resonances)");
        }
    }
    match &result.index {
        Some(idx) => {
            let _ = writeln!(out, "Group index: {:.3}", idx.group_index);
            let note = if idx.dispersion_corrected {
                ""
            } else {
                " (≈ n_g, small-dispersion approximation)"
            };
            let _ = writeln!(out, "Effective index: {:.3}{note}", idx.effective_index);
        }
        None => {
            let _ = writeln!(out, "Group index: N/A");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_spectrum, params::AnalysisParams};
    use crate::data::model::Spectrum;

    #[test]
    fn empty_result_reports_not_available() {
        let sp = Spectrum::new(Vec::new(), Vec::new()).unwrap();
        let result = analyze_spectrum(&sp, &AnalysisParams::default()).unwrap();
        let text = summary(&result);
        assert!(text.contains("0 found, 0 fitted"));
        assert!(text.contains("Free Spectral Range: N/A"));
        assert!(text.contains("Group index: N/A"));
        assert_eq!(resonance_table(&result).lines().count(), 2);
    }
}
