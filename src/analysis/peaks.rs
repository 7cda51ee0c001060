use serde::{Deserialize, Serialize};

use super::smoothing::savitzky_golay;
use crate::data::model::Spectrum;

// ---------------------------------------------------------------------------
// ResonanceCandidate – a detected transmission dip
// ---------------------------------------------------------------------------

/// A local transmission minimum that qualified as a resonance candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResonanceCandidate {
    /// Sample index into the spectrum.
    pub index: usize,
    /// Raw wavelength at `index`.
    pub wavelength_nm: f64,
    /// Smoothed power at `index`.
    pub smoothed_power_dbm: f64,
    /// Depth below the lower of the two neighbouring maxima, in dB.
    pub depth_db: f64,
}

/// Settings of the detection step.
#[derive(Debug, Clone, Copy)]
pub struct DetectionSettings {
    pub min_depth_db: f64,
    pub min_separation_nm: f64,
    pub smoothing_window: usize,
    pub smoothing_order: usize,
}

/// Find resonance dips in `spectrum`, ordered by wavelength.
///
/// The power trace is Savitzky-Golay smoothed, local minima are located and
/// kept when their depth reaches `min_depth_db`. Among candidates closer than
/// `min_separation_nm` only the deepest survives.
///
/// A spectrum shorter than the smoothing window yields no candidates.
///
/// The smoothing window is counted in samples, so it spans
/// `smoothing_window × step` nm. A dip whose FWHM covers only about half the
/// window or less (≈ 5 samples with the default 11/3 filter) is flattened by
/// the filter and may fall below `min_depth_db`; undersampled narrow
/// resonances need a shorter window or a finer sweep.
pub fn find_resonances(
    spectrum: &Spectrum,
    settings: &DetectionSettings,
) -> Vec<ResonanceCandidate> {
    let smoothed = match savitzky_golay(
        spectrum.power_dbm(),
        settings.smoothing_window,
        settings.smoothing_order,
    ) {
        Some(s) => s,
        None => {
            log::debug!(
                "spectrum has {} samples, fewer than the {}-sample smoothing window",
                spectrum.len(),
                settings.smoothing_window
            );
            return Vec::new();
        }
    };

    let minima = local_minima(&smoothed);
    let wl = spectrum.wavelength_nm();

    let mut candidates: Vec<ResonanceCandidate> = minima
        .into_iter()
        .map(|index| ResonanceCandidate {
            index,
            wavelength_nm: wl[index],
            smoothed_power_dbm: smoothed[index],
            depth_db: dip_depth(&smoothed, index),
        })
        .filter(|c| c.depth_db >= settings.min_depth_db)
        .collect();

    log::debug!(
        "{} dips pass the {} dB depth threshold (smoothing span {:.1} pm)",
        candidates.len(),
        settings.min_depth_db,
        spectrum.mean_step_nm().unwrap_or(0.0) * settings.smoothing_window as f64 * 1e3
    );

    // Deepest first; ties resolved toward shorter wavelength.
    candidates.sort_by(|a, b| b.depth_db.total_cmp(&a.depth_db).then(a.index.cmp(&b.index)));

    let mut kept: Vec<ResonanceCandidate> = Vec::with_capacity(candidates.len());
    for c in candidates {
        let crowded = kept
            .iter()
            .any(|k| (k.wavelength_nm - c.wavelength_nm).abs() < settings.min_separation_nm);
        if !crowded {
            kept.push(c);
        }
    }

    kept.sort_by_key(|c| c.index);
    kept
}

/// Indices of strict local minima. A flat-bottomed minimum is reported at its
/// middle sample; the first and last samples never qualify.
fn local_minima(y: &[f64]) -> Vec<usize> {
    let n = y.len();
    let mut out = Vec::new();
    if n < 3 {
        return out;
    }
    let mut i = 1;
    while i < n - 1 {
        if y[i] < y[i - 1] {
            let mut j = i;
            while j + 1 < n && y[j + 1] == y[i] {
                j += 1;
            }
            if j + 1 < n && y[j + 1] > y[i] {
                out.push((i + j) / 2);
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    out
}

/// Height of the dip at `index` below the lower of its two bounding maxima.
///
/// Each side is scanned outward until a sample lower than the dip (or the
/// edge); the highest value seen on that side is its bounding maximum.
fn dip_depth(y: &[f64], index: usize) -> f64 {
    let v = y[index];

    let mut left_max = v;
    for &s in y[..index].iter().rev() {
        if s < v {
            break;
        }
        left_max = left_max.max(s);
    }

    let mut right_max = v;
    for &s in &y[index + 1..] {
        if s < v {
            break;
        }
        right_max = right_max.max(s);
    }

    left_max.min(right_max) - v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DetectionSettings {
        DetectionSettings {
            min_depth_db: 3.0,
            min_separation_nm: 0.1,
            smoothing_window: 5,
            smoothing_order: 2,
        }
    }

    #[test]
    fn minima_skip_edges_and_center_plateaus() {
        let y = [0.0, 1.0, 0.5, 0.5, 0.5, 1.0, 2.0, 1.5, 3.0, -1.0];
        assert_eq!(local_minima(&y), vec![3, 7]);
    }

    #[test]
    fn depth_uses_lower_neighbouring_maximum() {
        let y = [5.0, 10.0, 2.0, 6.0, 1.0, 8.0];
        // Dip at 2: left max 10, right scan stops at 1.0 with max 6.
        assert_eq!(dip_depth(&y, 2), 4.0);
        // Global minimum at 4: both sides run to the edges.
        assert_eq!(dip_depth(&y, 4), 7.0);
    }

    #[test]
    fn short_spectrum_has_no_candidates() {
        let sp = Spectrum::new(vec![1.0, 2.0, 3.0], vec![0.0, -10.0, 0.0]).unwrap();
        assert!(find_resonances(&sp, &settings()).is_empty());
    }

    #[test]
    fn shallow_dip_rejected() {
        let wl: Vec<f64> = (0..41).map(|i| 1550.0 + i as f64 * 0.01).collect();
        let p: Vec<f64> = (0..41)
            .map(|i| -20.0 - 1.0 * (-((i as f64 - 20.0) / 4.0).powi(2)).exp())
            .collect();
        let sp = Spectrum::new(wl, p).unwrap();
        assert!(find_resonances(&sp, &settings()).is_empty());
    }

    #[test]
    fn undersampled_dip_needs_short_window() {
        use crate::data::synthetic::{ring_spectrum, uniform_grid, LorentzianDip};

        // FWHM 40 pm at a 10 pm step: four samples across the dip.
        let grid = uniform_grid(1549.0, 1551.0, 0.01);
        let sp = ring_spectrum(&grid, -20.0, &[LorentzianDip::new(1550.0, 0.02, 3.5)]).unwrap();

        let default_filter = DetectionSettings {
            smoothing_window: 11,
            smoothing_order: 3,
            ..settings()
        };
        assert!(find_resonances(&sp, &default_filter).is_empty());

        let found = find_resonances(&sp, &settings());
        assert_eq!(found.len(), 1);
        assert!((found[0].wavelength_nm - 1550.0).abs() < 0.011);
    }

    #[test]
    fn close_dips_keep_the_deeper_one() {
        let wl: Vec<f64> = (0..201).map(|i| 1550.0 + i as f64 * 0.005).collect();
        let dip = |c: f64, d: f64, x: f64| d * (-((x - c) / 0.01).powi(2)).exp();
        let p: Vec<f64> = wl
            .iter()
            .map(|&x| -20.0 - dip(1550.40, 8.0, x) - dip(1550.45, 12.0, x))
            .collect();
        let sp = Spectrum::new(wl, p).unwrap();
        let found = find_resonances(&sp, &settings());
        assert_eq!(found.len(), 1);
        assert!((found[0].wavelength_nm - 1550.45).abs() < 0.006);
    }
}
