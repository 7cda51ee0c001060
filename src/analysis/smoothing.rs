//! Savitzky-Golay smoothing.
//!
//! Each output sample is the value at that position of a least-squares
//! polynomial fitted to the surrounding window. Interior samples use the
//! central convolution row; the first and last half-window are evaluated
//! from the polynomial fitted to the first/last full window, so a dip near
//! the edge is not pulled toward a padded value.

use nalgebra::DMatrix;

/// Projection matrix `V (VᵀV)⁻¹ Vᵀ` of a centred Vandermonde matrix.
///
/// Row `i` holds the weights that evaluate the window's fitted polynomial at
/// window position `i`.
fn projection(window: usize, order: usize) -> Option<DMatrix<f64>> {
    let half = (window / 2) as f64;
    let v = DMatrix::from_fn(window, order + 1, |i, j| (i as f64 - half).powi(j as i32));
    let vtv = v.transpose() * &v;
    let inv = vtv.try_inverse()?;
    Some(&v * inv * v.transpose())
}

/// Smooth `y` with a Savitzky-Golay filter.
///
/// Returns `None` when `y` is shorter than the window or the parameters are
/// unusable (even window, order >= window).
pub fn savitzky_golay(y: &[f64], window: usize, order: usize) -> Option<Vec<f64>> {
    let n = y.len();
    if window % 2 == 0 || order >= window || n < window {
        return None;
    }
    let h = projection(window, order)?;
    let half = window / 2;

    let dot = |row: usize, start: usize| -> f64 {
        (0..window).map(|j| h[(row, j)] * y[start + j]).sum()
    };

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let value = if i < half {
            dot(i, 0)
        } else if i >= n - half {
            dot(i - (n - window), n - window)
        } else {
            dot(half, i - half)
        };
        out.push(value);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_input_is_none() {
        assert!(savitzky_golay(&[1.0, 2.0, 3.0], 5, 2).is_none());
        assert!(savitzky_golay(&[0.0; 10], 4, 2).is_none());
    }

    #[test]
    fn cubic_is_preserved_exactly() {
        let y: Vec<f64> = (0..30)
            .map(|i| {
                let x = i as f64 * 0.1;
                0.5 * x * x * x - x * x + 2.0
            })
            .collect();
        let s = savitzky_golay(&y, 11, 3).unwrap();
        for (a, b) in y.iter().zip(&s) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn interior_weights_match_known_coefficients() {
        // Classic 5-point quadratic: (-3, 12, 17, 12, -3) / 35
        let h = projection(5, 2).unwrap();
        let expected = [-3.0, 12.0, 17.0, 12.0, -3.0];
        for (j, e) in expected.iter().enumerate() {
            assert!((h[(2, j)] - e / 35.0).abs() < 1e-12);
        }
    }

    #[test]
    fn reduces_alternating_noise() {
        let y: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let s = savitzky_golay(&y, 11, 3).unwrap();
        let peak = s[5..45].iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak < 0.5);
    }
}
