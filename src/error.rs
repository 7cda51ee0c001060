use thiserror::Error;

// ---------------------------------------------------------------------------
// Construction-time errors
// ---------------------------------------------------------------------------

/// Reasons a pair of wavelength / power vectors cannot form a [`Spectrum`].
///
/// [`Spectrum`]: crate::data::model::Spectrum
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectrumError {
    #[error("wavelength has {wavelengths} samples but power has {powers}")]
    LengthMismatch { wavelengths: usize, powers: usize },

    #[error("sample {index} is not finite (wavelength {wavelength_nm}, power {power_dbm})")]
    NonFinite {
        index: usize,
        wavelength_nm: f64,
        power_dbm: f64,
    },

    #[error(
        "wavelength not strictly increasing at sample {index}: {current_nm} nm after {previous_nm} nm"
    )]
    NotIncreasing {
        index: usize,
        previous_nm: f64,
        current_nm: f64,
    },
}

/// Invalid analysis parameters, rejected before any spectrum is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("smoothing window must be odd and at least 5 samples, got {0}")]
    SmoothingWindow(usize),

    #[error("smoothing order {order} must be smaller than the window length {window}")]
    SmoothingOrder { order: usize, window: usize },

    #[error("{name} must be a positive finite number, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("dispersion slope must be finite, got {0}")]
    DispersionSlope(f64),

    #[error("evaluation budget must be at least 1")]
    ZeroEvaluations,
}
