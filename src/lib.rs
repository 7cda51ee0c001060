//! Ring-resonator transmission spectrum analysis.
//!
//! Finds resonance dips in a wavelength/power spectrum, fits each with a
//! Lorentzian and derives Q-factor, extinction ratio, free spectral range and
//! group/effective index.
//!
//! ```no_run
//! use ring_analyzer::{analyze_spectrum, load_file, AnalysisParams};
//!
//! let spectrum = load_file("ring.csv".as_ref())?;
//! let params = AnalysisParams::default().with_ring_radius(10.0);
//! let result = analyze_spectrum(&spectrum, &params)?;
//! for r in &result.resonances {
//!     println!("{:.3} nm  Q = {:.0}", r.center_wavelength_nm, r.q_factor);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod analysis;
pub mod data;
pub mod error;
pub mod report;

pub use analysis::aggregate::{FreeSpectralRange, IndexEstimate, SampleStats};
pub use analysis::fit::{FittedResonance, ResonanceFit, SkipReason, SkippedCandidate};
pub use analysis::lorentzian::LorentzianParams;
pub use analysis::params::AnalysisParams;
pub use analysis::peaks::ResonanceCandidate;
pub use analysis::{analyze_spectrum, ResonanceSpectrumAnalyzer, SpectrumAnalysisResult};
pub use data::loader::load_file;
pub use data::model::Spectrum;
pub use error::{ParamsError, SpectrumError};
