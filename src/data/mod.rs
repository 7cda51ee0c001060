/// Data layer: spectrum type, loading, export and synthetic spectra.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Spectrum (sorted, validated)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  wavelength_nm / power_dBm, dBm ↔ mW
///   └──────────┘
///        │            analysis::ResonanceSpectrumAnalyzer
///        ▼
///   ┌──────────┐
///   │  export   │  SpectrumAnalysisResult → .json / .csv
///   └──────────┘
/// ```

pub mod export;
pub mod loader;
pub mod model;
pub mod synthetic;
