use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::Float64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use ring_analyzer::data::loader::{POWER_COLUMN, WAVELENGTH_COLUMN};
use ring_analyzer::data::synthetic::{noisy_ring_spectrum, uniform_grid, LorentzianDip};
use ring_analyzer::Spectrum;

/// Silicon ring, R = 10 µm: FSR ≈ 9.1 nm around 1550 nm.
const FSR_NM: f64 = 9.1;

fn write_csv(spectrum: &Spectrum, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    writer.write_record([WAVELENGTH_COLUMN, POWER_COLUMN])?;
    for (wl, p) in spectrum.wavelength_nm().iter().zip(spectrum.power_dbm()) {
        writer.write_record([format!("{wl:.4}"), format!("{p:.4}")])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(spectrum: &Spectrum, path: &Path) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(WAVELENGTH_COLUMN, DataType::Float64, false),
        Field::new(POWER_COLUMN, DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(spectrum.wavelength_nm().to_vec())),
            Arc::new(Float64Array::from(spectrum.power_dbm().to_vec())),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let stem = std::env::args().nth(1).unwrap_or_else(|| "sample_ring".to_string());

    // 1520 → 1580 nm, 1 pm step
    let wavelengths = uniform_grid(1520.0, 1580.0, 0.001);

    // Slowly varying Q and extinction across the band, as in a real ring.
    let dips: Vec<LorentzianDip> = (-3..=3)
        .map(|m| {
            let center = 1550.0 + m as f64 * FSR_NM;
            let gamma = 0.04 + 0.005 * m as f64;
            let depth = 15.0 - 1.5 * (m as f64).abs();
            LorentzianDip::new(center, gamma, depth)
        })
        .collect();

    let spectrum = noisy_ring_spectrum(&wavelengths, -12.0, &dips, 0.05, 42)?;

    let csv_path = PathBuf::from(format!("{stem}.csv"));
    let parquet_path = PathBuf::from(format!("{stem}.parquet"));
    write_csv(&spectrum, &csv_path)?;
    write_parquet(&spectrum, &parquet_path)?;

    println!(
        "Wrote {} samples with {} resonances to {} and {}",
        spectrum.len(),
        dips.len(),
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
