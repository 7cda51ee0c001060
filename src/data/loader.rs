use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, Float32Array, Float64Array};
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::Spectrum;

/// Column holding the wavelength axis (nm).
pub const WAVELENGTH_COLUMN: &str = "wavelength_nm";
/// Column holding the transmitted power (dBm).
pub const POWER_COLUMN: &str = "power_dBm";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a transmission spectrum from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with `wavelength_nm` and `power_dBm` columns
/// * `.json`    – `{ "wavelength_nm": [...], "power_dBm": [...] }` or
///                `[{ "wavelength_nm": .., "power_dBm": .. }, ...]`
/// * `.parquet` – Float64/Float32 columns `wavelength_nm` and `power_dBm`
///
/// Samples are sorted by wavelength, so descending sweeps load as well.
pub fn load_file(path: &Path) -> Result<Spectrum> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let samples = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let spectrum = Spectrum::from_unsorted(samples)
        .with_context(|| format!("invalid spectrum in {}", path.display()))?;
    log::debug!("loaded {} samples from {}", spectrum.len(), path.display());
    Ok(spectrum)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row, one sample per row. Extra columns are ignored.
fn load_csv(path: &Path) -> Result<Vec<(f64, f64)>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers = reader.headers().context("reading CSV headers")?.clone();

    let wl_idx = headers
        .iter()
        .position(|h| h.trim() == WAVELENGTH_COLUMN)
        .with_context(|| format!("CSV missing '{WAVELENGTH_COLUMN}' column"))?;
    let p_idx = headers
        .iter()
        .position(|h| h.trim() == POWER_COLUMN)
        .with_context(|| format!("CSV missing '{POWER_COLUMN}' column"))?;

    let mut samples = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let wl = parse_cell(record.get(wl_idx), row_no, WAVELENGTH_COLUMN)?;
        let p = parse_cell(record.get(p_idx), row_no, POWER_COLUMN)?;
        samples.push((wl, p));
    }
    Ok(samples)
}

fn parse_cell(cell: Option<&str>, row: usize, col: &str) -> Result<f64> {
    let tok = cell.unwrap_or("").trim();
    tok.parse::<f64>()
        .with_context(|| format!("Row {row}, {col}: '{tok}' is not a number"))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Accepts the column form (`df.to_json(orient='list')`-like object) and the
/// records form (`df.to_json(orient='records')`).
fn load_json(path: &Path) -> Result<Vec<(f64, f64)>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    match &root {
        JsonValue::Object(obj) => {
            let wl = json_array_to_f64(obj.get(WAVELENGTH_COLUMN), WAVELENGTH_COLUMN)?;
            let p = json_array_to_f64(obj.get(POWER_COLUMN), POWER_COLUMN)?;
            if wl.len() != p.len() {
                bail!(
                    "'{WAVELENGTH_COLUMN}' has {} values but '{POWER_COLUMN}' has {}",
                    wl.len(),
                    p.len()
                );
            }
            Ok(wl.into_iter().zip(p).collect())
        }
        JsonValue::Array(records) => records
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let obj = rec
                    .as_object()
                    .with_context(|| format!("Row {i} is not a JSON object"))?;
                let wl = json_number(obj.get(WAVELENGTH_COLUMN), i, WAVELENGTH_COLUMN)?;
                let p = json_number(obj.get(POWER_COLUMN), i, POWER_COLUMN)?;
                Ok((wl, p))
            })
            .collect(),
        _ => bail!("Expected a JSON object of columns or an array of records"),
    }
}

fn json_array_to_f64(val: Option<&JsonValue>, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("{col}[{j}]: not a number"))
        })
        .collect()
}

fn json_number(val: Option<&JsonValue>, row: usize, col: &str) -> Result<f64> {
    val.and_then(|v| v.as_f64())
        .with_context(|| format!("Row {row}: missing or invalid '{col}'"))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one row per sample.
///
/// Works with files written by **Pandas** (`df.to_parquet()`), **Polars**
/// and the `generate_sample` binary.
fn load_parquet(path: &Path) -> Result<Vec<(f64, f64)>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut samples = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        if samples.is_empty() && log::log_enabled!(log::Level::Trace) {
            if let Ok(preview) = pretty_format_batches(&[batch.slice(0, batch.num_rows().min(5))]) {
                log::trace!("{}:\n{preview}", path.display());
            }
        }
        let schema = batch.schema();

        let wl_idx = schema
            .index_of(WAVELENGTH_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{WAVELENGTH_COLUMN}' column"))?;
        let p_idx = schema
            .index_of(POWER_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing '{POWER_COLUMN}' column"))?;

        let wl = extract_f64_column(batch.column(wl_idx))
            .with_context(|| format!("reading '{WAVELENGTH_COLUMN}'"))?;
        let p = extract_f64_column(batch.column(p_idx))
            .with_context(|| format!("reading '{POWER_COLUMN}'"))?;

        samples.extend(wl.into_iter().zip(p));
    }

    Ok(samples)
}

/// Extract a non-null Float64 / Float32 column as `Vec<f64>`.
fn extract_f64_column(col: &Arc<dyn Array>) -> Result<Vec<f64>> {
    if col.null_count() > 0 {
        bail!("column contains {} null values", col.null_count());
    }

    if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        Ok(arr.values().to_vec())
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        Ok(arr.values().iter().map(|&v| v as f64).collect())
    } else {
        bail!("expected Float64 or Float32 column, got {:?}", col.data_type())
    }
}
