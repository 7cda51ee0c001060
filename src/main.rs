use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};

use ring_analyzer::data::export::{write_json, write_resonance_csv};
use ring_analyzer::report::{resonance_table, summary};
use ring_analyzer::{load_file, AnalysisParams, ResonanceSpectrumAnalyzer};

const USAGE: &str = "\
Usage: ring-analyzer [OPTIONS] <FILE>...

Fit Lorentzian resonances in ring-resonator transmission spectra
(.csv / .json / .parquet with wavelength_nm and power_dBm columns).

Options:
  --radius <UM>          Ring radius in µm (enables group/effective index)
  --config <FILE>        JSON file with analysis parameters
  --min-depth <DB>       Minimum dip depth in dB
  --min-separation <NM>  Minimum spacing between resonances in nm
  --window <NM>          Half width of the fit window in nm
  --out-dir <DIR>        Directory for result files (default: next to input)
  --no-export            Print the report only
  -h, --help             Show this help";

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

struct Options {
    params: AnalysisParams,
    files: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    export: bool,
}

fn parse_number(flag: &str, value: Option<String>) -> Result<f64> {
    let value = value.with_context(|| format!("{flag} needs a value"))?;
    value
        .parse::<f64>()
        .with_context(|| format!("{flag}: '{value}' is not a number"))
}

/// Parse arguments. Returns `None` when help was requested.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Options>> {
    let mut config: Option<PathBuf> = None;
    let mut radius = None;
    let mut min_depth = None;
    let mut min_separation = None;
    let mut window = None;
    let mut out_dir = None;
    let mut export = true;
    let mut files = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--radius" => radius = Some(parse_number(&arg, args.next())?),
            "--min-depth" => min_depth = Some(parse_number(&arg, args.next())?),
            "--min-separation" => min_separation = Some(parse_number(&arg, args.next())?),
            "--window" => window = Some(parse_number(&arg, args.next())?),
            "--config" => {
                config = Some(args.next().context("--config needs a file")?.into());
            }
            "--out-dir" => {
                out_dir = Some(PathBuf::from(args.next().context("--out-dir needs a directory")?));
            }
            "--no-export" => export = false,
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            file => files.push(PathBuf::from(file)),
        }
    }

    if files.is_empty() {
        bail!("no input files given");
    }

    // File values first, flags override.
    let mut params = match &config {
        Some(path) => AnalysisParams::from_json_file(path)?,
        None => AnalysisParams::default(),
    };
    if let Some(r) = radius {
        params.ring_radius_um = Some(r);
    }
    if let Some(d) = min_depth {
        params.min_depth_db = d;
    }
    if let Some(s) = min_separation {
        params.min_separation_nm = s;
    }
    if let Some(w) = window {
        params.fit_window_nm = w;
    }

    Ok(Some(Options {
        params,
        files,
        out_dir,
        export,
    }))
}

fn output_path(input: &Path, out_dir: Option<&Path>, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum");
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}{suffix}"))
}

fn run_file(analyzer: &ResonanceSpectrumAnalyzer, path: &Path, opts: &Options) -> Result<()> {
    println!("Analyzing ring resonator data: {}", path.display());
    let spectrum = load_file(path).with_context(|| format!("loading {}", path.display()))?;
    match spectrum.mean_step_nm() {
        Some(step) => println!(
            "Loaded {} spectral points ({:.1} pm step)",
            spectrum.len(),
            step * 1e3
        ),
        None => println!("Loaded {} spectral points", spectrum.len()),
    }

    let result = analyzer.analyze(&spectrum);

    print!("{}", resonance_table(&result));
    println!();
    print!("{}", summary(&result));

    if opts.export {
        let json_path = output_path(path, opts.out_dir.as_deref(), "_results.json");
        let csv_path = output_path(path, opts.out_dir.as_deref(), "_resonances.csv");
        write_json(&result, &json_path)?;
        write_resonance_csv(&result, &csv_path)?;
        println!("Results saved to {} and {}", json_path.display(), csv_path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(Some(opts)) => opts,
        Ok(None) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("error: {err:#}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    let analyzer = match ResonanceSpectrumAnalyzer::new(opts.params.clone()) {
        Ok(a) => a,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    log::info!("analysis parameters: {:?}", analyzer.params());

    let mut failures = 0;
    for path in &opts.files {
        if let Err(err) = run_file(&analyzer, path, &opts) {
            log::error!("{err:#}");
            eprintln!("error: {err:#}");
            failures += 1;
        }
        println!();
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn flags_override_defaults() {
        let opts = parse_args(args(&["--radius", "10", "--window", "0.5", "ring.csv"]))
            .unwrap()
            .unwrap();
        assert_eq!(opts.params.ring_radius_um, Some(10.0));
        assert_eq!(opts.params.fit_window_nm, 0.5);
        assert_eq!(opts.files, vec![PathBuf::from("ring.csv")]);
        assert!(opts.export);
    }

    #[test]
    fn help_and_errors() {
        assert!(parse_args(args(&["--help"])).unwrap().is_none());
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["--radius"])).is_err());
        assert!(parse_args(args(&["--bogus", "a.csv"])).is_err());
    }

    #[test]
    fn output_paths_follow_input_stem() {
        let p = output_path(Path::new("data/ring.csv"), None, "_results.json");
        assert_eq!(p, PathBuf::from("data/ring_results.json"));
        let p = output_path(Path::new("ring.csv"), Some(Path::new("out")), "_resonances.csv");
        assert_eq!(p, PathBuf::from("out/ring_resonances.csv"));
    }
}
