mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;
use mdof_io::{load_record, write_ida_csv, write_ida_json, write_pushover_csv, write_trajectory_csv};
use mdof_solver::{
    DEFAULT_SPECTRAL_DAMPING, IdaRunner, MdofModel, response_spectrum,
};

use crate::config::JobFile;

#[derive(Parser, Debug)]
#[command(name = "mdof")]
#[command(version)]
#[command(about = "Seismic analysis of lumped-mass shear buildings")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the natural periods of the building
    Modal {
        /// JSON job file
        job: PathBuf,
        /// Number of modes, all by default
        #[arg(long)]
        modes: Option<usize>,
    },
    /// Time-history analysis under one scaled record
    Dynamic {
        job: PathBuf,
        /// Record file (.AT2 or flat series)
        #[arg(long)]
        record: PathBuf,
        /// Sample step of a flat series [s]
        #[arg(long)]
        dt: Option<f64>,
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        /// Response history CSV
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Displacement-controlled pushover
    Pushover {
        job: PathBuf,
        /// Control-floor displacement targets [m], visited in order
        #[arg(long, num_args = 1.., allow_negative_numbers = true, required = true)]
        targets: Vec<f64>,
        /// Largest displacement increment [m]
        #[arg(long)]
        step: f64,
        /// Control floor, 1-based; the roof by default
        #[arg(long)]
        control_floor: Option<usize>,
        /// Capacity curve CSV
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Incremental dynamic analysis over the job's records and intensities
    Ida {
        job: PathBuf,
        /// Result table, overrides the job's output path
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Write JSON instead of CSV
        #[arg(long)]
        json: bool,
    },
    /// Elastic pseudo-acceleration spectrum of a record
    Spectrum {
        /// Record file (.AT2 or flat series)
        record: PathBuf,
        #[arg(long)]
        dt: Option<f64>,
        /// Oscillator periods [s]
        #[arg(long, num_args = 1.., required = true)]
        periods: Vec<f64>,
        #[arg(long, default_value_t = DEFAULT_SPECTRAL_DAMPING)]
        damping: f64,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn build_model(job: &JobFile) -> Result<MdofModel> {
    let model = MdofModel::new(&job.structure).context("building structural model")?;
    Ok(model.with_ladder(job.ladder()))
}

fn run_modal(job: &Path, modes: Option<usize>) -> Result<()> {
    let job = JobFile::load(job)?;
    let model = build_model(&job)?;
    let periods = model.eigen(modes.unwrap_or(model.story_count()))?;
    for (i, period) in periods.iter().enumerate() {
        println!("mode {}: T = {period:.6} s", i + 1);
    }
    Ok(())
}

fn run_dynamic(
    job: &Path,
    record: &Path,
    dt: Option<f64>,
    scale: f64,
    out: Option<&Path>,
) -> Result<()> {
    let job = JobFile::load(job)?;
    let mut model = build_model(&job)?;
    let record = load_record(record, dt)
        .with_context(|| format!("reading record {}", record.display()))?;

    let outcome = model.run_dynamic(&record, scale, job.time_step)?;
    println!(
        "finished: {} ({:.3} of {:.3} s, {} steps, {} fallbacks)",
        outcome.finished, outcome.reached_time, outcome.total_time, outcome.steps, outcome.fallbacks
    );
    println!("max_drift: {:?}", model.max_drift());
    println!("max_abs_accel: {:?}", model.max_abs_accel());
    println!("max_rel_accel: {:?}", model.max_rel_accel());
    println!("residual_drift: {}", model.residual_drift());

    if let Some(out) = out {
        write_trajectory_csv(out, model.trajectory())?;
        info!("response history written to {}", out.display());
    }
    Ok(())
}

fn run_pushover(
    job: &Path,
    targets: &[f64],
    step: f64,
    control_floor: Option<usize>,
    out: Option<&Path>,
) -> Result<()> {
    let job = JobFile::load(job)?;
    let mut model = build_model(&job)?;
    let floor = control_floor.unwrap_or(model.story_count());

    let curve = model.run_static_pushover(targets, step, floor)?;
    println!(
        "finished: {} ({} of {} targets), peak base shear {:.3} N",
        curve.finished,
        curve.targets_reached,
        targets.len(),
        curve.peak_base_shear()
    );
    if let Some(out) = out {
        write_pushover_csv(out, &curve)?;
        info!("capacity curve written to {}", out.display());
    }
    Ok(())
}

fn run_ida(job_path: &Path, out: Option<PathBuf>, json: bool) -> Result<()> {
    let job = JobFile::load(job_path)?;
    let records = job.load_records()?;
    let out = match out.or_else(|| job.output.as_ref().map(|p| job.resolve(p))) {
        Some(out) => out,
        None if json => PathBuf::from("IDA_results.json"),
        None => PathBuf::from("IDA_results.csv"),
    };

    info!(
        "IDA started {} for job {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        job_path.display()
    );
    let started = Instant::now();
    let table = IdaRunner::new(&job.structure, job.ida_config())
        .with_ladder(job.ladder())
        .run(&records)?;

    if json {
        write_ida_json(&out, &table)?;
    } else {
        write_ida_csv(&out, &table)?;
    }
    println!(
        "{} rows ({} finished, {} failed) in {:.2?}, written to {}",
        table.len(),
        table.finished_count(),
        table.failed_count(),
        started.elapsed(),
        out.display()
    );
    Ok(())
}

fn run_spectrum(record: &Path, dt: Option<f64>, periods: &[f64], damping: f64) -> Result<()> {
    if !(0.0..1.0).contains(&damping) {
        bail!("damping ratio must be in [0, 1), got {damping}");
    }
    let record = load_record(record, dt)
        .with_context(|| format!("reading record {}", record.display()))?;
    let ordinates = response_spectrum(record.accel(), record.dt(), periods, damping);
    println!("period,sa");
    for (period, sa) in periods.iter().zip(&ordinates) {
        println!("{period},{sa}");
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Modal { job, modes } => run_modal(&job, modes),
        Command::Dynamic {
            job,
            record,
            dt,
            scale,
            out,
        } => run_dynamic(&job, &record, dt, scale, out.as_deref()),
        Command::Pushover {
            job,
            targets,
            step,
            control_floor,
            out,
        } => run_pushover(&job, &targets, step, control_floor, out.as_deref()),
        Command::Ida { job, out, json } => run_ida(&job, out, json),
        Command::Spectrum {
            record,
            dt,
            periods,
            damping,
        } => run_spectrum(&record, dt, &periods, damping),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_negative_pushover_targets() {
        let cli = Cli::try_parse_from([
            "mdof", "pushover", "job.json", "--targets", "0.1", "-0.1", "0.0", "--step", "0.01",
        ])
        .unwrap();
        match cli.command {
            Command::Pushover { targets, step, .. } => {
                assert_eq!(targets, vec![0.1, -0.1, 0.0]);
                assert_eq!(step, 0.01);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn ida_defaults_to_csv() {
        let cli = Cli::try_parse_from(["mdof", "-v", "ida", "job.json"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Ida { json: false, out: None, .. }));
    }
}
