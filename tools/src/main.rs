//! synpop-runner: headless runner for the synthetic population pipeline.
//!
//! Usage:
//!   synpop-runner --data-dir ./data --db run.db
//!   synpop-runner --seed 12345 --data-dir ./data --db run.db --reuse-weights
//!   synpop-runner --data-dir ./data --json

use anyhow::Result;
use std::env;
use synpop_core::{
    assignment::AssignmentReport,
    config::SynPopConfig,
    inputs::PipelineInputs,
    pipeline::{Pipeline, PipelineOutput},
    store::SynPopStore,
};

#[derive(serde::Serialize)]
struct RunSummary {
    run_id:           String,
    seed:             u64,
    households:       usize,
    persons:          usize,
    dwellings:        usize,
    vacant_dwellings: usize,
    calibrations:     Vec<CalibrationSummary>,
    assignments:      Vec<AssignmentReport>,
}

#[derive(serde::Serialize)]
struct CalibrationSummary {
    scope:       String,
    iterations:  u32,
    best_error:  f64,
    termination: String,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = arg_value(&args, "--data-dir").unwrap_or("./data");
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let json = args.iter().any(|a| a == "--json");

    let mut config = SynPopConfig::load(data_dir)?;
    config.run.seed = parse_arg(&args, "--seed", config.run.seed);
    if args.iter().any(|a| a == "--reuse-weights") {
        config.run.reuse_weights = true;
    }
    let seed = config.run.seed;

    if !json {
        println!("synpop-runner");
        println!("  seed:      {seed}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let inputs = PipelineInputs::load(data_dir)?;

    let store = SynPopStore::open(db)?;
    store.migrate()?;
    let run_id = format!("run-{seed}-{}", unix_seconds());
    store.insert_run(&run_id, seed, &config.run.weights_key, env!("CARGO_PKG_VERSION"))?;

    let mut pipeline = Pipeline::new(run_id.clone(), config, store);
    let output = pipeline.run(&inputs)?;

    let summary = summarize(&run_id, seed, &output);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn summarize(run_id: &str, seed: u64, output: &PipelineOutput) -> RunSummary {
    RunSummary {
        run_id: run_id.to_string(),
        seed,
        households: output.population.households.len(),
        persons: output.population.persons.len(),
        dwellings: output.population.dwellings.len(),
        vacant_dwellings: output.population.vacant_dwelling_count(),
        calibrations: output
            .calibration_reports
            .iter()
            .map(|(scope, r)| CalibrationSummary {
                scope:       scope.clone(),
                iterations:  r.iterations,
                best_error:  r.best_error,
                termination: r.termination.as_str().to_string(),
            })
            .collect(),
        assignments: output.assignment_reports.clone(),
    }
}

fn print_summary(s: &RunSummary) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:           {}", s.run_id);
    println!("  households:       {}", s.households);
    println!("  persons:          {}", s.persons);
    println!("  dwellings:        {}", s.dwellings);
    println!("  vacant dwellings: {}", s.vacant_dwellings);

    println!();
    println!("=== CALIBRATION ===");
    if s.calibrations.is_empty() {
        println!("  (stored weights reused)");
    }
    for c in &s.calibrations {
        println!(
            "  {:<14} {:<15} iterations={:<4} error={:.6}",
            c.scope, c.termination, c.iterations, c.best_error
        );
    }

    println!();
    println!("=== ASSIGNMENT ===");
    for a in &s.assignments {
        println!(
            "  {:<18} requested={:<6} assigned={:<6} outside={:<6} vacant left={}",
            a.label, a.requested, a.assigned, a.outside, a.remaining_vacant
        );
        if !a.is_conserved() {
            log::warn!("{} assignment counts do not balance: {a:?}", a.label);
        }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn unix_seconds() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
