//! chatreel Simulator CLI
//!
//! Run verification drills against the built-in (or a JSON) scenario catalog,
//! export a drill transcript, or play scenarios interactively in the terminal.

use chatreel_core::catalog::{CatalogError, ScenarioCatalog};
use chatreel_core::config::{Edition, PlaybackTimings, PlayerConfig, SPEED_RANGE};
use chatreel_core::dashboard::ChatDashboard;
use chatreel_core::driver::PlaybackDriver;
use chatreel_core::engine::PlaybackEngine;
use chatreel_core::model::ScenarioId;
use chatreel_env::{EnvError, TokioContext};
use chatreel_sim::{DrillId, DrillResult, DrillRunner, TranscriptExport};
use clap::Parser;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Failures of the interactive player.
#[derive(Debug, Error)]
enum PlayError {
    #[error("terminal error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Env(#[from] EnvError),
}

/// How long the driver gets to stop after the dashboard closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// chatreel drill runner and interactive player
#[derive(Parser, Debug)]
#[command(name = "chatreel-sim")]
#[command(about = "Verify and play scripted insurance chat demos", long_about = None)]
struct Args {
    /// Seed for the random-controls drill and session ids
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario id or title, or "all"
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Drill to run (full_playback, restart_mid_run, reset_mid_typing,
    /// scenario_switch, manual_toggle, selection_override, random_controls, all)
    #[arg(short = 'D', long, default_value = "all")]
    drill: String,

    /// Load scenarios from a JSON file instead of the built-in catalog
    #[arg(long)]
    catalog: Option<String>,

    /// Playback speed factor (2.0 = twice as fast, 0.1 to 100)
    #[arg(long, default_value = "1.0", value_parser = parse_speed)]
    speed: f64,

    /// Page edition for --play (classic, rich, phone)
    #[arg(long, default_value = "phone")]
    edition: Edition,

    /// Open the interactive terminal player
    #[arg(long)]
    play: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export one drill's transcript and event log to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn parse_speed(s: &str) -> Result<f64, String> {
    let speed: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if SPEED_RANGE.contains(&speed) {
        Ok(speed)
    } else {
        Err(format!(
            "speed must be between {} and {}",
            SPEED_RANGE.start(),
            SPEED_RANGE.end()
        ))
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn init_logging(args: &Args) {
    // The player owns the terminal; only log when asked to
    if args.play && std::env::var_os("RUST_LOG").is_none() {
        return;
    }

    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn load_catalog(path: Option<&str>) -> Result<ScenarioCatalog, CatalogError> {
    match path {
        Some(path) => {
            let catalog = ScenarioCatalog::load(path)?;
            info!("Loaded {} scenarios from {}", catalog.len(), path);
            Ok(catalog)
        }
        None => Ok(ScenarioCatalog::builtin()),
    }
}

/// Interactive player: driver on a tokio runtime, dashboard on this thread.
fn play(catalog: Arc<ScenarioCatalog>, config: PlayerConfig, preselect: Option<ScenarioId>) -> Result<(), PlayError> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let _guard = runtime.enter();

    let engine = PlaybackEngine::new(Arc::clone(&catalog), config.timings);
    let initial = engine.snapshot();
    let (driver, handle, frames) = PlaybackDriver::new(TokioContext::shared(), engine);
    let task = runtime.spawn(driver.run());

    if let Some(id) = preselect {
        handle.select(id)?;
    }

    let mut dashboard = ChatDashboard::new(frames, handle, catalog, config, initial);
    // The dashboard keeps the frame receiver alive until the driver has stopped
    let ui = dashboard.run();
    let engine = runtime.block_on(async {
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(joined) => joined.map_err(EnvError::context)?,
            Err(_) => Err(EnvError::Timeout(millis(SHUTDOWN_GRACE))),
        }
    })?;
    info!(
        "Player closed after {} runs, {} messages revealed",
        engine.stats().runs_started,
        engine.stats().appended
    );
    ui?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if !args.json && !args.play {
        info!("chatreel Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let catalog = match load_catalog(args.catalog.as_deref()) {
        Ok(catalog) => Arc::new(catalog),
        Err(CatalogError::Invalid(report)) => {
            eprintln!("Error: catalog failed validation ({} issues)", report.issues.len());
            for id in report.affected_scenarios() {
                eprintln!("  scenario {}:", id);
                for issue in report.for_scenario(id) {
                    eprintln!("    - {}", issue.kind);
                }
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        catalog.iter().map(|s| s.id).collect()
    } else {
        match catalog.resolve(&args.scenario) {
            Some(scenario) => vec![scenario.id],
            None => {
                eprintln!("Error: Unknown scenario: {}", args.scenario);
                eprintln!("Available scenarios:");
                for scenario in catalog.iter() {
                    eprintln!("  {:>3}  {}", scenario.id, scenario.title);
                }
                std::process::exit(1);
            }
        }
    };

    let timings = PlaybackTimings::default().scaled(args.speed);

    // Handle --play mode
    if args.play {
        let config = PlayerConfig::for_edition(args.edition).with_timings(timings);
        let preselect = (scenarios.len() == 1).then(|| scenarios[0]);
        if let Err(e) = play(Arc::clone(&catalog), config, preselect) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Parse drills
    let drills: Vec<DrillId> = if args.drill == "all" {
        DrillId::all()
    } else {
        vec![args.drill.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available drills:");
            for drill in DrillId::all() {
                eprintln!("  {:<20} {}", drill.name(), drill.description());
            }
            std::process::exit(1);
        })]
    };

    let runner = DrillRunner::new(Arc::clone(&catalog))
        .with_timings(timings)
        .with_seed(args.seed);

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }
        let drill = if drills.len() == 1 { drills[0] } else { DrillId::FullPlayback };

        info!("Running with export to: {}", export_path);
        let result = runner.run(drill, scenarios[0]);
        let export = TranscriptExport::from_result(&result);

        if let Err(e) = export.write_to_file(export_path) {
            error!("Failed to write export: {:?}", e);
            std::process::exit(1);
        }
        info!("Exported {} events to {}", export.events.len(), export_path);

        if result.passed {
            info!("✓ {} on '{}' PASSED", drill.name(), result.scenario_title);
        } else {
            error!(
                "✗ {} on '{}' FAILED: {}",
                drill.name(),
                result.scenario_title,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }

    // Run drills
    let all_results: Vec<DrillResult> = runner.run_all(&drills, &scenarios);
    let failed_count = all_results.iter().filter(|r| !r.passed).count();

    if !args.json {
        for result in &all_results {
            if result.skipped {
                info!("- {} on '{}' skipped", result.drill.name(), result.scenario_title);
            } else if result.passed {
                info!(
                    "✓ {} on '{}' PASSED ({} messages, {:.1}s virtual)",
                    result.drill.name(),
                    result.scenario_title,
                    result.transcript.len(),
                    result.virtual_time.as_secs_f64()
                );
            } else {
                error!(
                    "✗ {} on '{}' FAILED: {}",
                    result.drill.name(),
                    result.scenario_title,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "seed": args.seed,
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "drill": r.drill.name(),
                    "scenario_id": r.scenario_id,
                    "scenario": r.scenario_title,
                    "passed": r.passed,
                    "skipped": r.skipped,
                    "virtual_ms": millis(r.virtual_time),
                    "metrics": r.metrics,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} drill runs passed!", total);
        } else {
            error!("❌ {}/{} drill runs failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_must_be_in_range() {
        assert_eq!(parse_speed("2.5"), Ok(2.5));
        assert_eq!(parse_speed("0.1"), Ok(0.1));
        assert!(parse_speed("0").is_err());
        assert!(parse_speed("-1").is_err());
        assert!(parse_speed("1e-20").is_err());
        assert!(parse_speed("NaN").is_err());
        assert!(parse_speed("fast").is_err());

        assert!(Args::try_parse_from(["chatreel-sim", "--speed", "0"]).is_err());
        let args = Args::try_parse_from(["chatreel-sim", "--speed", "4"]).unwrap();
        assert_eq!(args.speed, 4.0);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
