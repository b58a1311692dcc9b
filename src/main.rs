//! LapDrop headless runner
//!
//! Loads a drill, plays it at the fixed timestep (optionally under the
//! autopilot), writes the telemetry file and prints the result.

use std::path::PathBuf;

use clap::Parser;

use lapdrop::autopilot::Autopilot;
use lapdrop::consts::SIM_DT;
use lapdrop::persistence::NdjsonSink;
use lapdrop::sim::{Drill, DrillPhase, TickInput, TickStatus};
use lapdrop::{DrillDefinition, Tuning};

const DEFAULT_DRILL: &str = include_str!("../drills/pea_drop_plus.json");

#[derive(Debug, Parser)]
#[command(name = "lapdrop", about = "Run a LapDrop bead drop drill headlessly")]
struct Cli {
    /// Drill definition (JSON); defaults to the bundled Pea Drop Plus drill
    drill: Option<PathBuf>,

    /// Directory for NDJSON telemetry files
    #[arg(long, default_value = "telemetry")]
    telemetry_dir: PathBuf,

    /// Tuning overrides (JSON)
    #[arg(long)]
    tuning: Option<PathBuf>,

    /// Let the autopilot play instead of idling
    #[arg(long)]
    autopilot: bool,

    /// Autopilot RNG seed
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let definition = match &cli.drill {
        Some(path) => DrillDefinition::load(path)?,
        None => DrillDefinition::from_json_str(DEFAULT_DRILL)?,
    };
    let tuning = match &cli.tuning {
        Some(path) => Tuning::load(path)?,
        None => Tuning::default(),
    };
    log::info!(
        "Loaded drill '{}' ({}s, {} drops)",
        definition.name,
        definition.duration_seconds,
        definition.target_drops
    );

    let mut autopilot = cli.autopilot.then(|| Autopilot::new(cli.seed));
    let mut drill = Drill::new(definition, tuning, NdjsonSink::new(&cli.telemetry_dir));

    let start = TickInput {
        confirm: true,
        ..Default::default()
    };
    drill.tick(&start, SIM_DT);

    while drill.phase() == DrillPhase::Running {
        let input = match (autopilot.as_mut(), drill.session()) {
            (Some(pilot), Some(session)) => pilot.input(session),
            _ => TickInput::default(),
        };
        if drill.tick(&input, SIM_DT) == TickStatus::Quit {
            break;
        }
    }

    let Some(result) = drill.result() else {
        return Ok(());
    };
    let b = &result.breakdown;
    println!("Drill:          {}", result.drill_id);
    println!("Score:          {:.0} (grade {})", b.score, result.grade);
    println!(
        "Drops:          {}  Misses: {}  Tissue: {}",
        b.drops, b.misses, b.tissue_contacts
    );
    println!(
        "Perfect drops:  {}  Best streak: {}",
        b.perfect_drops, b.best_streak
    );
    println!("Time played:    {:.1}s", result.duration_played);
    match &result.telemetry_location {
        Some(location) => println!("Telemetry:      {location}"),
        None => println!("Telemetry:      not saved"),
    }

    Ok(())
}
