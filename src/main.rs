//! Trade Mission Solver - Command Line Interface
//!
//! Plans a single-visit trading route for a list of pickup/delivery missions.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use trade_mission_solver::database::{ReferenceData, ReferencePaths, ShipParameters};
use trade_mission_solver::lookup::StationLookup;
use trade_mission_solver::mission::MissionSet;
use trade_mission_solver::report::RouteReport;
use trade_mission_solver::route::{BestRoute, RouteFinder, SearchConfig, SearchObserver, SearchOutcome, SearchProgress};
use trade_mission_solver::trader::Trader;

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "trade-mission-solver")]
#[command(version = "1.0")]
#[command(about = "Finds a trading route that finishes as many missions as possible in one visit per station")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a route for a mission file
    Run {
        /// Mission file (tab separated)
        #[arg(short, long, default_value = "missions.txt")]
        missions: PathBuf,

        /// Station lookup built with `build-database`
        #[arg(short, long, default_value = "lookup.json")]
        lookup: PathBuf,

        /// Cargo capacity in tons
        #[arg(short, long, default_value = "512")]
        cargo: u32,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Largest number of stations searched exhaustively
        #[arg(long, default_value = "9")]
        exhaustive_limit: usize,

        /// Number of random routes tried above the exhaustive limit
        #[arg(long, default_value = "400023")]
        trials: usize,

        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Check whether any known station sells a commodity
    Available {
        commodity: String,

        #[arg(short, long, default_value = "lookup.json")]
        lookup: PathBuf,
    },

    /// Build the station lookup from raw reference files
    BuildDatabase {
        /// Directory holding systems_populated.json, stations.json,
        /// commodities.json and listings.csv
        #[arg(short, long)]
        dir: PathBuf,

        /// Mission file; its `I'm at` line gives the origin system
        #[arg(short, long, default_value = "missions.txt")]
        missions: PathBuf,

        /// Laden jump range in light years
        #[arg(long, default_value = "20.0")]
        jump_range: f64,

        /// Maximum number of jumps to fetch a commodity
        #[arg(long, default_value = "8")]
        max_jumps: u32,

        /// Landing pad size the ship needs
        #[arg(long, value_enum, default_value = "large")]
        pad_size: PadSize,

        /// Maximum station distance from the arrival point (ls)
        #[arg(long, default_value = "2500")]
        max_distance: f64,

        /// Minimum supply for a listing to count
        #[arg(long, default_value = "100")]
        minimum_supply: u32,

        #[arg(short, long, default_value = "lookup.json")]
        output: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum PadSize {
    /// Medium pad is enough
    Medium,
    /// Needs a large pad
    Large,
}

/// Progress bar fed by the route search
struct ProgressObserver {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl ProgressObserver {
    fn new(quiet: bool) -> Self {
        ProgressObserver { bar: None, quiet }
    }
}

impl SearchObserver for ProgressObserver {
    fn on_start(&mut self, progress: &SearchProgress) {
        if self.quiet {
            return;
        }
        let bar = match progress.total {
            Some(total) => ProgressBar::new(total as u64),
            None => ProgressBar::new_spinner(),
        };
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} routes [{elapsed_precise}] {msg}") {
            bar.set_style(style);
        }
        bar.set_message(format!("{} open", progress.best_residual_obligations));
        self.bar = Some(bar);
    }

    fn on_progress(&mut self, progress: &SearchProgress) {
        if let Some(bar) = &self.bar {
            bar.set_position(progress.trials as u64);
        }
    }

    fn on_improvement(&mut self, best: &BestRoute, _trials: usize) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{} open", best.residual_obligations));
        }
    }

    fn on_finish(&mut self, _outcome: &SearchOutcome) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { missions, lookup, cargo, seed, exhaustive_limit, trials, output, quiet } => {
            let config = SearchConfig {
                exhaustive_limit,
                random_trials: trials,
                seed,
                ..Default::default()
            };
            run_missions(&missions, &lookup, cargo, config, output, quiet);
        }

        Commands::Available { commodity, lookup } => {
            check_availability(&commodity, &lookup);
        }

        Commands::BuildDatabase { dir, missions, jump_range, max_jumps, pad_size, max_distance, minimum_supply, output } => {
            let params = ShipParameters {
                jump_range,
                max_jumps,
                pad_size: match pad_size {
                    PadSize::Medium => trade_mission_solver::database::PadSize::Medium,
                    PadSize::Large => trade_mission_solver::database::PadSize::Large,
                },
                max_distance,
                minimum_supply,
                ..Default::default()
            };
            build_database(&dir, &missions, &params, &output);
        }
    }
}

fn load_lookup(path: &Path) -> StationLookup {
    match StationLookup::from_file(path) {
        Ok(lookup) => lookup,
        Err(e) => {
            eprintln!("Error loading lookup: {}", e);
            eprintln!("Run `build-database` first.");
            std::process::exit(1);
        }
    }
}

fn load_missions(path: &Path) -> MissionSet {
    match MissionSet::from_file(path) {
        Ok(missions) => missions,
        Err(e) => {
            eprintln!("Error loading missions: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_missions(missions_path: &Path, lookup_path: &Path, cargo: u32, config: SearchConfig, output: Option<PathBuf>, quiet: bool) {
    println!("Loading missions from {:?}...", missions_path);
    let missions = load_missions(missions_path);
    let lookup = load_lookup(lookup_path);
    println!("{} missions, {} known stations", missions.missions.len(), lookup.len());

    let trader = Trader::new(&missions, &lookup, cargo);
    for (site, quantity) in trader.deliveries() {
        println!("Deliver {} to {}", quantity, site);
    }

    let start = Instant::now();
    let mut finder = RouteFinder::new(&trader, config);
    let mut observer = ProgressObserver::new(quiet);
    let outcome = finder.find_route(&mut observer);
    let elapsed = start.elapsed();

    let report = RouteReport::from_outcome(&outcome);
    println!("\n========== Route ==========");
    print!("{}", report);
    println!("Time: {:.4}s", elapsed.as_secs_f64());

    if let Some(out_path) = output {
        match report.save_to_file(&out_path) {
            Ok(()) => println!("\nReport saved to {:?}", out_path),
            Err(e) => {
                eprintln!("Error saving report: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn check_availability(commodity: &str, lookup_path: &Path) {
    let lookup = load_lookup(lookup_path);
    if lookup.find_commodity(commodity) {
        println!("{} is sold within reach", commodity);
    } else {
        println!("{} is not sold at any known station", commodity);
    }
}

fn build_database(dir: &Path, missions_path: &Path, params: &ShipParameters, output: &Path) {
    let missions = load_missions(missions_path);
    let Some(origin) = missions.origin else {
        eprintln!("Error: {}", trade_mission_solver::Error::MissingOrigin);
        std::process::exit(1);
    };

    let result = ReferenceData::load(&ReferencePaths::in_dir(dir))
        .and_then(|data| data.build_lookup(&origin.system, params))
        .and_then(|lookup| lookup.save(output).map(|()| lookup.len()));

    match result {
        Ok(count) => println!("{} stations written to {:?}", count, output),
        Err(e) => {
            eprintln!("Error building lookup: {}", e);
            std::process::exit(1);
        }
    }
}
