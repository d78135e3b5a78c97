use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::error;

use timetable_solver::domain::ClassRoomPools;
use timetable_solver::export;
use timetable_solver::loader;
use timetable_solver::server;
use timetable_solver::solver::{solve, SolveOptions};
use timetable_solver::{Problem, SolveError};

/// Assigns every lesson of a weekly timetable to a (timeslot, room)
/// pair, then spends a time budget improving the schedule's quality
/// score.
#[derive(Debug, Parser)]
#[command(name = "timetable-solver", version)]
struct Cli {
    /// Dataset file to solve (required unless --serve)
    dataset: Option<PathBuf>,

    /// Wall-clock budget in seconds for the improvement phase
    #[arg(long, default_value_t = 60.0)]
    phase2_seconds: f64,

    /// Repair-step cap per local-search run
    #[arg(long, default_value_t = 1000)]
    min_conflicts_iters: u32,

    /// Seed for reproducible runs; clock-seeded when absent
    #[arg(long)]
    random_seed: Option<u64>,

    /// Restrict a class's unpinned lessons to a room pool, as
    /// CLASS=ROOM+ROOM; repeatable
    #[arg(long = "class-rooms", value_name = "CLASS=ROOMS")]
    class_rooms: Vec<String>,

    /// Most lessons a class may have on one day
    #[arg(long, default_value_t = 3)]
    class_daily_cap: u32,

    /// Most online lessons allowed on one day overall
    #[arg(long, default_value_t = 3)]
    online_daily_cap: u32,

    /// Write the timetable as CSV to this path
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print the outcome as JSON instead of the text rendering
    #[arg(long)]
    json: bool,

    /// Run the HTTP solve endpoint instead of solving a file
    #[arg(long)]
    serve: bool,

    /// Listen address for --serve
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.serve {
        server::run_server(&cli.addr).await;
        return;
    }

    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let Some(path) = cli.dataset.as_ref() else {
        error!("a dataset file is required unless --serve is given");
        return 1;
    };

    match try_run(&cli, path) {
        Ok(()) => 0,
        Err(e) => {
            error!("{e}");
            e.exit_code()
        }
    }
}

fn try_run(cli: &Cli, path: &PathBuf) -> Result<(), SolveError> {
    let dataset = loader::load_file(path)?;
    let problem = Problem::from_dataset(&dataset)?;

    let options = SolveOptions {
        phase2_budget: Duration::from_secs_f64(cli.phase2_seconds.max(0.0)),
        min_conflicts_iters: cli.min_conflicts_iters,
        random_seed: cli.random_seed,
        class_preferred_rooms: parse_class_rooms(&cli.class_rooms)?,
        class_daily_cap: cli.class_daily_cap,
        online_daily_cap: cli.online_daily_cap,
    };
    let outcome = solve(&problem, &options)?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).expect("outcome serializes")
        );
    } else {
        print!("{}", export::render_text(&problem, &outcome.assignments));
        println!(
            "\nScore: {} (seed {}, {} restarts, {} ms)",
            outcome.score, outcome.base_seed, outcome.restarts, outcome.solve_millis
        );
        for unmet in &outcome.unmet_soft_constraints {
            println!("  {unmet}");
        }
    }

    if let Some(csv_path) = &cli.csv {
        fs::write(csv_path, export::to_csv(&problem, &outcome.assignments))?;
        println!("Timetable exported to {}", csv_path.display());
    }

    Ok(())
}

fn parse_class_rooms(entries: &[String]) -> Result<Option<ClassRoomPools>, SolveError> {
    if entries.is_empty() {
        return Ok(None);
    }
    let mut pools = ClassRoomPools::new();
    for entry in entries {
        let (class, rooms) = entry.split_once('=').ok_or_else(|| {
            SolveError::InputInvalid(format!("room pool {entry} is not CLASS=ROOM+ROOM"))
        })?;
        let rooms: Vec<String> = rooms
            .split('+')
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        if rooms.is_empty() {
            return Err(SolveError::InputInvalid(format!(
                "room pool for class {class} lists no rooms"
            )));
        }
        pools.insert(class.to_string(), rooms);
    }
    Ok(Some(pools))
}
