use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::fmt;

use repcount::config::Config;
use repcount::counter::RepCounter;
use repcount::db;
use repcount::logging;
use repcount::store::SqliteSessionStore;
use repcount::tracker::Tracker;
use repcount::workout::{DEFAULT_USER_ID, WorkoutSession};

#[derive(Parser, Debug)]
#[command(version, about = "Push-up counter CLI", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// off, error, warn, info, debug or trace
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List completed workouts, most recent first
    ListWorkouts {
        #[arg(short, long)]
        verbose: bool,
        /// Only show this user's workouts
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Start a workout, closing any the user left open
    StartWorkout {
        #[arg(short, long, default_value = DEFAULT_USER_ID)]
        user: String,
    },
    /// End an open workout by id
    EndWorkout { workout_id: String },
    /// Run a sequence of elbow angles through the rep counter
    Replay {
        #[arg(required = true, num_args = 1..)]
        angles: Vec<f64>,
    },
    /// Delete every stored workout
    ResetDatabase {
        #[arg(long)]
        yes: bool,
    },
}

struct DisplayableWorkout<'a>(&'a WorkoutSession);

impl fmt::Display for DisplayableWorkout<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let workout = self.0;
        let end = workout
            .end_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "open".into());
        write!(
            f,
            "{}, {}, {} → {}, {} push-ups",
            workout.id,
            workout.user_id,
            workout.start_time.format("%Y-%m-%d %H:%M:%S"),
            end,
            workout.total_pushups
        )
    }
}

fn replay(angles: &[f64]) {
    let mut counter = RepCounter::new();
    for angle in angles {
        let rep = counter.observe(*angle, chrono::Utc::now());
        println!(
            "{:>7.1}°  stage={:<4}  count={}{}",
            angle,
            counter.stage().map(|s| s.as_str()).unwrap_or("-"),
            counter.count(),
            if rep.is_some() { "  +rep" } else { "" }
        );
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;
    logging::set_log_level(args.log_level.as_deref().unwrap_or("warn"));

    match args.command {
        Commands::Replay { angles } => {
            replay(&angles);
            Ok(())
        }
        Commands::ListWorkouts { verbose, user } => {
            let tracker = Tracker::from_config(&config)?;
            let workouts = tracker.list_workouts(user.as_deref()).await?;
            if workouts.is_empty() {
                println!("No completed workouts");
            }
            for workout in &workouts {
                println!("{}", DisplayableWorkout(workout));
                if verbose {
                    for rep in &workout.pushup_data {
                        println!("\t#{} at {}", rep.count, rep.timestamp.format("%H:%M:%S%.3f"));
                    }
                }
            }
            Ok(())
        }
        Commands::StartWorkout { user } => {
            let tracker = Tracker::from_config(&config)?;
            let session = tracker.start_workout(&user).await?;
            println!("Started workout {} at {}", session.id, session.start_time);
            Ok(())
        }
        Commands::EndWorkout { workout_id } => {
            let tracker = Tracker::from_config(&config)?;
            let end_time = tracker.end_workout(&workout_id).await?;
            println!("Ended workout {} at {}", workout_id, end_time);
            Ok(())
        }
        Commands::ResetDatabase { yes } => {
            if !yes {
                bail!("Refusing to delete all workouts without --yes");
            }
            if config.uses_memory_store() {
                bail!("DATABASE_URL points at the in-memory store; nothing to reset");
            }
            let store = SqliteSessionStore::open(&config.database_url)?;
            let mut conn = store.pool().get()?;
            db::drop_all_rows(&mut conn)?;
            println!("Deleted all workouts in {}", config.database_url);
            Ok(())
        }
    }
}
