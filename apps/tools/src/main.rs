use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::domain::{OrganizationId, WorkoutId};
use storage::{Storage, WorkoutStore};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/workouts.db")]
    database_url: String,
    #[arg(long, default_value = "default")]
    organization: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    ListWorkouts,
    ShowWorkout { workout_id: String },
    /// Deletes workouts synthesized by controllers for ad-hoc timers.
    PurgeFreestanding,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;
    let organization_id = OrganizationId::new(cli.organization);

    match cli.command {
        Command::ListWorkouts => {
            let workouts = storage.list_workouts(&organization_id).await?;
            if workouts.is_empty() {
                println!("no workouts for organization {organization_id}");
            }
            for workout in workouts {
                let kind = if workout.id.is_freestanding() {
                    "freestanding"
                } else {
                    "catalog"
                };
                println!(
                    "{}\t{}\t{} block(s)\t{kind}",
                    workout.id, workout.title, workout.block_count
                );
            }
        }
        Command::ShowWorkout { workout_id } => {
            let workout_id = WorkoutId::new(workout_id);
            let Some(workout) = storage.load(&workout_id).await? else {
                bail!("workout {workout_id} not found");
            };
            println!("{}", serde_json::to_string_pretty(&workout)?);
        }
        Command::PurgeFreestanding => {
            let removed = storage.delete_freestanding(&organization_id).await?;
            println!("removed {removed} freestanding workout(s) from {organization_id}");
        }
    }

    Ok(())
}
