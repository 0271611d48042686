mod config;
mod plan_cmds;
mod planner;
mod slot_cmds;
#[cfg(test)]
mod test_util;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use mealgrid_core::backend::PgMealPlanBackend;
use mealgrid_core::intent::IntentParser;
use mealgrid_core::week::WeekKey;
use mealgrid_core::{Day, MealSlot};
use mealgrid_db::pool;

use config::{CliOverrides, MealgridConfig};
use plan_cmds::Target;
use planner::Planner;

#[derive(Parser)]
#[command(name = "mealgrid", about = "Weekly meal planner with recipe generation")]
struct Cli {
    /// Database URL (overrides MEALGRID_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Profile to plan for (overrides MEALGRID_PROFILE); without one the
    /// session is a guest and nothing is saved
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Recipe generator command (overrides MEALGRID_GENERATOR)
    #[arg(long, global = true)]
    generator: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            database_url: self.database_url.clone(),
            profile: self.profile.clone(),
            generator: self.generator.clone(),
        }
    }
}

/// Week and day selection shared by the planning commands.
#[derive(clap::Args, Debug, Clone, Copy)]
struct TargetArgs {
    /// Any date in the week to work on (YYYY-MM-DD); defaults to this week
    #[arg(long)]
    week: Option<WeekKey>,
    /// Day of the week; defaults to today
    #[arg(long)]
    day: Option<Day>,
}

impl From<TargetArgs> for Target {
    fn from(args: TargetArgs) -> Self {
        Self {
            week: args.week,
            day: args.day,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a mealgrid config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/mealgrid")]
        db_url: String,
        /// Profile name; omit for guest use
        #[arg(long = "name")]
        name: Option<String>,
        /// Recipe generator command
        #[arg(long = "command")]
        generator_command: Option<String>,
        /// Argument passed to the generator command (repeatable)
        #[arg(long = "arg")]
        generator_args: Vec<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the mealgrid database and run migrations
    DbInit,
    /// Show which meal slots a request targets
    Parse {
        /// Free-text request, e.g. "pasta for lunch and dinner"
        text: String,
    },
    /// Show the meals planned for a week
    Show {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Generate meals for a day from a free-text request
    Generate {
        /// Free-text request; empty asks for a full day
        #[arg(default_value = "")]
        text: String,
        /// Slot to fill regardless of the text (repeatable)
        #[arg(long)]
        slot: Vec<MealSlot>,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Replace the meal in one slot
    Regenerate {
        slot: MealSlot,
        /// Preferences for the new meal
        #[arg(default_value = "")]
        text: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Remove the meal in one slot
    Remove {
        slot: MealSlot,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Print saved item ids of a day's meals for grocery export
    Grocery {
        /// Slot to include (repeatable); defaults to the whole day
        #[arg(long)]
        slot: Vec<MealSlot>,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List the stored weekly plans of the profile
    Plans,
}

/// Execute the `mealgrid init` command: write config file.
fn cmd_init(
    db_url: &str,
    name: Option<String>,
    generator_command: Option<String>,
    generator_args: Vec<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();
    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        profile: config::ProfileSection { name },
        generator: generator_command.map(|command| config::GeneratorSection {
            command,
            args: generator_args,
        }),
        intent: Default::default(),
    };
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    match &cfg.profile.name {
        Some(name) => println!("  profile.name = {name}"),
        None => println!("  (no profile: sessions run as guest)"),
    }
    if let Some(generator) = &cfg.generator {
        println!("  generator.command = {}", generator.command);
    }
    println!();
    println!("Next: run `mealgrid db-init` to create and migrate the database.");
    Ok(())
}

/// Execute the `mealgrid db-init` command: create database and run migrations.
async fn cmd_db_init(resolved: &MealgridConfig) -> anyhow::Result<()> {
    println!("Initializing mealgrid database...");

    let created = pool::ensure_database_exists(&resolved.db_config).await?;
    if created {
        println!("Created database at {}", resolved.db_config.redacted_url());
    }
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let result = migrate_and_summarize(&db_pool).await;
    db_pool.close().await;
    let summary = result?;

    println!(
        "Database ready: {} profiles, {} plans, {} planned meals.",
        summary.profiles, summary.plans, summary.items
    );
    println!("mealgrid db-init complete.");
    Ok(())
}

async fn migrate_and_summarize(db_pool: &sqlx::PgPool) -> anyhow::Result<pool::StoreSummary> {
    pool::run_migrations(db_pool).await?;
    pool::store_summary(db_pool).await
}

fn cmd_parse(resolved: &MealgridConfig, text: &str) {
    let slots = IntentParser::new(resolved.planner.intent).parse_slots(text);
    let names: Vec<String> = slots.iter().map(ToString::to_string).collect();
    println!("{}", names.join(", "));
}

async fn cmd_plans(resolved: &MealgridConfig) -> anyhow::Result<()> {
    let profile = resolved
        .profile
        .as_deref()
        .context("no profile configured; pass --profile or set MEALGRID_PROFILE")?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let backend = PgMealPlanBackend::new(db_pool.clone());
    let result = plan_cmds::run_plans(&backend, profile).await;
    db_pool.close().await;
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = cli.overrides();

    match cli.command {
        Commands::Init {
            db_url,
            name,
            generator_command,
            generator_args,
            force,
        } => {
            cmd_init(&db_url, name, generator_command, generator_args, force)?;
        }
        Commands::DbInit => {
            let resolved = MealgridConfig::resolve(&overrides)?;
            cmd_db_init(&resolved).await?;
        }
        Commands::Parse { text } => {
            let resolved = MealgridConfig::resolve(&overrides)?;
            cmd_parse(&resolved, &text);
        }
        Commands::Plans => {
            let resolved = MealgridConfig::resolve(&overrides)?;
            cmd_plans(&resolved).await?;
        }
        Commands::Show { target } => {
            let resolved = MealgridConfig::resolve(&overrides)?;
            let mut planner = Planner::open(&resolved).await?;
            let result = plan_cmds::run_show(&mut planner, target.into()).await;
            planner.close().await;
            result?;
        }
        Commands::Generate { text, slot, target } => {
            let resolved = MealgridConfig::resolve(&overrides)?;
            let mut planner = Planner::open(&resolved).await?;
            let result = slot_cmds::run_generate(&mut planner, target.into(), &slot, &text).await;
            planner.close().await;
            result?;
        }
        Commands::Regenerate { slot, text, target } => {
            let resolved = MealgridConfig::resolve(&overrides)?;
            let mut planner = Planner::open(&resolved).await?;
            let result = slot_cmds::run_regenerate(&mut planner, target.into(), slot, &text).await;
            planner.close().await;
            result?;
        }
        Commands::Remove { slot, target } => {
            let resolved = MealgridConfig::resolve(&overrides)?;
            let mut planner = Planner::open(&resolved).await?;
            let result = slot_cmds::run_remove(&mut planner, target.into(), slot).await;
            planner.close().await;
            result?;
        }
        Commands::Grocery { slot, target } => {
            let resolved = MealgridConfig::resolve(&overrides)?;
            let mut planner = Planner::open(&resolved).await?;
            let result = slot_cmds::run_grocery(&mut planner, target.into(), &slot).await;
            planner.close().await;
            result?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_accepts_slots_and_target() {
        let cli = Cli::try_parse_from([
            "mealgrid",
            "--profile",
            "ana",
            "generate",
            "spicy tacos",
            "--slot",
            "lunch",
            "--slot",
            "Dinner",
            "--week",
            "2026-10-22",
            "--day",
            "fri",
        ])
        .unwrap();
        assert_eq!(cli.profile.as_deref(), Some("ana"));
        let Commands::Generate { text, slot, target } = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(text, "spicy tacos");
        assert_eq!(slot, vec![MealSlot::Lunch, MealSlot::Dinner]);
        assert_eq!(target.week.unwrap().to_string(), "2026-10-19");
        assert_eq!(target.day, Some(Day::Friday));
    }

    #[test]
    fn bad_slot_is_rejected() {
        assert!(Cli::try_parse_from(["mealgrid", "remove", "elevenses"]).is_err());
    }
}
