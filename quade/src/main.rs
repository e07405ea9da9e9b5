//! `quade` command line: manage scenarios and run them from a terminal.
//!
//! State lives in `.quade/` under `--root` (config, database, schema).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};

use quade::app::Quade;
use quade::core::listing::render_fixture_listing;
use quade::core::types::ScenarioConfig;
use quade::exit_codes;
use quade::io::init::{InitOptions, QuadePaths, init_quade};
use quade::io::scenario_config::{load_scenario_config, parse_scenario_config};
use quade::logging;
use quade::models::Scenario;
use quade::records;
use quade::registry::FixtureCatalog;
use quade::scenarios::{self, NewScenario};
use quade::store::{Id, Stored};

#[derive(Parser)]
#[command(name = "quade", version, about = "QA scenario fixture runner")]
struct Cli {
    /// Project root containing `.quade/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.quade/` with a default config.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the registered fixture functions.
    ListFixtures,
    /// Manage scenarios.
    #[command(subcommand)]
    Scenario(ScenarioCommand),
    /// Create a record for an active scenario and execute it.
    Execute {
        slug: String,
        /// Recorded as the record's creator.
        #[arg(long)]
        user: String,
    },
    /// Inspect and manage records.
    #[command(subcommand)]
    Record(RecordCommand),
}

#[derive(Subcommand)]
enum ScenarioCommand {
    /// Create a scenario.
    Add {
        slug: String,
        #[arg(long)]
        description: String,
        #[command(flatten)]
        config: ConfigSource,
        /// Create the scenario inactive.
        #[arg(long)]
        inactive: bool,
    },
    /// List scenarios.
    List {
        /// Only active scenarios, ordered by description.
        #[arg(long)]
        active: bool,
    },
    /// Show one scenario with its config.
    Show { slug: String },
    /// Replace a scenario's config.
    SetConfig {
        slug: String,
        #[command(flatten)]
        config: ConfigSource,
    },
    Activate { slug: String },
    Deactivate { slug: String },
    /// Soft delete (deactivate).
    Delete { slug: String },
    /// Remove the scenario permanently. Refused while records reference it.
    HardDelete { slug: String },
}

#[derive(Subcommand)]
enum RecordCommand {
    /// List recent records, newest first.
    List {
        /// Defaults to `recent_records_limit` from the config.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show a record with its instructions and recorded objects.
    Show { id: Id },
    /// Mark a record done.
    Done { id: Id },
    /// Delete a record and its recorded objects.
    Delete { id: Id },
}

/// Scenario config as inline JSON or a JSON file.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct ConfigSource {
    /// Inline JSON, e.g. `[["customer", {}]]`.
    #[arg(long)]
    config: Option<String>,
    /// Path to a JSON file.
    #[arg(long)]
    config_file: Option<PathBuf>,
}

impl ConfigSource {
    fn load(&self) -> Result<ScenarioConfig> {
        match (&self.config, &self.config_file) {
            (Some(raw), _) => parse_scenario_config(raw),
            (None, Some(path)) => load_scenario_config(path),
            (None, None) => bail!("one of --config or --config-file is required"),
        }
    }
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = cli.root.as_path();
    match cli.command {
        Command::Init { force } => cmd_init(root, force),
        Command::ListFixtures => cmd_list_fixtures(root),
        Command::Scenario(command) => cmd_scenario(root, command),
        Command::Execute { slug, user } => cmd_execute(root, &slug, &user),
        Command::Record(command) => cmd_record(root, command),
    }
}

fn open(root: &Path) -> Result<Quade> {
    let paths = QuadePaths::new(root);
    if !paths.quade_dir.is_dir() {
        bail!(
            "{} is not initialized (run `quade init`)",
            paths.root.display()
        );
    }
    Quade::open(&paths, &FixtureCatalog::builtin())
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_quade(root, &InitOptions { force })?;
    println!("initialized {}", paths.quade_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_list_fixtures(root: &Path) -> Result<i32> {
    let quade = open(root)?;
    print!(
        "{}",
        render_fixture_listing(&quade.registry().registered_names())
    );
    Ok(exit_codes::OK)
}

fn cmd_scenario(root: &Path, command: ScenarioCommand) -> Result<i32> {
    let quade = open(root)?;
    let mut session = quade.session()?;
    match command {
        ScenarioCommand::Add {
            slug,
            description,
            config,
            inactive,
        } => {
            let mut new = NewScenario::new(slug, description, config.load()?);
            if inactive {
                new = new.inactive();
            }
            let scenario = scenarios::create(&mut session, quade.registry(), new)?;
            println!("created {}", scenario_line(&scenario));
        }
        ScenarioCommand::List { active } => {
            let list = if active {
                scenarios::active(&session)?
            } else {
                scenarios::all(&session)?
            };
            for scenario in &list {
                println!("{}", scenario_line(scenario));
            }
        }
        ScenarioCommand::Show { slug } => {
            let scenario = scenarios::find(&session, &slug)?;
            println!("{}", scenario_line(&scenario));
            let pretty = serde_json::to_string_pretty(&scenario.config)
                .context("serialize scenario config")?;
            println!("{pretty}");
        }
        ScenarioCommand::SetConfig { slug, config } => {
            let scenario =
                scenarios::update_config(&mut session, quade.registry(), &slug, config.load()?)?;
            println!("updated {}", scenario_line(&scenario));
        }
        ScenarioCommand::Activate { slug } => {
            let scenario = scenarios::activate(&mut session, &slug)?;
            println!("{}", scenario_line(&scenario));
        }
        ScenarioCommand::Deactivate { slug } => {
            let scenario = scenarios::deactivate(&mut session, &slug)?;
            println!("{}", scenario_line(&scenario));
        }
        ScenarioCommand::Delete { slug } => {
            let scenario = scenarios::delete(&mut session, &slug)?;
            println!("{}", scenario_line(&scenario));
        }
        ScenarioCommand::HardDelete { slug } => {
            scenarios::hard_delete(&mut session, &slug)?;
            println!("deleted {slug}");
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_execute(root: &Path, slug: &str, user: &str) -> Result<i32> {
    let quade = open(root)?;
    if !quade.settings().allowed() {
        bail!("quade is not enabled in this environment (see [allowed_envs])");
    }
    let record = quade.submit(slug, user)?;
    match quade.execute(record.id) {
        Ok(record) => {
            println!("{record}");
            if let Some(instructions) = &record.instructions {
                println!("{instructions}");
            }
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("Record #{} failed: {:#}", record.id, err);
            Ok(exit_codes::EXECUTION_FAILED)
        }
    }
}

fn cmd_record(root: &Path, command: RecordCommand) -> Result<i32> {
    let quade = open(root)?;
    let mut session = quade.session()?;
    match command {
        RecordCommand::List { limit } => {
            let limit = limit.unwrap_or(quade.settings().recent_records_limit());
            for record in records::recent(&session, limit)? {
                let scenario = session
                    .get::<Scenario>(record.scenario)?
                    .map_or_else(|| format!("#{}", record.scenario), |s| s.slug.clone());
                println!(
                    "{record}\t{scenario}\t{}\t{}",
                    record.created_by,
                    record.created_on.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        RecordCommand::Show { id } => {
            let record = records::get(&session, id)?
                .with_context(|| format!("record #{id} does not exist"))?;
            println!("{record}");
            println!("created by {} on {}", record.created_by, record.created_on);
            if let Some(instructions) = &record.instructions {
                println!("{instructions}");
            }
            for recorded in records::recorded_objects(&session, id)? {
                println!("- {}", records::describe_recorded_object(&session, &recorded));
            }
        }
        RecordCommand::Done { id } => {
            let record = records::mark_done(&mut session, id)?;
            println!("{record}");
        }
        RecordCommand::Delete { id } => {
            if !records::delete(&mut session, id)? {
                bail!("record #{id} does not exist");
            }
            println!("deleted record #{id}");
        }
    }
    Ok(exit_codes::OK)
}

fn scenario_line(scenario: &Stored<Scenario>) -> String {
    format!("{scenario} [{}] ({})", scenario.slug, scenario.status)
}
