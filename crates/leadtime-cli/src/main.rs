//! leadtime CLI - Project Planning Engine
//!
//! Command-line interface for validating, scheduling and reporting on a
//! leadtime project document.

mod output;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use leadtime_core::ProjectDocument;
use leadtime_solver::{
    demand_curves, schedule, timeline_evolution, CancelToken, ScheduleOutcome, SchedulerOptions,
    DEFAULT_PARTICLES,
};
use leadtime_tickets::{burndown, JsonFileProvider, StoryPointPattern};

use crate::output::{
    print_demand_text, print_evolution_text, print_schedule_text, print_stochastic_text,
    BurndownReport, DemandReport, EvolutionReport, ScheduleReport, StochasticReport,
};

#[derive(Parser)]
#[command(name = "leadtime")]
#[command(author, version, about = "Project planning engine", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a project document
    Check {
        /// Input document path
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Compute the schedule and critical path
    Schedule {
        /// Input document path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Observation date (YYYY-MM-DD); defaults to today
        #[arg(long, value_name = "DATE")]
        as_of: Option<String>,

        /// Terminal process; may be repeated
        #[arg(short, long, value_name = "PID")]
        terminal: Vec<String>,

        /// Run the Monte Carlo mode instead of the deterministic one
        #[arg(long)]
        stochastic: bool,

        /// Particle count for the stochastic mode
        #[arg(long, default_value_t = DEFAULT_PARTICLES)]
        particles: u32,

        /// PRNG seed for the stochastic mode
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Resource demand and cost curves for the scheduled plan
    Demand {
        /// Input document path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Observation date (YYYY-MM-DD); defaults to today
        #[arg(long, value_name = "DATE")]
        as_of: Option<String>,

        /// Weight demand by each process's start probability
        #[arg(long)]
        weighted: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Evolution of the predicted completion date over the estimate history
    Evolution {
        /// Input document path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Terminal process; may be repeated
        #[arg(short, long, value_name = "PID")]
        terminal: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Story-point burn-down over a ticket event dump
    Burndown {
        /// Ticket dump path (JSON)
        #[arg(value_name = "EVENTS_FILE")]
        file: PathBuf,

        /// Report configuration (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Tracking label to report on; may be repeated, defaults to the
        /// configured tracking labels
        #[arg(short, long, value_name = "LABEL")]
        label: Vec<String>,

        /// First report day (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        from: Option<String>,

        /// One past the last report day (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        to: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

/// Report settings read from the TOML config file.
#[derive(Debug, serde::Deserialize)]
struct ReportConfig {
    #[serde(default = "default_tracking_labels")]
    tracking_labels: Vec<String>,
    #[serde(default = "default_storypoint_pattern")]
    storypoint_pattern: String,
}

fn default_tracking_labels() -> Vec<String> {
    ["backlog", "in_progress", "blocked", "testing", "awaiting_deploy"]
        .map(String::from)
        .to_vec()
}

fn default_storypoint_pattern() -> String {
    "<value>SPs".into()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            tracking_labels: default_tracking_labels(),
            storypoint_pattern: default_storypoint_pattern(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Check { file } => cmd_check(&file),
        Commands::Schedule {
            file,
            as_of,
            terminal,
            stochastic,
            particles,
            seed,
            format,
        } => cmd_schedule(&file, as_of, terminal, stochastic, particles, seed, &format),
        Commands::Demand {
            file,
            as_of,
            weighted,
            format,
        } => cmd_demand(&file, as_of, weighted, &format),
        Commands::Evolution {
            file,
            terminal,
            format,
        } => cmd_evolution(&file, terminal, &format),
        Commands::Burndown {
            file,
            config,
            label,
            from,
            to,
            format,
        } => cmd_burndown(&file, config, label, from, to, &format),
    }
}

fn load_document(path: &Path) -> Result<ProjectDocument> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    ProjectDocument::from_json(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

fn as_of_or_today(as_of: Option<String>) -> Result<NaiveDate> {
    match as_of {
        Some(value) => parse_date(&value),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn cmd_check(file: &Path) -> Result<()> {
    let doc = load_document(file)?;

    let mut issues = 0;
    for (pid, process) in &doc.processes {
        for (date, record) in &process.history {
            if let Err(issue) = record.validate() {
                println!("warning: {pid} @ {date}: {issue}");
                issues += 1;
            }
            for dep in &record.dependencies {
                if !doc.processes.contains_key(dep) {
                    println!("warning: {pid} @ {date}: dependency '{dep}' does not exist");
                    issues += 1;
                }
            }
        }
    }

    println!(
        "{}: {} processes, {} resources, {} roles, {} warnings",
        file.display(),
        doc.processes.len(),
        doc.resources.len(),
        doc.roles.len(),
        issues
    );
    Ok(())
}

fn cmd_schedule(
    file: &Path,
    as_of: Option<String>,
    terminals: Vec<String>,
    stochastic: bool,
    particles: u32,
    seed: u64,
    format: &str,
) -> Result<()> {
    let doc = load_document(file)?;
    let as_of = as_of_or_today(as_of)?;

    let options = if stochastic {
        SchedulerOptions::stochastic(particles, seed).terminals(terminals)
    } else {
        SchedulerOptions::deterministic().terminals(terminals)
    };

    let outcome = schedule(&doc, as_of, &options, &CancelToken::new())?;
    match outcome {
        ScheduleOutcome::Deterministic(plan) => {
            let report = ScheduleReport::from_schedule(as_of, &plan);
            match format {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                "text" => print_schedule_text(&report),
                other => bail!("unknown format '{other}'"),
            }
        }
        ScheduleOutcome::Stochastic(result) => {
            let report = StochasticReport::from_result(as_of, &result);
            match format {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                "text" => print_stochastic_text(&report),
                other => bail!("unknown format '{other}'"),
            }
        }
        ScheduleOutcome::Unavailable { missing, as_of } => {
            bail!(
                "schedule unavailable as of {as_of}: terminals not yet defined: {}",
                missing.join(", ")
            );
        }
    }
    Ok(())
}

fn cmd_demand(file: &Path, as_of: Option<String>, weighted: bool, format: &str) -> Result<()> {
    let doc = load_document(file)?;
    let as_of = as_of_or_today(as_of)?;

    let graph = leadtime_solver::PlanGraph::build(&doc, as_of)?;
    let outcome = leadtime_solver::schedule_graph(
        &graph,
        as_of,
        &SchedulerOptions::deterministic(),
        &CancelToken::new(),
    )?;
    let plan = outcome
        .as_deterministic()
        .expect("deterministic mode yields a deterministic outcome");

    let curves = demand_curves(plan, &graph, &doc, weighted);
    let report = DemandReport::from_curves(as_of, weighted, &curves);
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_demand_text(&report),
        other => bail!("unknown format '{other}'"),
    }
    Ok(())
}

fn cmd_evolution(file: &Path, terminals: Vec<String>, format: &str) -> Result<()> {
    let doc = load_document(file)?;
    let today = chrono::Local::now().date_naive();

    let points = timeline_evolution(&doc, &terminals, today, &CancelToken::new())?;
    let report = EvolutionReport::from_points(&points);
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_evolution_text(&report),
        other => bail!("unknown format '{other}'"),
    }
    Ok(())
}

fn cmd_burndown(
    file: &Path,
    config: Option<PathBuf>,
    labels: Vec<String>,
    from: Option<String>,
    to: Option<String>,
    format: &str,
) -> Result<()> {
    let config = match config {
        Some(path) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<ReportConfig>(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => ReportConfig::default(),
    };
    let pattern = StoryPointPattern::from_placeholder(&config.storypoint_pattern)
        .context("invalid story-point pattern")?;
    let labels = if labels.is_empty() {
        config.tracking_labels.clone()
    } else {
        labels
    };

    let provider = JsonFileProvider::open(file)
        .with_context(|| format!("failed to load ticket dump {}", file.display()))?;
    let histories = provider.histories();

    let from = match from {
        Some(value) => parse_date(&value)?,
        None => histories
            .iter()
            .map(|h| h.ticket.created_at.date())
            .min()
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
    };
    let to = match to {
        Some(value) => parse_date(&value)?,
        None => chrono::Local::now().date_naive() + chrono::Days::new(1),
    };
    if from >= to {
        bail!("empty report range: {from} >= {to}");
    }

    let mut report = BurndownReport::new(from, to);
    for label in &labels {
        let curve = burndown(histories, label, from, to, &pattern);
        report.add_label(label, &curve);
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => report.print_text(),
        other => bail!("unknown format '{other}'"),
    }
    Ok(())
}
