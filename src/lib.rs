//! Wildlabel: resumable binary labelling of wildlife presence images.
//!
//! An operator reviews candidate images one at a time and answers with a key
//! press. Every decision is appended to a CSV history that doubles as the
//! resume point: images already in the history are never shown again, and
//! the running tally is rebuilt from it at startup.
//!
//! # Modules
//!
//! - [`dataset`]: Observation CSV aggregation and the species filter
//! - [`label`]: Labels, key bindings and token decoding
//! - [`history`]: The append-only labelling history and batched writes
//! - [`dedup`]: Removal of already-labelled candidates
//! - [`tally`]: Label counts reconciled from the history
//! - [`session`]: The interactive labelling loop
//! - [`placement`]: Filing labelled images, with a held-out test split
//! - [`source`], [`fetch`], [`present`]: Image acquisition and display
//! - [`config`]: Configuration and data directory layout
//! - [`logging`]: Tracing subscriber setup for the CLI
//! - [`error`]: Error types for wildlabel operations

pub mod config;
pub mod dataset;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod history;
pub mod label;
pub mod logging;
pub mod placement;
pub mod present;
pub mod session;
pub mod source;
pub mod tally;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use error::WildlabelError;

use config::{Config, DataLayout};
use dataset::{AggregateOptions, Candidate};
use history::{labelled_ids, BatchWriter, HistoryStore};
use placement::PlacementEngine;
use present::TerminalPresenter;
use session::{InterruptHandle, Session, SessionOutcome, SessionReport};
use source::LocalDirectory;

/// The wildlabel CLI application.
#[derive(Parser)]
#[command(name = "wildlabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Label unlabelled images interactively.
    Label(LabelArgs),
    /// Show the label counts recorded in the history.
    Status(StatusArgs),
    /// Aggregate observation datasets into one candidate table.
    Aggregate(AggregateArgs),
}

/// Arguments shared by every subcommand.
#[derive(clap::Args)]
struct DataArgs {
    /// Data directory holding images/, observations/ and labelled/.
    #[arg(long, env = "WILDLABEL_DATA_ROOT", default_value = "data")]
    data_root: PathBuf,

    /// YAML configuration file.
    #[arg(long, env = "WILDLABEL_CONFIG")]
    config: Option<PathBuf>,
}

/// Arguments for the label subcommand.
#[derive(clap::Args)]
struct LabelArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Observation datasets to fetch images from. Without any, images are
    /// read from the local images directory.
    #[arg(long = "dataset")]
    datasets: Vec<PathBuf>,

    /// Fraction of labelled images held out for testing.
    #[arg(long)]
    test_split: Option<f64>,

    /// Labels buffered before each history write.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Seed for the train/test split.
    #[arg(long)]
    seed: Option<u64>,

    /// Output format for the session report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the status subcommand.
#[derive(clap::Args)]
struct StatusArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the aggregate subcommand.
#[derive(clap::Args)]
struct AggregateArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Observation datasets to aggregate.
    #[arg(long = "dataset", required = true)]
    datasets: Vec<PathBuf>,

    /// Write the remaining candidates to this CSV file.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Result<Self, WildlabelError> {
        match value {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(WildlabelError::UnsupportedOutput(format!(
                "'{}' (supported: text, json)",
                other
            ))),
        }
    }
}

/// Run the wildlabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), WildlabelError> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Some(Commands::Label(args)) => run_label(args),
        Some(Commands::Status(args)) => run_status(args),
        Some(Commands::Aggregate(args)) => run_aggregate(args),
        None => {
            println!("wildlabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Resumable binary labelling of wildlife presence images.");
            println!();
            println!("Run 'wildlabel --help' for usage information.");
            Ok(())
        }
    }
}

fn load_config(data: &DataArgs) -> Result<Config, WildlabelError> {
    Config::load(data.config.as_deref())
}

/// Execute the label subcommand.
fn run_label(args: LabelArgs) -> Result<(), WildlabelError> {
    let output = OutputFormat::parse(&args.output)?;
    let layout = DataLayout::new(&args.data.data_root);

    let mut config = load_config(&args.data)?;
    if let Some(test_split) = args.test_split {
        config.test_split = test_split;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config.validate()?;

    let store = HistoryStore::new(layout.history_path());
    let history = store.load()?;
    let labelled = labelled_ids(&history);
    let tally = tally::reconcile(&history, &config.labels);
    tracing::info!(
        records = history.len(),
        present = tally.present,
        absent = tally.absent,
        "resuming from labelling history"
    );

    let placement = PlacementEngine::with_seed(
        layout.labelled_images_dir(),
        config.test_split,
        args.seed,
    );
    let writer = BatchWriter::new(store, config.batch_size);
    let session = Session::new(config.labels.clone(), writer, placement, tally);
    install_interrupt_handler(session.interrupt_handle());
    let mut presenter = TerminalPresenter::stdio(config.labels.clone());

    let report = if args.datasets.is_empty() {
        let names = source::list_staged_images(&layout.images_dir())?;
        let candidates: Vec<Candidate> = dedup::filter_file_names(names, &labelled)
            .into_iter()
            .map(Candidate::from_id)
            .collect();
        let mut source = LocalDirectory::new(layout.images_dir());
        session.run(candidates, &mut source, &mut presenter)?
    } else {
        let paths: Vec<PathBuf> = args
            .datasets
            .iter()
            .map(|name| dataset::resolve_dataset_path(&layout.observations_dir(), name))
            .collect();
        let opts = AggregateOptions {
            excluded_species: config.excluded_species.clone(),
            require_image_url: true,
        };
        let table = dataset::aggregate_datasets(&paths, &opts)?;
        let candidates: Vec<Candidate> = dedup::filter_candidates(table, &labelled)
            .into_iter()
            .collect();
        run_remote(session, candidates, &layout, &mut presenter)?
    };

    print_report(&report, output)?;

    match report.outcome {
        SessionOutcome::Exhausted => Ok(()),
        SessionOutcome::Aborted { token } => Err(WildlabelError::SessionAborted { token, report }),
        SessionOutcome::Interrupted => Err(WildlabelError::SessionInterrupted { report }),
    }
}

/// Exit status after Ctrl-C, as shells report SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Flushes pending labels on Ctrl-C, then exits.
///
/// The loop is usually blocked reading a key when the signal arrives, so the
/// handler cannot wait for it to notice the stop flag.
fn install_interrupt_handler(handle: InterruptHandle) {
    let installed = ctrlc::set_handler(move || {
        match handle.interrupt() {
            Ok(rows) => eprintln!("\nInterrupted: flushed {rows} pending label(s)"),
            Err(err) => eprintln!("\nInterrupted: failed to flush pending labels: {err}"),
        }
        std::process::exit(INTERRUPTED_EXIT_CODE);
    });
    if let Err(err) = installed {
        tracing::warn!(error = %err, "failed to install Ctrl-C handler");
    }
}

#[cfg(feature = "remote")]
fn run_remote(
    session: Session,
    candidates: Vec<Candidate>,
    layout: &DataLayout,
    presenter: &mut dyn present::Presenter,
) -> Result<SessionReport, WildlabelError> {
    let mut source = source::RemoteSource::new(fetch::HttpFetcher::new(), layout.cache_dir());
    session.run(candidates, &mut source, presenter)
}

#[cfg(not(feature = "remote"))]
fn run_remote(
    _session: Session,
    _candidates: Vec<Candidate>,
    _layout: &DataLayout,
    _presenter: &mut dyn present::Presenter,
) -> Result<SessionReport, WildlabelError> {
    Err(WildlabelError::InvalidConfig(
        "fetching dataset images requires the 'remote' feature".to_string(),
    ))
}

fn print_report(report: &SessionReport, output: OutputFormat) -> Result<(), WildlabelError> {
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report)
                .map_err(|e| WildlabelError::Io(e.into()))?;
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", report),
    }
    Ok(())
}

/// Execute the status subcommand.
fn run_status(args: StatusArgs) -> Result<(), WildlabelError> {
    let output = OutputFormat::parse(&args.output)?;
    let layout = DataLayout::new(&args.data.data_root);
    let config = load_config(&args.data)?;
    config.validate()?;

    let store = HistoryStore::new(layout.history_path());
    let history = store.load()?;
    let tally = tally::reconcile(&history, &config.labels);

    match output {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "history": store.path().display().to_string(),
                "records": history.len(),
                "tally": tally,
            });
            let json =
                serde_json::to_string_pretty(&value).map_err(|e| WildlabelError::Io(e.into()))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!("History: {}", store.path().display());
            println!("Records: {}", history.len());
            println!("{}", tally.describe(&config.labels));
        }
    }

    Ok(())
}

/// Execute the aggregate subcommand.
fn run_aggregate(args: AggregateArgs) -> Result<(), WildlabelError> {
    let layout = DataLayout::new(&args.data.data_root);
    let config = load_config(&args.data)?;

    let paths: Vec<PathBuf> = args
        .datasets
        .iter()
        .map(|name| dataset::resolve_dataset_path(&layout.observations_dir(), name))
        .collect();
    let opts = AggregateOptions {
        excluded_species: config.excluded_species.clone(),
        require_image_url: false,
    };
    let table = dataset::aggregate_datasets(&paths, &opts)?;
    let aggregated = table.len();

    let history = HistoryStore::new(layout.history_path()).load()?;
    let remaining = dedup::filter_candidates(table, &labelled_ids(&history));

    if let Some(out) = args.out.as_deref() {
        dataset::write_candidates(out, &remaining)?;
        println!(
            "Wrote {} of {} candidate(s) to {}",
            remaining.len(),
            aggregated,
            out.display()
        );
    } else {
        println!(
            "{} candidate(s) aggregated, {} not yet labelled",
            aggregated,
            remaining.len()
        );
    }

    Ok(())
}
