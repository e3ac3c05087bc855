//! Flashdeck - question/answer flashcard decks studied in repeated passes.

mod app;
mod config;
mod console;
mod error;
mod models;
mod session;
mod store;

use app::{App, StudyOptions};
use clap::{Parser, Subcommand, ValueEnum};
use config::{Config, StorageBackend};
use console::Console;
use error::DeckResult;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flashdeck", about = "Study question/answer flashcard decks", version)]
struct Cli {
    /// Directory holding the decks (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Storage backend (overrides config)
    #[arg(long, global = true)]
    backend: Option<BackendArg>,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Seed for shuffled study order
    #[arg(long, global = true, hide = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Json,
    Sqlite,
}

impl From<BackendArg> for StorageBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Json => Self::Json,
            BackendArg::Sqlite => Self::Sqlite,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Create a new, empty deck
    New { deck: String },

    /// Add a card (creates the deck if needed)
    Add {
        deck: String,
        #[arg(short, long)]
        question: Option<String>,
        #[arg(short, long)]
        answer: Option<String>,
    },

    /// Edit the card at INDEX
    Edit {
        deck: String,
        #[arg(allow_hyphen_values = true)]
        index: String,
        #[arg(short, long)]
        question: Option<String>,
        #[arg(short, long)]
        answer: Option<String>,
    },

    /// Delete the card at INDEX
    Delete {
        deck: String,
        #[arg(allow_hyphen_values = true)]
        index: String,
    },

    /// List the cards of a deck
    List { deck: String },

    /// Study a deck
    Study {
        deck: String,
        /// Shuffle cards on every pass
        #[arg(short, long)]
        random: bool,
        /// Only review cards not yet understood
        #[arg(long)]
        resume: bool,
    },

    /// Clear the understood flag on every card
    Reset { deck: String },

    /// Delete a whole deck
    RemoveDeck {
        deck: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List stored decks
    Decks,

    /// Import a deck from a JSON file
    Import {
        file: PathBuf,
        /// Store under a different name
        #[arg(long)]
        name: Option<String>,
        /// Overwrite an existing deck
        #[arg(long)]
        force: bool,
    },

    /// Export a deck to a JSON file
    Export { deck: String, file: PathBuf },

    /// Interactive edit menu for a deck
    Manage { deck: String },

    /// Show the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        write: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("FLASHDECK_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut config = Config::load();
    if let Some(dir) = cli.data_dir {
        config.storage.dir = Some(dir);
    }
    if let Some(backend) = cli.backend {
        config.storage.backend = backend.into();
    }
    if cli.no_color {
        config.display.color = false;
    }

    let store = store::open_store(&config.storage)?;
    let console = Console::new(io::stdin().lock(), io::stdout()).with_color(config.display.color);
    let mut app = App::new(store, config, console);
    if let Some(seed) = cli.seed {
        app = app.with_seed(seed);
    }

    let result = dispatch(&mut app, cli.command);
    Ok(ExitCode::from(finish(&mut app, result)))
}

fn dispatch<R: BufRead, W: Write>(app: &mut App<R, W>, command: Command) -> DeckResult<()> {
    match command {
        Command::New { deck } => app.new_deck(&deck),
        Command::Add {
            deck,
            question,
            answer,
        } => app.add_card(&deck, question, answer),
        Command::Edit {
            deck,
            index,
            question,
            answer,
        } => app.edit_card(&deck, &index, question, answer),
        Command::Delete { deck, index } => app.delete_card(&deck, &index),
        Command::List { deck } => app.list_cards(&deck),
        Command::Study {
            deck,
            random,
            resume,
        } => app.study(
            &deck,
            StudyOptions {
                randomize: random,
                resume,
            },
        ),
        Command::Reset { deck } => app.reset_deck(&deck),
        Command::RemoveDeck { deck, yes } => app.delete_deck(&deck, yes),
        Command::Decks => app.list_decks(),
        Command::Import { file, name, force } => app.import_deck(&file, name.as_deref(), force),
        Command::Export { deck, file } => app.export_deck(&deck, &file),
        Command::Manage { deck } => app.manage(&deck),
        Command::Config { write } => app.show_config(write),
    }
}

/// Report a failed command and map the result to the process exit status.
fn finish<R: BufRead, W: Write>(app: &mut App<R, W>, result: DeckResult<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            if app.console.error(&err).is_err() {
                eprintln!("Error: {}", err);
            }
            1
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
