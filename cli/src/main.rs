mod atomic_write;
mod config;
mod console;
mod games;
mod path_utils;
mod startup;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;
use xyzzy_interpreter::Interpreter;
use xyzzy_markup::Formatter;
use xyzzy_markup::MarkupDialect;

use crate::config::BridgeConfig;
use crate::games::FsGameRepository;
use crate::games::GameRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "kebab-case")]
enum CliMarkup {
    Slack,
    Markdown,
    Plain,
}

impl CliMarkup {
    fn as_dialect(self) -> MarkupDialect {
        match self {
            CliMarkup::Slack => MarkupDialect::Slack,
            CliMarkup::Markdown => MarkupDialect::Markdown,
            CliMarkup::Plain => MarkupDialect::Plain,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Play remote-Glk interactive fiction through a chat-style bridge")]
struct Cli {
    /// Path to config.toml (defaults to `~/.xyzzy/config.toml`).
    #[arg(long, env = "XYZZY_CONFIG")]
    config: Option<PathBuf>,

    /// Interpreter binary, overriding `[interpreter] program`.
    #[arg(long, env = "XYZZY_INTERPRETER")]
    interpreter: Option<String>,

    /// Markup used when printing game output, overriding `[markup] dialect`. Defaults to `plain`.
    #[arg(long, value_enum)]
    markup: Option<CliMarkup>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// List the games in the game directory.
    List,
    /// Play a game at the console.
    Play {
        /// Game name, as shown by `list`.
        game: String,
        /// Session name; save files go to `<working_root>/<session>`.
        #[arg(long, default_value = "console")]
        session: String,
    },
    /// Copy a story file into the game directory.
    Add {
        file: PathBuf,
        /// File name to store it under (defaults to the source file name).
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a story file from the game directory.
    Remove {
        /// File name including extension, e.g. `zork1.z5`.
        file_name: String,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match cli.config.clone() {
        Some(path) => path_utils::expand_tilde(&path),
        None => config::default_config_path()?,
    };
    let mut bridge = BridgeConfig::load(&config_path)?;
    if let Some(program) = cli.interpreter.clone() {
        bridge.interpreter.program = program;
    }
    info!(config = %path_utils::display_with_tilde(&config_path), "loaded configuration");

    let repository = FsGameRepository::new(bridge.game_directory.clone());
    match cli.command {
        CliCommand::List => {
            let names = repository.list_games().context("list games")?;
            if names.is_empty() {
                println!(
                    "No games in {}.",
                    path_utils::display_with_tilde(repository.directory())
                );
            }
            for name in names {
                println!("{name}");
            }
        }
        CliCommand::Add { file, name } => {
            let file_name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(std::ffi::OsStr::to_str)
                    .map(ToString::to_string)
                    .with_context(|| format!("cannot derive a file name from {}", file.display()))?,
            };
            let contents =
                std::fs::read(&file).with_context(|| format!("read {}", file.display()))?;
            let stored = repository.add_game(&file_name, &contents)?;
            println!("Added {}.", path_utils::display_with_tilde(&stored));
        }
        CliCommand::Remove { file_name } => {
            repository.remove_game(&file_name)?;
            println!("Removed {file_name}.");
        }
        CliCommand::Play { game, session } => {
            let dialect = cli
                .markup
                .map(CliMarkup::as_dialect)
                .or(bridge.dialect)
                .unwrap_or(MarkupDialect::Plain);
            play(&bridge, &repository, &game, &session, dialect).await?;
        }
    }

    Ok(())
}

async fn play(
    bridge: &BridgeConfig,
    repository: &FsGameRepository,
    game: &str,
    session: &str,
    dialect: MarkupDialect,
) -> anyhow::Result<()> {
    let program = match startup::resolve_interpreter_bin(&bridge.interpreter.program) {
        Ok(program) => program,
        Err(err) => {
            eprint!("{}", err.render_ansi());
            std::process::exit(1);
        }
    };
    let game_file = repository.game_file(game)?;
    let working_dir = bridge.working_dir_for(session)?;

    info!(game, session, working_dir = %working_dir.display(), "starting game");
    let (interpreter, output_rx) =
        Interpreter::start(bridge.interpreter_config(program, &game_file, working_dir))
            .context("start interpreter")?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let end = console::run_console(
        &interpreter,
        output_rx,
        Formatter::new(dialect),
        stdin,
        &mut stdout,
    )
    .await?;
    info!(?end, "session finished");
    Ok(())
}
