mod workspace;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use apdu_view::{Decoder, Registry};
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::workspace::Loaded;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Could not decode the APDU: {0}")]
    Decode(#[from] apdu_view::Error),

    #[error("Could not load the configuration: {0}")]
    Config(#[from] apdu_view::config::Error),

    #[error("Could not render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Decode smart-card command APDUs, naming CLA/INS/P1/P2 through `.vscode/apdu_config.json`.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Commands as hex digits. Read from stdin, one per line, if none are given.
    inputs: Vec<String>,

    /// Workspace root holding `.vscode/apdu_config.json`.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    workspace: PathBuf,

    /// Skips the configuration of the workspace.
    #[arg(long)]
    no_workspace_config: bool,

    /// Extra configuration files, merged in order after the workspace one.
    #[arg(short, long = "config", value_name = "FILE")]
    configs: Vec<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Verbosity (-v, -vv).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Default log level for the number of `-v` flags.
fn level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn init_tracing(verbose: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_registry(cli: &Cli) -> Registry {
    let mut registry = Registry::new();

    if !cli.no_workspace_config {
        match workspace::load_workspace(&mut registry, &cli.workspace) {
            Ok(Loaded::Merged { path, warnings }) => {
                info!("Using {} ({} warnings)", path.display(), warnings.len())
            }
            Ok(Loaded::Missing(path)) => info!("No configuration found at {}", path.display()),
            Ok(Loaded::NoWorkspace) => warn!("No workspace at {}", cli.workspace.display()),
            Err(e) => error!("{}", e),
        }
    }

    for path in &cli.configs {
        if let Err(e) = workspace::load_file(&mut registry, path) {
            error!("{}: {}", path.display(), e);
        }
    }

    registry
}

fn read_inputs(cli: &Cli) -> Result<Vec<String>> {
    if !cli.inputs.is_empty() {
        return Ok(cli.inputs.clone());
    }

    let mut inputs = vec![];
    for line in io::stdin().lock().lines() {
        let line = line?;
        if !line.trim().is_empty() {
            inputs.push(line);
        }
    }

    Ok(inputs)
}

/// Decodes every input, returning how many of them failed.
///
/// Results go to `out`, separated by a blank line; a diagnostic per failed input goes
/// to `err`.
fn run(
    cli: &Cli,
    registry: &Registry,
    inputs: &[String],
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<usize> {
    let decoder = Decoder::new(registry);
    let mut failures = 0;
    let mut printed = false;

    for input in inputs {
        let apdu = match decoder.decode_hex(input) {
            Ok(apdu) => apdu,
            Err(e) => {
                failures += 1;
                writeln!(err, "error: {}", Error::from(e))?;
                continue;
            }
        };

        if printed {
            writeln!(out)?;
        }

        match cli.format {
            Format::Text => write!(out, "{}", apdu)?,
            Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&apdu)?)?,
        }
        printed = true;
    }

    Ok(failures)
}

fn exit_code(failures: usize) -> ExitCode {
    if failures == 0 {
        return ExitCode::SUCCESS;
    }

    info!("{} input(s) failed to decode", failures);
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let registry = load_registry(&cli);
    let result = read_inputs(&cli).and_then(|inputs| {
        run(
            &cli,
            &registry,
            &inputs,
            &mut io::stdout().lock(),
            &mut io::stderr(),
        )
    });

    match result {
        Ok(failures) => exit_code(failures),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
