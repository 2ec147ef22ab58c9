use clap::Parser;
use pyberry::driver::{self, FileReport};
use pyberry::{Config, TranslateError, Translator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Translate Python automation scripts into Berry scripts for Tasmota.
#[derive(Parser, Debug)]
#[command(name = "pyberry", version, about)]
struct Cli {
    /// Python file, or a directory to translate every `*.py` below it
    input: PathBuf,

    /// Config file (default: ./pyberry.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the translation instead of writing it (single file only)
    #[arg(long, conflicts_with = "json")]
    stdout: bool,

    /// Print a JSON report of every translated file
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<bool, TranslateError> {
    let config = Config::load(cli.config.as_deref())?;
    let translator = Translator::from_config(&config);

    if cli.stdout {
        print!("{}", driver::translate_to_string(&cli.input, &translator)?);
        return Ok(true);
    }

    let reports = driver::translate_path(&cli.input, &translator)?;
    if cli.json {
        print_json(&reports);
    } else {
        print_text(&reports);
    }
    Ok(reports.iter().all(|report| !report.is_error()))
}

fn print_json(reports: &[FileReport]) {
    match serde_json::to_string_pretty(reports) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("error: cannot serialise report: {err}"),
    }
}

fn print_text(reports: &[FileReport]) {
    for report in reports {
        match &report.outcome {
            driver::FileOutcome::Ok { output } => println!("{}", output.display()),
            driver::FileOutcome::Error { message, .. } => {
                eprintln!("error: {}: {}", report.input.display(), message)
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
