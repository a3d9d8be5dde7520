//! poiprep CLI entry point

use clap::Parser;
use poiprep::config::{Cli, Settings};
use poiprep::pipeline;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli);

    if let Err(e) = validate_inputs(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let settings = match Settings::from_cli(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Missing files fail only their own pair
    for path in settings.missing_inputs() {
        warn!("Input file does not exist: {}", path.display());
    }

    match pipeline::run(&settings) {
        Ok(summary) => {
            println!();
            println!(
                "Summary: {} successful, {} failed (of {} pairs)",
                summary.successful, summary.failed, summary.total
            );

            if summary.failed > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = if cli.quiet { "error" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn validate_inputs(cli: &Cli) -> Result<(), String> {
    // The output dir itself is created, its parent must exist
    if let Some(parent) = cli.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(format!(
                "Output parent directory does not exist: {}\n\n  Tip: The output directory will be created automatically,\n  but its parent directory must exist.\n  Example: mkdir -p {}",
                parent.display(),
                parent.display()
            ));
        }
    }

    Ok(())
}
