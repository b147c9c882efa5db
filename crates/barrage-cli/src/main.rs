//! Barrage CLI: profile-driven HTTP load testing
//!
//! Usage:
//!   barrage run --catalog config.json --request 1 --test smoke,load --peak 50 --base-url https://api.example.com
//!   barrage plan --test stress --peak 100
//!   barrage list --catalog config.json

use barrage_cli::{handlers, logging, Cli, CliConfig, CliResult, Commands, Verbosity};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = build_config(&cli);
    logging::init(config.verbosity, config.log_format)?;

    match cli.command {
        Commands::Run(args) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(handlers::execute_run(&config, &args))
        }
        Commands::Plan(args) => handlers::execute_plan(&args),
        Commands::List(args) => handlers::execute_list(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_log_format(cli.log_format.into())
}
