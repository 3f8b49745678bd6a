use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kubectl_ball::cli::{saved_message, App, Cli, Outcome, USAGE};
use kubectl_ball::config::{ConfigStore, Tools};
use kubectl_ball::exec::ProcessExecutor;

/// Initialize tracing on stderr so stdout carries only the report.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kubectl_ball=debug"
    } else {
        "kubectl_ball=warn"
    };
    let filter =
        tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let store = ConfigStore::resolve(cli.config.clone())?;
    let app = App::new(Arc::new(ProcessExecutor::new()), store, Tools::from_env());

    match app.run(&cli).await? {
        Outcome::Saved(config) => println!("{}", saved_message(&config)),
        Outcome::Report(report) => print!("{}", report),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    if std::env::args_os().len() <= 1 {
        println!("{}", USAGE);
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse_args(std::env::args_os()).unwrap_or_else(|e| e.exit());
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
