//! Vigil CLI entry point.

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use vigil::cli::commands::{self, Runtime};
use vigil::cli::{Cli, Commands};
use vigil::infrastructure::config::ConfigLoader;
use vigil::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    if let Err(err) = run(cli).await {
        vigil::cli::handle_error(&err, json_mode);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger = LoggerImpl::init(&LogConfig::try_from(&config.logging)?)?;

    let runtime = Runtime::open(config).await?;
    let janitor_stop = CancellationToken::new();
    let janitor = runtime.notifier().clone().spawn_janitor(janitor_stop.clone());

    let json = cli.json;
    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args, &runtime, json).await,
        Commands::Batch(args) => commands::batch::execute(args, &runtime, json).await,
        Commands::History(args) => commands::history::execute(args, &runtime, json).await,
        Commands::Lineage(args) => commands::lineage::execute(args, &runtime, json).await,
        Commands::List(args) => commands::list::execute(args, &runtime, json).await,
    };

    janitor_stop.cancel();
    let _ = janitor.await;
    result
}
