use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gator::fetcher::DEFAULT_TIMEOUT;
use gator::{Command, Commands, Config, Database, Fetcher, State};

#[derive(Parser)]
#[command(name = "gator", version)]
#[command(about = "Aggregate RSS feeds from the command line", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.gatorconfig.json
    #[arg(long, env = "GATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Command followed by its arguments, e.g. `addfeed "Blog" https://blog.example.com/rss`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn load_config(cli: &Cli) -> gator::Result<Config> {
    match &cli.config {
        Some(path) => Config::read_from(path),
        None => Config::read(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, command output to stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gator=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = load_config(&cli).context("failed to load configuration")?;
    debug!(db_url = %config.db_url, "loaded configuration");

    let db = Database::connect(&config.db_url)
        .await
        .with_context(|| format!("failed to open database {}", config.db_url))?;
    let fetcher = Fetcher::new(DEFAULT_TIMEOUT)?;

    let command = Command::from_words(cli.command).context("no command given")?;
    let mut state = State::new(config, db, fetcher, Box::new(std::io::stdout()));

    Commands::with_defaults().run(&mut state, &command).await?;

    Ok(())
}
