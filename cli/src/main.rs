use clap::Parser;
use storyrag_cli::{Cli, init_logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env values must be in place before clap reads env-backed flags
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Ok(path) = dotenv {
        log::debug!("Loaded environment from {}", path.display());
    }

    cli.run().await
}
