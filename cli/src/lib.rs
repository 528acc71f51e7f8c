//! Command-line front end for story retrieval.

mod context;
mod normalize_cmd;
mod search_cmd;

pub use context::format_document_context;
pub use normalize_cmd::NormalizeArgs;
pub use search_cmd::EmbeddingTable;
pub use search_cmd::SearchArgs;
pub use search_cmd::parse_filter;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "storyrag", version, about = "Hybrid vector + BM25 retrieval over user stories")]
pub struct Cli {
    /// Raise log verbosity to debug (logs go to stderr)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the normalized form of a query
    Normalize(NormalizeArgs),

    /// Retrieve the stories most related to a query
    Search(SearchArgs),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Normalize(args) => normalize_cmd::run_normalize(args),
            Command::Search(args) => search_cmd::run_search(args).await,
        }
    }
}

/// Install the stderr logger; `RUST_LOG` wins over the verbosity flag.
pub fn init_logger(verbose: u8) {
    let default_level = if verbose > 0 { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}
