//! Command-line front end for tickerwatch
//!
//! # Usage
//!
//! ```bash
//! export TICKERWATCH_API_URL="http://localhost:8000"
//! export TICKERWATCH_IDENTITY_API_KEY="your-web-api-key"
//!
//! tickerwatch login me@example.com
//! tickerwatch watchlist add tsla
//! tickerwatch detail TSLA
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tickerwatch_client::config::{ENV_API_URL, ENV_IDENTITY_API_KEY, ENV_SESSION_FILE};
use tickerwatch_utils::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "tickerwatch", version)]
#[command(about = "Stock watchlist with AI-generated summaries", long_about = None)]
pub struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = ENV_API_URL)]
    pub api_url: Option<String>,

    /// Identity provider web API key
    #[arg(long, global = true, env = ENV_IDENTITY_API_KEY, hide_env_values = true)]
    pub identity_api_key: Option<String>,

    /// Where the signed-in session is kept
    #[arg(long, global = true, env = ENV_SESSION_FILE)]
    pub session_file: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with email and password
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "TICKERWATCH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Also create the backend user record
        #[arg(long)]
        register: bool,
    },
    /// Create an account (does not sign in)
    Signup {
        email: String,
        #[arg(long, env = "TICKERWATCH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Print a fresh bearer token
    Token,
    /// Show or edit the watchlist
    Watchlist {
        #[command(subcommand)]
        action: Option<WatchlistAction>,
    },
    /// Latest quotes for some tickers
    Prices {
        #[arg(required = true)]
        tickers: Vec<String>,
    },
    /// Key statistics and AI analysis, waiting for the analysis if needed
    Detail {
        ticker: String,
        /// Re-check interval while the analysis is generating
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Summarize an earnings call transcript
    Summarize {
        #[arg(long)]
        ticker: String,
        /// Transcript file; use `-` for stdin
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Transcript text
        #[arg(long)]
        text: Option<String>,
        /// Save the summary to your account
        #[arg(long)]
        save: bool,
    },
    /// Saved summaries
    Summaries {
        #[command(subcommand)]
        action: Option<SummariesAction>,
    },
    /// Summarize the latest 10-Q filing
    FilingSummary {
        ticker: String,
        #[arg(long)]
        debug: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum WatchlistAction {
    /// List tickers with prices
    List,
    /// Add a ticker
    Add { ticker: String },
    /// Remove a ticker
    Remove { ticker: String },
}

#[derive(Subcommand, Debug)]
pub enum SummariesAction {
    /// List saved summaries
    List,
    /// Save a summary
    Save {
        ticker: String,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        text: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    let filter = if cli.verbose {
        "info,tickerwatch_client=debug"
    } else {
        tickerwatch_utils::DEFAULT_FILTER
    };
    tickerwatch_utils::init_tracing_with(filter, format);

    let app = commands::App::connect(&cli).await?;
    app.run(cli.command).await
}
