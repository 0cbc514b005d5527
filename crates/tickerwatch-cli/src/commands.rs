//! Subcommand implementations

use crate::{Cli, Command, SummariesAction, WatchlistAction};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tickerwatch_client::config::ENV_IDENTITY_API_KEY;
use tickerwatch_client::format::{self, MISSING};
use tickerwatch_client::{
    ApiClient, Backend, ClientConfig, ClientError, Credential, DetailPhase, DetailPoller,
    FirebaseIdentity, HttpTransport, IdentityProvider, ReqwestTransport, SUMMARY_FALLBACK,
    Session, SessionStore, SignedIn, TranscriptForm, WatchlistBoard, WatchlistRow,
};
use tickerwatch_core::{Quotes, SavedSummary, Ticker};
use tracing::{debug, warn};

const SESSION_DIR: &str = ".tickerwatch";
const SESSION_FILE_NAME: &str = "session.json";
const SUMMARY_PREVIEW_CHARS: usize = 80;

/// Wired-up client for one invocation
pub struct App {
    config: ClientConfig,
    session: Arc<Session>,
    api: Arc<ApiClient>,
}

impl App {
    pub async fn connect(cli: &Cli) -> Result<Self> {
        let mut builder = ClientConfig::builder();
        if let Some(url) = &cli.api_url {
            builder = builder.api_base_url(url.clone());
        }
        if let Some(key) = &cli.identity_api_key {
            builder = builder.identity_api_key(key.clone());
        }
        if let Some(path) = &cli.session_file {
            builder = builder.session_file(path.clone());
        }
        let config = builder.with_env().build().context("Invalid configuration")?;

        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new(config.request_timeout)?);

        let identity: Arc<dyn IdentityProvider> =
            match FirebaseIdentity::from_config(Arc::clone(&transport), &config) {
                Ok(identity) => Arc::new(identity),
                Err(e) => {
                    debug!("Identity provider unavailable: {}", e);
                    Arc::new(MissingIdentityKey)
                }
            };

        let store = SessionStore::new(
            config
                .session_file
                .clone()
                .unwrap_or_else(default_session_file),
        );
        let session = Arc::new(
            Session::restore(identity, config.token_refresh_margin, store)
                .await
                .context("Failed to read stored session")?,
        );
        let api = Arc::new(ApiClient::new(
            transport,
            config.api_base_url.clone(),
            Arc::clone(&session),
        ));

        Ok(Self {
            config,
            session,
            api,
        })
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Login {
                email,
                password,
                register,
            } => self.login(&email, password, register).await,
            Command::Signup { email, password } => {
                let password = password_or_prompt(password)?;
                self.session.sign_up(&email, &password).await?;
                println!("Account created! Please log in.");
                Ok(())
            }
            Command::Logout => {
                self.session.sign_out().await?;
                println!("Signed out");
                Ok(())
            }
            Command::Whoami => self.whoami().await,
            Command::Token => {
                println!("{}", self.session.fresh_credential().await?);
                Ok(())
            }
            Command::Watchlist { action } => {
                self.watchlist(action.unwrap_or(WatchlistAction::List))
                    .await
            }
            Command::Prices { tickers } => self.prices(&tickers).await,
            Command::Detail {
                ticker,
                interval_ms,
            } => {
                let interval = interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.config.poll_interval);
                self.detail(&ticker, interval).await
            }
            Command::Summarize {
                ticker,
                file,
                text,
                save,
            } => self.summarize(&ticker, file.as_deref(), text, save).await,
            Command::Summaries { action } => {
                self.summaries(action.unwrap_or(SummariesAction::List))
                    .await
            }
            Command::FilingSummary { ticker, debug } => {
                let ticker = Ticker::parse(&ticker)?;
                let summary = self.api.filing_summary(ticker.as_str(), debug).await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
                Ok(())
            }
        }
    }

    async fn login(&self, email: &str, password: Option<String>, register: bool) -> Result<()> {
        let password = password_or_prompt(password)?;
        let identity = self.session.sign_in(email, &password).await?;
        println!("Signed in as {}", identity.email);

        if register {
            let profile = self
                .api
                .register_user(&identity.email, &identity.uid)
                .await
                .context("Signed in, but registering with the backend failed")?;
            println!("Registered backend user #{}", profile.id);
        }
        Ok(())
    }

    async fn whoami(&self) -> Result<()> {
        let identity = self
            .session
            .current_identity()
            .await
            .ok_or(ClientError::NotAuthenticated)?;
        println!("{} ({})", identity.email, identity.uid);

        match self.api.me().await {
            Ok(profile) => println!(
                "Backend user #{} since {}{}",
                profile.id,
                profile.created_at.format("%Y-%m-%d"),
                if profile.is_active { "" } else { " (inactive)" }
            ),
            Err(e) => warn!("Could not load backend profile: {}", e),
        }
        Ok(())
    }

    async fn watchlist(&self, action: WatchlistAction) -> Result<()> {
        let mut board = WatchlistBoard::new(Arc::clone(&self.api) as Arc<dyn Backend>);

        match action {
            WatchlistAction::List => board.load().await?,
            WatchlistAction::Add { ticker } => {
                if let Some(entry) = board.add(&ticker).await? {
                    println!("Added {}", entry.ticker);
                }
            }
            WatchlistAction::Remove { ticker } => {
                let ticker = ticker.trim().to_uppercase();
                board.remove(&ticker).await?;
                println!("Removed {ticker}");
            }
        }

        if board.entries().is_empty() {
            println!("Your watchlist is empty");
        } else {
            println!("{}", watchlist_table(&board.rows()));
        }
        Ok(())
    }

    async fn prices(&self, tickers: &[String]) -> Result<()> {
        let tickers = tickers
            .iter()
            .map(|raw| Ticker::parse(raw).map(Ticker::into_inner))
            .collect::<tickerwatch_core::Result<Vec<_>>>()?;
        let quotes = self.api.stock_prices(&tickers).await?;
        println!("{}", prices_table(&tickers, &quotes));
        Ok(())
    }

    async fn detail(&self, ticker: &str, interval: Duration) -> Result<()> {
        let ticker = Ticker::parse(ticker)?;
        let poller = DetailPoller::new(Arc::clone(&self.api) as Arc<dyn Backend>, interval);
        let mut rx = poller.subscribe();
        poller.set_ticker(ticker.as_str());

        let mut shown_pending = false;
        loop {
            let state = rx.borrow_and_update().clone();
            match &state.phase {
                DetailPhase::Idle => {}
                DetailPhase::Loading => eprintln!("Loading {ticker}..."),
                DetailPhase::ReadyPending(detail) => {
                    if shown_pending {
                        debug!("Analysis for {} is still generating", ticker);
                    } else {
                        print!("{}", format::detail_report(ticker.as_str(), detail));
                        shown_pending = true;
                    }
                }
                DetailPhase::Ready(detail) => {
                    if shown_pending {
                        println!();
                    }
                    print!("{}", format::detail_report(ticker.as_str(), detail));
                    return Ok(());
                }
                DetailPhase::Error { message, last } => {
                    if let Some(detail) = last.as_ref().filter(|_| !shown_pending) {
                        print!("{}", format::detail_report(ticker.as_str(), detail));
                    }
                    bail!("{message}");
                }
            }

            tokio::select! {
                changed = rx.changed() => changed.context("Stock detail poller stopped")?,
                _ = tokio::signal::ctrl_c() => {
                    poller.stop();
                    eprintln!("Cancelled");
                    return Ok(());
                }
            }
        }
    }

    async fn summarize(
        &self,
        ticker: &str,
        file: Option<&Path>,
        text: Option<String>,
        save: bool,
    ) -> Result<()> {
        let ticker = Ticker::parse(ticker)?;
        let transcript = read_text(file, text)?;

        let mut form = TranscriptForm::new(Arc::clone(&self.api) as Arc<dyn Backend>);
        let summary = form.submit(ticker.as_str(), &transcript).await.to_string();
        println!("{summary}");

        if save {
            if summary == SUMMARY_FALLBACK {
                bail!("Nothing to save");
            }
            let saved = self.api.save_summary(ticker.as_str(), &summary).await?;
            eprintln!("Saved summary #{}", saved.id);
        }
        Ok(())
    }

    async fn summaries(&self, action: SummariesAction) -> Result<()> {
        match action {
            SummariesAction::List => {
                let summaries = self.api.summaries().await?;
                if summaries.is_empty() {
                    println!("No saved summaries");
                } else {
                    println!("{}", summaries_table(&summaries));
                }
            }
            SummariesAction::Save { ticker, file, text } => {
                let ticker = Ticker::parse(&ticker)?;
                let summary_text = read_text(file.as_deref(), text)?;
                let saved = self
                    .api
                    .save_summary(ticker.as_str(), summary_text.trim())
                    .await?;
                println!("Saved summary #{}", saved.id);
            }
        }
        Ok(())
    }
}

/// Identity provider used when no API key is configured
///
/// A stored session keeps working until its token needs refreshing.
struct MissingIdentityKey;

impl MissingIdentityKey {
    fn error() -> ClientError {
        ClientError::Config(format!("{ENV_IDENTITY_API_KEY} environment variable not set"))
    }
}

#[async_trait]
impl IdentityProvider for MissingIdentityKey {
    async fn sign_in(&self, _email: &str, _password: &str) -> tickerwatch_client::Result<SignedIn> {
        Err(Self::error())
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> tickerwatch_client::Result<SignedIn> {
        Err(Self::error())
    }

    async fn refresh(&self, _refresh_token: &str) -> tickerwatch_client::Result<Credential> {
        Err(Self::error())
    }

    fn name(&self) -> &str {
        "unconfigured"
    }
}

fn default_session_file() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(SESSION_DIR)
        .join(SESSION_FILE_NAME)
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

/// Text from `--text`, a file, or stdin when the file is `-`
fn read_text(file: Option<&Path>, text: Option<String>) -> Result<String> {
    let content = match (file, text) {
        (_, Some(text)) => text,
        (Some(path), None) if path == Path::new("-") => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
        (Some(path), None) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => bail!("Provide --file or --text"),
    };

    if content.trim().is_empty() {
        bail!("Transcript is empty");
    }
    Ok(content)
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn change_cell(text: &str, positive: bool) -> Cell {
    let cell = Cell::new(text);
    if text == MISSING {
        cell
    } else if positive {
        cell.fg(Color::Green)
    } else {
        cell.fg(Color::Red)
    }
}

fn watchlist_table(rows: &[WatchlistRow]) -> Table {
    let mut table = new_table(&["Ticker", "Price", "Change"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.ticker),
            Cell::new(&row.price),
            change_cell(&row.change, row.positive),
        ]);
    }
    table
}

fn prices_table(tickers: &[String], quotes: &Quotes) -> Table {
    let mut table = new_table(&["Ticker", "Price", "Change", "Change %"]);
    for ticker in tickers {
        let quote = quotes.get(ticker);
        let badge = quote.map_or_else(
            || MISSING.to_string(),
            |q| format::change_badge(q.change_percent),
        );
        table.add_row(vec![
            Cell::new(ticker),
            Cell::new(format::price(quote.map(|q| q.price))),
            Cell::new(quote.map_or_else(|| MISSING.to_string(), |q| format!("{:+.2}", q.change))),
            change_cell(&badge, quote.is_some_and(|q| q.change_percent > 0.0)),
        ]);
    }
    table
}

fn summaries_table(summaries: &[SavedSummary]) -> Table {
    let mut table = new_table(&["#", "Ticker", "Saved", "Summary"]);
    for summary in summaries {
        table.add_row(vec![
            Cell::new(summary.id),
            Cell::new(&summary.ticker),
            Cell::new(summary.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(preview(&summary.summary_text, SUMMARY_PREVIEW_CHARS)),
        ]);
    }
    table
}

/// First line of `text`, cut to `max` characters
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() > max {
        let cut: String = line.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    } else {
        line.to_string()
    }
}
