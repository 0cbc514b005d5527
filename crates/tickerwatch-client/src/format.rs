//! Display formatting for prices and key statistics

use std::fmt::{self, Write};
use tickerwatch_core::{StockDetail, SummaryState};

/// Placeholder for a value the backend did not provide
pub const MISSING: &str = "--";

/// Shown in place of the analysis while it is being generated
pub const GENERATING_NOTICE: &str = "Generating AI analysis...";

/// `$189.50`, or `--` without a quote
pub fn price(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |p| format!("${p:.2}"))
}

/// `+1.2%` / `-0.6%`; only strictly positive moves get a sign
pub fn change_badge(change_percent: f64) -> String {
    let sign = if change_percent > 0.0 { "+" } else { "" };
    format!("{sign}{change_percent:.1}%")
}

/// Market cap in billions: `$2.95B` for 2.95e9
pub fn market_cap(value: f64) -> String {
    format!("${:.2}B", value / 1e9)
}

pub fn pe_ratio(value: f64) -> String {
    format!("{value:.2}")
}

pub fn eps(value: f64) -> String {
    format!("${value:.2}")
}

/// Volume in thousands: `51234K`
pub fn volume(value: f64) -> String {
    format!("{:.0}K", value / 1000.0)
}

/// Multi-line rendering of the detail screen
pub fn detail_report(ticker: &str, detail: &StockDetail) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, ticker, detail);
    out
}

fn write_report(out: &mut String, ticker: &str, detail: &StockDetail) -> fmt::Result {
    writeln!(
        out,
        "{ticker}  {}  {}\n",
        price(Some(detail.price)),
        change_badge(detail.change_percent)
    )?;
    writeln!(out, "Key Statistics")?;
    writeln!(out, "  Market Cap  {}", market_cap(detail.market_cap))?;
    writeln!(out, "  P/E Ratio   {}", pe_ratio(detail.pe_ratio))?;
    writeln!(out, "  EPS         {}", eps(detail.eps))?;
    writeln!(out, "  Volume      {}\n", volume(detail.volume))?;
    writeln!(out, "AI Analysis")?;
    match detail.summary_state() {
        SummaryState::Pending => writeln!(out, "  {GENERATING_NOTICE}"),
        SummaryState::Final(summary) => summary
            .lines()
            .try_for_each(|line| writeln!(out, "  {line}")),
    }
}
