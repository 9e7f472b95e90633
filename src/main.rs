//! Entry point. Wires statement -> rate prefetch -> FIFO ledger -> report.

mod config;
mod error;
mod fetch;
mod ledger;
mod parser;
mod rates;
mod report;
mod types;
mod utils;

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::fetch::RateFetcher;
use crate::ledger::Ledger;
use crate::rates::{EcbCacheDir, RateResolver, RateSource};
use crate::report::{Format, Report};
use crate::types::TradeEvent;

/// FIFO realized capital gains from an Interactive Brokers activity statement.
#[derive(Parser, Debug)]
#[command(name = "ibkr-capgains", version, about, long_about = None)]
struct Cli {
    /// Re-download exchange rate files even when cached
    #[arg(short, long)]
    download: bool,

    /// Only report lots closed in this year
    #[arg(short, long)]
    year: Option<i32>,

    /// Configuration file (YAML)
    #[arg(short, long, env = "IBKR_CAPGAINS_CONFIG")]
    config: Option<PathBuf>,

    /// Emit JSON lines instead of the tax form
    #[arg(long)]
    json: bool,

    /// Statement CSV; stdin when omitted
    #[arg(value_name = "STATEMENT")]
    input: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::load_or_default(cli.config.as_deref())?;

    let input: Box<dyn Read> = match &cli.input {
        Some(p) => Box::new(BufReader::new(
            File::open(p).with_context(|| format!("open {}", p.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let statement = parser::read_statement(input).context("read statement")?;
    if statement.contracts.is_empty() && !statement.trades.is_empty() {
        warn!("Statement has trades but no Financial Instrument Information section");
    }

    let cache = EcbCacheDir::new(cfg.rates.cache_dir());
    let resolver = RateResolver::new(&cfg.home_currency, cache.clone(), cfg.rates.max_lookback_days);

    // Rate files first, so matching never waits on the network
    let needed = resolver.tables_needed(&statement.currencies());
    let fetcher = RateFetcher::new(
        &cfg.rates.base_url,
        cache,
        Duration::from_secs(cfg.rates.download_timeout_sec),
    )?;
    fetcher.prefetch(&needed, cli.download).await?;

    let mut ledger = Ledger::new(statement.contracts, resolver);
    let format = if cli.json { Format::Json } else { Format::Text };
    let (out, total) = render(&statement.trades, &mut ledger, format, cli.year)?;
    io::stdout().lock().write_all(&out)?;

    info!(
        "Done: {} trades, total {:.2} {}",
        statement.trades.len(),
        total,
        cfg.home_currency
    );
    for (conid, p) in ledger.positions().filter(|(_, p)| !p.is_empty()) {
        info!(
            "Still open: conid {} {:?} {} in {} lots",
            conid,
            p.side(),
            p.quantity(),
            p.lots().count()
        );
    }
    Ok(())
}

/// Feed trades through the ledger in order and return the finished report with
/// its total. Nothing is returned unless every trade matched.
fn render<S: RateSource>(
    trades: &[TradeEvent],
    ledger: &mut Ledger<S>,
    format: Format,
    year: Option<i32>,
) -> anyhow::Result<(Vec<u8>, f64)> {
    let mut report = Report::new(Vec::new(), format, year);
    for trade in trades {
        let closed = ledger
            .apply_trade(trade)
            .with_context(|| format!("{} {} on {}", trade.symbol, trade.quantity, trade.timestamp))?;
        for lot in &closed {
            report.record(lot)?;
        }
    }
    let total = report.total();
    Ok((report.finish()?, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATEMENT: &str = "\
Trades,Header,DataDiscriminator,Asset Category,Currency,Symbol,Date/Time,Quantity,T. Price,C. Price,Proceeds,Comm/Fee,Basis,Realized P/L,MTM P/L,Code
Trades,Data,Order,Stocks,EUR,SAP,\"2018-01-02, 09:00:00\",10,100,100,-1000,-1,1001,0,0,O
Trades,Data,Order,Stocks,USD,GILD,\"2018-06-16, 20:34:11\",-10,69.45,69.5,694.5,-2,-700,-5.8,-0.5,C
Trades,Data,Order,Stocks,EUR,SAP,\"2018-03-05, 12:00:00\",-10,150,150,1500,-1,-1001,498,0,C
Trades,Data,Order,Stocks,USD,GILD,\"2017-12-01, 15:00:00\",10,60,60,-600,-2,602,0,0,O
Financial Instrument Information,Data,Stocks,GILD,GILEAD SCIENCES INC,269,US3755581036,NASDAQ,1,COMMON
Financial Instrument Information,Data,Stocks,SAP,SAP SE,14204,DE0007164600,IBIS,1,COMMON
";

    const USD_XML: &str = r#"<DataSet><Series CURRENCY="USD">
<Obs TIME_PERIOD="2017-12-01" OBS_VALUE="1.2"/>
<Obs TIME_PERIOD="2018-06-15" OBS_VALUE="1.25"/>
</Series></DataSet>"#;

    fn run(year: Option<i32>, cache: &std::path::Path) -> anyhow::Result<String> {
        let st = parser::read_statement(STATEMENT.as_bytes())?;
        let mut ledger = Ledger::new(
            st.contracts,
            RateResolver::new("EUR", EcbCacheDir::new(cache), 14),
        );
        let (out, _) = render(&st.trades, &mut ledger, Format::Text, year)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn statement_to_tax_form() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("usd.xml"), USD_XML).unwrap();

        let out = run(Some(2018), dir.path()).unwrap();
        assert_eq!(out.matches("Arvopaperin nimi").count(), 2);
        // SAP: 10 * (150 - 100) - 1 - 1
        assert!(out.contains("Voitto:            498.00\n"));
        // GILD bought at 60 / 1.2, sold on a Saturday at the Friday rate 69.45 / 1.25
        assert!(out.contains("Hankintahinta:     500.00\n"));
        assert!(out.contains("Luovutushinta:     555.60\n"));
        assert!(out.contains("Luovutusaika:      16.06.2018\n"));
        // 555.60 - 500.00 - 2/1.2 - 2/1.25 = 52.33
        assert!(out.ends_with("Voitto yhteensä:   550.33\n"));
    }

    #[test]
    fn later_rate_gap_discards_earlier_lots() {
        let dir = tempfile::tempdir().unwrap();
        // no USD rate near the June sale
        std::fs::write(
            dir.path().join("usd.xml"),
            r#"<Obs TIME_PERIOD="2017-12-01" OBS_VALUE="1.2"/>"#,
        )
        .unwrap();
        // the SAP lot closes in March before the GILD sale fails
        let err = run(None, dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("no USD reference rate on or before 2018-06-16"));
    }

    #[test]
    fn missing_rate_file_aborts_without_total() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(None, dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("exchange rates unavailable for USD"));
    }
}
