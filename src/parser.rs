//! Parse an Interactive Brokers activity statement (CSV export).
//! Supported: stock order rows and the stock instrument information section.

use std::collections::HashMap;
use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::error::{GainsError, Result};
use crate::types::{Contract, TradeEvent};
use crate::utils::{calendar_day, sanitize_code, strip_thousands};

/// Ticker -> contract. Several tickers may point at one contract after a relisting.
#[derive(Debug, Default, Clone)]
pub struct ContractDirectory {
    by_symbol: HashMap<String, Contract>,
}

impl ContractDirectory {
    pub fn insert(&mut self, symbol: &str, contract: Contract) {
        self.by_symbol.insert(symbol.trim().to_string(), contract);
    }

    pub fn get(&self, symbol: &str) -> Option<&Contract> {
        self.by_symbol.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct Statement {
    pub contracts: ContractDirectory,
    /// Sorted by trade day, then by the raw timestamp.
    pub trades: Vec<TradeEvent>,
}

impl Statement {
    /// Distinct trade currencies, in first-seen order.
    pub fn currencies(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for t in &self.trades {
            if !out.contains(&t.currency) {
                out.push(t.currency.clone());
            }
        }
        out
    }
}

pub fn read_statement<R: Read>(input: R) -> Result<Statement> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut st = Statement::default();
    for result in reader.records() {
        let record = result.map_err(|e| GainsError::MalformedRow {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            reason: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if is_stock_trade(&record) {
            st.trades.push(parse_trade(&record, line)?);
        } else if is_stock_info(&record) {
            let description = field(&record, 4, line)?.trim().to_string();
            let conid = field(&record, 5, line)?.trim().to_string();
            for symbol in field(&record, 3, line)?.split(", ") {
                st.contracts.insert(
                    symbol,
                    Contract {
                        description: description.clone(),
                        conid: conid.clone(),
                    },
                );
            }
        }
    }

    st.trades.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });
    info!(
        "Statement: {} stock trades, {} instrument symbols",
        st.trades.len(),
        st.contracts.len()
    );
    Ok(st)
}

fn is_stock_trade(r: &StringRecord) -> bool {
    r.get(0).map(strip_bom) == Some("Trades")
        && r.get(1) == Some("Data")
        && r.get(2) == Some("Order")
        && r.get(3).is_some_and(|s| s.starts_with("Stocks"))
}

fn is_stock_info(r: &StringRecord) -> bool {
    r.get(0).map(strip_bom) == Some("Financial Instrument Information")
        && r.get(1) == Some("Data")
        && r.get(2) == Some("Stocks")
}

fn strip_bom(s: &str) -> &str {
    s.trim_start_matches('\u{feff}')
}

fn field<'r>(r: &'r StringRecord, idx: usize, line: u64) -> Result<&'r str> {
    r.get(idx).ok_or_else(|| GainsError::MalformedRow {
        line,
        reason: format!("missing column {}", idx),
    })
}

fn number(r: &StringRecord, idx: usize, line: u64, what: &str) -> Result<f64> {
    let raw = field(r, idx, line)?;
    strip_thousands(raw)
        .parse()
        .map_err(|_| GainsError::MalformedRow {
            line,
            reason: format!("bad {}: {:?}", what, raw),
        })
}

// Columns: 4 currency, 5 symbol, 6 "date, time", 7 quantity, 8 price, 11 commission
fn parse_trade(r: &StringRecord, line: u64) -> Result<TradeEvent> {
    let timestamp = field(r, 6, line)?.trim().to_string();
    let date = calendar_day(&timestamp).ok_or_else(|| GainsError::MalformedRow {
        line,
        reason: format!("bad date/time: {:?}", timestamp),
    })?;
    let raw_qty = field(r, 7, line)?;
    let quantity: i64 = strip_thousands(raw_qty)
        .parse()
        .map_err(|_| GainsError::MalformedRow {
            line,
            reason: format!("bad quantity: {:?}", raw_qty),
        })?;

    let trade = TradeEvent {
        symbol: field(r, 5, line)?.trim().to_string(),
        currency: sanitize_code(field(r, 4, line)?),
        date,
        timestamp,
        quantity,
        price: number(r, 8, line, "price")?,
        commission: -number(r, 11, line, "commission")?,
    };
    debug!("line {}: {:?}", line, trade);
    Ok(trade)
}
