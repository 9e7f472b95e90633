//! ECB reference rates: per-currency tables loaded on first use.

use std::collections::{hash_map::Entry, BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{GainsError, Result};

/// Daily rates for one currency, quoted as units per one unit of the source's base currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    rates: BTreeMap<NaiveDate, f64>,
}

impl RateTable {
    pub fn insert(&mut self, date: NaiveDate, rate: f64) {
        self.rates.insert(date, rate);
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rates.keys().next().copied()
    }

    /// Latest published rate at or before `date`, at most `max_lookback_days` back.
    pub fn rate_on_or_before(&self, date: NaiveDate, max_lookback_days: i64) -> Option<(NaiveDate, f64)> {
        let (&found, &rate) = self.rates.range(..=date).next_back()?;
        if (date - found).num_days() > max_lookback_days {
            return None;
        }
        Some((found, rate))
    }
}

impl FromIterator<(NaiveDate, f64)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().collect(),
        }
    }
}

/// Where rate tables come from.
pub trait RateSource {
    fn load(&self, currency: &str) -> Result<RateTable>;

    /// Currency every table is quoted against. The ECB quotes against the euro.
    fn base(&self) -> &str {
        "EUR"
    }
}

/// Directory of `<currency>.xml` files in the ECB SDMX layout.
#[derive(Debug, Clone)]
pub struct EcbCacheDir {
    dir: PathBuf,
}

impl EcbCacheDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(currency: &str) -> String {
        format!("{}.xml", currency.to_ascii_lowercase())
    }

    pub fn path_for(&self, currency: &str) -> PathBuf {
        self.dir.join(Self::file_name(currency))
    }
}

impl RateSource for EcbCacheDir {
    fn load(&self, currency: &str) -> Result<RateTable> {
        let path = self.path_for(currency);
        let xml = fs::read_to_string(&path).map_err(|e| GainsError::DataUnavailable {
            currency: currency.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })?;
        parse_ecb_xml(currency, &xml)
    }
}

/// Extract `TIME_PERIOD`/`OBS_VALUE` pairs from every `Obs` element.
pub fn parse_ecb_xml(currency: &str, xml: &str) -> Result<RateTable> {
    static OBS: OnceLock<Regex> = OnceLock::new();
    static ATTR: OnceLock<Regex> = OnceLock::new();
    let obs = OBS.get_or_init(|| Regex::new(r"<(?:[A-Za-z0-9_]+:)?Obs(\s[^>]*)>").unwrap());
    let attr = ATTR.get_or_init(|| Regex::new(r#"([A-Za-z_]+)="([^"]*)""#).unwrap());

    let mut table = RateTable::default();
    for c in obs.captures_iter(xml) {
        let mut period = None;
        let mut value = None;
        for a in attr.captures_iter(&c[1]) {
            match &a[1] {
                "TIME_PERIOD" => period = NaiveDate::parse_from_str(&a[2], "%Y-%m-%d").ok(),
                "OBS_VALUE" => value = a[2].parse::<f64>().ok(),
                _ => {}
            }
        }
        match (period, value) {
            (Some(d), Some(v)) if v.is_finite() && v > 0.0 => table.insert(d, v),
            _ => debug!("{}: skipping observation {}", currency, c[1].trim()),
        }
    }

    if table.is_empty() {
        return Err(GainsError::DataUnavailable {
            currency: currency.to_string(),
            reason: "no observations in rate file".into(),
        });
    }
    Ok(table)
}

/// Converts trade amounts to the home currency.
pub struct RateResolver<S> {
    home: String,
    source: S,
    max_lookback_days: i64,
    tables: HashMap<String, RateTable>,
}

impl<S: RateSource> RateResolver<S> {
    pub fn new(home: &str, source: S, max_lookback_days: i64) -> Self {
        Self {
            home: home.to_ascii_uppercase(),
            source,
            max_lookback_days,
            tables: HashMap::new(),
        }
    }

    pub fn is_home(&self, currency: &str) -> bool {
        currency.eq_ignore_ascii_case(&self.home)
    }

    /// Currencies whose tables `rate_for` may need besides the base itself.
    pub fn tables_needed<'a>(&self, currencies: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        let base = self.source.base().to_ascii_uppercase();
        let mut out: Vec<String> = Vec::new();
        for c in currencies {
            if self.is_home(c) {
                continue;
            }
            for code in [c.to_ascii_uppercase(), self.home.clone()] {
                if code != base && !out.contains(&code) {
                    out.push(code);
                }
            }
        }
        out
    }

    #[cfg(test)]
    pub fn loaded(&self) -> usize {
        self.tables.len()
    }

    /// Units of `currency` per one home unit on `date`, crossed through the base
    /// currency when home is not the base.
    pub fn rate_for(&mut self, currency: &str, date: NaiveDate) -> Result<f64> {
        if self.is_home(currency) {
            return Ok(1.0);
        }
        let foreign = self.quote(currency, date)?;
        let home = self.home.clone();
        let home_quote = self.quote(&home, date)?;
        Ok(foreign / home_quote)
    }

    fn quote(&mut self, currency: &str, date: NaiveDate) -> Result<f64> {
        if currency.eq_ignore_ascii_case(self.source.base()) {
            return Ok(1.0);
        }

        let table = match self.tables.entry(currency.to_ascii_uppercase()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                let t = self.source.load(e.key())?;
                info!(
                    "Loaded {} {} rates starting {:?}",
                    t.len(),
                    e.key(),
                    t.first_date()
                );
                e.insert(t)
            }
        };

        match table.rate_on_or_before(date, self.max_lookback_days) {
            Some((found, rate)) => {
                if found != date {
                    debug!("{} rate for {} taken from {}", currency, date, found);
                }
                Ok(rate)
            }
            None => Err(GainsError::RateGapExhausted {
                currency: currency.to_string(),
                date,
            }),
        }
    }
}
