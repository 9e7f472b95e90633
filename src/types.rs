//! Core domain types for trades, open lots and realized gains.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One stock order line from the activity statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub symbol: String,
    pub currency: String,
    pub date: NaiveDate,
    /// Raw "date, time" string; only used to order trades within a day.
    pub timestamp: String,
    pub quantity: i64, // + buy, - sell
    pub price: f64,
    /// Broker commission negated, so a charge is positive.
    pub commission: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LotSide {
    Long,
    Short,
}

impl LotSide {
    pub fn of(quantity: i64) -> Self {
        if quantity < 0 {
            LotSide::Short
        } else {
            LotSide::Long
        }
    }
}

/// Unfilled quantity of one original trade. Prices are in home currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenLot {
    pub quantity: i64,
    pub unit_price: f64,
    pub unit_commission: f64,
    pub acquired_on: NaiveDate,
}

impl OpenLot {
    pub fn side(&self) -> LotSide {
        LotSide::of(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub description: String,
    pub conid: String,
}

/// A lot, or part of one, closed by an opposing trade.
///
/// `acquired_*` always describes the lot that was open and `closed_*` the trade
/// that closed it, whichever of the two was the buy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedLot {
    pub description: String,
    pub conid: String,
    pub side: LotSide,
    pub quantity: i64,
    pub acquired_on: NaiveDate,
    pub acquisition_price: f64,
    pub closed_on: NaiveDate,
    pub disposal_price: f64,
    pub acquisition_expense: f64,
    pub disposal_expense: f64,
    pub profit: f64,
}

impl ClosedLot {
    /// Date of the sale leg. For a short that is when the lot was opened.
    pub fn sale_date(&self) -> NaiveDate {
        match self.side {
            LotSide::Long => self.closed_on,
            LotSide::Short => self.acquired_on,
        }
    }

    pub fn sale_price(&self) -> f64 {
        match self.side {
            LotSide::Long => self.disposal_price,
            LotSide::Short => self.acquisition_price,
        }
    }

    pub fn sale_expense(&self) -> f64 {
        match self.side {
            LotSide::Long => self.disposal_expense,
            LotSide::Short => self.acquisition_expense,
        }
    }

    pub fn purchase_date(&self) -> NaiveDate {
        match self.side {
            LotSide::Long => self.acquired_on,
            LotSide::Short => self.closed_on,
        }
    }

    pub fn purchase_price(&self) -> f64 {
        match self.side {
            LotSide::Long => self.acquisition_price,
            LotSide::Short => self.disposal_price,
        }
    }

    pub fn purchase_expense(&self) -> f64 {
        match self.side {
            LotSide::Long => self.acquisition_expense,
            LotSide::Short => self.disposal_expense,
        }
    }
}
