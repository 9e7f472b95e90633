//! FIFO lot matching. Every trade either opens lots or closes the oldest
//! opposing ones first, realizing the gain for each closed piece.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::error::{GainsError, Result};
use crate::parser::ContractDirectory;
use crate::rates::{RateResolver, RateSource};
use crate::types::{ClosedLot, LotSide, OpenLot, TradeEvent};

/// Open lots of one contract, oldest first. All lots share one sign.
#[derive(Debug, Default, Clone)]
pub struct Position {
    lots: VecDeque<OpenLot>,
}

impl Position {
    pub fn lots(&self) -> impl Iterator<Item = &OpenLot> {
        self.lots.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Net signed quantity still open.
    pub fn quantity(&self) -> i64 {
        self.lots.iter().map(|l| l.quantity).sum()
    }

    pub fn side(&self) -> Option<LotSide> {
        self.lots.front().map(OpenLot::side)
    }
}

pub struct Ledger<S> {
    contracts: ContractDirectory,
    rates: RateResolver<S>,
    positions: HashMap<String, Position>,
}

impl<S: RateSource> Ledger<S> {
    pub fn new(contracts: ContractDirectory, rates: RateResolver<S>) -> Self {
        Self {
            contracts,
            rates,
            positions: HashMap::new(),
        }
    }

    /// Position by contract id.
    #[cfg(test)]
    pub fn position(&self, conid: &str) -> Option<&Position> {
        self.positions.get(conid)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&String, &Position)> {
        self.positions.iter()
    }

    pub fn apply_trade(&mut self, trade: &TradeEvent) -> Result<Vec<ClosedLot>> {
        let contract = self
            .contracts
            .get(&trade.symbol)
            .ok_or_else(|| GainsError::UnknownInstrument(trade.symbol.clone()))?;
        let rate = self.rates.rate_for(&trade.currency, trade.date)?;

        let mut closed = Vec::new();
        if trade.quantity == 0 {
            return Ok(closed);
        }

        let price = trade.price / rate;
        let commission = trade.commission / rate;
        let total = trade.quantity.abs();
        let unit_commission = commission / total as f64;
        let trade_side = LotSide::of(trade.quantity);

        let position = self.positions.entry(contract.conid.clone()).or_default();
        let mut remaining = total;

        while remaining > 0 {
            let Some(head) = position.lots.front_mut() else {
                break;
            };
            if head.side() == trade_side {
                break;
            }

            let lotsize = remaining.min(head.quantity.abs());
            let gross = match head.side() {
                LotSide::Long => lotsize as f64 * (price - head.unit_price),
                LotSide::Short => lotsize as f64 * (head.unit_price - price),
            };
            let acquisition_expense = head.unit_commission * lotsize as f64;
            let disposal_expense = commission * lotsize as f64 / total as f64;

            let lot = ClosedLot {
                description: contract.description.clone(),
                conid: contract.conid.clone(),
                side: head.side(),
                quantity: lotsize,
                acquired_on: head.acquired_on,
                acquisition_price: head.unit_price,
                closed_on: trade.date,
                disposal_price: price,
                acquisition_expense,
                disposal_expense,
                profit: gross - acquisition_expense - disposal_expense,
            };

            if lotsize == head.quantity.abs() {
                position.lots.pop_front();
            } else {
                head.quantity -= lotsize * head.quantity.signum();
            }

            debug!(
                "{} closed {:?} {} @ {:.4} (opened {}), profit {:.2}",
                lot.description, lot.side, lot.quantity, lot.disposal_price, lot.acquired_on, lot.profit
            );
            closed.push(lot);
            remaining -= lotsize;
        }

        if remaining > 0 {
            position.lots.push_back(OpenLot {
                quantity: remaining * trade.quantity.signum(),
                unit_price: price,
                unit_commission,
                acquired_on: trade.date,
            });
        }

        Ok(closed)
    }
}
