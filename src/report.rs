//! Capital gains report in the layout of the Finnish tax form
//! (luovutusvoittolaskelma), or as JSON lines.

use std::io::{self, Write};

use chrono::Datelike;
use serde::Serialize;

use crate::types::ClosedLot;
use crate::utils::fi_style_date;

const RULE: &str = "-----------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

#[derive(Serialize)]
struct Totals {
    year: Option<i32>,
    lots: usize,
    total_profit: f64,
}

pub struct Report<W> {
    out: W,
    format: Format,
    year: Option<i32>,
    total: f64,
    lots: usize,
}

impl<W: Write> Report<W> {
    pub fn new(out: W, format: Format, year: Option<i32>) -> Self {
        Self {
            out,
            format,
            year,
            total: 0.0,
            lots: 0,
        }
    }

    /// A lot belongs to the report when it was closed in the requested year.
    pub fn includes(&self, lot: &ClosedLot) -> bool {
        self.year.map_or(true, |y| lot.closed_on.year() == y)
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Print and total `lot` if it falls in the report year. Returns whether it did.
    pub fn record(&mut self, lot: &ClosedLot) -> io::Result<bool> {
        if !self.includes(lot) {
            return Ok(false);
        }
        self.total += lot.profit;
        self.lots += 1;
        match self.format {
            Format::Text => write_form(&mut self.out, lot)?,
            Format::Json => {
                serde_json::to_writer(&mut self.out, lot)?;
                writeln!(self.out)?;
            }
        }
        Ok(true)
    }

    /// Write the closing total and hand back the writer.
    pub fn finish(mut self) -> io::Result<W> {
        match self.format {
            Format::Text => {
                writeln!(self.out, "{}", RULE)?;
                writeln!(self.out, "Voitto yhteensä:   {:.2}", self.total)?;
            }
            Format::Json => {
                let totals = Totals {
                    year: self.year,
                    lots: self.lots,
                    total_profit: self.total,
                };
                serde_json::to_writer(&mut self.out, &totals)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

fn write_form<W: Write>(w: &mut W, lot: &ClosedLot) -> io::Result<()> {
    let qty = lot.quantity as f64;
    writeln!(w, "{}", RULE)?;
    writeln!(w, "Arvopaperin nimi:  {}", lot.description)?;
    writeln!(w, "Lukumäärä:         {}", lot.quantity)?;
    writeln!(w, "Luovutusaika:      {}", fi_style_date(lot.sale_date()))?;
    writeln!(w, "Luovutushinta:     {:.2}", qty * lot.sale_price())?;
    writeln!(w, "Hankinta-aika:     {}", fi_style_date(lot.purchase_date()))?;
    writeln!(w, "Hankintahinta:     {:.2}", qty * lot.purchase_price())?;
    writeln!(w, "Hankintakulut:     {:.2}", lot.purchase_expense())?;
    writeln!(w, "Myyntikulut:       {:.2}", lot.sale_expense())?;
    let label = if lot.profit >= 0.0 { "Voitto" } else { "Tappio" };
    writeln!(w, "{}:            {:.2}", label, lot.profit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LotSide;
    use chrono::NaiveDate;

    fn lot(side: LotSide, closed: (i32, u32, u32), profit: f64) -> ClosedLot {
        ClosedLot {
            description: "GILEAD SCIENCES INC".into(),
            conid: "269".into(),
            side,
            quantity: 10,
            acquired_on: NaiveDate::from_ymd_opt(2017, 12, 1).unwrap(),
            acquisition_price: 60.0,
            closed_on: NaiveDate::from_ymd_opt(closed.0, closed.1, closed.2).unwrap(),
            disposal_price: 69.5,
            acquisition_expense: 1.0,
            disposal_expense: 0.25,
            profit,
        }
    }

    fn text(r: Report<Vec<u8>>) -> String {
        String::from_utf8(r.finish().unwrap()).unwrap()
    }

    #[test]
    fn long_lot_form() {
        let mut r = Report::new(Vec::new(), Format::Text, None);
        assert!(r.record(&lot(LotSide::Long, (2018, 6, 18), 93.75)).unwrap());
        let out = text(r);
        assert!(out.contains("Arvopaperin nimi:  GILEAD SCIENCES INC\n"));
        assert!(out.contains("Lukumäärä:         10\n"));
        assert!(out.contains("Luovutusaika:      18.06.2018\n"));
        assert!(out.contains("Luovutushinta:     695.00\n"));
        assert!(out.contains("Hankinta-aika:     01.12.2017\n"));
        assert!(out.contains("Hankintahinta:     600.00\n"));
        assert!(out.contains("Hankintakulut:     1.00\n"));
        assert!(out.contains("Myyntikulut:       0.25\n"));
        assert!(out.contains("Voitto:            93.75\n"));
        assert!(out.ends_with("Voitto yhteensä:   93.75\n"));
    }

    #[test]
    fn short_lot_swaps_sale_and_purchase() {
        let mut r = Report::new(Vec::new(), Format::Text, None);
        r.record(&lot(LotSide::Short, (2018, 6, 18), -96.25)).unwrap();
        let out = text(r);
        assert!(out.contains("Luovutusaika:      01.12.2017\n"));
        assert!(out.contains("Luovutushinta:     600.00\n"));
        assert!(out.contains("Hankinta-aika:     18.06.2018\n"));
        assert!(out.contains("Myyntikulut:       1.00\n"));
        assert!(out.contains("Tappio:            -96.25\n"));
    }

    #[test]
    fn other_years_are_left_out_of_the_total() {
        let mut r = Report::new(Vec::new(), Format::Text, Some(2018));
        assert!(!r.record(&lot(LotSide::Long, (2017, 12, 29), 500.0)).unwrap());
        assert!(r.record(&lot(LotSide::Long, (2018, 1, 2), 20.0)).unwrap());
        assert!(r.record(&lot(LotSide::Long, (2018, 12, 31), -5.0)).unwrap());
        assert!(!r.record(&lot(LotSide::Long, (2019, 1, 2), 7.0)).unwrap());
        assert_eq!(r.total(), 15.0);
        let out = text(r);
        assert_eq!(out.matches("Arvopaperin nimi").count(), 2);
        assert!(out.ends_with("Voitto yhteensä:   15.00\n"));
    }

    #[test]
    fn json_lines_end_with_totals() {
        let mut r = Report::new(Vec::new(), Format::Json, Some(2018));
        r.record(&lot(LotSide::Long, (2018, 6, 18), 93.75)).unwrap();
        let out = text(r);
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["side"], "Long");
        assert_eq!(lines[0]["closed_on"], "2018-06-18");
        assert_eq!(lines[1]["year"], 2018);
        assert_eq!(lines[1]["lots"], 1);
        assert_eq!(lines[1]["total_profit"], 93.75);
    }
}
