//! Currency conversion (spec.md §4.?, referenced by floors, adjuster,
//! bid normalisation). Grounded on SPEC_FULL.md §5: swap-pointer of an
//! immutable rate snapshot, refreshed off the hot path, read without
//! locking, following the teacher's `arc_swap` usage in
//! `core/managers/publishers.rs`.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CurrencyTable {
    /// Multiplier to convert 1 unit of `from` into `to`: `rates[(from,to)]`.
    rates: HashMap<(String, String), f64>,
}

impl CurrencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        self.rates.insert((from.to_uppercase(), to.to_uppercase()), rate);
        self
    }

    fn direct(&self, from: &str, to: &str) -> Option<f64> {
        self.rates.get(&(from.to_uppercase(), to.to_uppercase())).copied()
    }

    pub fn rate(&self, from: &str, to: &str) -> Option<f64> {
        if from.eq_ignore_ascii_case(to) {
            return Some(1.0);
        }
        if let Some(r) = self.direct(from, to) {
            return Some(r);
        }
        // fall back to the inverse of a known rate in the other direction
        self.direct(to, from).map(|r| 1.0 / r)
    }

    pub fn known(&self, code: &str) -> bool {
        code.eq_ignore_ascii_case("USD")
            || self
                .rates
                .keys()
                .any(|(a, b)| a.eq_ignore_ascii_case(code) || b.eq_ignore_ascii_case(code))
    }
}

#[derive(Debug, Clone)]
pub enum ConversionError {
    UnknownCurrency(String),
}

/// Hot-path reader of the latest refreshed rate snapshot; writers (a
/// periodic background refresh task, out of core) replace the pointer
/// wholesale.
pub struct CurrencyConverter {
    table: ArcSwap<CurrencyTable>,
}

impl CurrencyConverter {
    pub fn new(table: CurrencyTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    pub fn refresh(&self, table: CurrencyTable) {
        self.table.store(Arc::new(table));
    }

    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, ConversionError> {
        let table = self.table.load();
        match table.rate(from, to) {
            Some(rate) => Ok(amount * rate),
            None => Err(ConversionError::UnknownCurrency(from.to_string())),
        }
    }

    pub fn known(&self, code: &str) -> bool {
        self.table.load().known(code)
    }
}

impl Default for CurrencyConverter {
    fn default() -> Self {
        Self::new(CurrencyTable::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_currency_is_identity() {
        let conv = CurrencyConverter::default();
        assert_eq!(conv.convert(5.0, "USD", "USD").unwrap(), 5.0);
    }

    #[test]
    fn scenario_e_eur_to_usd() {
        let conv = CurrencyConverter::new(CurrencyTable::new().with_rate("EUR", "USD", 1.10));
        let converted = conv.convert(1.00, "EUR", "USD").unwrap();
        assert!((converted - 1.10).abs() < 1e-9);
    }

    #[test]
    fn inverse_rate_is_derived() {
        let conv = CurrencyConverter::new(CurrencyTable::new().with_rate("EUR", "USD", 2.0));
        let converted = conv.convert(10.0, "USD", "EUR").unwrap();
        assert!((converted - 5.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_currency_errors() {
        let conv = CurrencyConverter::default();
        assert!(conv.convert(1.0, "XYZ", "USD").is_err());
    }
}
