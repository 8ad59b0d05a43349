//! Option contract multiplier lookup (spec.md §6): `{market, code_prefix ->
//! multiplier}`, process-local configuration with no persistence of its own.
//! Default for an unmatched symbol is 100 for US, 1 for everything else —
//! and 1 always for stock instruments, which carry no multiplier.

use core_types::{Instrument, Market};
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct MultiplierTable {
    entries: HashMap<(Market, String), Decimal>,
}

impl Default for MultiplierTable {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl MultiplierTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, market: Market, code_prefix: impl Into<String>, multiplier: Decimal) -> Self {
        self.entries.insert((market, code_prefix.into()), multiplier);
        self
    }

    /// Longest-matching `code_prefix` under `market` wins; falls back to the
    /// spec's default (100 for US, 1 otherwise) for unmatched options, and
    /// 1 unconditionally for stock.
    pub fn lookup(&self, market: Market, code: &str, instrument: Instrument) -> Decimal {
        if instrument == Instrument::Stock {
            return Decimal::ONE;
        }
        let best = self
            .entries
            .iter()
            .filter(|((m, prefix), _)| *m == market && code.starts_with(prefix.as_str()))
            .max_by_key(|((_, prefix), _)| prefix.len());
        match best {
            Some((_, mult)) => *mult,
            None => match market {
                Market::Us => Decimal::from(100),
                _ => Decimal::ONE,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_instrument_always_multiplies_by_one() {
        let table = MultiplierTable::new();
        assert_eq!(table.lookup(Market::Us, "AAPL", Instrument::Stock), Decimal::ONE);
    }

    #[test]
    fn unknown_us_option_defaults_to_100() {
        let table = MultiplierTable::new();
        let mult = table.lookup(Market::Us, "AAPL240119C00150000", Instrument::Option);
        assert_eq!(mult, Decimal::from(100));
    }

    #[test]
    fn unknown_non_us_option_defaults_to_1() {
        let table = MultiplierTable::new();
        let mult = table.lookup(Market::Hk, "00700240119C00500000", Instrument::Option);
        assert_eq!(mult, Decimal::ONE);
    }

    #[test]
    fn explicit_entry_overrides_default() {
        let table = MultiplierTable::new().with_entry(Market::Us, "SPX", Decimal::from(100));
        assert_eq!(table.lookup(Market::Us, "SPX240119C04500000", Instrument::Option), Decimal::from(100));
    }

    #[test]
    fn longest_prefix_wins_over_shorter_match() {
        let table = MultiplierTable::new()
            .with_entry(Market::Us, "A", Decimal::from(10))
            .with_entry(Market::Us, "AAPL", Decimal::from(100));
        assert_eq!(table.lookup(Market::Us, "AAPL240119C00150000", Instrument::Option), Decimal::from(100));
    }
}
