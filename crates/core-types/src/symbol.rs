use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    Hk,
    Us,
    A,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Market::Hk => "HK",
            Market::Us => "US",
            Market::A => "A",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Market {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HK" => Ok(Market::Hk),
            "US" => Ok(Market::Us),
            "A" | "SH" | "SZ" => Ok(Market::A),
            other => Err(CoreError::InvalidInput(format!("unknown market {other}"))),
        }
    }
}

/// Canonical `MARKET.CODE` symbol identifier (spec.md §3). A-share codes
/// originating as `SH.*`/`SZ.*` are normalized to `market=A` here, at
/// parse time, so every downstream component only ever sees the
/// normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub market: Market,
    pub code: String,
}

impl Symbol {
    pub fn new(market: Market, code: impl Into<String>) -> Self {
        Self { market, code: code.into() }
    }

    /// Parse the canonical `MARKET.CODE` form, or a bare code with market
    /// inference: 6-digit numeric codes infer `A` (SH/SZ normalized),
    /// 5-digit numeric codes infer `HK`, anything else infers `US`.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CoreError::InvalidInput("empty symbol".into()));
        }

        if let Some((prefix, code)) = input.split_once('.') {
            let market: Market = prefix.parse()?;
            if code.is_empty() {
                return Err(CoreError::InvalidInput(format!("empty code in {input}")));
            }
            return Ok(Symbol::new(market, code));
        }

        let market = if input.len() == 6 && input.chars().all(|c| c.is_ascii_digit()) {
            Market::A
        } else if input.len() == 5 && input.chars().all(|c| c.is_ascii_digit()) {
            Market::Hk
        } else {
            Market::Us
        };
        Ok(Symbol::new(market, input))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.market, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_form() {
        let s = Symbol::parse("HK.00700").unwrap();
        assert_eq!(s.market, Market::Hk);
        assert_eq!(s.code, "00700");
    }

    #[test]
    fn normalizes_sh_sz_to_a() {
        let sh = Symbol::parse("SH.600519").unwrap();
        let sz = Symbol::parse("SZ.000001").unwrap();
        assert_eq!(sh.market, Market::A);
        assert_eq!(sz.market, Market::A);
    }

    #[test]
    fn infers_market_for_bare_codes() {
        assert_eq!(Symbol::parse("AAPL").unwrap().market, Market::Us);
        assert_eq!(Symbol::parse("00700").unwrap().market, Market::Hk);
        assert_eq!(Symbol::parse("600519").unwrap().market, Market::A);
    }

    #[test]
    fn rejects_empty_code() {
        assert!(Symbol::parse("HK.").is_err());
        assert!(Symbol::parse("").is_err());
    }

    #[test]
    fn rejects_unknown_market_prefix() {
        assert!(Symbol::parse("ZZ.1234").is_err());
    }
}
