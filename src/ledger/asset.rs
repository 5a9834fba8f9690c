//! Chains and chain-qualified currencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A blockchain the platform accepts funds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Polygon,
    Bsc,
    Arbitrum,
    Base,
    Tron,
    Bitcoin,
    Solana,
}

impl Chain {
    pub const ALL: [Chain; 8] = [
        Chain::Ethereum,
        Chain::Polygon,
        Chain::Bsc,
        Chain::Arbitrum,
        Chain::Base,
        Chain::Tron,
        Chain::Bitcoin,
        Chain::Solana,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Polygon => "polygon",
            Chain::Bsc => "bsc",
            Chain::Arbitrum => "arbitrum",
            Chain::Base => "base",
            Chain::Tron => "tron",
            Chain::Bitcoin => "bitcoin",
            Chain::Solana => "solana",
        }
    }

    /// Whether the chain speaks the Ethereum JSON-RPC dialect.
    pub fn is_evm(&self) -> bool {
        matches!(
            self,
            Chain::Ethereum | Chain::Polygon | Chain::Bsc | Chain::Arbitrum | Chain::Base
        )
    }

    /// Currencies that can be moved on this chain.
    pub fn currencies(&self) -> Vec<Currency> {
        Currency::ALL
            .iter()
            .copied()
            .filter(|c| c.is_supported_on(*self))
            .collect()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Chain::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown chain '{}'", s))
    }
}

/// A token identifier qualified by the chain it lives on.
///
/// `USDT_ETH` and `USDT_TRON` are distinct currencies and never share a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Currency {
    Eth,
    Btc,
    Bnb,
    Sol,
    Matic,
    Trx,
    UsdtEth,
    UsdtTron,
    UsdtBsc,
    UsdcEth,
    UsdcPolygon,
    UsdcArb,
    UsdcBase,
}

impl Currency {
    pub const ALL: [Currency; 13] = [
        Currency::Eth,
        Currency::Btc,
        Currency::Bnb,
        Currency::Sol,
        Currency::Matic,
        Currency::Trx,
        Currency::UsdtEth,
        Currency::UsdtTron,
        Currency::UsdtBsc,
        Currency::UsdcEth,
        Currency::UsdcPolygon,
        Currency::UsdcArb,
        Currency::UsdcBase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Eth => "ETH",
            Currency::Btc => "BTC",
            Currency::Bnb => "BNB",
            Currency::Sol => "SOL",
            Currency::Matic => "MATIC",
            Currency::Trx => "TRX",
            Currency::UsdtEth => "USDT_ETH",
            Currency::UsdtTron => "USDT_TRON",
            Currency::UsdtBsc => "USDT_BSC",
            Currency::UsdcEth => "USDC_ETH",
            Currency::UsdcPolygon => "USDC_POLYGON",
            Currency::UsdcArb => "USDC_ARB",
            Currency::UsdcBase => "USDC_BASE",
        }
    }

    /// Chains the currency can be deposited or withdrawn on. The first entry is its home chain.
    pub fn chains(&self) -> &'static [Chain] {
        match self {
            Currency::Eth => &[Chain::Ethereum, Chain::Arbitrum, Chain::Base],
            Currency::Btc => &[Chain::Bitcoin],
            Currency::Bnb => &[Chain::Bsc],
            Currency::Sol => &[Chain::Solana],
            Currency::Matic => &[Chain::Polygon],
            Currency::Trx => &[Chain::Tron],
            Currency::UsdtEth => &[Chain::Ethereum],
            Currency::UsdtTron => &[Chain::Tron],
            Currency::UsdtBsc => &[Chain::Bsc],
            Currency::UsdcEth => &[Chain::Ethereum],
            Currency::UsdcPolygon => &[Chain::Polygon],
            Currency::UsdcArb => &[Chain::Arbitrum],
            Currency::UsdcBase => &[Chain::Base],
        }
    }

    /// Chain prize payouts in this currency are sent on.
    pub fn home_chain(&self) -> Chain {
        self.chains()[0]
    }

    pub fn is_supported_on(&self, chain: Chain) -> bool {
        self.chains().contains(&chain)
    }

    /// Native gas asset rather than a token contract.
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            Currency::Eth
                | Currency::Btc
                | Currency::Bnb
                | Currency::Sol
                | Currency::Matic
                | Currency::Trx
        )
    }

    /// Base-unit decimals used when no override is configured.
    pub fn default_decimals(&self) -> u32 {
        match self {
            Currency::Eth | Currency::Bnb | Currency::Matic | Currency::UsdtBsc => 18,
            Currency::Btc => 8,
            Currency::Sol => 9,
            Currency::Trx
            | Currency::UsdtEth
            | Currency::UsdtTron
            | Currency::UsdcEth
            | Currency::UsdcPolygon
            | Currency::UsdcArb
            | Currency::UsdcBase => 6,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown currency '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_qualified_currencies_are_distinct() {
        assert_ne!(Currency::UsdtEth, Currency::UsdtTron);
        assert_eq!(Currency::UsdtEth.home_chain(), Chain::Ethereum);
        assert_eq!(Currency::UsdtTron.home_chain(), Chain::Tron);
    }

    #[test]
    fn test_parse_round_trip_names() {
        assert_eq!("usdc_polygon".parse::<Currency>().unwrap(), Currency::UsdcPolygon);
        assert_eq!("Ethereum".parse::<Chain>().unwrap(), Chain::Ethereum);
        assert!("xrp".parse::<Chain>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Currency::UsdtEth).unwrap();
        assert_eq!(json, "\"USDT_ETH\"");
        let json = serde_json::to_string(&Chain::Bsc).unwrap();
        assert_eq!(json, "\"bsc\"");
    }

    #[test]
    fn test_chain_catalogue() {
        let eth = Chain::Ethereum.currencies();
        assert_eq!(eth, vec![Currency::Eth, Currency::UsdtEth, Currency::UsdcEth]);
        assert!(Currency::Eth.is_supported_on(Chain::Base));
        assert!(!Currency::Matic.is_supported_on(Chain::Ethereum));
        assert!(!Chain::Tron.is_evm());
    }
}
