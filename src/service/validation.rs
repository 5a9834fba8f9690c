//! Request validation at the service boundary.

use alloy::primitives::Address;
use rust_decimal::Decimal;

use crate::ledger::asset::{Chain, Currency};
use crate::ledger::store::PageRequest;

const BASE58: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

pub const MAX_PAGE_LIMIT: u32 = 100;

/// Smallest withdrawal accepted.
pub fn min_withdrawal() -> Decimal {
    Decimal::new(1, 3)
}

/// Whether `address` is well formed for the chain's address family.
pub fn is_valid_address(chain: Chain, address: &str) -> bool {
    match chain {
        Chain::Ethereum | Chain::Polygon | Chain::Bsc | Chain::Arbitrum | Chain::Base => is_evm_address(address),
        Chain::Bitcoin => is_bitcoin_address(address),
        Chain::Solana => (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58.contains(c)),
        Chain::Tron => {
            address.len() == 34
                && address.starts_with('T')
                && address.chars().all(|c| c.is_ascii_alphanumeric())
        }
    }
}

fn is_evm_address(address: &str) -> bool {
    let Some(hex) = address.strip_prefix("0x") else {
        return false;
    };
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let mixed_case = hex.chars().any(|c| c.is_ascii_uppercase()) && hex.chars().any(|c| c.is_ascii_lowercase());
    if mixed_case {
        Address::parse_checksummed(address, None).is_ok()
    } else {
        true
    }
}

fn is_bitcoin_address(address: &str) -> bool {
    let rest = if let Some(rest) = address.strip_prefix("bc1") {
        rest
    } else if address.starts_with('1') || address.starts_with('3') {
        &address[1..]
    } else {
        return false;
    };
    // Same alphabet as base58 with the upper-case letters the original format allows.
    (25..=62).contains(&rest.len())
        && rest
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || (c.is_ascii_uppercase() && c != 'I' && c != 'O'))
}

/// EVM transaction hashes are 0x plus 32 bytes of hex; other chains only need a
/// non-blank alphanumeric identifier.
pub fn is_valid_tx_hash(chain: Chain, tx_hash: &str) -> bool {
    if chain.is_evm() {
        tx_hash
            .strip_prefix("0x")
            .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
    } else {
        !tx_hash.is_empty() && tx_hash.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

pub fn check_currency(currency: Currency, chain: Chain) -> Result<(), String> {
    if currency.is_supported_on(chain) {
        Ok(())
    } else {
        Err(format!("{} is not supported on {}", currency, chain))
    }
}

pub fn check_page(request: &PageRequest) -> Result<(), String> {
    if request.page < 1 {
        return Err("page must be at least 1".to_string());
    }
    if request.limit < 1 || request.limit > MAX_PAGE_LIMIT {
        return Err(format!("limit must be between 1 and {}", MAX_PAGE_LIMIT));
    }
    Ok(())
}
