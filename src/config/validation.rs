//! Configuration validation.
//!
//! Returns every problem found, not just the first, so an operator can fix a file in one pass.

use alloy::primitives::Address;
use std::fmt;

use crate::config::schema::{EngineConfig, QueueConfig};
use crate::ledger::asset::{Chain, Currency};
use crate::queue::policy::Backoff;

/// A semantic problem in an otherwise well-formed config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check semantic constraints that serde cannot express.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (name, endpoint) in &config.chains {
        let field = format!("chains.{}", name);
        match name.parse::<Chain>() {
            Ok(chain) if !chain.is_evm() => {
                errors.push(ValidationError::new(&field, "only EVM chains have receipt providers"));
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new(&field, e)),
        }
        if endpoint.rpc_url.parse::<url::Url>().is_err() {
            errors.push(ValidationError::new(
                format!("{}.rpc_url", field),
                format!("invalid URL '{}'", endpoint.rpc_url),
            ));
        }
        if endpoint.rpc_timeout_secs == 0 {
            errors.push(ValidationError::new(format!("{}.rpc_timeout_secs", field), "must be > 0"));
        }
    }

    for (name, token) in &config.tokens {
        let field = format!("tokens.{}", name);
        let currency = match name.parse::<Currency>() {
            Ok(currency) => currency,
            Err(e) => {
                errors.push(ValidationError::new(&field, e));
                continue;
            }
        };
        if let Some(address) = &token.contract_address {
            if currency.is_native() {
                errors.push(ValidationError::new(
                    format!("{}.contract_address", field),
                    "native currencies have no contract",
                ));
            } else if address.parse::<Address>().is_err() {
                errors.push(ValidationError::new(
                    format!("{}.contract_address", field),
                    format!("invalid address '{}'", address),
                ));
            }
        }
        if matches!(token.decimals, Some(d) if d > 36) {
            errors.push(ValidationError::new(format!("{}.decimals", field), "must be <= 36"));
        }
    }

    if config.platform_wallet.private_key_env.trim().is_empty() {
        errors.push(ValidationError::new("platform_wallet.private_key_env", "must not be empty"));
    }
    if config.platform_wallet.submit_timeout_secs == 0 {
        errors.push(ValidationError::new("platform_wallet.submit_timeout_secs", "must be > 0"));
    }

    validate_queue("queues.verify_deposit", &config.queues.verify_deposit, &mut errors);
    validate_queue("queues.process_withdrawal", &config.queues.process_withdrawal, &mut errors);
    validate_queue("queues.process_prize_payout", &config.queues.process_prize_payout, &mut errors);

    if config.ledger.store_timeout_secs == 0 {
        errors.push(ValidationError::new("ledger.store_timeout_secs", "must be > 0"));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() || config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
            errors.push(ValidationError::new("admin.api_key", "must be set when the admin API is enabled"));
        }
        if config.admin.bind_address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "invalid socket address"));
        }
    }

    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new("observability.log_format", "must be 'pretty' or 'json'"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_queue(field: &str, queue: &QueueConfig, errors: &mut Vec<ValidationError>) {
    if queue.concurrency == 0 {
        errors.push(ValidationError::new(format!("{}.concurrency", field), "must be > 0"));
    }
    if queue.max_attempts == 0 {
        errors.push(ValidationError::new(format!("{}.max_attempts", field), "must be >= 1"));
    }
    if let Backoff::Exponential { base_ms, max_ms } = queue.backoff {
        if base_ms > max_ms {
            errors.push(ValidationError::new(format!("{}.backoff", field), "base_ms exceeds max_ms"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ChainEndpointConfig, TokenConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_non_evm_chain_rejected() {
        let mut config = EngineConfig::default();
        config.chains.insert("tron".into(), ChainEndpointConfig::default());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "chains.tron");
    }

    #[test]
    fn test_token_checks() {
        let mut config = EngineConfig::default();
        config.tokens.insert(
            "ETH".into(),
            TokenConfig {
                contract_address: Some("0x0000000000000000000000000000000000000001".into()),
                decimals: None,
            },
        );
        config.tokens.insert(
            "USDC_ETH".into(),
            TokenConfig {
                contract_address: Some("0xnothex".into()),
                decimals: Some(40),
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_admin_requires_real_key() {
        let mut config = EngineConfig::default();
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "admin.api_key"));
    }

    #[test]
    fn test_queue_bounds() {
        let mut config = EngineConfig::default();
        config.queues.verify_deposit.concurrency = 0;
        config.queues.process_prize_payout.backoff = Backoff::Exponential { base_ms: 10, max_ms: 1 };

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].to_string(), "queues.verify_deposit.concurrency: must be > 0");
    }
}
