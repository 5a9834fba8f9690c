//! EVM payment signer.
//!
//! Native currencies are sent as value transfers; tokens as ERC-20 `transfer` calls.
//! One signing provider per configured EVM chain. Submissions are serialized through
//! a single lock so nonces are assigned in order.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::schema::EngineConfig;
use crate::ledger::asset::{Chain, Currency};
use crate::resilience::timeouts::with_deadline;
use crate::signer::wallet::PlatformWallet;
use crate::signer::{PaymentRequest, PaymentSigner, SignerError, SignerResult};

sol! {
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Contract and precision for one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TokenSpec {
    contract: Option<Address>,
    decimals: u32,
}

/// Convert a decimal amount to integer base units. `None` when the amount is negative
/// or carries more fractional digits than `decimals`.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Option<U256> {
    if amount.is_sign_negative() {
        return None;
    }
    let normalized = amount.normalize();
    let scale = normalized.scale();
    if scale > decimals {
        return None;
    }
    let mantissa = u128::try_from(normalized.mantissa()).ok()?;
    let factor = U256::from(10u64).checked_pow(U256::from(decimals - scale))?;
    U256::from(mantissa).checked_mul(factor)
}

pub struct EvmSigner {
    from: Address,
    providers: HashMap<Chain, Arc<dyn Provider + Send + Sync>>,
    tokens: HashMap<Currency, TokenSpec>,
    submit_timeout: Duration,
    submission: Mutex<()>,
}

impl EvmSigner {
    /// Build a signing provider for every configured EVM chain.
    pub fn new(wallet: &PlatformWallet, config: &EngineConfig) -> SignerResult<Self> {
        let mut providers: HashMap<Chain, Arc<dyn Provider + Send + Sync>> = HashMap::new();
        for (name, endpoint) in &config.chains {
            let Ok(chain) = name.parse::<Chain>() else {
                continue;
            };
            if !chain.is_evm() {
                continue;
            }
            let url: url::Url = endpoint
                .rpc_url
                .parse()
                .map_err(|e| SignerError::Rpc(format!("Invalid RPC URL '{}': {}", endpoint.rpc_url, e)))?;
            let provider = ProviderBuilder::new()
                .wallet(EthereumWallet::from(wallet.signer()))
                .connect_http(url);
            providers.insert(chain, Arc::new(provider));
        }

        let mut tokens = HashMap::new();
        for currency in Currency::ALL.iter() {
            let configured = config.tokens.get(currency.as_str());
            let contract = match configured.and_then(|t| t.contract_address.as_deref()) {
                Some(address) => Some(
                    address
                        .parse::<Address>()
                        .map_err(|_| SignerError::InvalidAddress(address.to_string()))?,
                ),
                None => None,
            };
            let decimals = configured
                .and_then(|t| t.decimals)
                .unwrap_or_else(|| currency.default_decimals());
            tokens.insert(*currency, TokenSpec { contract, decimals });
        }

        tracing::info!(
            address = %wallet.address(),
            chains = providers.len(),
            "EVM signer ready"
        );

        Ok(Self {
            from: wallet.address(),
            providers,
            tokens,
            submit_timeout: Duration::from_secs(config.platform_wallet.submit_timeout_secs),
            submission: Mutex::new(()),
        })
    }

    /// Translate a payment into an unsigned transaction request.
    fn build_request(&self, request: &PaymentRequest) -> SignerResult<TransactionRequest> {
        if !request.currency.is_supported_on(request.chain) {
            return Err(SignerError::UnsupportedCurrency {
                currency: request.currency,
                chain: request.chain,
            });
        }
        let to: Address = request
            .to_address
            .parse()
            .map_err(|_| SignerError::InvalidAddress(request.to_address.clone()))?;

        let token = self
            .tokens
            .get(&request.currency)
            .copied()
            .unwrap_or(TokenSpec {
                contract: None,
                decimals: request.currency.default_decimals(),
            });
        let units = to_base_units(request.amount, token.decimals).ok_or(SignerError::AmountPrecision {
            amount: request.amount,
            decimals: token.decimals,
        })?;

        let tx = TransactionRequest::default().with_from(self.from);
        if request.currency.is_native() {
            return Ok(tx.with_to(to).with_value(units));
        }

        let contract = token.contract.ok_or(SignerError::NoTokenContract(request.currency))?;
        let data = IERC20::transferCall { to, amount: units }.abi_encode();
        Ok(tx.with_to(contract).with_input(Bytes::from(data)))
    }
}

#[async_trait]
impl PaymentSigner for EvmSigner {
    async fn submit(&self, request: &PaymentRequest) -> SignerResult<String> {
        let provider = self
            .providers
            .get(&request.chain)
            .cloned()
            .ok_or(SignerError::UnsupportedChain(request.chain))?;
        let tx = self.build_request(request)?;

        let _guard = self.submission.lock().await;
        let pending = with_deadline("payment submission", self.submit_timeout, provider.send_transaction(tx))
            .await
            .map_err(|e| SignerError::Timeout(e.secs))?
            .map_err(|e| SignerError::Rpc(e.to_string()))?;

        let tx_hash = format!("{:#x}", pending.tx_hash());
        tracing::info!(
            tx_hash = %tx_hash,
            chain = %request.chain,
            currency = %request.currency,
            amount = %request.amount,
            "Payment broadcast"
        );
        Ok(tx_hash)
    }
}

impl std::fmt::Debug for EvmSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmSigner")
            .field("from", &self.from)
            .field("chains", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}
