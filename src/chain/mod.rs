//! Chain read side.
//!
//! # Data Flow
//! ```text
//! [chains.*] config
//!     → registry.rs (one client per EVM chain)
//!     → client.rs (failover JSON-RPC, receipt lookups)
//!     → deposit verification
//! ```

pub mod client;
pub mod registry;
pub mod types;

pub use client::{ChainClient, ReceiptSource};
pub use registry::ProviderRegistry;
pub use types::{ChainError, ChainResult, ReceiptOutcome};
