//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Build ledger, queue, providers, signer → Spawn worker pools → Admin API
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Workers finish in-flight job → Snapshot queue and ledger → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Engine, StartupError};
