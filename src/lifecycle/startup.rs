//! Startup orchestration.
//!
//! Subsystems are built in dependency order: ledger and queue (restored from their
//! snapshots), chain providers, the platform signer, then the service and worker pools.
//! A missing signer or chain provider does not stop startup; jobs that need them fail
//! with a configuration error instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::admin::{setup_admin_router, AdminState};
use crate::chain::registry::ProviderRegistry;
use crate::config::schema::EngineConfig;
use crate::ledger::memory::MemoryLedger;
use crate::ledger::store::LedgerError;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::wait_for_signal;
use crate::payments::processor::WalletProcessor;
use crate::queue::job::JobKind;
use crate::queue::memory::{MemoryQueue, QueueError};
use crate::queue::worker::WorkerPool;
use crate::service::{JobPolicies, WalletService};
use crate::signer::{EvmSigner, PaymentSigner, PlatformWallet, SignerError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    #[error("signer: {0}")]
    Signer(#[from] SignerError),

    #[error("admin listener: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully wired engine.
pub struct Engine {
    config: EngineConfig,
    ledger: MemoryLedger,
    queue: MemoryQueue,
    providers: ProviderRegistry,
    signer: Option<Arc<dyn PaymentSigner>>,
    service: WalletService,
    shutdown: Shutdown,
    started_at: Instant,
}

impl Engine {
    /// Build every subsystem from configuration.
    pub async fn build(config: EngineConfig) -> Result<Self, StartupError> {
        let ledger = match &config.ledger.snapshot_path {
            Some(path) => MemoryLedger::load_from_file(&PathBuf::from(path))?,
            None => MemoryLedger::default(),
        };
        let queue = match &config.queues.snapshot_path {
            Some(path) => MemoryQueue::load_from_file(&PathBuf::from(path))?,
            None => MemoryQueue::default(),
        };
        let providers = ProviderRegistry::connect(&config).await;

        let signer: Option<Arc<dyn PaymentSigner>> =
            match PlatformWallet::from_env(&config.platform_wallet.private_key_env) {
                Ok(wallet) => Some(Arc::new(EvmSigner::new(&wallet, &config)?)),
                Err(SignerError::NotConfigured) => {
                    tracing::warn!(
                        env = %config.platform_wallet.private_key_env,
                        "Platform wallet not configured; withdrawals and prize payouts will fail"
                    );
                    None
                }
                Err(e) => return Err(e.into()),
            };

        Ok(Self::with_parts(config, ledger, queue, providers, signer))
    }

    /// Assemble an engine from prebuilt parts.
    pub fn with_parts(
        config: EngineConfig,
        ledger: MemoryLedger,
        queue: MemoryQueue,
        providers: ProviderRegistry,
        signer: Option<Arc<dyn PaymentSigner>>,
    ) -> Self {
        let service = WalletService::new(
            Arc::new(ledger.clone()),
            Arc::new(queue.clone()),
            JobPolicies::from(&config.queues),
        );
        Self {
            config,
            ledger,
            queue,
            providers,
            signer,
            service,
            shutdown: Shutdown::new(),
            started_at: Instant::now(),
        }
    }

    pub fn service(&self) -> &WalletService {
        &self.service
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    pub fn queue(&self) -> &MemoryQueue {
        &self.queue
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn admin_state(&self) -> AdminState {
        AdminState {
            ledger: Arc::new(self.ledger.clone()),
            queue: Arc::new(self.queue.clone()),
            providers: self.providers.clone(),
            signer_configured: self.signer.is_some(),
            api_key: Arc::from(self.config.admin.api_key.as_str()),
            started_at: self.started_at,
            review_after: Duration::from_secs(self.config.admin.review_after_secs),
        }
    }

    /// Spawn one worker pool per job kind.
    pub fn start_workers(&self) -> Vec<JoinHandle<()>> {
        let processor = Arc::new(WalletProcessor::new(
            Arc::new(self.ledger.clone()),
            self.providers.clone(),
            self.signer.clone(),
            Duration::from_secs(self.config.ledger.store_timeout_secs),
        ));

        let queues = &self.config.queues;
        let pools = [
            (JobKind::VerifyDeposit, queues.verify_deposit.concurrency),
            (JobKind::ProcessWithdrawal, queues.process_withdrawal.concurrency),
            (JobKind::ProcessPrizePayout, queues.process_prize_payout.concurrency),
        ];

        pools
            .into_iter()
            .flat_map(|(kind, concurrency)| {
                WorkerPool::new(kind, concurrency, Arc::new(self.queue.clone()), processor.clone())
                    .spawn(&self.shutdown)
            })
            .collect()
    }

    /// Run until SIGINT/SIGTERM or an explicit trigger, then drain and snapshot.
    pub async fn run(self) -> Result<(), StartupError> {
        let mut stop = self.shutdown.subscribe();
        let mut tasks = self.start_workers();

        if self.config.admin.enabled {
            let listener = tokio::net::TcpListener::bind(&self.config.admin.bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Admin API listening");

            let router = setup_admin_router(self.admin_state());
            let mut admin_stop = self.shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                    let _ = admin_stop.recv().await;
                });
                if let Err(e) = server.await {
                    tracing::error!(error = %e, "Admin API stopped with error");
                }
            }));
        }

        tokio::spawn(wait_for_signal(self.shutdown.clone()));
        tracing::info!("Wallet engine running");

        if !self.shutdown.is_triggered() {
            let _ = stop.recv().await;
        }

        tracing::info!("Draining workers");
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Task panicked during shutdown");
            }
        }

        self.snapshot();
        tracing::info!("Shutdown complete");
        Ok(())
    }

    /// Persist the queue and ledger where snapshot paths are configured.
    pub fn snapshot(&self) {
        if let Err(e) = self.queue.save_to_file() {
            tracing::error!(error = %e, "Failed to save queue snapshot");
        }
        if let Err(e) = self.ledger.save_to_file() {
            tracing::error!(error = %e, "Failed to save ledger snapshot");
        }
    }
}
