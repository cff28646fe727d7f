//! Facilitator service: wires configuration, ledger and HTTP server together.

use crate::api::{self, AppState};
use crate::config::FacilitatorConfig;
use crate::error::{Error, Result};
use crate::event::{create_event_channel, FacilitatorEvent, FacilitatorEventsChannel, FacilitatorEventsSender};
use crate::ledger::{AptosLedger, InMemoryLedger, NonceLedger, SponsoredSubmitter, TransactionLookup};
use crate::payment::signature::derive_address;
use crate::payment::{Address, AuthorizationFacilitator, FacilitatorSettings, ReplayGuard, StrandedNonce};
use axum::Router;
use ed25519_dalek::SigningKey;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// The ledger collaborators, possibly all backed by one object.
struct Collaborators {
    nonces: Arc<dyn NonceLedger>,
    submitter: Arc<dyn SponsoredSubmitter>,
    lookup: Arc<dyn TransactionLookup>,
}

impl Collaborators {
    fn from_ledger<L>(ledger: Arc<L>) -> Self
    where
        L: NonceLedger + SponsoredSubmitter + TransactionLookup + 'static,
    {
        Self {
            nonces: ledger.clone(),
            submitter: ledger.clone(),
            lookup: ledger,
        }
    }
}

/// Builder for constructing a facilitator service.
pub struct FacilitatorBuilder {
    config: FacilitatorConfig,
    signing_key: SigningKey,
    ledger: Option<Collaborators>,
}

impl FacilitatorBuilder {
    /// Create a builder; `signing_key` is the gas-paying facilitator account.
    #[must_use]
    pub fn new(config: FacilitatorConfig, signing_key: SigningKey) -> Self {
        Self {
            config,
            signing_key,
            ledger: None,
        }
    }

    /// Use `ledger` instead of the one selected by the configuration.
    #[must_use]
    pub fn with_ledger<L>(mut self, ledger: Arc<L>) -> Self
    where
        L: NonceLedger + SponsoredSubmitter + TransactionLookup + 'static,
    {
        self.ledger = Some(Collaborators::from_ledger(ledger));
        self
    }

    /// Build the facilitator and bind its listener.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger client cannot be created or the
    /// listen address cannot be bound.
    pub async fn build(self) -> Result<RunningFacilitator> {
        info!(
            port = self.config.port,
            offline = self.config.offline,
            network = self.config.ledger.network.as_str(),
            "Building gasless-facilitator"
        );

        let facilitator_address = derive_address(self.signing_key.verifying_key().as_bytes());
        let module_address = self.config.ledger.module_address.unwrap_or(facilitator_address);

        let ledger = match self.ledger {
            Some(ledger) => ledger,
            None if self.config.offline => {
                warn!("Offline mode: using in-memory ledger, no transactions reach the chain");
                Collaborators::from_ledger(Arc::new(InMemoryLedger::new()))
            }
            None => Collaborators::from_ledger(Arc::new(AptosLedger::new(
                self.config.ledger.clone(),
                self.signing_key.clone(),
            )?)),
        };

        let (events_tx, events_rx) = create_event_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let guard = ReplayGuard::new(ledger.nonces, self.config.payment.ledger_error_policy);
        let settings = FacilitatorSettings::new(&self.config.payment, self.config.ledger.network, module_address);
        let facilitator = Arc::new(AuthorizationFacilitator::new(
            guard,
            ledger.submitter,
            ledger.lookup,
            settings,
            events_tx.clone(),
        ));

        let bind = SocketAddr::new(self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|e| Error::Server(format!("Failed to bind {bind}: {e}")))?;
        let local_addr = listener.local_addr()?;

        let app = api::router(Arc::new(AppState {
            facilitator: Arc::clone(&facilitator),
            facilitator_address,
        }));

        Ok(RunningFacilitator {
            listener,
            local_addr,
            app,
            facilitator,
            facilitator_address,
            shutdown: ShutdownHandle(Arc::new(shutdown_tx)),
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// Requests a running facilitator to stop.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    /// Request shutdown. In-flight requests are allowed to finish.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

/// A facilitator with a bound listener, ready to serve.
pub struct RunningFacilitator {
    listener: TcpListener,
    local_addr: SocketAddr,
    app: Router,
    facilitator: Arc<AuthorizationFacilitator>,
    facilitator_address: Address,
    shutdown: ShutdownHandle,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: FacilitatorEventsSender,
    events_rx: Option<FacilitatorEventsChannel>,
}

impl RunningFacilitator {
    /// Address the HTTP server is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Account paying gas for sponsored transactions.
    #[must_use]
    pub const fn facilitator_address(&self) -> &Address {
        &self.facilitator_address
    }

    /// The facilitator behind the HTTP routes.
    #[must_use]
    pub fn facilitator(&self) -> Arc<AuthorizationFacilitator> {
        Arc::clone(&self.facilitator)
    }

    /// Get a receiver for facilitator events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<FacilitatorEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to facilitator events.
    #[must_use]
    pub fn subscribe_events(&self) -> FacilitatorEventsChannel {
        self.events_tx.subscribe()
    }

    /// Handle that stops [`run`](Self::run) from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Request the facilitator to shut down.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Serve HTTP until shutdown is requested or Ctrl-C is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails.
    pub async fn run(self) -> Result<()> {
        info!(address = %self.local_addr, facilitator = %self.facilitator_address, "Facilitator listening");
        let _ = self.events_tx.send(FacilitatorEvent::Started {
            address: self.local_addr,
        });

        let mut shutdown_rx = self.shutdown_rx;
        let signal = async move {
            tokio::select! {
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    info!("Shutdown signal received");
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                }
            }
        };

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| Error::Server(e.to_string()))?;

        let _ = self.events_tx.send(FacilitatorEvent::ShuttingDown);

        let stats = self.facilitator.replay_stats();
        let stranded = self.facilitator.stranded_nonces();
        report_stranded(&stranded);
        info!(
            cached_nonces = stats.cache.insertions,
            cache_hit_rate = stats.cache.hit_rate(),
            ledger_queries = stats.ledger_queries,
            ledger_errors = stats.ledger_errors,
            "Facilitator shutdown complete"
        );
        Ok(())
    }
}

/// Repeat every stranded nonce under the `reconciliation` target.
fn report_stranded(stranded: &[StrandedNonce]) {
    if stranded.is_empty() {
        return;
    }
    warn!(
        target: "reconciliation",
        count = stranded.len(),
        "Shutting down with stranded nonces awaiting reconciliation"
    );
    for entry in stranded {
        warn!(
            target: "reconciliation",
            sender = %entry.sender,
            nonce = entry.nonce,
            recipient = %entry.recipient,
            amount = entry.amount,
            cause = %entry.cause,
            at = entry.at,
            "Stranded nonce"
        );
    }
}
