//! The authorization facilitator.
//!
//! Issues intents, and accepts signed authorizations in a fixed order:
//!
//! 1. required fields present
//! 2. not expired, nonce not consumed ([`ReplayGuard::validate`])
//! 3. public key bound to the sender, signature valid
//! 4. nonce claimed (at most one concurrent request wins)
//! 5. sponsored submission
//!
//! Steps 1 to 4 have no side effects on rejection. A failure in step 5
//! leaves the nonce consumed; it is recorded as a [`StrandedNonce`] for
//! reconciliation.

use crate::config::{AptosNetwork, PaymentConfig};
use crate::event::{FacilitatorEvent, FacilitatorEventsSender};
use crate::ledger::{LedgerError, SponsoredSubmitter, TransactionLookup, TransactionStatus};
use crate::payment::error::AuthorizationError;
use crate::payment::replay::{unix_now, RejectReason, ReplayGuard, ReplayStats, Validation};
use crate::payment::request::{AuthorizationRequest, IntentRequest};
use crate::payment::signature;
use crate::payment::types::{Address, PaymentIntent, SignedAuthorization, TransactionReceipt};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// Random nonce suffix range; one slot per microsecond-of-millisecond.
const NONCE_JITTER: u64 = 1000;

/// Static facilitator parameters.
#[derive(Debug, Clone)]
pub struct FacilitatorSettings {
    /// Network sponsored transactions target.
    pub network: AptosNetwork,
    /// Address of the on-chain `payment_with_auth` module.
    pub module_address: Address,
    /// Asset label returned with issued intents.
    pub asset: String,
    /// Minutes until an issued intent expires.
    pub expiry_minutes: u64,
    /// Require the public key to derive the sender's address.
    pub require_key_binding: bool,
}

impl FacilitatorSettings {
    /// Settings from the payment section of the configuration.
    #[must_use]
    pub fn new(payment: &PaymentConfig, network: AptosNetwork, module_address: Address) -> Self {
        Self {
            network,
            module_address,
            asset: payment.asset.clone(),
            expiry_minutes: payment.expiry_minutes,
            require_key_binding: payment.require_key_binding,
        }
    }
}

/// A nonce consumed locally whose sponsored submission failed.
///
/// The user's authorization can no longer be replayed, but no transfer
/// happened; an operator has to reconcile it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrandedNonce {
    /// Paying account.
    pub sender: Address,
    /// Consumed nonce.
    pub nonce: u64,
    /// Intended recipient.
    pub recipient: Address,
    /// Intended amount.
    pub amount: u64,
    /// Submission failure.
    pub cause: String,
    /// When the failure was recorded (Unix seconds).
    pub at: u64,
}

/// Issues intents and executes signed authorizations.
pub struct AuthorizationFacilitator {
    guard: ReplayGuard,
    submitter: Arc<dyn SponsoredSubmitter>,
    lookup: Arc<dyn TransactionLookup>,
    settings: FacilitatorSettings,
    events_tx: FacilitatorEventsSender,
    last_nonce: AtomicU64,
    stranded: Arc<Mutex<Vec<StrandedNonce>>>,
}

impl AuthorizationFacilitator {
    /// Create a facilitator.
    #[must_use]
    pub fn new(
        guard: ReplayGuard,
        submitter: Arc<dyn SponsoredSubmitter>,
        lookup: Arc<dyn TransactionLookup>,
        settings: FacilitatorSettings,
        events_tx: FacilitatorEventsSender,
    ) -> Self {
        info!(
            network = settings.network.as_str(),
            module = %settings.module_address,
            expiry_minutes = settings.expiry_minutes,
            require_key_binding = settings.require_key_binding,
            "Authorization facilitator initialized"
        );
        Self {
            guard,
            submitter,
            lookup,
            settings,
            events_tx,
            last_nonce: AtomicU64::new(0),
            stranded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Issue a fresh intent for the client to sign.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::InvalidRequest`] if a field is missing
    /// or malformed, or the amount is zero.
    pub fn issue_intent(&self, request: &IntentRequest) -> Result<PaymentIntent, AuthorizationError> {
        let parsed = request.parse().map_err(|e| self.rejected(None, e.into()))?;

        let nonce = self.next_nonce();
        let expiry = unix_now().saturating_add(self.settings.expiry_minutes.saturating_mul(60));
        let intent = PaymentIntent {
            sender: parsed.sender,
            recipient: parsed.recipient,
            amount: parsed.amount,
            nonce,
            expiry,
            asset: self.settings.asset.clone(),
            network: self.settings.network.as_str().to_string(),
            module_address: self.settings.module_address,
        };

        info!(sender = %intent.sender, recipient = %intent.recipient, amount = intent.amount, nonce, expiry, "Payment intent issued");
        let _ = self.events_tx.send(FacilitatorEvent::IntentIssued {
            sender: intent.sender,
            nonce,
            expiry,
        });
        Ok(intent)
    }

    /// Validate and execute a client authorization request.
    ///
    /// # Errors
    ///
    /// See [`submit_signed`](Self::submit_signed); additionally
    /// [`AuthorizationError::InvalidRequest`] for missing or malformed fields.
    pub async fn submit_authorization(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<TransactionReceipt, AuthorizationError> {
        let authorization = request.parse().map_err(|e| self.rejected(None, e.into()))?;
        self.submit_signed(authorization).await
    }

    /// Validate and execute a parsed authorization.
    ///
    /// # Errors
    ///
    /// - [`AuthorizationError::InvalidAuthorization`] if expired or replayed
    /// - [`AuthorizationError::InvalidSignature`] if the key is not the
    ///   sender's or the signature does not verify
    /// - [`AuthorizationError::LedgerUnavailable`] if the nonce query failed
    ///   under the fail-closed policy
    /// - [`AuthorizationError::SubmissionFailed`] if the sponsored
    ///   transaction could not be submitted; the nonce stays consumed
    pub async fn submit_signed(
        &self,
        authorization: SignedAuthorization,
    ) -> Result<TransactionReceipt, AuthorizationError> {
        let intent = authorization.intent();
        let sender = *intent.sender();
        let nonce = intent.nonce();

        debug!(sender = %sender, nonce, expiry = intent.expiry(), "Validating authorization");

        match self.guard.validate(&sender, nonce, intent.expiry()).await {
            Ok(Validation::Valid) => {}
            Ok(Validation::Rejected(reason)) => return Err(self.rejected(Some(sender), reason.into())),
            Err(e) => return Err(self.rejected(Some(sender), AuthorizationError::LedgerUnavailable(e))),
        }

        if self.settings.require_key_binding && !signature::key_matches_sender(&sender, authorization.public_key()) {
            warn!(sender = %sender, nonce, "Public key does not authenticate sender");
            return Err(self.rejected(Some(sender), AuthorizationError::InvalidSignature));
        }
        if !signature::verify_hex(&sender, authorization.public_key(), authorization.signature(), intent) {
            return Err(self.rejected(Some(sender), AuthorizationError::InvalidSignature));
        }

        if !self.guard.claim(sender, nonce) {
            info!(sender = %sender, nonce, "Lost nonce claim to a concurrent submission");
            return Err(self.rejected(Some(sender), RejectReason::Replay.into()));
        }

        // The task records its own outcome: the request future may be dropped
        // by a disconnecting client while the submission is in flight
        let submitter = Arc::clone(&self.submitter);
        let stranded = Arc::clone(&self.stranded);
        let events_tx = self.events_tx.clone();
        let task_authorization = authorization.clone();
        let outcome = tokio::spawn(async move {
            let outcome = submitter.submit(&task_authorization).await;
            record_outcome(&task_authorization, &outcome, &stranded, &events_tx);
            outcome
        })
        .await
        .unwrap_or_else(|e| {
            let cause = LedgerError::Network(format!("Submission task failed: {e}"));
            strand(&authorization, &cause, &self.stranded, &self.events_tx);
            Err(cause)
        });

        match outcome {
            Ok(transaction_hash) => Ok(TransactionReceipt {
                transaction_hash,
                sender,
                nonce,
            }),
            Err(cause) => Err(self.rejected(Some(sender), AuthorizationError::SubmissionFailed(cause))),
        }
    }

    /// Status of a previously submitted transaction.
    ///
    /// # Errors
    ///
    /// Returns the ledger error if the lookup fails.
    pub async fn transaction_status(&self, hash: &str) -> Result<TransactionStatus, LedgerError> {
        self.lookup.transaction_status(hash).await
    }

    /// Nonces consumed without a successful submission, oldest first.
    #[must_use]
    pub fn stranded_nonces(&self) -> Vec<StrandedNonce> {
        self.stranded.lock().clone()
    }

    /// Replay guard statistics.
    #[must_use]
    pub fn replay_stats(&self) -> ReplayStats {
        self.guard.stats()
    }

    /// Static parameters.
    #[must_use]
    pub const fn settings(&self) -> &FacilitatorSettings {
        &self.settings
    }

    /// `unix_millis * 1000 + jitter`, strictly increasing within the process.
    fn next_nonce(&self) -> u64 {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX / NONCE_JITTER))
            .unwrap_or_default();
        let candidate = millis
            .saturating_mul(NONCE_JITTER)
            .saturating_add(rand::thread_rng().gen_range(0..NONCE_JITTER));

        let previous = match self
            .last_nonce
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(candidate.max(last.saturating_add(1)))
            }) {
            Ok(previous) | Err(previous) => previous,
        };
        candidate.max(previous.saturating_add(1))
    }

    fn rejected(&self, sender: Option<Address>, error: AuthorizationError) -> AuthorizationError {
        let reason = error.label();
        match sender {
            Some(sender) => info!(sender = %sender, reason, error = %error, "Authorization rejected"),
            None => info!(reason, error = %error, "Request rejected"),
        }
        let _ = self
            .events_tx
            .send(FacilitatorEvent::AuthorizationRejected { sender, reason });
        error
    }
}

/// Log and broadcast the result of a sponsored submission.
fn record_outcome(
    authorization: &SignedAuthorization,
    outcome: &Result<String, LedgerError>,
    stranded: &Mutex<Vec<StrandedNonce>>,
    events_tx: &FacilitatorEventsSender,
) {
    let intent = authorization.intent();
    match outcome {
        Ok(transaction_hash) => {
            info!(sender = %intent.sender(), nonce = intent.nonce(), amount = intent.amount(), hash = %transaction_hash, "Authorization accepted");
            let _ = events_tx.send(FacilitatorEvent::AuthorizationAccepted {
                sender: *intent.sender(),
                nonce: intent.nonce(),
                transaction_hash: transaction_hash.clone(),
            });
        }
        Err(cause) => strand(authorization, cause, stranded, events_tx),
    }
}

/// Record a consumed nonce whose submission failed.
fn strand(
    authorization: &SignedAuthorization,
    cause: &LedgerError,
    stranded: &Mutex<Vec<StrandedNonce>>,
    events_tx: &FacilitatorEventsSender,
) {
    let intent = authorization.intent();
    let entry = StrandedNonce {
        sender: *intent.sender(),
        nonce: intent.nonce(),
        recipient: *intent.recipient(),
        amount: intent.amount(),
        cause: cause.to_string(),
        at: unix_now(),
    };
    error!(
        target: "reconciliation",
        sender = %entry.sender,
        nonce = entry.nonce,
        recipient = %entry.recipient,
        amount = entry.amount,
        cause = %entry.cause,
        "Nonce consumed but sponsored submission failed"
    );
    stranded.lock().push(entry.clone());
    let _ = events_tx.send(FacilitatorEvent::NonceStranded(entry));
}
