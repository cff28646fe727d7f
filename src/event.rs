//! Facilitator event system.

use crate::payment::{Address, StrandedNonce};
use std::net::SocketAddr;
use tokio::sync::broadcast;

/// Events emitted by the facilitator.
#[derive(Debug, Clone)]
pub enum FacilitatorEvent {
    /// HTTP server is accepting connections.
    Started {
        /// Bound listen address.
        address: SocketAddr,
    },

    /// Facilitator is shutting down.
    ShuttingDown,

    /// A fresh intent was handed out for signing.
    IntentIssued {
        /// Paying account.
        sender: Address,
        /// Issued nonce.
        nonce: u64,
        /// Issued expiry (Unix seconds).
        expiry: u64,
    },

    /// An authorization was verified and submitted.
    AuthorizationAccepted {
        /// Paying account.
        sender: Address,
        /// Consumed nonce.
        nonce: u64,
        /// Sponsored transaction hash.
        transaction_hash: String,
    },

    /// An authorization was refused.
    AuthorizationRejected {
        /// Paying account, when the request got far enough to name one.
        sender: Option<Address>,
        /// Rejection label.
        reason: &'static str,
    },

    /// A nonce was consumed but its submission failed.
    NonceStranded(StrandedNonce),
}

/// Channel for receiving facilitator events.
pub type FacilitatorEventsChannel = broadcast::Receiver<FacilitatorEvent>;

/// Sender for facilitator events.
pub type FacilitatorEventsSender = broadcast::Sender<FacilitatorEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (FacilitatorEventsSender, FacilitatorEventsChannel) {
    broadcast::channel(256)
}
