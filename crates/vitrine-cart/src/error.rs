//! Cart error types.

use thiserror::Error;

/// Errors that can occur in cart operations.
///
/// These are faults of the machinery (storage, locks, encoding), not
/// business outcomes. A rejected add-to-cart is data, not an error;
/// see `AddOutcome`.
#[derive(Error, Debug)]
pub enum CartError {
    /// Storage backend failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A shared lock was poisoned by a panicking holder.
    #[error("Cart state lock poisoned")]
    Poisoned,

    /// Cart record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Currency mismatch while totaling.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// Arithmetic overflow in cart totals.
    #[error("Arithmetic overflow in cart totals")]
    Overflow,
}

impl From<serde_json::Error> for CartError {
    fn from(e: serde_json::Error) -> Self {
        CartError::Serialization(e.to_string())
    }
}
