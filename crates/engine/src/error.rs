//! Unified error handling for the cart engine.
//!
//! The taxonomy mirrors how failures are surfaced:
//!
//! - input validation errors ([`CartError::MissingVariantId`],
//!   [`CartError::MissingOption`]) are reported to the user and abort the
//!   pipeline before any mutation;
//! - storage write failures ([`CartError::Storage`]) propagate to the
//!   caller; reads never fail - a corrupt cart degrades to empty.
//!
//! Nothing here is fatal to the page: every failure path leaves previously
//! persisted cart state intact.

use thiserror::Error;

use crate::store::StorageError;

/// Engine-level error type.
#[derive(Debug, Error)]
pub enum CartError {
    /// The candidate item carried no variant id.
    #[error("item is missing a variant id")]
    MissingVariantId,

    /// A required option selection is empty or a placeholder. Carries the
    /// user-facing option name (label text, falling back to a generic
    /// term).
    #[error("please select {0}")]
    MissingOption(String),

    /// Checkout was attempted on an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// Persisting the cart or order log failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CartError {
    /// Whether the error is a user-input problem (retryable by the user
    /// fixing their selection) rather than an engine/storage fault.
    #[must_use]
    pub const fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::MissingVariantId | Self::MissingOption(_) | Self::EmptyCart
        )
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
