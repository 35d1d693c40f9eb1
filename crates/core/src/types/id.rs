//! Newtype IDs for type-safe entity references.
//!
//! Variant ids are opaque strings handed to us by the page (Shopify-style
//! numeric ids arrive as JSON numbers or strings and are compared in string
//! form); line item ids are generated locally and never reused.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a purchasable variant, as supplied by the page.
///
/// Treated as an opaque string: the page encodes the same id as a JSON
/// number in one place and a string in another, so all comparisons happen
/// on the canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(String);

impl VariantId {
    /// Create a variant id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty (an empty id is never valid for a cart add).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VariantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for VariantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of a cart row.
///
/// Assigned once when the line item is created, stable for the row's
/// lifetime, and never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(Uuid);

impl LineItemId {
    /// Generate a fresh, unique line item id.
    #[must_use]
    pub fn new_unique() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for LineItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
