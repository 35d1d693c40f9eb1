//! Engine configuration.
//!
//! Everything storefront-specific lives here as data rather than code: the
//! storage keys, the processing window of the idempotency guard, the
//! fallback title/image used when no page source yields a usable value,
//! and the package-variant override table (exact option strings mapped to
//! display names and override images). A host loads its own table from
//! JSON; the defaults carry no store-specific entries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default reset delay for the per-form processing flag.
const DEFAULT_PROCESSING_WINDOW_MS: u64 = 500;

/// Inline placeholder graphic used when no page source yields an image.
const PLACEHOLDER_IMAGE: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iMjAwIiBoZWlnaHQ9IjIwMCIgeG1sbnM9Imh0dHA6Ly93d3cudzMub3JnLzIwMDAvc3ZnIj48cmVjdCB3aWR0aD0iMjAwIiBoZWlnaHQ9IjIwMCIgZmlsbD0iI2VlZSIvPjx0ZXh0IHg9IjUwJSIgeT0iNTAlIiBmb250LWZhbWlseT0iQXJpYWwiIGZvbnQtc2l6ZT0iMTQiIGZpbGw9IiM5OTkiIHRleHQtYW5jaG9yPSJtaWRkbGUiIGR5PSIuM2VtIj5ObyBJbWFnZTwvdGV4dD48L3N2Zz4=";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid cart configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A recognized package-variant option mapped to its display form.
///
/// When any raw option value contains one of the `matches` fragments, the
/// line item's title is composed around `display_name` and, when set,
/// `image` replaces the resolved product image. This mapping is
/// store-specific configuration, not cart logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageOverride {
    /// Substrings of raw option values that select this package.
    pub matches: Vec<String>,
    /// Canonical display name, also stored as the normalized
    /// `packageVariant` option slot.
    pub display_name: String,
    /// Optional replacement image URL (normalized like any resolved
    /// image).
    #[serde(default)]
    pub image: Option<String>,
}

/// Cart engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartConfig {
    /// Storage key holding the serialized line-item array.
    pub cart_storage_key: String,
    /// Storage key holding the append-only order log.
    pub orders_storage_key: String,
    /// Milliseconds a form stays in the Processing state before the
    /// idempotency guard lets the next submission through.
    pub processing_window_ms: u64,
    /// Title used when no page source yields one.
    pub fallback_title: String,
    /// Image used when no page source yields a usable one.
    pub placeholder_image: String,
    /// Recognized package-variant options (store-specific data).
    pub package_overrides: Vec<PackageOverride>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            cart_storage_key: "local_cart".to_string(),
            orders_storage_key: "local_cart_orders".to_string(),
            processing_window_ms: DEFAULT_PROCESSING_WINDOW_MS,
            fallback_title: "Product".to_string(),
            placeholder_image: PLACEHOLDER_IMAGE.to_string(),
            package_overrides: Vec::new(),
        }
    }
}

impl CartConfig {
    /// Load configuration from a JSON document; absent fields keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The processing window as a [`Duration`].
    #[must_use]
    pub const fn processing_window(&self) -> Duration {
        Duration::from_millis(self.processing_window_ms)
    }

    /// Find the package override selected by a raw option value, if any.
    #[must_use]
    pub fn match_package_override(&self, option_value: &str) -> Option<&PackageOverride> {
        self.package_overrides
            .iter()
            .find(|o| o.matches.iter().any(|m| option_value.contains(m.as_str())))
    }
}
