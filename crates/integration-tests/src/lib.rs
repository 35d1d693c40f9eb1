//! Integration tests for the local cart engine.
//!
//! The shared fixtures model one storage origin the way a browser models
//! `localStorage`: a backend and change hub shared by every session
//! opened against the origin, so cross-tab scenarios are two sessions on
//! one [`TestOrigin`].
//!
//! Page fixtures approximate a real storefront product page, carrying the
//! same facts redundantly (component context, product JSON, meta tags)
//! like the pages the engine is built against.

use std::sync::Arc;

use url::Url;

use local_cart_engine::page::{CartForm, ProductComponent};
use local_cart_engine::{
    CartConfig, CartEngine, CartSession, ChangeHub, MemoryBackend, OrderLog, PageDocument,
    PersistentStore, StorageBackend, StorageError,
};

/// One storage origin shared by any number of sessions ("tabs").
pub struct TestOrigin {
    backend: Arc<dyn StorageBackend>,
    hub: Arc<ChangeHub>,
    config: Arc<CartConfig>,
}

impl TestOrigin {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CartConfig::default())
    }

    #[must_use]
    pub fn with_config(config: CartConfig) -> Self {
        init_tracing();
        Self {
            backend: Arc::new(MemoryBackend::new()),
            hub: Arc::new(ChangeHub::new()),
            config: Arc::new(config),
        }
    }

    /// Open a new session against this origin, like opening a tab.
    #[must_use]
    pub fn open_session(&self) -> CartSession {
        let store = PersistentStore::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.hub),
            self.config.cart_storage_key.clone(),
        );
        CartSession::new(Arc::clone(&self.config), CartEngine::new(store))
    }

    /// The origin's order log.
    #[must_use]
    pub fn order_log(&self) -> OrderLog {
        OrderLog::new(
            Arc::clone(&self.backend),
            self.config.orders_storage_key.clone(),
        )
    }

    /// Write a raw value straight into origin storage, bypassing the
    /// engine (for corruption scenarios).
    ///
    /// # Errors
    ///
    /// Propagates backend write failures.
    pub fn raw_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend.set(key, value)
    }

    /// Read a raw value straight from origin storage.
    ///
    /// # Errors
    ///
    /// Propagates backend read failures.
    pub fn raw_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.backend.get(key)
    }
}

impl Default for TestOrigin {
    fn default() -> Self {
        Self::new()
    }
}

/// Route engine logs through the test harness; repeat calls are fine.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Serialize a variant context the way product components embed it:
/// JSON with entity-escaped quotes.
#[must_use]
pub fn context_attr(id: u64, price_minor: i64, name: &str, public_title: &str) -> String {
    let json = serde_json::json!({
        "variantSelected": {
            "id": id,
            "price": price_minor,
            "name": name,
            "public_title": public_title,
        }
    });
    json.to_string().replace('"', "&quot;")
}

/// A product page carrying the same facts redundantly across sources,
/// with one component-owned cart form whose hidden field is pre-filled.
#[must_use]
pub fn product_page() -> PageDocument {
    let mut page = PageDocument::new(
        Url::parse("https://shop.example.com").unwrap_or_else(|_| unreachable!()),
        "/products/wool-socks.html",
    );
    page.meta.og_type = Some("product".to_string());
    page.meta.og_title = Some("Wool Socks (OG)".to_string());
    page.meta.og_image = Some("//cdn.example.com/og.png".to_string());
    page.meta.og_price_amount = Some("99.99".to_string());
    page.json_scripts.push(
        r#"{"product":{"title":"Wool Socks","handle":"wool-socks",
            "featured_image":"//cdn.example.com/socks.png",
            "variants":[{"id":45001,"price":1099}]}}"#
            .to_string(),
    );

    let mut form = CartForm::new("product-form");
    form.variant_id_field = Some("45123".to_string());
    page.components.push(ProductComponent {
        context_attr: Some(context_attr(45123, 1299, "Wool Socks - M", "M")),
        data_attr: None,
        forms: vec![form],
    });
    page
}
