//! Persistence behavior: the cart survives session teardown, tolerates
//! corrupt state, and works over the file backend.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use local_cart_engine::{
    CartConfig, CartEngine, CartSession, ChangeHub, FileBackend, PageEvent, PersistentStore,
    StorageBackend,
};
use local_cart_integration_tests::{TestOrigin, product_page};

fn submit() -> PageEvent {
    PageEvent::FormSubmit {
        form_key: "product-form".to_string(),
    }
}

#[test]
fn test_cart_survives_session_restart() {
    let origin = TestOrigin::new();

    let mut session = origin.open_session();
    session.handle_event(&mut product_page(), submit());
    let items_before = session.engine().items().to_vec();
    drop(session);

    let reopened = origin.open_session();
    assert_eq!(reopened.engine().items(), items_before);
}

#[test]
fn test_corrupt_cart_degrades_to_empty() {
    let origin = TestOrigin::new();
    origin.raw_set("local_cart", "{definitely not json").unwrap();

    let session = origin.open_session();
    assert!(session.engine().is_empty());
}

#[test]
fn test_corrupt_cart_is_replaced_on_next_add() {
    let origin = TestOrigin::new();
    origin.raw_set("local_cart", "42").unwrap();

    let mut session = origin.open_session();
    session.handle_event(&mut product_page(), submit());

    let raw = origin.raw_get("local_cart").unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value.as_array().unwrap().len(), 1);
}

#[test]
fn test_wrong_shape_degrades_to_empty() {
    // Valid JSON, wrong type: an object where the item array belongs.
    let origin = TestOrigin::new();
    origin.raw_set("local_cart", r#"{"items":[]}"#).unwrap();

    let session = origin.open_session();
    assert!(session.engine().is_empty());
}

#[test]
fn test_file_backend_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::new(dir.path()).unwrap());
    let hub = Arc::new(ChangeHub::new());
    let config = Arc::new(CartConfig::default());

    let mut session = CartSession::new(
        Arc::clone(&config),
        CartEngine::new(PersistentStore::new(
            Arc::clone(&backend),
            Arc::clone(&hub),
            config.cart_storage_key.clone(),
        )),
    );
    session.handle_event(&mut product_page(), submit());
    let items_before = session.engine().items().to_vec();
    drop(session);

    assert!(dir.path().join("local_cart.json").exists());

    let reopened = CartEngine::new(PersistentStore::new(backend, hub, "local_cart"));
    assert_eq!(reopened.items(), items_before);
}
