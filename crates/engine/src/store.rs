//! Cart persistence and change signalling.
//!
//! Line items live in origin-local key/value storage under a single key,
//! serialized as a JSON array. Reads are tolerant: an absent or corrupt
//! value degrades to an empty cart (logged, never surfaced). Writes
//! propagate errors.
//!
//! Cross-context synchronization goes through a [`ChangeHub`]: each
//! browsing context registers for a context id, every successful write
//! publishes the changed key to all *other* contexts, and a context drains
//! its pending notifications when its host pumps events. The originating
//! context is never notified of its own writes.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::warn;

use local_cart_core::{LineItem, OrderRecord};

/// Storage-layer errors. Only writes surface these; reads degrade.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("cart serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Origin-local key/value storage.
///
/// String keys to string values, shared by all contexts on one origin.
pub trait StorageBackend: Send + Sync {
    /// Read the value under `key`, if present.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value under `key`, if present.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// Backends
// =============================================================================

/// In-memory backend for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(poisoned)?;
        values.remove(key);
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Io(io::Error::other("storage lock poisoned"))
}

/// File-backed storage: one `<key>.json` file per key under a root
/// directory. Keys are sanitized to a conservative filename alphabet.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a file backend rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] when the root cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{safe}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Change hub
// =============================================================================

/// Identity of one browsing context registered with the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

/// Cross-context change notifications for a shared storage origin.
///
/// Mirrors the browser storage-event contract: a write is announced to
/// every context on the origin except the one that performed it.
#[derive(Debug, Default)]
pub struct ChangeHub {
    inner: Mutex<HubInner>,
}

#[derive(Debug, Default)]
struct HubInner {
    next_id: u64,
    pending: HashMap<u64, Vec<String>>,
}

impl ChangeHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a browsing context and get its id.
    pub fn register(&self) -> ContextId {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.pending.insert(id, Vec::new());
        ContextId(id)
    }

    /// Remove a context's registration and drop its pending queue.
    ///
    /// Called when the owning store goes away; without it, a closed
    /// context's queue would keep growing on every later publish.
    pub fn unregister(&self, context: ContextId) {
        let mut inner = self.lock();
        inner.pending.remove(&context.0);
    }

    /// Announce a write to `key` performed by `origin`. Every other
    /// registered context gets the notification queued.
    pub fn publish(&self, origin: ContextId, key: &str) {
        let mut inner = self.lock();
        for (id, queue) in &mut inner.pending {
            if *id != origin.0 {
                queue.push(key.to_string());
            }
        }
    }

    /// Take all pending change notifications for `context`.
    pub fn drain(&self, context: ContextId) -> Vec<String> {
        let mut inner = self.lock();
        inner
            .pending
            .get_mut(&context.0)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        // Queues hold plain strings; a panic mid-push cannot corrupt them.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// =============================================================================
// Persistent cart store
// =============================================================================

/// The cart's persistence handle for one browsing context.
///
/// Wraps a shared backend with the cart storage key, the owning context's
/// hub registration, and the degrade-on-corrupt read policy.
pub struct PersistentStore {
    backend: Arc<dyn StorageBackend>,
    hub: Arc<ChangeHub>,
    context: ContextId,
    key: String,
}

impl PersistentStore {
    /// Create a store for one context, registering it with the hub.
    #[must_use]
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        hub: Arc<ChangeHub>,
        key: impl Into<String>,
    ) -> Self {
        let context = hub.register();
        Self {
            backend,
            hub,
            context,
            key: key.into(),
        }
    }

    /// The storage key this store reads and writes.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the persisted line items.
    ///
    /// Absent, unreadable, or corrupt state degrades to an empty cart;
    /// the failure is logged, never propagated.
    #[must_use]
    pub fn load(&self) -> Vec<LineItem> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "cart read failed, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(key = %self.key, error = %e, "corrupt cart state, starting empty");
                Vec::new()
            }
        }
    }

    /// Persist the full line-item array and announce the change to other
    /// contexts.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when serialization or the backing write
    /// fails. The previously persisted state is left untouched in that
    /// case.
    pub fn save(&self, items: &[LineItem]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(items)?;
        self.backend.set(&self.key, &raw)?;
        self.hub.publish(self.context, &self.key);
        Ok(())
    }

    /// Storage keys changed by other contexts since the last drain.
    pub fn drain_changes(&self) -> Vec<String> {
        self.hub.drain(self.context)
    }
}

impl Drop for PersistentStore {
    fn drop(&mut self) {
        self.hub.unregister(self.context);
    }
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("key", &self.key)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Order log
// =============================================================================

/// Append-only log of captured orders, persisted as a JSON array under its
/// own key. The cart engine never reads it back; fulfillment tooling does.
pub struct OrderLog {
    backend: Arc<dyn StorageBackend>,
    key: String,
}

impl OrderLog {
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Append one order to the log.
    ///
    /// A corrupt existing log is replaced by a fresh one holding only this
    /// order; losing the cart state the user is looking at would be worse
    /// than losing an unreadable history.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when serialization or the write fails.
    pub fn append(&self, order: &OrderRecord) -> Result<(), StorageError> {
        let mut orders = self.load();
        orders.push(order.clone());
        let raw = serde_json::to_string(&orders)?;
        self.backend.set(&self.key, &raw)?;
        Ok(())
    }

    /// Drop the most recently appended order.
    ///
    /// Order capture uses this to back out an append when clearing the
    /// cart afterwards fails; a retried capture must not record the same
    /// order twice.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when rewriting the log fails.
    pub(crate) fn retract_last(&self) -> Result<(), StorageError> {
        let mut orders = self.load();
        if orders.pop().is_none() {
            return Ok(());
        }
        let raw = serde_json::to_string(&orders)?;
        self.backend.set(&self.key, &raw)?;
        Ok(())
    }

    /// Load all captured orders. Absent or corrupt state degrades to an
    /// empty log.
    #[must_use]
    pub fn load(&self) -> Vec<OrderRecord> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "order log read failed");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(orders) => orders,
            Err(e) => {
                warn!(key = %self.key, error = %e, "corrupt order log, starting fresh");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for OrderLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLog")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use local_cart_core::{Price, SelectedOptions, VariantId};

    fn item(variant: &str) -> LineItem {
        LineItem::new(
            VariantId::new(variant),
            SelectedOptions::new(),
            "Socks",
            "https://cdn.example.com/socks.png",
            Price::from_minor_units(1299),
            "socks",
            "/products/socks.html",
            1,
        )
    }

    fn store_pair() -> (PersistentStore, PersistentStore) {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let hub = Arc::new(ChangeHub::new());
        let a = PersistentStore::new(Arc::clone(&backend), Arc::clone(&hub), "local_cart");
        let b = PersistentStore::new(backend, hub, "local_cart");
        (a, b)
    }

    #[test]
    fn test_save_load_round_trip() {
        let (store, _) = store_pair();
        let items = vec![item("101"), item("102")];
        store.save(&items).unwrap();
        assert_eq!(store.load(), items);
    }

    #[test]
    fn test_absent_state_loads_empty() {
        let (store, _) = store_pair();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_corrupt_state_loads_empty() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        backend.set("local_cart", "{not json").unwrap();
        let hub = Arc::new(ChangeHub::new());
        let store = PersistentStore::new(backend, hub, "local_cart");
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_writer_is_not_notified_of_own_write() {
        let (a, b) = store_pair();
        a.save(&[item("101")]).unwrap();

        assert!(a.drain_changes().is_empty());
        assert_eq!(b.drain_changes(), vec!["local_cart".to_string()]);
        // Drain is consuming
        assert!(b.drain_changes().is_empty());
    }

    #[test]
    fn test_closed_context_stops_accumulating_notifications() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let hub = Arc::new(ChangeHub::new());
        let a = PersistentStore::new(Arc::clone(&backend), Arc::clone(&hub), "local_cart");
        let b = PersistentStore::new(Arc::clone(&backend), Arc::clone(&hub), "local_cart");
        let b_context = b.context;
        drop(b);

        for _ in 0..100 {
            a.save(&[item("101")]).unwrap();
        }

        // The closed context's queue is gone, not growing.
        assert!(hub.drain(b_context).is_empty());
        assert_eq!(hub.lock().pending.len(), 1);
    }

    #[test]
    fn test_cross_context_last_write_wins() {
        let (a, b) = store_pair();
        a.save(&[item("101")]).unwrap();
        b.save(&[item("202")]).unwrap();

        let seen = a.load();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].variant_id.as_str(), "202");
        assert_eq!(a.load(), b.load());
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        backend.set("local_cart", "[1,2]").unwrap();
        assert_eq!(backend.get("local_cart").unwrap().as_deref(), Some("[1,2]"));
        backend.remove("local_cart").unwrap();
        assert_eq!(backend.get("local_cart").unwrap(), None);
        // Removing a missing key is fine
        backend.remove("local_cart").unwrap();
    }

    #[test]
    fn test_file_backend_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        backend.set("../escape/attempt", "x").unwrap();
        assert_eq!(backend.get("../escape/attempt").unwrap().as_deref(), Some("x"));
        assert!(dir.path().join("___escape_attempt.json").exists());
    }

    #[test]
    fn test_order_log_appends() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let log = OrderLog::new(Arc::clone(&backend), "local_cart_orders");

        let order = OrderRecord::new("Ada", "+4512345678", vec![item("101")], Price::from_minor_units(1299));
        log.append(&order).unwrap();
        log.append(&order).unwrap();
        assert_eq!(log.load().len(), 2);
    }

    #[test]
    fn test_order_log_recovers_from_corruption() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        backend.set("local_cart_orders", "][").unwrap();
        let log = OrderLog::new(backend, "local_cart_orders");

        let order = OrderRecord::new("Ada", "+4512345678", vec![item("101")], Price::from_minor_units(1299));
        log.append(&order).unwrap();
        assert_eq!(log.load().len(), 1);
    }
}
