//! Line-item identity, merging, and cart mutation.
//!
//! Two line items are the same purchasable thing when their variant id
//! and their full normalized option maps are equal. Adding a duplicate
//! merges by bumping quantity; the existing item's resolved snapshot
//! (title, image, price) is sticky and never overwritten by the later
//! add. Every successful mutation persists the full cart and notifies
//! same-context subscribers.

use tracing::debug;

use local_cart_core::{LineItem, LineItemId, Price, VariantId};

use crate::error::{CartError, Result};
use crate::options::{RawOptionMap, normalize_options};
use crate::store::PersistentStore;

/// An add-to-cart candidate, as assembled by the interceptor: resolved
/// product facts plus the raw option selections.
#[derive(Debug, Clone)]
pub struct CandidateItem {
    pub variant_id: VariantId,
    pub raw_options: RawOptionMap,
    pub title: String,
    pub image: String,
    pub price: Price,
    pub handle: String,
    pub url: String,
    pub quantity: u32,
}

/// What an add did to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line item was created.
    Added(LineItemId),
    /// The candidate merged into an existing line item.
    Merged(LineItemId),
}

impl AddOutcome {
    /// Id of the line item the add landed on.
    #[must_use]
    pub const fn line_item_id(&self) -> LineItemId {
        match self {
            Self::Added(id) | Self::Merged(id) => *id,
        }
    }

    #[must_use]
    pub const fn is_merge(&self) -> bool {
        matches!(self, Self::Merged(_))
    }
}

type ChangeListener = Box<dyn FnMut(&[LineItem])>;

/// The cart state core for one browsing context.
///
/// State is loaded from storage on construction; corrupt or absent state
/// starts empty. All mutations persist before returning, so the in-memory
/// view and storage never diverge on the success path.
pub struct CartEngine {
    items: Vec<LineItem>,
    store: PersistentStore,
    listeners: Vec<ChangeListener>,
}

impl CartEngine {
    /// Build an engine over the given store, loading whatever it holds.
    #[must_use]
    pub fn new(store: PersistentStore) -> Self {
        let items = store.load();
        Self {
            items,
            store,
            listeners: Vec::new(),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current line items, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Sum of line totals.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Sum of quantities across all line items.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add a candidate item, merging with an existing line item when the
    /// variant id and normalized options match.
    ///
    /// # Errors
    ///
    /// [`CartError::MissingVariantId`] when the candidate has no variant
    /// id; [`CartError::Storage`] when persisting fails (the in-memory
    /// change is rolled back).
    pub fn add_item(&mut self, candidate: CandidateItem) -> Result<AddOutcome> {
        if candidate.variant_id.is_empty() {
            return Err(CartError::MissingVariantId);
        }

        let options = normalize_options(&candidate.raw_options);
        let quantity = candidate.quantity.max(1);

        let outcome = if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.variant_id == candidate.variant_id && i.selected_options == options)
        {
            existing.quantity += quantity;
            debug!(variant = %existing.variant_id, quantity = existing.quantity, "merged line item");
            AddOutcome::Merged(existing.id)
        } else {
            let item = LineItem::new(
                candidate.variant_id,
                options,
                candidate.title,
                candidate.image,
                candidate.price,
                candidate.handle,
                candidate.url,
                quantity,
            );
            let id = item.id;
            debug!(variant = %item.variant_id, "added line item");
            self.items.push(item);
            AddOutcome::Added(id)
        };

        if let Err(e) = self.persist() {
            // Roll back so memory matches what storage still holds.
            match outcome {
                AddOutcome::Added(id) => self.items.retain(|i| i.id != id),
                AddOutcome::Merged(id) => {
                    if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
                        item.quantity = item.quantity.saturating_sub(quantity).max(1);
                    }
                }
            }
            return Err(e);
        }
        Ok(outcome)
    }

    /// Remove a line item. Unknown ids are a no-op and do not persist.
    ///
    /// # Errors
    ///
    /// [`CartError::Storage`] when persisting fails.
    pub fn remove_item(&mut self, id: LineItemId) -> Result<()> {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        if self.items.len() == before {
            return Ok(());
        }
        self.persist()
    }

    /// Set a line item's quantity; zero removes the item. Unknown ids are
    /// a no-op and do not persist.
    ///
    /// # Errors
    ///
    /// [`CartError::Storage`] when persisting fails.
    pub fn set_quantity(&mut self, id: LineItemId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return self.remove_item(id);
        }
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return Ok(());
        };
        if item.quantity == quantity {
            return Ok(());
        }
        item.quantity = quantity;
        self.persist()
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// [`CartError::Storage`] when persisting fails.
    pub fn clear(&mut self) -> Result<()> {
        if self.items.is_empty() {
            return Ok(());
        }
        let kept = std::mem::take(&mut self.items);
        if let Err(e) = self.persist() {
            // Failed writes keep the in-memory cart too, so a retry sees
            // the same state the storage still holds.
            self.items = kept;
            return Err(e);
        }
        Ok(())
    }

    // =========================================================================
    // Change propagation
    // =========================================================================

    /// Subscribe to cart changes in this context. Listeners fire after
    /// every persisted mutation and after cross-context reloads.
    pub fn on_change(&mut self, listener: impl FnMut(&[LineItem]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Apply storage changes announced by other contexts: when the cart
    /// key changed elsewhere, reload the full state (last write wins) and
    /// notify subscribers. Returns whether a reload happened.
    pub fn pump_storage_events(&mut self) -> bool {
        let cart_changed = self
            .store
            .drain_changes()
            .iter()
            .any(|key| key == self.store.key());
        if !cart_changed {
            return false;
        }
        self.items = self.store.load();
        self.notify();
        true
    }

    fn persist(&mut self) -> Result<()> {
        self.store.save(&self.items)?;
        self.notify();
        Ok(())
    }

    fn notify(&mut self) {
        for listener in &mut self.listeners {
            listener(&self.items);
        }
    }
}

impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine")
            .field("items", &self.items)
            .field("store", &self.store)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
