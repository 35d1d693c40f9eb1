//! Cart line items and their normalized option maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::{LineItemId, VariantId};
use super::price::Price;

/// The canonical, comparable form of a variant's option selections.
///
/// Keys are sorted by construction (`BTreeMap`), values are trimmed strings.
/// Two maps are equal iff they have the same key set and identical values
/// per key, independent of the order the selections were gathered in.
///
/// May include synthetic keys (`packageVariant`, `size`, `color`) layered
/// on top of raw option keys; identity comparison and display rely on these
/// canonical slots rather than page-specific option labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectedOptions(BTreeMap<String, String>);

impl SelectedOptions {
    /// An empty option map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert an option, replacing any previous value for the name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Look up an option value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Iterate options in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for SelectedOptions {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One cart row: a variant plus its selected options and quantity.
///
/// Product metadata (`title`, `image`, `price`, `handle`, `url`) is a
/// snapshot captured at add time and never re-resolved; merging a second
/// add into an existing row keeps the original snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Stable row identifier, never reused after removal.
    pub id: LineItemId,
    /// Identifier of the purchased variant. Required, non-empty.
    pub variant_id: VariantId,
    /// Normalized option selections used for identity comparison.
    pub selected_options: SelectedOptions,
    /// Display title captured at add time.
    pub title: String,
    /// Image URL captured at add time.
    pub image: String,
    /// Unit price captured at add time.
    pub price: Price,
    /// Product handle (URL slug).
    pub handle: String,
    /// Product page path.
    pub url: String,
    /// Always >= 1; a mutation to 0 removes the row instead.
    pub quantity: u32,
}

impl LineItem {
    /// Create a new line item with a freshly generated id.
    ///
    /// A requested quantity of 0 defaults to 1 (the row exists because the
    /// user asked for the product at least once).
    #[must_use]
    pub fn new(
        variant_id: VariantId,
        selected_options: SelectedOptions,
        title: impl Into<String>,
        image: impl Into<String>,
        price: Price,
        handle: impl Into<String>,
        url: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            id: LineItemId::new_unique(),
            variant_id,
            selected_options,
            title: title.into(),
            image: image.into(),
            price,
            handle: handle.into(),
            url: url.into(),
            quantity: quantity.max(1),
        }
    }

    /// Line total (unit price times quantity).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}
