//! Shared type definitions.

mod id;
mod line_item;
mod order;
mod price;

pub use id::{LineItemId, VariantId};
pub use line_item::{LineItem, SelectedOptions};
pub use order::OrderRecord;
pub use price::Price;
