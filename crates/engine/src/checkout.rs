//! Order capture for the checkout collaborator.
//!
//! The checkout surface itself (form, validation UI, confirmation) is a
//! consumer concern. The engine's side of the handshake is a single
//! operation: snapshot the cart into an [`OrderRecord`], append it to the
//! order log, and empty the cart. The cart is cleared only after the
//! order has been durably appended.

use tracing::{info, warn};

use local_cart_core::OrderRecord;

use crate::cart::CartEngine;
use crate::error::{CartError, Result};
use crate::store::OrderLog;

/// Buyer contact details collected by the checkout surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutDetails {
    pub name: String,
    pub phone: String,
}

/// Capture the current cart as an order.
///
/// # Errors
///
/// [`CartError::EmptyCart`] when there is nothing to capture;
/// [`CartError::Storage`] when appending the order or clearing the cart
/// fails. Either way the cart is left untouched and the order is not in
/// the log, so the user can retry without recording it twice.
pub fn capture_order(
    engine: &mut CartEngine,
    log: &OrderLog,
    details: CheckoutDetails,
) -> Result<OrderRecord> {
    if engine.is_empty() {
        return Err(CartError::EmptyCart);
    }

    let order = OrderRecord::new(
        details.name,
        details.phone,
        engine.items().to_vec(),
        engine.total(),
    );
    log.append(&order)?;
    if let Err(e) = engine.clear() {
        // Back out the append; the capture as a whole did not happen.
        if let Err(retract) = log.retract_last() {
            warn!(error = %retract, "could not retract order after clear failure");
        }
        return Err(e);
    }

    info!(items = order.items.len(), total = %order.total, "order captured");
    Ok(order)
}
