//! Local Cart Engine - a storefront-local cart that bypasses the host
//! platform's native add-to-cart flow.
//!
//! Line items live in origin-local key/value storage instead of a server
//! session. The engine covers the cart state core:
//!
//! - [`interceptor`] - idempotent interception of add-to-cart actions
//!   arriving through overlapping page entry points
//! - [`resolver`] - priority-cascade resolution of product/variant data
//!   from several inconsistent, redundantly-encoded page sources
//! - [`cart`] - the line-item identity and merge rule
//! - [`store`] - persistence plus same-context and cross-context change
//!   signals
//! - [`observer`] - keeps the form's hidden variant-id field current
//! - [`options`] - canonicalization of raw option selections
//! - [`checkout`] - order capture for the checkout collaborator
//!
//! Rendering (cart widget, toasts) is a consumer concern: hosts subscribe
//! to cart changes via [`cart::CartEngine::on_change`] and map
//! [`interceptor::Dispatch`] outcomes to whatever UI they own.
//!
//! # Concurrency
//!
//! Execution is single-threaded, cooperative, and event-driven: the host
//! feeds [`page::PageDocument`] snapshots and [`interceptor::PageEvent`]s
//! into a [`interceptor::CartSession`], and every handler runs to
//! completion before the next event. Cross-context concurrency (two
//! browsing contexts sharing one origin) is last-write-wins with a full
//! reload on change notification.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod entities;
pub mod error;
pub mod interceptor;
pub mod observer;
pub mod options;
pub mod page;
pub mod resolver;
pub mod store;

pub use cart::{AddOutcome, CandidateItem, CartEngine};
pub use checkout::{CheckoutDetails, capture_order};
pub use config::{CartConfig, ConfigError, PackageOverride};
pub use error::{CartError, Result};
pub use interceptor::{CartSession, Dispatch, PageEvent, ProcessingGuard};
pub use page::PageDocument;
pub use resolver::{ResolvedProduct, Resolver, normalize_image_url};
pub use store::{
    ChangeHub, FileBackend, MemoryBackend, OrderLog, PersistentStore, StorageBackend, StorageError,
};
