//! Local Cart Core - Shared types library.
//!
//! This crate provides the data model shared by the local cart components:
//! - `engine` - Cart state engine (interception, resolution, merge, storage)
//! - `integration-tests` - Cross-crate scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access, no page
//! parsing. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, prices, line items, normalized options, and
//!   order records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
