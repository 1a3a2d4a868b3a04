//! Per-endpoint operations.
//!
//! Each module exposes plain functions returning an [`Operation`] descriptor
//! and adds the matching convenience method to [`Client`].
//!
//! [`Operation`]: crate::operation::Operation
//! [`Client`]: crate::client::Client

pub mod catalog;
pub mod metal;
pub mod ssh_keys;

pub use metal::ListMetalOptions;
