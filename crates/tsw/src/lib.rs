//! Typed client for the TSW bare metal provisioning API.
//!
//! The crate is split into a generic request pipeline (configuration,
//! request building, transport with logging hooks, envelope decoding) and
//! thin per-endpoint operations for regions, images, SSH keys and metal
//! services.
//!
//! # Example
//!
//! ```rust,ignore
//! use tsw::{CancellationToken, Client, ListMetalOptions, PowerCommand};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::from_token(&std::env::var("TSW_API_KEY")?)?;
//!     let ctx = CancellationToken::new();
//!
//!     let services = client.list_metal(&ctx, &ListMetalOptions::default()).await?;
//!     for metal in services.result.unwrap_or_default() {
//!         println!("{} {}", metal.id, metal.display_name);
//!     }
//!
//!     client.send_power_command(&ctx, 10346, PowerCommand::PowerOff).await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod models;
pub mod operation;
pub mod request;
pub mod resources;
pub mod response;
pub mod transport;

pub use client::{Client, ClientBuilder, ClientConfig, DEFAULT_BASE_URL};
pub use error::Error;
pub use operation::Operation;
pub use request::{with_header, with_query_param, RequestBody, RequestOption};
pub use resources::ListMetalOptions;
pub use response::{ApiResponse, ErrorResponse, ListMetadata};
pub use transport::{CompletedRequest, HttpEngine, PlainLogger, RawResponse};

pub use models::*;

// Re-exported so callers don't need a direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;
