//! Cloud inventory API seam
//!
//! Providers talk to the inventory through [`InventoryApi`]. The production
//! implementation is [`HttpInventoryClient`]; tests use `FakeInventory`.

mod error;
#[cfg(test)]
pub mod fake;
mod http;
mod types;

pub use error::CloudError;
pub use http::{HttpInventoryClient, InventoryClientConfig};
pub use types::{Filter, InventoryApi, Page};
