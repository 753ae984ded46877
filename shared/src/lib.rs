//! Shared types for the Comanda sync core
//!
//! Entity models, change-feed payload types and the error taxonomy used
//! across the client crates.

pub mod error;
pub mod feed;
pub mod models;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Change-feed re-exports (for convenient access)
pub use error::{RemoteError, RemoteResult};
pub use feed::{ChangeEvent, ChangeOp, Collection};
