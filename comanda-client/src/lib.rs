//! Comanda client sync core
//!
//! Client-side realtime state synchronization for the Comanda POS:
//! authoritative entity stores fed by a remote change feed, optimistic
//! local mutations, kitchen ticket prioritization, table/session
//! lifecycle control, and pure aggregation over store snapshots.
//!
//! The remote data service is an opaque collaborator behind the
//! [`remote::DataService`] trait; [`remote::MemoryDataService`] ships as
//! the in-memory reference implementation for tests and examples.

pub mod cash;
pub mod catalog;
pub mod config;
pub mod error;
pub mod feed;
pub mod hub;
pub mod kitchen;
pub mod logger;
pub mod remote;
pub mod reports;
pub mod store;
pub mod tables;

// Re-export main types
pub use config::{KitchenConfig, SyncConfig};
pub use error::{FlowError, FlowResult, FlowStage};
pub use feed::ChangeFeed;
pub use hub::StoreHub;
pub use remote::{DataService, Filter, MemoryDataService};
pub use store::{Entity, EntityStore, Mutation};
