//! # DocSync Engine
//!
//! Client-side sync layer for a remote, partitioned document store.
//!
//! This crate provides:
//! - Per-partition list cache
//! - Pagination state machine with a single-flight guard
//! - Page fetching over an abstract document store
//! - Write reconciliation (optimistic deletes, reload for writes)
//! - A presentation-facing session that runs remote calls in the background
//! - HTTP and in-memory document stores
//!
//! ## Architecture
//!
//! A caller selects a partition; the [`PaginationController`] asks the
//! [`PageFetcher`] for page 1 and the result replaces that partition's list
//! in the [`PartitionCache`]. "Load more" fetches the next page and appends
//! it, with at most one fetch per partition in flight. Writes go through the
//! [`MutationReconciler`], which performs the remote operation and then
//! reconciles the cache.
//!
//! ## Key Invariants
//!
//! - The User partition is never read or written without authorization
//! - A partition's list only grows during a pagination session
//! - First-page loads and post-write reloads replace a list whole
//! - No remote call is retried automatically
//! - Every failure leaves the cache as it was, except that a confirmed
//!   missing document is dropped from it

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod fetcher;
mod http;
mod memory;
mod pagination;
mod reconciler;
mod session;
mod store;

pub use cache::PartitionCache;
pub use config::SessionConfig;
pub use error::{SyncError, SyncResult};
pub use fetcher::{PageFetcher, RemotePageFetcher};
pub use http::{HttpClient, HttpDocumentStore, HttpResponse, LoopbackClient};
pub use memory::MemoryDocumentStore;
pub use pagination::{
    FetchRequest, FetchTicket, PageOutcome, PaginationController, PaginationState, PaginationStats,
};
pub use reconciler::{MutationReconciler, PendingDelete, WriteReceipt};
pub use session::{ListEntry, SessionEvent, StorageSession};
pub use store::DocumentStore;
