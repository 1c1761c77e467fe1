//! # docsync protocol
//!
//! Data and wire types shared by the docsync engine and any remote document
//! store implementation.
//!
//! This crate provides:
//! - `PartitionId` and the `Authorization` gate for the user partition
//! - `DocumentSummary`, `WriteOptions` and `TimeToLive`
//! - `Page` and its opaque `ContinuationToken`
//! - Request/response messages of the remote document API
//! - CBOR encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod messages;
mod page;
mod partition;

pub use document::{validate_document_id, DocumentSummary, TimeToLive, WriteMode, WriteOptions};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    DeleteDocumentRequest, ListDocumentsRequest, ListDocumentsResponse, WireMessage,
    WriteDocumentRequest, WriteDocumentResponse,
};
pub use page::{ContinuationToken, Page};
pub use partition::{Authorization, PartitionId};
