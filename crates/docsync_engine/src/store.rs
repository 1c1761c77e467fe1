//! Boundary to the remote document store.

use crate::error::SyncResult;
use docsync_protocol::{
    DeleteDocumentRequest, DocumentSummary, ListDocumentsRequest, ListDocumentsResponse,
    WriteDocumentRequest, WriteMode,
};

/// A remote, partitioned document store.
///
/// This trait abstracts the store's SDK or wire protocol, allowing for
/// different implementations (HTTP, in-memory for testing, etc.). Every call
/// performs exactly one round trip and never retries on its own.
pub trait DocumentStore: Send + Sync {
    /// Lists one page of documents.
    fn list_documents(&self, request: &ListDocumentsRequest) -> SyncResult<ListDocumentsResponse>;

    /// Creates a document. Fails with `AlreadyExists` if the id is taken.
    fn create_document(&self, request: &WriteDocumentRequest) -> SyncResult<DocumentSummary>;

    /// Replaces a document. Fails with `NotFound` if the id does not exist.
    fn replace_document(&self, request: &WriteDocumentRequest) -> SyncResult<DocumentSummary>;

    /// Deletes a document. Fails with `NotFound` if the id does not exist.
    fn delete_document(&self, request: &DeleteDocumentRequest) -> SyncResult<()>;

    /// Checks if the store is reachable.
    fn is_connected(&self) -> bool;

    /// Dispatches a write to `create_document` or `replace_document`.
    fn write_document(&self, request: &WriteDocumentRequest) -> SyncResult<DocumentSummary> {
        match request.mode {
            WriteMode::Create => self.create_document(request),
            WriteMode::Replace => self.replace_document(request),
        }
    }
}
