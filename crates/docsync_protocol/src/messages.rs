//! Request and response messages of the remote document API.

use crate::document::{DocumentSummary, WriteMode, WriteOptions};
use crate::error::{ProtocolError, ProtocolResult};
use crate::page::{ContinuationToken, Page};
use crate::partition::PartitionId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A message that travels to or from the store as CBOR.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Encodes to CBOR.
    fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| ProtocolError::encoding(e.to_string()))?;
        Ok(bytes)
    }

    /// Decodes from CBOR.
    fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| ProtocolError::decoding(e.to_string()))
    }
}

/// Lists one page of documents in a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDocumentsRequest {
    /// Partition to list.
    pub partition: PartitionId,
    /// Document type the caller expects.
    pub document_type: String,
    /// Requested page size (a hint, the store may return fewer).
    pub page_size: u32,
    /// Token from the previous page; `None` asks for the first page.
    pub continuation: Option<ContinuationToken>,
}

impl ListDocumentsRequest {
    /// Creates a first-page request.
    pub fn first_page(
        partition: PartitionId,
        document_type: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            partition,
            document_type: document_type.into(),
            page_size,
            continuation: None,
        }
    }

    /// Turns this request into the request for the page after `token`.
    pub fn after(mut self, token: ContinuationToken) -> Self {
        self.continuation = Some(token);
        self
    }
}

impl WireMessage for ListDocumentsRequest {}

/// One page of listed documents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListDocumentsResponse {
    /// Documents in server order.
    pub documents: Vec<DocumentSummary>,
    /// Token for the next page, absent on the last page.
    pub continuation: Option<ContinuationToken>,
}

impl ListDocumentsResponse {
    /// Creates a response.
    pub fn new(documents: Vec<DocumentSummary>, continuation: Option<ContinuationToken>) -> Self {
        Self {
            documents,
            continuation,
        }
    }

    /// Converts into a [`Page`] of `partition`.
    pub fn into_page(self, partition: PartitionId) -> Page {
        Page::new(partition, self.documents, self.continuation)
    }
}

impl WireMessage for ListDocumentsResponse {}

/// Creates or replaces one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteDocumentRequest {
    /// Target partition.
    pub partition: PartitionId,
    /// Target document id.
    pub document_id: String,
    /// Document type of the content.
    pub document_type: String,
    /// New document content.
    pub content: Vec<u8>,
    /// Write options.
    pub options: WriteOptions,
    /// Create or replace.
    pub mode: WriteMode,
}

impl WireMessage for WriteDocumentRequest {}

/// The document as stored after a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteDocumentResponse {
    /// Stored document, with server metadata.
    pub document: DocumentSummary,
}

impl WireMessage for WriteDocumentResponse {}

/// Deletes one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDocumentRequest {
    /// Target partition.
    pub partition: PartitionId,
    /// Target document id.
    pub document_id: String,
}

impl DeleteDocumentRequest {
    /// Creates a delete request.
    pub fn new(partition: PartitionId, document_id: impl Into<String>) -> Self {
        Self {
            partition,
            document_id: document_id.into(),
        }
    }
}

impl WireMessage for DeleteDocumentRequest {}
