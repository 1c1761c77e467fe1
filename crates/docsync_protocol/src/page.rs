//! Pages of listed documents.

use crate::document::DocumentSummary;
use crate::partition::PartitionId;
use serde::{Deserialize, Serialize};

/// Opaque token the store hands out to fetch the page after the current one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wraps a token received from the store.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One batch of documents plus the token for the next batch, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Partition the page was listed from.
    pub partition: PartitionId,
    /// Documents in server order.
    pub items: Vec<DocumentSummary>,
    /// Token for the next page; `None` means this is the last page.
    pub continuation: Option<ContinuationToken>,
}

impl Page {
    /// Creates a page.
    pub fn new(
        partition: PartitionId,
        items: Vec<DocumentSummary>,
        continuation: Option<ContinuationToken>,
    ) -> Self {
        Self {
            partition,
            items,
            continuation,
        }
    }

    /// An empty, final page.
    pub fn empty(partition: PartitionId) -> Self {
        Self::new(partition, Vec::new(), None)
    }

    /// Returns true if the store reported a further page.
    pub fn has_next(&self) -> bool {
        self.continuation.is_some()
    }

    /// Returns true if pagination stops after this page.
    ///
    /// An empty page ends pagination even when it carries a token.
    pub fn ends_pagination(&self) -> bool {
        self.continuation.is_none() || self.items.is_empty()
    }

    /// Number of documents in the page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the page holds no documents.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
