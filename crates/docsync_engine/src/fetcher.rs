//! Page fetching against a document store.

use crate::error::SyncResult;
use crate::store::DocumentStore;
use docsync_protocol::{ContinuationToken, ListDocumentsRequest, Page, PartitionId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches pages of a partition, one round trip per call.
///
/// Implementations never touch the partition cache. A response that cannot
/// be understood yields an empty, final page rather than an error.
pub trait PageFetcher: Send + Sync {
    /// Fetches the first page of `partition`.
    fn fetch_first_page(&self, partition: PartitionId) -> SyncResult<Page>;

    /// Fetches the page that follows `token`.
    fn fetch_next_page(&self, partition: PartitionId, token: &ContinuationToken)
        -> SyncResult<Page>;
}

/// A [`PageFetcher`] backed by a [`DocumentStore`].
pub struct RemotePageFetcher<S: DocumentStore> {
    store: Arc<S>,
    document_type: String,
    page_size: u32,
}

impl<S: DocumentStore> RemotePageFetcher<S> {
    /// Creates a fetcher that lists `document_type` documents, `page_size` at a time.
    pub fn new(store: Arc<S>, document_type: impl Into<String>, page_size: u32) -> Self {
        Self {
            store,
            document_type: document_type.into(),
            page_size,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn fetch(&self, request: ListDocumentsRequest) -> SyncResult<Page> {
        let partition = request.partition;
        match self.store.list_documents(&request) {
            Ok(response) => {
                let page = response.into_page(partition);
                debug!(
                    partition = %partition,
                    items = page.len(),
                    has_next = page.has_next(),
                    "fetched page"
                );
                Ok(page)
            }
            Err(e) if e.is_malformed_response() => {
                warn!(partition = %partition, error = %e, "dropping malformed page");
                Ok(Page::empty(partition))
            }
            Err(e) => Err(e),
        }
    }
}

impl<S: DocumentStore> PageFetcher for RemotePageFetcher<S> {
    fn fetch_first_page(&self, partition: PartitionId) -> SyncResult<Page> {
        self.fetch(ListDocumentsRequest::first_page(
            partition,
            self.document_type.clone(),
            self.page_size,
        ))
    }

    fn fetch_next_page(
        &self,
        partition: PartitionId,
        token: &ContinuationToken,
    ) -> SyncResult<Page> {
        self.fetch(
            ListDocumentsRequest::first_page(partition, self.document_type.clone(), self.page_size)
                .after(token.clone()),
        )
    }
}
