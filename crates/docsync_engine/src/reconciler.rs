//! Applies local writes to the store and reconciles the cache afterward.
//!
//! Deletes are optimistic: the entry leaves the cache as soon as the delete
//! is issued and is put back at its old index only if the store reports a
//! failure other than `NotFound`. Creates and replaces
//! never touch the cache directly; a confirmed write starts a first-page
//! reload of the partition so the cache shows what the store actually holds.

use crate::error::{SyncError, SyncResult};
use crate::fetcher::PageFetcher;
use crate::pagination::{FetchTicket, PageOutcome, PaginationController};
use crate::store::DocumentStore;
use docsync_protocol::{
    validate_document_id, DeleteDocumentRequest, DocumentSummary, PartitionId,
    WriteDocumentRequest, WriteMode, WriteOptions,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The result of a confirmed create or replace.
#[derive(Debug, Clone)]
pub struct WriteReceipt {
    /// The document as stored.
    pub document: DocumentSummary,
    /// Result of the reload that followed the write.
    ///
    /// A failed reload does not undo the write.
    pub reload: SyncResult<PageOutcome>,
}

/// A delete that has been issued but not yet answered.
///
/// The cache entry, if there was one, has already been taken out.
#[derive(Debug, Clone)]
pub struct PendingDelete {
    /// Request to send to the store.
    pub request: DeleteDocumentRequest,
    removed: Option<(usize, DocumentSummary)>,
}

impl PendingDelete {
    /// Target partition.
    pub fn partition(&self) -> PartitionId {
        self.request.partition
    }

    /// Target document id.
    pub fn document_id(&self) -> &str {
        &self.request.document_id
    }

    /// Returns true if a cached entry was removed when the delete was issued.
    pub fn removed_entry(&self) -> bool {
        self.removed.is_some()
    }
}

/// Performs creates, replaces and deletes against a [`DocumentStore`].
pub struct MutationReconciler<S: DocumentStore, F: PageFetcher> {
    store: Arc<S>,
    controller: Arc<PaginationController<F>>,
    document_type: String,
}

impl<S: DocumentStore, F: PageFetcher> MutationReconciler<S, F> {
    /// Creates a reconciler writing `document_type` documents.
    pub fn new(
        store: Arc<S>,
        controller: Arc<PaginationController<F>>,
        document_type: impl Into<String>,
    ) -> Self {
        Self {
            store,
            controller,
            document_type: document_type.into(),
        }
    }

    /// Returns the store writes are sent to.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the controller used for post-write reloads.
    pub fn controller(&self) -> &Arc<PaginationController<F>> {
        &self.controller
    }

    /// Fails unless local writes to `partition` are allowed for this caller.
    pub fn check_writable(&self, partition: PartitionId) -> SyncResult<()> {
        if !partition.is_writable() {
            return Err(SyncError::ReadOnlyPartition(partition));
        }
        self.controller.authorize(partition)
    }

    /// Validates a create or replace and builds its request.
    pub fn prepare_write(
        &self,
        partition: PartitionId,
        document_id: &str,
        content: Vec<u8>,
        options: WriteOptions,
        mode: WriteMode,
    ) -> SyncResult<WriteDocumentRequest> {
        self.check_writable(partition)?;
        validate_document_id(document_id)?;
        Ok(WriteDocumentRequest {
            partition,
            document_id: document_id.to_string(),
            document_type: self.document_type.clone(),
            content,
            options,
            mode,
        })
    }

    /// Validates a delete and builds its request.
    pub fn prepare_delete(
        &self,
        partition: PartitionId,
        document_id: &str,
    ) -> SyncResult<DeleteDocumentRequest> {
        self.check_writable(partition)?;
        validate_document_id(document_id)?;
        Ok(DeleteDocumentRequest::new(partition, document_id))
    }

    /// Reconciles the cache with the store's answer to a create or replace.
    ///
    /// On success returns the ticket of the reload to run, or `None` if a
    /// fetch was in flight and the reload was queued behind it. A replace
    /// that reports `NotFound` drops the stale cache entry before the error
    /// is returned.
    pub fn finish_write(
        &self,
        partition: PartitionId,
        document_id: &str,
        mode: WriteMode,
        result: SyncResult<DocumentSummary>,
    ) -> SyncResult<(DocumentSummary, Option<FetchTicket>)> {
        match result {
            Ok(document) => {
                info!(partition = %partition, document_id, mode = ?mode, "document written");
                let ticket = self.controller.begin_first_page(partition)?;
                Ok((document, ticket))
            }
            Err(e) if e.is_not_found() && mode == WriteMode::Replace => {
                if self.controller.cache().remove(partition, document_id) {
                    debug!(partition = %partition, document_id, "dropped stale entry");
                }
                Err(e)
            }
            Err(e) => {
                warn!(partition = %partition, document_id, error = %e, "write failed");
                Err(e)
            }
        }
    }

    /// Validates a delete and takes its entry out of the cache.
    pub fn begin_delete(
        &self,
        partition: PartitionId,
        document_id: &str,
    ) -> SyncResult<PendingDelete> {
        let request = self.prepare_delete(partition, document_id)?;
        let removed = self.controller.cache().take(partition, document_id);
        debug!(
            partition = %partition,
            document_id,
            cached = removed.is_some(),
            "delete issued"
        );
        Ok(PendingDelete { request, removed })
    }

    /// Reconciles the cache with the store's answer to a delete.
    ///
    /// Success and `NotFound` both confirm the document is absent, so the
    /// entry stays out; `NotFound` is still returned. Any other failure puts
    /// the entry back where it was.
    pub fn finish_delete(&self, pending: PendingDelete, result: SyncResult<()>) -> SyncResult<()> {
        let PendingDelete { request, removed } = pending;
        let partition = request.partition;
        let document_id = request.document_id.as_str();
        match result {
            Ok(()) => {
                info!(partition = %partition, document_id, "document deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(partition = %partition, document_id, "delete target already gone");
                Err(e)
            }
            Err(e) => {
                warn!(partition = %partition, document_id, error = %e, "delete failed");
                if let Some((index, document)) = removed {
                    self.controller.cache().restore(partition, index, document);
                }
                Err(e)
            }
        }
    }

    /// Creates a document and reloads the partition.
    pub fn create(
        &self,
        partition: PartitionId,
        document_id: &str,
        content: Vec<u8>,
        options: WriteOptions,
    ) -> SyncResult<WriteReceipt> {
        self.write(partition, document_id, content, options, WriteMode::Create)
    }

    /// Replaces a document and reloads the partition.
    pub fn replace(
        &self,
        partition: PartitionId,
        document_id: &str,
        content: Vec<u8>,
        options: WriteOptions,
    ) -> SyncResult<WriteReceipt> {
        self.write(partition, document_id, content, options, WriteMode::Replace)
    }

    /// Deletes a document, removing it from the cache up front.
    pub fn delete(&self, partition: PartitionId, document_id: &str) -> SyncResult<()> {
        let pending = self.begin_delete(partition, document_id)?;
        let result = self.store.delete_document(&pending.request);
        self.finish_delete(pending, result)
    }

    fn write(
        &self,
        partition: PartitionId,
        document_id: &str,
        content: Vec<u8>,
        options: WriteOptions,
        mode: WriteMode,
    ) -> SyncResult<WriteReceipt> {
        let request = self.prepare_write(partition, document_id, content, options, mode)?;
        let result = self.store.write_document(&request);
        let (document, ticket) = self.finish_write(partition, document_id, mode, result)?;

        let reload = match ticket {
            Some(ticket) => self.controller.drive(ticket),
            None => Ok(PageOutcome::ReloadQueued),
        };
        if let Err(e) = &reload {
            warn!(partition = %partition, error = %e, "reload after write failed");
        }
        Ok(WriteReceipt { document, reload })
    }
}
