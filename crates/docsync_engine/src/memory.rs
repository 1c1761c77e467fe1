//! In-memory document store for tests and local tooling.

use crate::error::{SyncError, SyncResult};
use crate::store::DocumentStore;
use docsync_protocol::{
    ContinuationToken, DeleteDocumentRequest, DocumentSummary, ListDocumentsRequest,
    ListDocumentsResponse, PartitionId, WriteDocumentRequest,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Page size used when a request asks for zero documents.
const DEFAULT_PAGE_SIZE: u32 = 100;

/// A paged, partitioned document store held in memory.
///
/// Documents are listed in insertion order. Continuation tokens have the
/// form `"<remote partition name>:<offset>"`. Failures can be scripted per
/// call kind, and call counters let tests assert how many round trips a
/// component made.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    partitions: RwLock<BTreeMap<PartitionId, Vec<DocumentSummary>>>,
    max_page_size: RwLock<Option<u32>>,
    connected: AtomicBool,
    list_failures: Mutex<VecDeque<SyncError>>,
    write_failures: Mutex<VecDeque<SyncError>>,
    list_calls: AtomicU64,
    write_calls: AtomicU64,
    delete_calls: AtomicU64,
    clock: AtomicU64,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(BTreeMap::new()),
            max_page_size: RwLock::new(None),
            connected: AtomicBool::new(true),
            list_failures: Mutex::new(VecDeque::new()),
            write_failures: Mutex::new(VecDeque::new()),
            list_calls: AtomicU64::new(0),
            write_calls: AtomicU64::new(0),
            delete_calls: AtomicU64::new(0),
            clock: AtomicU64::new(0),
        }
    }

    /// Appends documents to a partition, stamping server metadata.
    pub fn seed<I, S>(&self, partition: PartitionId, documents: I)
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: Into<String>,
    {
        let mut partitions = self.partitions.write();
        let docs = partitions.entry(partition).or_default();
        for (id, content) in documents {
            let doc = self.stamp(DocumentSummary::new(partition, id, content));
            docs.push(doc);
        }
    }

    /// Caps the number of documents returned per page, whatever the request asks.
    pub fn set_max_page_size(&self, size: u32) {
        *self.max_page_size.write() = Some(size);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes the next list call fail with `error`.
    pub fn fail_next_list(&self, error: SyncError) {
        self.list_failures.lock().push_back(error);
    }

    /// Makes the next create, replace or delete call fail with `error`.
    pub fn fail_next_write(&self, error: SyncError) {
        self.write_failures.lock().push_back(error);
    }

    /// Number of list calls received.
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of create and replace calls received.
    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Number of delete calls received.
    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Returns all documents of a partition in listing order.
    pub fn snapshot(&self, partition: PartitionId) -> Vec<DocumentSummary> {
        self.partitions
            .read()
            .get(&partition)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of documents in a partition.
    pub fn document_count(&self, partition: PartitionId) -> usize {
        self.partitions
            .read()
            .get(&partition)
            .map_or(0, |docs| docs.len())
    }

    fn stamp(&self, mut doc: DocumentSummary) -> DocumentSummary {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        doc.etag = Some(format!("\"{tick}\""));
        doc.last_updated = Some(tick);
        doc
    }

    fn check_connected(&self) -> SyncResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SyncError::NotConnected)
        }
    }

    fn take_write_failure(&self) -> SyncResult<()> {
        match self.write_failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn parse_offset(partition: PartitionId, token: &ContinuationToken) -> SyncResult<usize> {
        token
            .as_str()
            .strip_prefix(partition.remote_name())
            .and_then(|rest| rest.strip_prefix(':'))
            .and_then(|offset| offset.parse().ok())
            .ok_or_else(|| {
                SyncError::Protocol(format!("invalid continuation token {:?}", token.as_str()))
            })
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn list_documents(&self, request: &ListDocumentsRequest) -> SyncResult<ListDocumentsResponse> {
        self.check_connected()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.list_failures.lock().pop_front() {
            return Err(error);
        }

        let offset = match &request.continuation {
            Some(token) => Self::parse_offset(request.partition, token)?,
            None => 0,
        };

        let requested = match request.page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n,
        };
        let max_page_size = *self.max_page_size.read();
        let page_size = max_page_size.map_or(requested, |max| requested.min(max)) as usize;

        let partitions = self.partitions.read();
        let docs = partitions
            .get(&request.partition)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let start = offset.min(docs.len());
        let end = (start + page_size).min(docs.len());
        let continuation = (end < docs.len()).then(|| {
            ContinuationToken::new(format!("{}:{}", request.partition.remote_name(), end))
        });

        Ok(ListDocumentsResponse::new(
            docs[start..end].to_vec(),
            continuation,
        ))
    }

    fn create_document(&self, request: &WriteDocumentRequest) -> SyncResult<DocumentSummary> {
        self.check_connected()?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.take_write_failure()?;

        let mut partitions = self.partitions.write();
        let docs = partitions.entry(request.partition).or_default();
        if docs.iter().any(|d| d.document_id == request.document_id) {
            return Err(SyncError::AlreadyExists {
                partition: request.partition,
                document_id: request.document_id.clone(),
            });
        }

        let doc = self.stamp(DocumentSummary::new(
            request.partition,
            request.document_id.clone(),
            request.content.clone(),
        ));
        docs.push(doc.clone());
        Ok(doc)
    }

    fn replace_document(&self, request: &WriteDocumentRequest) -> SyncResult<DocumentSummary> {
        self.check_connected()?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.take_write_failure()?;

        let mut partitions = self.partitions.write();
        let slot = partitions
            .get_mut(&request.partition)
            .and_then(|docs| docs.iter_mut().find(|d| d.document_id == request.document_id))
            .ok_or_else(|| SyncError::not_found(request.partition, request.document_id.clone()))?;

        *slot = self.stamp(DocumentSummary::new(
            request.partition,
            request.document_id.clone(),
            request.content.clone(),
        ));
        Ok(slot.clone())
    }

    fn delete_document(&self, request: &DeleteDocumentRequest) -> SyncResult<()> {
        self.check_connected()?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.take_write_failure()?;

        let mut partitions = self.partitions.write();
        let docs = partitions
            .get_mut(&request.partition)
            .ok_or_else(|| SyncError::not_found(request.partition, request.document_id.clone()))?;
        let index = docs
            .iter()
            .position(|d| d.document_id == request.document_id)
            .ok_or_else(|| SyncError::not_found(request.partition, request.document_id.clone()))?;
        docs.remove(index);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
