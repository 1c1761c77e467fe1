//! Presentation-facing session.
//!
//! A [`StorageSession`] is owned by the presentation context. Every remote
//! call is dispatched to the runtime's blocking pool and its completion comes
//! back over a channel; completions only touch the cache and the cursors when
//! the owner drains them with [`StorageSession::process_pending`],
//! [`StorageSession::next_completion`] or [`StorageSession::settle`]. The one
//! exception is a delete, whose entry leaves the cache when it is requested.
//! Cache mutations are therefore serialized on the owner, and the `request_*`
//! calls never block on the network.

use crate::cache::PartitionCache;
use crate::config::SessionConfig;
use crate::error::{SyncError, SyncResult};
use crate::fetcher::RemotePageFetcher;
use crate::pagination::{FetchTicket, PageOutcome, PaginationController, PaginationStats};
use crate::reconciler::{MutationReconciler, PendingDelete};
use crate::store::DocumentStore;
use docsync_protocol::{DocumentSummary, Page, PartitionId, WriteMode, WriteOptions};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One row of the list shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Document id.
    pub document_id: String,
    /// Text shown for the document.
    pub display_summary: String,
}

impl From<&DocumentSummary> for ListEntry {
    fn from(doc: &DocumentSummary) -> Self {
        Self {
            document_id: doc.document_id.clone(),
            display_summary: doc.display_summary().to_string(),
        }
    }
}

/// What a processed completion changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A first page replaced the partition's list.
    ListReplaced {
        /// Affected partition.
        partition: PartitionId,
        /// Items now listed.
        count: usize,
        /// Whether a further page exists.
        has_more: bool,
    },
    /// A next page was appended.
    ListAppended {
        /// Affected partition.
        partition: PartitionId,
        /// Items appended.
        count: usize,
        /// Whether a further page exists.
        has_more: bool,
    },
    /// The partition has no further pages.
    ListExhausted {
        /// Affected partition.
        partition: PartitionId,
    },
    /// A page fetch failed; the previous list is kept.
    LoadFailed {
        /// Affected partition.
        partition: PartitionId,
        /// Cause.
        error: SyncError,
    },
    /// A create or replace was confirmed; a reload is under way.
    DocumentWritten {
        /// Affected partition.
        partition: PartitionId,
        /// The document as stored.
        document: DocumentSummary,
        /// Create or replace.
        mode: WriteMode,
    },
    /// A delete was confirmed. The entry left the cache when it was issued.
    DocumentDeleted {
        /// Affected partition.
        partition: PartitionId,
        /// Deleted document id.
        document_id: String,
    },
    /// A create, replace or delete failed. A failed delete has put its
    /// entry back unless the store reported `NotFound`.
    MutationFailed {
        /// Affected partition.
        partition: PartitionId,
        /// Target document id.
        document_id: String,
        /// Cause.
        error: SyncError,
    },
}

enum Completion {
    Page {
        ticket: FetchTicket,
        result: SyncResult<Page>,
    },
    Write {
        partition: PartitionId,
        document_id: String,
        mode: WriteMode,
        result: SyncResult<DocumentSummary>,
    },
    Delete {
        pending: PendingDelete,
        result: SyncResult<()>,
    },
}

/// Entry point for a presentation component.
pub struct StorageSession<S: DocumentStore + 'static> {
    config: SessionConfig,
    store: Arc<S>,
    controller: Arc<PaginationController<RemotePageFetcher<S>>>,
    reconciler: MutationReconciler<S, RemotePageFetcher<S>>,
    runtime: Handle,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    selected: PartitionId,
    in_flight: usize,
}

impl<S: DocumentStore + 'static> StorageSession<S> {
    /// Opens a session with a fresh cache. The App partition is selected
    /// but not loaded.
    pub fn open(store: Arc<S>, config: SessionConfig, runtime: Handle) -> Self {
        Self::with_cache(store, Arc::new(PartitionCache::new()), config, runtime)
    }

    /// Opens a session over an existing cache.
    pub fn with_cache(
        store: Arc<S>,
        cache: Arc<PartitionCache>,
        config: SessionConfig,
        runtime: Handle,
    ) -> Self {
        let fetcher = Arc::new(RemotePageFetcher::new(
            Arc::clone(&store),
            config.document_type.clone(),
            config.page_size,
        ));
        let controller = Arc::new(PaginationController::new(
            fetcher,
            cache,
            config.authorization,
        ));
        let reconciler = MutationReconciler::new(
            Arc::clone(&store),
            Arc::clone(&controller),
            config.document_type.clone(),
        );
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        info!(
            signed_in = config.authorization.is_signed_in(),
            page_size = config.page_size,
            document_type = %config.document_type,
            "storage session opened"
        );

        Self {
            config,
            store,
            controller,
            reconciler,
            runtime,
            completion_tx,
            completion_rx,
            selected: PartitionId::App,
            in_flight: 0,
        }
    }

    /// Returns the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the shared cache.
    pub fn cache(&self) -> &Arc<PartitionCache> {
        self.controller.cache()
    }

    /// Returns the pagination controller.
    pub fn controller(&self) -> &Arc<PaginationController<RemotePageFetcher<S>>> {
        &self.controller
    }

    /// Gets the pagination stats.
    pub fn stats(&self) -> PaginationStats {
        self.controller.stats()
    }

    /// Returns the selected partition.
    pub fn selected_partition(&self) -> PartitionId {
        self.selected
    }

    /// Returns the number of dispatched operations not yet processed.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// The partition's list, empty if the caller may not see it.
    pub fn current_list(&self, partition: PartitionId) -> Vec<ListEntry> {
        if !self.config.authorization.permits(partition) {
            return Vec::new();
        }
        self.cache()
            .read(partition)
            .iter()
            .map(ListEntry::from)
            .collect()
    }

    /// Looks up a cached document.
    pub fn document(&self, partition: PartitionId, document_id: &str) -> Option<DocumentSummary> {
        if !self.config.authorization.permits(partition) {
            return None;
        }
        self.cache().get(partition, document_id)
    }

    /// Returns true if the partition has a further page.
    pub fn is_load_more_possible(&self, partition: PartitionId) -> bool {
        self.controller.is_load_more_possible(partition)
    }

    /// Requests the next page of a partition.
    ///
    /// Fails with `Unauthorized` if the caller may not access `partition`.
    /// Returns false if nothing was dispatched because the partition is not
    /// loaded, a fetch is in flight, or no further page exists.
    pub fn request_load_more(&mut self, partition: PartitionId) -> SyncResult<bool> {
        match self.controller.begin_load_more(partition)? {
            Some(ticket) => {
                self.dispatch_fetch(ticket);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Selects `partition`, loading its first page if it was never loaded.
    ///
    /// Fails with `Unauthorized`, keeping the current selection, if the
    /// caller may not access `partition`. Returns true if a fetch was
    /// dispatched.
    pub fn request_partition_switch(&mut self, partition: PartitionId) -> SyncResult<bool> {
        self.controller.authorize(partition)?;
        if partition != self.selected {
            info!(from = %self.selected, to = %partition, "partition switched");
            self.selected = partition;
        }

        if self.controller.has_loaded(partition) || self.controller.state(partition).is_fetching() {
            return Ok(false);
        }
        self.request_first_page(partition)
    }

    /// Reloads the selected partition from its first page.
    pub fn request_reload(&mut self) -> SyncResult<bool> {
        self.request_first_page(self.selected)
    }

    /// Deletes a document in the background.
    ///
    /// The entry leaves [`current_list`](Self::current_list) before this
    /// returns. Validation and authorization failures are returned
    /// immediately; the remote outcome arrives as a [`SessionEvent`].
    pub fn request_delete(&mut self, partition: PartitionId, document_id: &str) -> SyncResult<()> {
        let pending = self.reconciler.begin_delete(partition, document_id)?;
        let store = Arc::clone(&self.store);
        let tx = self.completion_tx.clone();

        self.in_flight += 1;
        self.runtime.spawn_blocking(move || {
            let result = store.delete_document(&pending.request);
            if tx.send(Completion::Delete { pending, result }).is_err() {
                debug!(partition = %partition, "session closed before delete completed");
            }
        });
        Ok(())
    }

    /// Creates or replaces a document in the background.
    ///
    /// `options` falls back to the session's default write options. On
    /// success the partition is reloaded.
    pub fn request_create_or_replace(
        &mut self,
        partition: PartitionId,
        document_id: &str,
        payload: Vec<u8>,
        options: Option<WriteOptions>,
        is_replace: bool,
    ) -> SyncResult<()> {
        let mode = if is_replace {
            WriteMode::Replace
        } else {
            WriteMode::Create
        };
        let options = options.unwrap_or(self.config.default_write_options);
        let request = self
            .reconciler
            .prepare_write(partition, document_id, payload, options, mode)?;
        let store = Arc::clone(&self.store);
        let tx = self.completion_tx.clone();
        let document_id = document_id.to_string();

        self.in_flight += 1;
        self.runtime.spawn_blocking(move || {
            let result = store.write_document(&request);
            let completion = Completion::Write {
                partition,
                document_id,
                mode,
                result,
            };
            if tx.send(completion).is_err() {
                debug!(partition = %partition, "session closed before write completed");
            }
        });
        Ok(())
    }

    /// Applies every completion that has already arrived, without waiting.
    pub fn process_pending(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            events.extend(self.apply(completion));
        }
        events
    }

    /// Waits for the next completion that produces an event and applies it.
    ///
    /// Returns `None` once nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<SessionEvent> {
        while self.in_flight > 0 {
            let completion = self.completion_rx.recv().await?;
            if let Some(event) = self.apply(completion) {
                return Some(event);
            }
        }
        None
    }

    /// Waits until nothing is in flight, returning every event on the way.
    pub async fn settle(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_completion().await {
            events.push(event);
        }
        events
    }

    fn request_first_page(&mut self, partition: PartitionId) -> SyncResult<bool> {
        match self.controller.begin_first_page(partition)? {
            Some(ticket) => {
                self.dispatch_fetch(ticket);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn dispatch_fetch(&mut self, ticket: FetchTicket) {
        let fetcher = Arc::clone(self.controller.fetcher());
        let tx = self.completion_tx.clone();

        self.in_flight += 1;
        self.runtime.spawn_blocking(move || {
            let result = ticket.run(fetcher.as_ref());
            let partition = ticket.partition();
            if tx.send(Completion::Page { ticket, result }).is_err() {
                debug!(partition = %partition, "session closed before fetch completed");
            }
        });
    }

    fn apply(&mut self, completion: Completion) -> Option<SessionEvent> {
        self.in_flight = self.in_flight.saturating_sub(1);

        match completion {
            Completion::Page { ticket, result } => {
                let partition = ticket.partition();
                match self.controller.complete(ticket, result) {
                    Ok(PageOutcome::Replaced { count, has_more }) => Some(SessionEvent::ListReplaced {
                        partition,
                        count,
                        has_more,
                    }),
                    Ok(PageOutcome::Appended { count, has_more }) => Some(SessionEvent::ListAppended {
                        partition,
                        count,
                        has_more,
                    }),
                    Ok(PageOutcome::Exhausted) => Some(SessionEvent::ListExhausted { partition }),
                    Ok(PageOutcome::Superseded(next)) => {
                        self.dispatch_fetch(next);
                        None
                    }
                    Ok(PageOutcome::ReloadQueued | PageOutcome::Skipped) => None,
                    Err(error) => Some(SessionEvent::LoadFailed { partition, error }),
                }
            }
            Completion::Write {
                partition,
                document_id,
                mode,
                result,
            } => match self
                .reconciler
                .finish_write(partition, &document_id, mode, result)
            {
                Ok((document, ticket)) => {
                    if let Some(ticket) = ticket {
                        self.dispatch_fetch(ticket);
                    }
                    Some(SessionEvent::DocumentWritten {
                        partition,
                        document,
                        mode,
                    })
                }
                Err(error) => Some(SessionEvent::MutationFailed {
                    partition,
                    document_id,
                    error,
                }),
            },
            Completion::Delete { pending, result } => {
                let partition = pending.partition();
                let document_id = pending.document_id().to_string();
                match self.reconciler.finish_delete(pending, result) {
                    Ok(()) => Some(SessionEvent::DocumentDeleted {
                        partition,
                        document_id,
                    }),
                    Err(error) => Some(SessionEvent::MutationFailed {
                        partition,
                        document_id,
                        error,
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentStore;
    use docsync_protocol::Authorization;

    fn store() -> Arc<MemoryDocumentStore> {
        let store = MemoryDocumentStore::new();
        store.seed(
            PartitionId::App,
            (0..5).map(|i| (format!("app{i}"), Vec::new())),
        );
        store.seed(
            PartitionId::User,
            [("doc1", Vec::new()), ("doc2", Vec::new())],
        );
        Arc::new(store)
    }

    fn session(authorization: Authorization) -> StorageSession<MemoryDocumentStore> {
        let config = SessionConfig::new(authorization).with_page_size(2);
        StorageSession::open(store(), config, Handle::current())
    }

    fn ids(session: &StorageSession<MemoryDocumentStore>, partition: PartitionId) -> Vec<String> {
        session
            .current_list(partition)
            .into_iter()
            .map(|e| e.document_id)
            .collect()
    }

    #[tokio::test]
    async fn switch_loads_once() {
        let mut s = session(Authorization::anonymous());
        assert_eq!(s.selected_partition(), PartitionId::App);
        assert!(s.current_list(PartitionId::App).is_empty());

        assert!(s.request_partition_switch(PartitionId::App).unwrap());
        assert_eq!(
            s.settle().await,
            vec![SessionEvent::ListReplaced {
                partition: PartitionId::App,
                count: 2,
                has_more: true
            }]
        );
        assert_eq!(ids(&s, PartitionId::App), vec!["app0", "app1"]);

        assert!(!s.request_partition_switch(PartitionId::App).unwrap());
        assert_eq!(s.store().list_calls(), 1);
    }

    #[tokio::test]
    async fn load_more_is_single_flight() {
        let mut s = session(Authorization::anonymous());
        s.request_partition_switch(PartitionId::App).unwrap();
        s.settle().await;

        assert!(s.request_load_more(PartitionId::App).unwrap());
        assert!(!s.request_load_more(PartitionId::App).unwrap());
        assert!(!s.request_load_more(PartitionId::App).unwrap());
        assert_eq!(s.in_flight(), 1);

        s.settle().await;
        assert_eq!(s.store().list_calls(), 2);
        assert_eq!(s.current_list(PartitionId::App).len(), 4);

        assert!(s.request_load_more(PartitionId::App).unwrap());
        let events = s.settle().await;
        assert_eq!(
            events,
            vec![SessionEvent::ListAppended {
                partition: PartitionId::App,
                count: 1,
                has_more: false
            }]
        );
        assert!(!s.is_load_more_possible(PartitionId::App));
        assert!(!s.request_load_more(PartitionId::App).unwrap());
    }

    #[tokio::test]
    async fn unauthorized_switch_keeps_selection() {
        let mut s = session(Authorization::anonymous());
        assert_eq!(
            s.request_partition_switch(PartitionId::User).unwrap_err(),
            SyncError::Unauthorized(PartitionId::User)
        );
        assert_eq!(s.selected_partition(), PartitionId::App);
        assert_eq!(s.in_flight(), 0);
    }

    #[tokio::test]
    async fn delete_is_reconciled_in_place() {
        let mut s = session(Authorization::signed_in());
        s.request_partition_switch(PartitionId::User).unwrap();
        s.settle().await;

        s.request_delete(PartitionId::User, "doc1").unwrap();
        let events = s.settle().await;
        assert_eq!(
            events,
            vec![SessionEvent::DocumentDeleted {
                partition: PartitionId::User,
                document_id: "doc1".into()
            }]
        );
        assert_eq!(ids(&s, PartitionId::User), vec!["doc2"]);
        assert_eq!(s.store().list_calls(), 1);

        s.request_delete(PartitionId::User, "doc1").unwrap();
        let events = s.settle().await;
        assert!(matches!(
            &events[..],
            [SessionEvent::MutationFailed { error, .. }] if error.is_not_found()
        ));
        assert_eq!(ids(&s, PartitionId::User), vec!["doc2"]);
    }

    #[tokio::test]
    async fn delete_leaves_the_list_before_completion() {
        let mut s = session(Authorization::signed_in());
        s.request_partition_switch(PartitionId::User).unwrap();
        s.settle().await;

        s.request_delete(PartitionId::User, "doc1").unwrap();
        assert_eq!(ids(&s, PartitionId::User), vec!["doc2"]);
        assert_eq!(s.in_flight(), 1);

        s.settle().await;
        assert_eq!(ids(&s, PartitionId::User), vec!["doc2"]);
        assert_eq!(s.store().document_count(PartitionId::User), 1);
    }

    #[tokio::test]
    async fn failed_delete_puts_the_entry_back() {
        let mut s = session(Authorization::signed_in());
        s.request_partition_switch(PartitionId::User).unwrap();
        s.settle().await;
        s.store()
            .fail_next_write(SyncError::transport_retryable("timeout"));

        s.request_delete(PartitionId::User, "doc1").unwrap();
        assert_eq!(ids(&s, PartitionId::User), vec!["doc2"]);

        let events = s.settle().await;
        assert!(matches!(
            &events[..],
            [SessionEvent::MutationFailed { error, .. }] if error.is_retryable()
        ));
        assert_eq!(ids(&s, PartitionId::User), vec!["doc1", "doc2"]);
        assert_eq!(s.store().list_calls(), 1);
    }

    #[tokio::test]
    async fn signed_out_user_partition_stays_hidden() {
        let mut s = session(Authorization::anonymous());
        assert_eq!(
            s.request_load_more(PartitionId::User).unwrap_err(),
            SyncError::Unauthorized(PartitionId::User)
        );
        assert!(s.current_list(PartitionId::User).is_empty());
        assert!(!s.is_load_more_possible(PartitionId::User));
        assert_eq!(s.in_flight(), 0);
        assert_eq!(s.store().list_calls(), 0);
    }

    #[tokio::test]
    async fn unselected_partition_can_load_more() {
        let mut s = session(Authorization::signed_in());
        s.request_partition_switch(PartitionId::App).unwrap();
        s.settle().await;
        s.request_partition_switch(PartitionId::User).unwrap();
        s.settle().await;

        assert!(s.request_load_more(PartitionId::App).unwrap());
        s.settle().await;
        assert_eq!(s.selected_partition(), PartitionId::User);
        assert_eq!(s.current_list(PartitionId::App).len(), 4);
    }

    #[tokio::test]
    async fn write_triggers_reload() {
        let mut s = session(Authorization::signed_in());
        s.request_partition_switch(PartitionId::User).unwrap();
        s.settle().await;

        s.request_create_or_replace(PartitionId::User, "doc0", b"{}".to_vec(), None, false)
            .unwrap();
        let events = s.settle().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            SessionEvent::DocumentWritten {
                mode: WriteMode::Create,
                ..
            }
        ));
        assert!(matches!(
            &events[1],
            SessionEvent::ListReplaced {
                count: 2,
                has_more: true,
                ..
            }
        ));
        assert_eq!(s.store().list_calls(), 2);
        assert!(s.is_load_more_possible(PartitionId::User));
    }

    #[tokio::test]
    async fn reload_during_load_more_refetches_first_page() {
        let mut s = session(Authorization::anonymous());
        s.request_partition_switch(PartitionId::App).unwrap();
        s.settle().await;

        assert!(s.request_load_more(PartitionId::App).unwrap());
        assert!(!s.request_reload().unwrap());

        let events = s.settle().await;
        assert_eq!(
            events,
            vec![SessionEvent::ListReplaced {
                partition: PartitionId::App,
                count: 2,
                has_more: true
            }]
        );
        assert_eq!(ids(&s, PartitionId::App), vec!["app0", "app1"]);
        assert_eq!(s.stats().discarded_pages, 1);
    }

    #[tokio::test]
    async fn load_failure_is_reported() {
        let mut s = session(Authorization::anonymous());
        s.store()
            .fail_next_list(SyncError::transport_retryable("reset"));
        s.request_partition_switch(PartitionId::App).unwrap();

        let events = s.settle().await;
        assert!(matches!(
            &events[..],
            [SessionEvent::LoadFailed { error, .. }] if error.is_retryable()
        ));
        assert!(s.current_list(PartitionId::App).is_empty());
        assert!(s.request_partition_switch(PartitionId::App).unwrap());
        s.settle().await;
        assert_eq!(s.current_list(PartitionId::App).len(), 2);
    }

    #[tokio::test]
    async fn local_rejections_do_not_dispatch() {
        let mut s = session(Authorization::signed_in());
        assert!(matches!(
            s.request_delete(PartitionId::App, "app0"),
            Err(SyncError::ReadOnlyPartition(PartitionId::App))
        ));
        assert!(s
            .request_create_or_replace(PartitionId::User, "", Vec::new(), None, false)
            .is_err());
        assert_eq!(s.in_flight(), 0);
        assert!(s.settle().await.is_empty());
    }

    #[tokio::test]
    async fn document_lookup() {
        let mut s = session(Authorization::signed_in());
        s.request_partition_switch(PartitionId::User).unwrap();
        s.settle().await;
        assert_eq!(s.document(PartitionId::User, "doc2").unwrap().document_id, "doc2");
        assert!(s.document(PartitionId::User, "missing").is_none());
        assert!(s.process_pending().is_empty());
    }
}
