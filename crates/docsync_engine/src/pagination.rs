//! Pagination state machine.
//!
//! Every partition owns an independent cursor that moves through four
//! states:
//!
//! ```text
//!   Idle ──begin_first_page──▶ Loading ──ok──▶ Loaded ──begin_load_more──▶ LoadingMore
//!    ▲                           │  ▲            │  ▲                          │
//!    └────────── err ────────────┘  └── reload ──┘  └──────── ok / err ───────┘
//! ```
//!
//! Fetching is split in two halves so that the network call can run on a
//! background worker: `begin_*` checks the single-flight guard and hands out
//! a [`FetchTicket`], the ticket is run against a [`PageFetcher`], and
//! [`PaginationController::complete`] applies the result to the cache and
//! releases the guard. `load_first_page` and `load_more` run all three steps
//! inline.
//!
//! ## Key Invariants
//!
//! - At most one page fetch per partition is in flight
//! - A `load_more` while a fetch is in flight is dropped, not queued
//! - The guard is released on success and on failure
//! - Once a page ends pagination, `load_more` is a no-op until the next
//!   first-page load
//! - A first-page load requested while a fetch is in flight is deferred: the
//!   in-flight result is discarded and the first page is fetched instead

use crate::cache::PartitionCache;
use crate::error::{SyncError, SyncResult};
use crate::fetcher::PageFetcher;
use docsync_protocol::{Authorization, ContinuationToken, Page, PartitionId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The pagination state of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationState {
    /// Never loaded, or the first load failed.
    #[default]
    Idle,
    /// First page in flight.
    Loading,
    /// Cache populated, no fetch in flight.
    Loaded,
    /// Next page in flight.
    LoadingMore,
}

impl PaginationState {
    /// Returns true if a page fetch is in flight.
    pub fn is_fetching(&self) -> bool {
        matches!(self, PaginationState::Loading | PaginationState::LoadingMore)
    }
}

/// Which page a ticket fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    /// The first page.
    FirstPage,
    /// The page after the given token.
    NextPage(ContinuationToken),
}

/// Permission to run exactly one page fetch for a partition.
///
/// Issued by `begin_first_page`/`begin_load_more` with the partition's guard
/// set; the guard is released when the ticket is passed to `complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    partition: PartitionId,
    request: FetchRequest,
}

impl FetchTicket {
    fn first_page(partition: PartitionId) -> Self {
        Self {
            partition,
            request: FetchRequest::FirstPage,
        }
    }

    fn next_page(partition: PartitionId, token: ContinuationToken) -> Self {
        Self {
            partition,
            request: FetchRequest::NextPage(token),
        }
    }

    /// Partition the ticket was issued for.
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Page the ticket fetches.
    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    /// Performs the fetch. Does not touch any controller state.
    pub fn run<F: PageFetcher + ?Sized>(&self, fetcher: &F) -> SyncResult<Page> {
        match &self.request {
            FetchRequest::FirstPage => fetcher.fetch_first_page(self.partition),
            FetchRequest::NextPage(token) => fetcher.fetch_next_page(self.partition, token),
        }
    }
}

/// What applying a page (or trying to start one) did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The partition's list was replaced by a first page.
    Replaced {
        /// Items now cached.
        count: usize,
        /// Whether a further page exists.
        has_more: bool,
    },
    /// A next page was appended.
    Appended {
        /// Items appended.
        count: usize,
        /// Whether a further page exists.
        has_more: bool,
    },
    /// The next page was empty; the cursor is now exhausted.
    Exhausted,
    /// The result was discarded because a reload was requested meanwhile.
    /// The ticket fetches the first page and must be run and completed.
    Superseded(FetchTicket),
    /// A fetch was in flight; the reload runs when it completes.
    ReloadQueued,
    /// `load_more` was a no-op (not loaded, in flight, or exhausted).
    Skipped,
}

/// Statistics about pagination.
#[derive(Debug, Clone, Default)]
pub struct PaginationStats {
    /// First pages applied.
    pub first_pages_loaded: u64,
    /// Next pages applied.
    pub next_pages_loaded: u64,
    /// Items placed in the cache by either kind of page.
    pub items_loaded: u64,
    /// Fetches that completed with an error.
    pub fetch_failures: u64,
    /// `load_more` calls that were no-ops.
    pub skipped_load_more: u64,
    /// Pages discarded because a reload superseded them.
    pub discarded_pages: u64,
}

#[derive(Debug, Default)]
struct Cursor {
    state: PaginationState,
    continuation: Option<ContinuationToken>,
    exhausted: bool,
    loaded_once: bool,
    reload_pending: bool,
}

impl Cursor {
    fn has_further_page(&self) -> bool {
        !self.exhausted && self.continuation.is_some()
    }
}

/// Drives first-page loads and load-more requests for every partition and
/// merges the results into the [`PartitionCache`].
pub struct PaginationController<F: PageFetcher> {
    fetcher: Arc<F>,
    cache: Arc<PartitionCache>,
    authorization: Authorization,
    cursors: RwLock<BTreeMap<PartitionId, Cursor>>,
    stats: RwLock<PaginationStats>,
}

impl<F: PageFetcher> PaginationController<F> {
    /// Creates a controller. `authorization` is captured for its lifetime.
    pub fn new(fetcher: Arc<F>, cache: Arc<PartitionCache>, authorization: Authorization) -> Self {
        Self {
            fetcher,
            cache,
            authorization,
            cursors: RwLock::new(BTreeMap::new()),
            stats: RwLock::new(PaginationStats::default()),
        }
    }

    /// Returns the page fetcher.
    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    /// Returns the cache this controller writes to.
    pub fn cache(&self) -> &Arc<PartitionCache> {
        &self.cache
    }

    /// Returns the captured authorization flag.
    pub fn authorization(&self) -> Authorization {
        self.authorization
    }

    /// Gets the state of a partition.
    pub fn state(&self, partition: PartitionId) -> PaginationState {
        self.cursors
            .read()
            .get(&partition)
            .map(|c| c.state)
            .unwrap_or_default()
    }

    /// Returns true if a first page was ever applied for the partition.
    pub fn has_loaded(&self, partition: PartitionId) -> bool {
        self.cursors
            .read()
            .get(&partition)
            .is_some_and(|c| c.loaded_once)
    }

    /// Returns true if the partition is loaded and a further page exists.
    pub fn is_load_more_possible(&self, partition: PartitionId) -> bool {
        if !self.authorization.permits(partition) {
            return false;
        }
        self.cursors.read().get(&partition).is_some_and(|c| {
            matches!(
                c.state,
                PaginationState::Loaded | PaginationState::LoadingMore
            ) && c.has_further_page()
        })
    }

    /// Gets the current stats.
    pub fn stats(&self) -> PaginationStats {
        self.stats.read().clone()
    }

    /// Fails with `Unauthorized` if the caller may not access `partition`.
    pub fn authorize(&self, partition: PartitionId) -> SyncResult<()> {
        if self.authorization.permits(partition) {
            Ok(())
        } else {
            Err(SyncError::Unauthorized(partition))
        }
    }

    /// Starts a first-page load.
    ///
    /// Returns `None` if a fetch is already in flight; the reload is then
    /// performed when that fetch completes.
    pub fn begin_first_page(&self, partition: PartitionId) -> SyncResult<Option<FetchTicket>> {
        self.authorize(partition)?;

        let mut cursors = self.cursors.write();
        let cursor = cursors.entry(partition).or_default();
        if cursor.state.is_fetching() {
            cursor.reload_pending = true;
            debug!(partition = %partition, "reload queued behind in-flight fetch");
            return Ok(None);
        }

        debug!(partition = %partition, from = ?cursor.state, "loading first page");
        cursor.state = PaginationState::Loading;
        Ok(Some(FetchTicket::first_page(partition)))
    }

    /// Starts a next-page load.
    ///
    /// Returns `None` (single-flight) if the partition is not loaded, a fetch
    /// is in flight, or no further page exists.
    pub fn begin_load_more(&self, partition: PartitionId) -> SyncResult<Option<FetchTicket>> {
        self.authorize(partition)?;

        let mut cursors = self.cursors.write();
        let cursor = cursors.entry(partition).or_default();
        let token = match (&cursor.state, &cursor.continuation) {
            (PaginationState::Loaded, Some(token)) if !cursor.exhausted => token.clone(),
            (state, _) => {
                self.stats.write().skipped_load_more += 1;
                debug!(
                    partition = %partition,
                    state = ?state,
                    exhausted = cursor.exhausted,
                    "load more skipped"
                );
                return Ok(None);
            }
        };

        cursor.state = PaginationState::LoadingMore;
        Ok(Some(FetchTicket::next_page(partition, token)))
    }

    /// Applies the result of a ticket's fetch and releases the guard.
    ///
    /// Must be called exactly once per ticket. On failure the error is
    /// returned and the previous list and cursor are kept.
    pub fn complete(&self, ticket: FetchTicket, result: SyncResult<Page>) -> SyncResult<PageOutcome> {
        let partition = ticket.partition;
        let mut cursors = self.cursors.write();
        let cursor = cursors.entry(partition).or_default();

        let expected = match ticket.request {
            FetchRequest::FirstPage => PaginationState::Loading,
            FetchRequest::NextPage(_) => PaginationState::LoadingMore,
        };
        if cursor.state != expected {
            return Err(SyncError::InvalidStateTransition {
                partition,
                from: format!("{:?}", cursor.state),
                to: format!("{:?}", PaginationState::Loaded),
            });
        }

        if cursor.reload_pending {
            cursor.reload_pending = false;
            cursor.state = PaginationState::Loading;
            self.stats.write().discarded_pages += 1;
            debug!(partition = %partition, "page superseded by reload");
            return Ok(PageOutcome::Superseded(FetchTicket::first_page(partition)));
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                cursor.state = match ticket.request {
                    FetchRequest::FirstPage if !cursor.loaded_once => PaginationState::Idle,
                    _ => PaginationState::Loaded,
                };
                self.stats.write().fetch_failures += 1;
                warn!(partition = %partition, error = %e, "page fetch failed");
                return Err(e);
            }
        };

        let has_more = !page.ends_pagination();
        let Page {
            items,
            continuation,
            ..
        } = page;
        let count = items.len();

        cursor.state = PaginationState::Loaded;
        cursor.exhausted = !has_more;
        cursor.continuation = if has_more { continuation } else { None };

        let mut stats = self.stats.write();
        stats.items_loaded += count as u64;

        match ticket.request {
            FetchRequest::FirstPage => {
                cursor.loaded_once = true;
                self.cache.replace(partition, items);
                stats.first_pages_loaded += 1;
                debug!(partition = %partition, count, has_more, "first page applied");
                Ok(PageOutcome::Replaced { count, has_more })
            }
            FetchRequest::NextPage(_) if count == 0 => {
                debug!(partition = %partition, "empty page, pagination exhausted");
                Ok(PageOutcome::Exhausted)
            }
            FetchRequest::NextPage(_) => {
                let total = self.cache.append(partition, items);
                stats.next_pages_loaded += 1;
                debug!(partition = %partition, count, total, has_more, "next page appended");
                Ok(PageOutcome::Appended { count, has_more })
            }
        }
    }

    /// Runs a ticket and completes it, following reloads that supersede it.
    pub fn drive(&self, mut ticket: FetchTicket) -> SyncResult<PageOutcome> {
        loop {
            let result = ticket.run(self.fetcher.as_ref());
            match self.complete(ticket, result)? {
                PageOutcome::Superseded(next) => ticket = next,
                outcome => return Ok(outcome),
            }
        }
    }

    /// Loads the first page inline, replacing the partition's list.
    pub fn load_first_page(&self, partition: PartitionId) -> SyncResult<PageOutcome> {
        match self.begin_first_page(partition)? {
            Some(ticket) => self.drive(ticket),
            None => Ok(PageOutcome::ReloadQueued),
        }
    }

    /// Loads the next page inline, appending it to the partition's list.
    pub fn load_more(&self, partition: PartitionId) -> SyncResult<PageOutcome> {
        match self.begin_load_more(partition)? {
            Some(ticket) => self.drive(ticket),
            None => Ok(PageOutcome::Skipped),
        }
    }
}
