//! Property tests for pagination and cache reconciliation.

use docsync_engine::{
    MemoryDocumentStore, PageOutcome, PaginationController, PartitionCache, RemotePageFetcher,
};
use docsync_protocol::{Authorization, DocumentSummary, PartitionId};
use proptest::prelude::*;
use std::sync::Arc;

fn controller(
    documents: usize,
    page_size: u32,
) -> PaginationController<RemotePageFetcher<MemoryDocumentStore>> {
    let store = MemoryDocumentStore::new();
    store.seed(
        PartitionId::App,
        (0..documents).map(|i| (format!("doc{i}"), Vec::new())),
    );
    let fetcher = RemotePageFetcher::new(Arc::new(store), "dictionary", page_size);
    PaginationController::new(
        Arc::new(fetcher),
        Arc::new(PartitionCache::new()),
        Authorization::anonymous(),
    )
}

fn ids(cache: &PartitionCache, partition: PartitionId) -> Vec<String> {
    cache
        .read(partition)
        .into_iter()
        .map(|d| d.document_id)
        .collect()
}

proptest! {
    #[test]
    fn load_more_only_extends_the_list(
        documents in 0usize..60,
        page_size in 1u32..10,
        calls in 0usize..15,
    ) {
        let c = controller(documents, page_size);
        c.load_first_page(PartitionId::App).unwrap();

        let mut previous = ids(c.cache(), PartitionId::App);
        for _ in 0..calls {
            c.load_more(PartitionId::App).unwrap();
            let current = ids(c.cache(), PartitionId::App);
            prop_assert!(current.len() >= previous.len());
            prop_assert_eq!(&current[..previous.len()], &previous[..]);
            previous = current;
        }

        let expected = documents.min(page_size as usize * (calls + 1));
        prop_assert_eq!(previous.len(), expected);
        prop_assert_eq!(
            c.is_load_more_possible(PartitionId::App),
            expected < documents
        );
    }

    #[test]
    fn overlapping_load_more_fetches_once(
        documents in 3usize..30,
        overlapping in 2usize..8,
    ) {
        let c = controller(documents, 2);
        c.load_first_page(PartitionId::App).unwrap();
        let calls_before = c.fetcher().store().list_calls();

        let tickets: Vec<_> = (0..overlapping)
            .filter_map(|_| c.begin_load_more(PartitionId::App).unwrap())
            .collect();
        prop_assert_eq!(tickets.len(), 1);

        for ticket in tickets {
            let result = ticket.run(c.fetcher().as_ref());
            c.complete(ticket, result).unwrap();
        }
        prop_assert_eq!(c.fetcher().store().list_calls(), calls_before + 1);
    }

    #[test]
    fn exhausted_cursor_stays_exhausted(documents in 0usize..12, extra in 1usize..5) {
        let c = controller(documents, 4);
        c.load_first_page(PartitionId::App).unwrap();
        while c.is_load_more_possible(PartitionId::App) {
            c.load_more(PartitionId::App).unwrap();
        }

        let calls = c.fetcher().store().list_calls();
        for _ in 0..extra {
            prop_assert_eq!(c.load_more(PartitionId::App).unwrap(), PageOutcome::Skipped);
        }
        prop_assert_eq!(c.fetcher().store().list_calls(), calls);
        prop_assert_eq!(c.cache().len(PartitionId::App), documents);
    }

    #[test]
    fn removal_is_idempotent(
        count in 1usize..20,
        removals in prop::collection::vec(0usize..25, 0..30),
    ) {
        let cache = PartitionCache::new();
        cache.replace(
            PartitionId::User,
            (0..count)
                .map(|i| DocumentSummary::new(PartitionId::User, format!("doc{i}"), Vec::new()))
                .collect(),
        );

        let mut removed = std::collections::BTreeSet::new();
        for index in removals {
            let id = format!("doc{index}");
            let changed = cache.remove(PartitionId::User, &id);
            prop_assert_eq!(changed, index < count && removed.insert(index));
        }

        let expected: Vec<String> = (0..count)
            .filter(|i| !removed.contains(i))
            .map(|i| format!("doc{i}"))
            .collect();
        prop_assert_eq!(ids(&cache, PartitionId::User), expected);
    }
}
