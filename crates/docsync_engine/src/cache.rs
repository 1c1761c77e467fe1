//! Ordered per-partition document lists.

use docsync_protocol::{DocumentSummary, PartitionId};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// One ordered sequence of document summaries per partition.
///
/// Order is server page order. During a pagination session the sequence only
/// grows at the tail; a first-page load or a post-write reload replaces it
/// whole. The cache is the only state the presentation layer reads and may
/// be shared (`Arc`) between several readers.
#[derive(Debug, Default)]
pub struct PartitionCache {
    lists: RwLock<BTreeMap<PartitionId, Vec<DocumentSummary>>>,
}

impl PartitionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the partition's list and stores `items` in its place.
    pub fn replace(&self, partition: PartitionId, items: Vec<DocumentSummary>) {
        self.lists.write().insert(partition, items);
    }

    /// Adds `items` to the tail in the given order. Returns the new length.
    pub fn append(&self, partition: PartitionId, items: Vec<DocumentSummary>) -> usize {
        let mut lists = self.lists.write();
        let list = lists.entry(partition).or_default();
        list.extend(items);
        list.len()
    }

    /// Removes the entry with `document_id`.
    ///
    /// Returns false, leaving the list untouched, if no entry matches.
    pub fn remove(&self, partition: PartitionId, document_id: &str) -> bool {
        self.take(partition, document_id).is_some()
    }

    /// Removes the entry with `document_id`, returning its index and value.
    pub fn take(
        &self,
        partition: PartitionId,
        document_id: &str,
    ) -> Option<(usize, DocumentSummary)> {
        let mut lists = self.lists.write();
        let list = lists.get_mut(&partition)?;
        let index = list.iter().position(|d| d.document_id == document_id)?;
        Some((index, list.remove(index)))
    }

    /// Puts a taken entry back at `index`, or at the tail if the list has
    /// since shrunk below it.
    ///
    /// Returns false, leaving the list untouched, if an entry with the same
    /// id is already cached.
    pub fn restore(
        &self,
        partition: PartitionId,
        index: usize,
        document: DocumentSummary,
    ) -> bool {
        let mut lists = self.lists.write();
        let list = lists.entry(partition).or_default();
        if list.iter().any(|d| d.document_id == document.document_id) {
            return false;
        }
        let index = index.min(list.len());
        list.insert(index, document);
        true
    }

    /// Returns a snapshot of the partition's list.
    pub fn read(&self, partition: PartitionId) -> Vec<DocumentSummary> {
        self.lists
            .read()
            .get(&partition)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the entry with `document_id`, if cached.
    pub fn get(&self, partition: PartitionId, document_id: &str) -> Option<DocumentSummary> {
        self.lists
            .read()
            .get(&partition)?
            .iter()
            .find(|d| d.document_id == document_id)
            .cloned()
    }

    /// Returns true if an entry with `document_id` is cached.
    pub fn contains(&self, partition: PartitionId, document_id: &str) -> bool {
        self.lists
            .read()
            .get(&partition)
            .is_some_and(|list| list.iter().any(|d| d.document_id == document_id))
    }

    /// Number of cached entries in the partition.
    pub fn len(&self, partition: PartitionId) -> usize {
        self.lists.read().get(&partition).map_or(0, Vec::len)
    }

    /// Returns true if the partition has no cached entries.
    pub fn is_empty(&self, partition: PartitionId) -> bool {
        self.len(partition) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(ids: &[&str]) -> Vec<DocumentSummary> {
        ids.iter()
            .map(|id| DocumentSummary::new(PartitionId::User, *id, Vec::new()))
            .collect()
    }

    fn ids(cache: &PartitionCache, partition: PartitionId) -> Vec<String> {
        cache
            .read(partition)
            .into_iter()
            .map(|d| d.document_id)
            .collect()
    }

    #[test]
    fn replace_discards_previous_list() {
        let cache = PartitionCache::new();
        cache.replace(PartitionId::User, docs(&["a", "b"]));
        cache.replace(PartitionId::User, docs(&["c"]));
        assert_eq!(ids(&cache, PartitionId::User), vec!["c"]);
    }

    #[test]
    fn append_keeps_order() {
        let cache = PartitionCache::new();
        cache.replace(PartitionId::User, docs(&["a"]));
        assert_eq!(cache.append(PartitionId::User, docs(&["b", "c"])), 3);
        assert_eq!(ids(&cache, PartitionId::User), vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let cache = PartitionCache::new();
        cache.replace(PartitionId::User, docs(&["a", "b"]));
        assert!(cache.remove(PartitionId::User, "a"));
        assert!(!cache.remove(PartitionId::User, "a"));
        assert!(!cache.remove(PartitionId::App, "a"));
        assert_eq!(ids(&cache, PartitionId::User), vec!["b"]);
    }

    #[test]
    fn taken_entry_is_restored_in_place() {
        let cache = PartitionCache::new();
        cache.replace(PartitionId::User, docs(&["a", "b", "c"]));
        let (index, doc) = cache.take(PartitionId::User, "b").unwrap();
        assert_eq!(index, 1);
        assert!(cache.take(PartitionId::User, "b").is_none());

        assert!(cache.restore(PartitionId::User, index, doc.clone()));
        assert_eq!(ids(&cache, PartitionId::User), vec!["a", "b", "c"]);
        assert!(!cache.restore(PartitionId::User, index, doc));
        assert_eq!(cache.len(PartitionId::User), 3);
    }

    #[test]
    fn restore_past_the_end_appends() {
        let cache = PartitionCache::new();
        cache.replace(PartitionId::User, docs(&["a", "b", "c"]));
        let (index, doc) = cache.take(PartitionId::User, "c").unwrap();
        cache.replace(PartitionId::User, docs(&["a"]));

        assert!(cache.restore(PartitionId::User, index, doc));
        assert_eq!(ids(&cache, PartitionId::User), vec!["a", "c"]);
    }

    #[test]
    fn partitions_are_independent() {
        let cache = PartitionCache::new();
        cache.replace(PartitionId::User, docs(&["a"]));
        assert!(cache.is_empty(PartitionId::App));
        assert_eq!(cache.len(PartitionId::User), 1);
        assert!(cache.contains(PartitionId::User, "a"));
        assert!(!cache.contains(PartitionId::App, "a"));
        assert_eq!(cache.get(PartitionId::User, "a").unwrap().document_id, "a");
        assert!(cache.get(PartitionId::User, "z").is_none());
    }
}
