//! Browse command implementation.

use super::{settle, Session};
use crate::fixture::content_value;
use docsync_protocol::PartitionId;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::info;

/// A listed document.
#[derive(Debug, Serialize)]
pub struct BrowsedDocument {
    /// Document id.
    pub id: String,
    /// Document body.
    pub content: Value,
    /// Server entity tag, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Server modification stamp, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<u64>,
}

/// Browse result.
#[derive(Debug, Serialize)]
pub struct BrowseResult {
    /// Browsed partition.
    pub partition: PartitionId,
    /// Documents in listing order.
    pub documents: Vec<BrowsedDocument>,
    /// Number of pages fetched.
    pub pages: usize,
    /// Whether a further page exists.
    pub has_more: bool,
}

/// Selects `partition` and loads its first page plus up to `extra_pages` more.
pub fn collect(
    session: &mut Session,
    runtime: &Runtime,
    partition: PartitionId,
    extra_pages: usize,
) -> Result<BrowseResult, Box<dyn std::error::Error>> {
    let mut pages = 0;
    if session.request_partition_switch(partition)? {
        settle(session, runtime)?;
        pages += 1;
    }

    for _ in 0..extra_pages {
        if !session.request_load_more(partition)? {
            break;
        }
        settle(session, runtime)?;
        pages += 1;
    }

    let documents = session
        .current_list(partition)
        .into_iter()
        .filter_map(|entry| session.document(partition, &entry.document_id))
        .map(|doc| BrowsedDocument {
            content: content_value(&doc.content),
            id: doc.document_id,
            etag: doc.etag,
            last_updated: doc.last_updated,
        })
        .collect();

    Ok(BrowseResult {
        partition,
        documents,
        pages,
        has_more: session.is_load_more_possible(partition),
    })
}

/// Runs the browse command.
pub fn run(
    session: &mut Session,
    runtime: &Runtime,
    partition: PartitionId,
    extra_pages: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Browsing {} partition", partition);
    let result = collect(session, runtime, partition, extra_pages)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &BrowseResult) {
    println!(
        "{} partition ({} documents, {} pages)",
        result.partition,
        result.documents.len(),
        result.pages
    );
    for doc in &result.documents {
        println!("  {}", doc.id);
    }
    if result.has_more {
        println!("  ... more available");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_engine::{MemoryDocumentStore, SessionConfig, StorageSession, SyncError};
    use docsync_protocol::Authorization;
    use std::sync::Arc;

    fn session(runtime: &Runtime, authorization: Authorization) -> Session {
        let store = MemoryDocumentStore::new();
        store.seed(
            PartitionId::App,
            (0..5).map(|i| (format!("app{i}"), b"{\"n\":1}".to_vec())),
        );
        store.seed(PartitionId::User, [("mine", b"\"text\"".to_vec())]);
        StorageSession::open(
            Arc::new(store),
            SessionConfig::new(authorization).with_page_size(2),
            runtime.handle().clone(),
        )
    }

    #[test]
    fn first_page_only() {
        let runtime = Runtime::new().unwrap();
        let mut session = session(&runtime, Authorization::anonymous());
        let result = collect(&mut session, &runtime, PartitionId::App, 0).unwrap();
        assert_eq!(result.documents.len(), 2);
        assert_eq!(result.pages, 1);
        assert!(result.has_more);
        assert_eq!(result.documents[0].content, serde_json::json!({"n": 1}));
    }

    #[test]
    fn extra_pages_stop_at_the_end() {
        let runtime = Runtime::new().unwrap();
        let mut session = session(&runtime, Authorization::anonymous());
        let result = collect(&mut session, &runtime, PartitionId::App, 10).unwrap();
        assert_eq!(result.documents.len(), 5);
        assert_eq!(result.pages, 3);
        assert!(!result.has_more);
    }

    #[test]
    fn user_partition_needs_sign_in() {
        let runtime = Runtime::new().unwrap();
        let mut session = session(&runtime, Authorization::anonymous());
        let err = collect(&mut session, &runtime, PartitionId::User, 0).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SyncError>(),
            Some(&SyncError::Unauthorized(PartitionId::User))
        );

        let mut session = self::session(&runtime, Authorization::signed_in());
        let result = collect(&mut session, &runtime, PartitionId::User, 0).unwrap();
        assert_eq!(result.documents[0].id, "mine");
    }
}
