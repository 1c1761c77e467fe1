//! Put and delete command implementations.
//!
//! Writes always target the User partition; the App partition is read-only.

use super::{settle, Session};
use docsync_engine::SessionEvent;
use docsync_protocol::{DocumentSummary, PartitionId, TimeToLive, WriteOptions};
use serde_json::Value;
use tokio::runtime::Runtime;
use tracing::info;

/// Creates or replaces a User document. `content` must be JSON.
pub fn put(
    session: &mut Session,
    runtime: &Runtime,
    document_id: &str,
    content: &str,
    replace: bool,
    ttl: Option<i64>,
) -> Result<DocumentSummary, Box<dyn std::error::Error>> {
    let body: Value = serde_json::from_str(content)?;
    let options = ttl.map(|secs| WriteOptions::new(TimeToLive::from_seconds(secs)));

    session.request_create_or_replace(
        PartitionId::User,
        document_id,
        serde_json::to_vec(&body)?,
        options,
        replace,
    )?;

    settle(session, runtime)?
        .into_iter()
        .find_map(|event| match event {
            SessionEvent::DocumentWritten { document, .. } => Some(document),
            _ => None,
        })
        .ok_or_else(|| format!("no confirmation for {document_id}").into())
}

/// Deletes a User document.
pub fn delete(
    session: &mut Session,
    runtime: &Runtime,
    document_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    session.request_delete(PartitionId::User, document_id)?;
    settle(session, runtime)?;
    Ok(())
}

/// Runs the put command.
pub fn run_put(
    session: &mut Session,
    runtime: &Runtime,
    document_id: &str,
    content: &str,
    replace: bool,
    ttl: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Writing {} to the User partition", document_id);
    let document = put(session, runtime, document_id, content, replace, ttl)?;
    let verb = if replace { "Replaced" } else { "Created" };
    match &document.etag {
        Some(etag) => println!("{verb} {} (etag {etag})", document.document_id),
        None => println!("{verb} {}", document.document_id),
    }
    println!(
        "User partition now lists {} documents",
        session.current_list(PartitionId::User).len()
    );
    Ok(())
}

/// Runs the delete command.
pub fn run_delete(
    session: &mut Session,
    runtime: &Runtime,
    document_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Deleting {} from the User partition", document_id);
    delete(session, runtime, document_id)?;
    println!("Deleted {document_id}");
    Ok(())
}
