//! CLI command implementations.

pub mod browse;
pub mod write;

use docsync_engine::{MemoryDocumentStore, SessionEvent, StorageSession};
use tokio::runtime::Runtime;

/// Session type every command drives.
pub type Session = StorageSession<MemoryDocumentStore>;

/// Waits for every dispatched operation and fails on the first failure event.
pub fn settle(
    session: &mut Session,
    runtime: &Runtime,
) -> Result<Vec<SessionEvent>, Box<dyn std::error::Error>> {
    let events = runtime.block_on(session.settle());
    for event in &events {
        if let SessionEvent::LoadFailed { error, .. } | SessionEvent::MutationFailed { error, .. } =
            event
        {
            return Err(error.clone().into());
        }
    }
    Ok(events)
}
