//! JSON fixture that stands in for the remote document store.
//!
//! ```json
//! {
//!   "app":  [{ "id": "greeting", "content": { "text": "hello" } }],
//!   "user": [{ "id": "notes", "content": ["a", "b"] }]
//! }
//! ```

use docsync_engine::MemoryDocumentStore;
use docsync_protocol::PartitionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors reading or writing a fixture.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// The fixture file could not be read or written.
    #[error("fixture {path:?}: {source}")]
    Io {
        /// Fixture path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The fixture or a document body is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One document in the fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureDocument {
    /// Document id.
    pub id: String,
    /// Document body.
    pub content: Value,
}

/// Contents of both partitions, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    /// Documents of the read-only App partition.
    #[serde(default)]
    pub app: Vec<FixtureDocument>,
    /// Documents of the User partition.
    #[serde(default)]
    pub user: Vec<FixtureDocument>,
}

impl Fixture {
    /// Loads a fixture. A missing file is an empty fixture.
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        debug!("Loading fixture from {:?}", path);
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No fixture at {:?}, starting empty", path);
                Ok(Self::default())
            }
            Err(source) => Err(FixtureError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Writes the fixture as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), FixtureError> {
        let json = serde_json::to_vec_pretty(self)?;
        info!("Saving fixture to {:?}", path);
        fs::write(path, json).map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Seeds an in-memory store with the fixture's documents.
    pub fn to_store(&self) -> Result<MemoryDocumentStore, FixtureError> {
        let store = MemoryDocumentStore::new();
        for partition in PartitionId::ALL {
            let documents = self
                .documents(partition)
                .iter()
                .map(|doc| Ok((doc.id.clone(), serde_json::to_vec(&doc.content)?)))
                .collect::<Result<Vec<_>, FixtureError>>()?;
            store.seed(partition, documents);
        }
        Ok(store)
    }

    /// Captures the current contents of a store.
    pub fn from_store(store: &MemoryDocumentStore) -> Self {
        let capture = |partition: PartitionId| -> Vec<FixtureDocument> {
            store
                .snapshot(partition)
                .into_iter()
                .map(|doc| FixtureDocument {
                    content: content_value(&doc.content),
                    id: doc.document_id,
                })
                .collect()
        };
        Self {
            app: capture(PartitionId::App),
            user: capture(PartitionId::User),
        }
    }

    /// Documents of `partition`.
    pub fn documents(&self, partition: PartitionId) -> &[FixtureDocument] {
        match partition {
            PartitionId::App => &self.app,
            PartitionId::User => &self.user,
        }
    }
}

/// Interprets document bytes as JSON, falling back to a string.
pub fn content_value(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
