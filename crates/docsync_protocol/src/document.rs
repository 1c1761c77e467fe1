//! Document summaries and write options.

use crate::error::{ProtocolError, ProtocolResult};
use crate::partition::PartitionId;
use serde::{Deserialize, Serialize};

/// Maximum length of a document id accepted by the remote store.
const MAX_DOCUMENT_ID_LEN: usize = 255;

/// Characters the remote store reserves in document ids.
const RESERVED_ID_CHARS: [char; 4] = ['/', '\\', '?', '#'];

/// A remote document as listed by the store.
///
/// Identity is `document_id`, unique within its partition. Summaries are
/// never edited in place: a refetch supersedes them wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Document id, unique within the partition.
    pub document_id: String,
    /// Partition the document was listed from.
    pub partition: PartitionId,
    /// Opaque document content.
    pub content: Vec<u8>,
    /// Server entity tag, if the store reported one.
    #[serde(default)]
    pub etag: Option<String>,
    /// Server-side modification stamp, if the store reported one.
    #[serde(default)]
    pub last_updated: Option<u64>,
}

impl DocumentSummary {
    /// Creates a summary without server metadata.
    pub fn new(partition: PartitionId, document_id: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            document_id: document_id.into(),
            partition,
            content,
            etag: None,
            last_updated: None,
        }
    }

    /// Sets the entity tag.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Sets the modification stamp.
    pub fn with_last_updated(mut self, stamp: u64) -> Self {
        self.last_updated = Some(stamp);
        self
    }

    /// Text shown for this document in a list.
    pub fn display_summary(&self) -> &str {
        &self.document_id
    }
}

/// How long a written document may be cached on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum TimeToLive {
    /// The store default of one day.
    #[default]
    Default,
    /// Do not cache on the device.
    NoCache,
    /// Cache until explicitly removed.
    Infinite,
    /// Cache for the given number of seconds.
    Seconds(u64),
}

impl TimeToLive {
    /// Seconds used by [`TimeToLive::Default`].
    pub const DEFAULT_SECONDS: i64 = 86_400;

    /// Returns the wire representation: seconds, `0` for no cache, `-1` for infinite.
    pub fn as_seconds(&self) -> i64 {
        match self {
            TimeToLive::Default => Self::DEFAULT_SECONDS,
            TimeToLive::NoCache => 0,
            TimeToLive::Infinite => -1,
            TimeToLive::Seconds(secs) => i64::try_from(*secs).unwrap_or(i64::MAX),
        }
    }

    /// Parses the wire representation.
    pub fn from_seconds(secs: i64) -> Self {
        match secs {
            s if s < 0 => TimeToLive::Infinite,
            0 => TimeToLive::NoCache,
            Self::DEFAULT_SECONDS => TimeToLive::Default,
            s => TimeToLive::Seconds(s as u64),
        }
    }
}

impl From<i64> for TimeToLive {
    fn from(secs: i64) -> Self {
        Self::from_seconds(secs)
    }
}

impl From<TimeToLive> for i64 {
    fn from(ttl: TimeToLive) -> Self {
        ttl.as_seconds()
    }
}

/// Options attached to a create or replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Device cache lifetime of the written document.
    pub device_time_to_live: TimeToLive,
}

impl WriteOptions {
    /// Creates write options with the given device time-to-live.
    pub fn new(device_time_to_live: TimeToLive) -> Self {
        Self {
            device_time_to_live,
        }
    }
}

/// Whether a write creates a new document or replaces an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    /// Fails if the id already exists.
    Create,
    /// Fails if the id does not exist.
    Replace,
}

/// Checks a document id against the remote store's naming rules.
pub fn validate_document_id(id: &str) -> ProtocolResult<()> {
    let invalid = |reason| ProtocolError::InvalidDocumentId {
        id: id.to_string(),
        reason,
    };

    if id.is_empty() {
        return Err(invalid("is empty"));
    }
    if id.chars().count() > MAX_DOCUMENT_ID_LEN {
        return Err(invalid("is longer than 255 characters"));
    }
    if id.contains(RESERVED_ID_CHARS) {
        return Err(invalid("contains a reserved character"));
    }
    if id.ends_with(char::is_whitespace) {
        return Err(invalid("ends with whitespace"));
    }
    Ok(())
}
