//! Partition identifiers and the user-partition authorization gate.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical scope of the remote document store.
///
/// Partitions are ordered by declaration (`App` before `User`) and are used
/// as keys for the partition cache, the pagination cursors and the
/// authorization check.
///
/// On the wire `App` is addressed as `"readonly"` and `User` as `"user"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PartitionId {
    /// Application-wide documents, readable by every caller.
    #[serde(rename = "readonly")]
    App,
    /// Documents scoped to the signed-in user.
    #[serde(rename = "user")]
    User,
}

impl PartitionId {
    /// All partitions in declaration order.
    pub const ALL: [PartitionId; 2] = [PartitionId::App, PartitionId::User];

    /// Returns the display name (`"App"` or `"User"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionId::App => "App",
            PartitionId::User => "User",
        }
    }

    /// Returns the name the remote store uses for this partition.
    pub fn remote_name(&self) -> &'static str {
        match self {
            PartitionId::App => "readonly",
            PartitionId::User => "user",
        }
    }

    /// Looks a partition up by its remote name.
    pub fn from_remote_name(name: &str) -> Option<Self> {
        match name {
            "readonly" => Some(PartitionId::App),
            "user" => Some(PartitionId::User),
            _ => None,
        }
    }

    /// Returns true if reading this partition needs a signed-in caller.
    pub fn requires_authorization(&self) -> bool {
        matches!(self, PartitionId::User)
    }

    /// Returns true if local create/replace/delete may target this partition.
    pub fn is_writable(&self) -> bool {
        matches!(self, PartitionId::User)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionId {
    type Err = ProtocolError;

    /// Accepts display names and remote names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "app" | "readonly" => Ok(PartitionId::App),
            "user" => Ok(PartitionId::User),
            _ => Err(ProtocolError::UnknownPartition(s.to_string())),
        }
    }
}

/// Whether the caller may access the user partition.
///
/// Read once from persisted identity state when a session starts and never
/// refreshed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Authorization {
    user_signed_in: bool,
}

impl Authorization {
    /// Creates an authorization flag.
    pub fn new(user_signed_in: bool) -> Self {
        Self { user_signed_in }
    }

    /// A caller signed in to an identity provider.
    pub fn signed_in() -> Self {
        Self::new(true)
    }

    /// A caller without a signed-in identity.
    pub fn anonymous() -> Self {
        Self::new(false)
    }

    /// Returns true if a user identity was signed in at session start.
    pub fn is_signed_in(&self) -> bool {
        self.user_signed_in
    }

    /// Returns true if the caller may read or write `partition`.
    pub fn permits(&self, partition: PartitionId) -> bool {
        !partition.requires_authorization() || self.user_signed_in
    }
}
