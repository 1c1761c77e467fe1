//! Configuration for a storage session.

use docsync_protocol::{Authorization, WriteOptions};

/// Configuration for a [`StorageSession`](crate::StorageSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Document type requested from and written to the store.
    pub document_type: String,
    /// Page size hint sent with every list request.
    pub page_size: u32,
    /// Whether the caller may access the user partition.
    ///
    /// Captured once when the session is created.
    pub authorization: Authorization,
    /// Write options used when a caller does not supply its own.
    pub default_write_options: WriteOptions,
}

impl SessionConfig {
    /// Creates a new session configuration.
    pub fn new(authorization: Authorization) -> Self {
        Self {
            document_type: "dictionary".to_string(),
            page_size: 100,
            authorization,
            default_write_options: WriteOptions::default(),
        }
    }

    /// Sets the document type.
    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = document_type.into();
        self
    }

    /// Sets the page size hint.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the authorization flag.
    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = authorization;
        self
    }

    /// Sets the default write options.
    pub fn with_default_write_options(mut self, options: WriteOptions) -> Self {
        self.default_write_options = options;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(Authorization::anonymous())
    }
}
