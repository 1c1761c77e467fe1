//! HTTP document store.
//!
//! This module provides an HTTP-based [`DocumentStore`]. Request and response
//! bodies are CBOR; failures are reported through status codes with a plain
//! text body. The actual HTTP client is abstracted via a trait to allow
//! different implementations (reqwest, hyper, etc.).

use crate::error::{SyncError, SyncResult};
use crate::store::DocumentStore;
use docsync_protocol::{
    DeleteDocumentRequest, DocumentSummary, ListDocumentsRequest, ListDocumentsResponse,
    PartitionId, WireMessage, WriteDocumentRequest, WriteDocumentResponse,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const LIST_ENDPOINT: &str = "/documents/list";
const CREATE_ENDPOINT: &str = "/documents/create";
const REPLACE_ENDPOINT: &str = "/documents/replace";
const DELETE_ENDPOINT: &str = "/documents/delete";

/// Status code and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Creates a `200 OK` response.
    pub fn ok(body: Vec<u8>) -> Self {
        Self::new(200, body)
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. An `Err` means
/// no response was received at all (connection refused, timeout, ...).
pub trait HttpClient: Send + Sync {
    /// Sends a POST request.
    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// A [`DocumentStore`] reached over HTTP.
pub struct HttpDocumentStore<C: HttpClient> {
    /// Base URL of the document API (e.g., "https://docs.example.com").
    base_url: String,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpDocumentStore<C> {
    /// Creates a new HTTP document store.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the message of the last failed call, if the last call failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Stops issuing requests. Every later call fails with `NotConnected`.
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    /// Posts `request` and returns the body of a successful response.
    ///
    /// `document_id` names the target of a write so that 404 and 409 can be
    /// reported against it.
    fn exchange<Req: WireMessage>(
        &self,
        endpoint: &str,
        request: &Req,
        partition: PartitionId,
        document_id: Option<&str>,
    ) -> SyncResult<Vec<u8>> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let body = request.encode()?;
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self.client.post(&url, body).map_err(|e| {
            self.set_error(&e);
            SyncError::transport_retryable(e)
        })?;

        if response.is_success() {
            self.clear_error();
            return Ok(response.body);
        }

        let message = String::from_utf8_lossy(&response.body).into_owned();
        self.set_error(&message);
        debug!(url = %url, status = response.status, message = %message, "request rejected");
        Err(status_error(response.status, message, partition, document_id))
    }
}

/// Maps a non-success status to an error.
fn status_error(
    status: u16,
    message: String,
    partition: PartitionId,
    document_id: Option<&str>,
) -> SyncError {
    match (status, document_id) {
        (401 | 403, _) => SyncError::AuthenticationFailed(message),
        (404, Some(id)) => SyncError::not_found(partition, id),
        (409, Some(id)) => SyncError::AlreadyExists {
            partition,
            document_id: id.to_string(),
        },
        (429 | 500..=599, _) => SyncError::transport_retryable(format!("HTTP {status}: {message}")),
        _ => SyncError::transport_fatal(format!("HTTP {status}: {message}")),
    }
}

fn decode<Res: WireMessage>(body: &[u8]) -> SyncResult<Res> {
    Res::decode(body).map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}")))
}

impl<C: HttpClient> DocumentStore for HttpDocumentStore<C> {
    fn list_documents(&self, request: &ListDocumentsRequest) -> SyncResult<ListDocumentsResponse> {
        let body = self.exchange(LIST_ENDPOINT, request, request.partition, None)?;
        decode(&body)
    }

    fn create_document(&self, request: &WriteDocumentRequest) -> SyncResult<DocumentSummary> {
        let body = self.exchange(
            CREATE_ENDPOINT,
            request,
            request.partition,
            Some(&request.document_id),
        )?;
        decode::<WriteDocumentResponse>(&body).map(|r| r.document)
    }

    fn replace_document(&self, request: &WriteDocumentRequest) -> SyncResult<DocumentSummary> {
        let body = self.exchange(
            REPLACE_ENDPOINT,
            request,
            request.partition,
            Some(&request.document_id),
        )?;
        decode::<WriteDocumentResponse>(&body).map(|r| r.document)
    }

    fn delete_document(&self, request: &DeleteDocumentRequest) -> SyncResult<()> {
        self.exchange(
            DELETE_ENDPOINT,
            request,
            request.partition,
            Some(&request.document_id),
        )?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }
}

/// An HTTP client that serves requests from a local [`DocumentStore`].
///
/// Useful for exercising the HTTP layer without a network.
pub struct LoopbackClient<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> LoopbackClient<S> {
    /// Creates a client backed by `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn handle(&self, path: &str, body: &[u8]) -> SyncResult<Vec<u8>> {
        match path {
            LIST_ENDPOINT => {
                let request = ListDocumentsRequest::decode(body)?;
                Ok(self.store.list_documents(&request)?.encode()?)
            }
            CREATE_ENDPOINT | REPLACE_ENDPOINT => {
                let request = WriteDocumentRequest::decode(body)?;
                let document = if path == CREATE_ENDPOINT {
                    self.store.create_document(&request)?
                } else {
                    self.store.replace_document(&request)?
                };
                Ok(WriteDocumentResponse { document }.encode()?)
            }
            DELETE_ENDPOINT => {
                let request = DeleteDocumentRequest::decode(body)?;
                self.store.delete_document(&request)?;
                Ok(Vec::new())
            }
            other => Err(SyncError::transport_fatal(format!("no route for {other}"))),
        }
    }
}

impl<S: DocumentStore> HttpClient for LoopbackClient<S> {
    fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        let path = url.find("/documents/").map_or(url, |i| &url[i..]);

        let status = match self.handle(path, &body) {
            Ok(body) => return Ok(HttpResponse::ok(body)),
            Err(SyncError::NotConnected) => return Err("connection refused".to_string()),
            Err(SyncError::AuthenticationFailed(_) | SyncError::Unauthorized(_)) => 401,
            Err(SyncError::NotFound { .. }) => 404,
            Err(SyncError::ReadOnlyPartition(_)) => 405,
            Err(SyncError::AlreadyExists { .. }) => 409,
            Err(SyncError::Transport {
                retryable: true, ..
            }) => 503,
            Err(SyncError::InvalidStateTransition { .. }) => 500,
            Err(SyncError::Transport { .. } | SyncError::Protocol(_) | SyncError::Codec(_)) => 400,
        };
        Ok(HttpResponse::new(status, format!("rejected {path}").into_bytes()))
    }

    fn is_healthy(&self) -> bool {
        self.store.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentStore;
    use docsync_protocol::{WriteMode, WriteOptions};
    use parking_lot::Mutex;

    struct TestClient {
        response: RwLock<Option<HttpResponse>>,
        healthy: AtomicBool,
        urls: Mutex<Vec<String>>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(None),
                healthy: AtomicBool::new(true),
                urls: Mutex::new(Vec::new()),
            }
        }

        fn set_response(&self, status: u16, body: Vec<u8>) {
            *self.response.write() = Some(HttpResponse::new(status, body));
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }
    }

    impl HttpClient for TestClient {
        fn post(&self, url: &str, _body: Vec<u8>) -> Result<HttpResponse, String> {
            self.urls.lock().push(url.to_string());
            self.response
                .read()
                .clone()
                .ok_or_else(|| "No response set".into())
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn http_store() -> HttpDocumentStore<TestClient> {
        HttpDocumentStore::new("https://docs.example.com", TestClient::new())
    }

    fn list_request() -> ListDocumentsRequest {
        ListDocumentsRequest::first_page(PartitionId::User, "dictionary", 20)
    }

    fn write_request(mode: WriteMode) -> WriteDocumentRequest {
        WriteDocumentRequest {
            partition: PartitionId::User,
            document_id: "doc1".into(),
            document_type: "dictionary".into(),
            content: b"{}".to_vec(),
            options: WriteOptions::default(),
            mode,
        }
    }

    #[test]
    fn store_creation() {
        let store = http_store();
        assert_eq!(store.base_url(), "https://docs.example.com");
        assert!(store.is_connected());
    }

    #[test]
    fn closed_store_refuses_calls() {
        let store = http_store();
        store.close();
        assert!(!store.is_connected());
        assert!(matches!(
            store.list_documents(&list_request()),
            Err(SyncError::NotConnected)
        ));
    }

    #[test]
    fn unhealthy_client() {
        let store = http_store();
        store.client.set_healthy(false);
        assert!(!store.is_connected());
    }

    #[test]
    fn list_decodes_response() {
        let store = http_store();
        let response = ListDocumentsResponse::new(
            vec![DocumentSummary::new(PartitionId::User, "a", Vec::new())],
            None,
        );
        store.client.set_response(200, response.encode().unwrap());

        let decoded = store.list_documents(&list_request()).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(
            store.client.urls.lock().as_slice(),
            ["https://docs.example.com/documents/list"]
        );
    }

    #[test]
    fn undecodable_body_is_a_protocol_error() {
        let store = http_store();
        store.client.set_response(200, vec![0xff, 0x00]);
        let err = store.list_documents(&list_request()).unwrap_err();
        assert!(err.is_malformed_response());
    }

    #[test]
    fn status_codes_map_to_errors() {
        let store = http_store();

        store.client.set_response(401, b"expired".to_vec());
        assert!(store.list_documents(&list_request()).unwrap_err().is_authorization());
        assert_eq!(store.last_error().as_deref(), Some("expired"));

        store.client.set_response(404, Vec::new());
        assert_eq!(
            store.replace_document(&write_request(WriteMode::Replace)).unwrap_err(),
            SyncError::not_found(PartitionId::User, "doc1")
        );

        store.client.set_response(409, Vec::new());
        assert!(matches!(
            store.create_document(&write_request(WriteMode::Create)),
            Err(SyncError::AlreadyExists { .. })
        ));

        store.client.set_response(503, Vec::new());
        assert!(store.list_documents(&list_request()).unwrap_err().is_retryable());

        store.client.set_response(400, Vec::new());
        assert!(!store.list_documents(&list_request()).unwrap_err().is_retryable());
    }

    #[test]
    fn missing_response_is_retryable_transport_error() {
        let store = http_store();
        let err = store
            .delete_document(&DeleteDocumentRequest::new(PartitionId::User, "doc1"))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.last_error().as_deref(), Some("No response set"));
    }

    #[test]
    fn loopback_round_trip() {
        let memory = MemoryDocumentStore::new();
        memory.seed(PartitionId::User, [("doc1", b"v1".to_vec())]);
        let store = HttpDocumentStore::new("http://loopback", LoopbackClient::new(memory));

        let page = store.list_documents(&list_request()).unwrap();
        assert_eq!(page.documents[0].document_id, "doc1");

        let replaced = store
            .write_document(&write_request(WriteMode::Replace))
            .unwrap();
        assert_eq!(replaced.content, b"{}");
        assert!(matches!(
            store.write_document(&write_request(WriteMode::Create)),
            Err(SyncError::AlreadyExists { .. })
        ));

        let delete = DeleteDocumentRequest::new(PartitionId::User, "doc1");
        store.delete_document(&delete).unwrap();
        assert!(store.delete_document(&delete).unwrap_err().is_not_found());
        assert_eq!(store.last_error().as_deref(), Some("rejected /documents/delete"));
    }

    #[test]
    fn loopback_follows_store_connectivity() {
        let store = HttpDocumentStore::new(
            "http://loopback",
            LoopbackClient::new(MemoryDocumentStore::new()),
        );
        store.client.store().set_connected(false);
        assert!(!store.is_connected());
        assert!(matches!(
            store.list_documents(&list_request()),
            Err(SyncError::NotConnected)
        ));
    }
}
