//! Bulk save requests against a CouchDB-style `_bulk_docs` endpoint
//!
//! The request body is assembled by splicing document text into
//! `{"docs":[...]}` rather than re-serializing it, so each document is sent
//! exactly as it was stored.

use crate::error::{SaveError, SaveResult};
use crate::http::HttpTransport;
use crate::migrate::fetch::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Content type of every bulk request
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Result for one document, positionally matched with the request's `docs`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocResponse {
    pub ok: bool,
    pub id: String,
    pub rev: String,
    pub error: String,
    pub reason: String,
}

impl DocResponse {
    /// True when the destination rejected this document
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

impl fmt::Display for DocResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            write!(
                f,
                "error id={} error={} reason={}",
                self.id, self.error, self.reason
            )
        } else {
            write!(f, "ok id={} rev={}", self.id, self.rev)
        }
    }
}

/// Parsed reply to one bulk request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkSaveResponse {
    /// HTTP status code
    pub status: u16,

    /// Body exactly as received
    pub raw: String,

    /// Per-document results
    pub responses: Vec<DocResponse>,
}

impl BulkSaveResponse {
    /// Number of rejected documents
    pub fn error_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_error()).count()
    }
}

/// Build `{"docs":[doc1,doc2,...]}` from document bodies
pub fn build_body<'a, I>(bodies: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut body = String::from(r#"{"docs":["#);
    for (i, doc) in bodies.into_iter().enumerate() {
        if i > 0 {
            body.push(',');
        }
        body.push_str(doc);
    }
    body.push_str("]}");
    body
}

/// Parse a bulk save reply into per-document results
pub fn parse_response(status: u16, body: Vec<u8>) -> SaveResult<BulkSaveResponse> {
    let raw = String::from_utf8(body).map_err(|e| SaveError::UnreadableResponse(e.to_string()))?;

    let responses: Vec<DocResponse> = match serde_json::from_str(&raw) {
        Ok(responses) => responses,
        Err(e) => {
            return Err(SaveError::MalformedResponse {
                status,
                reason: e.to_string(),
                raw,
            })
        }
    };

    Ok(BulkSaveResponse {
        status,
        raw,
        responses,
    })
}

/// Submits batches of documents to the destination
pub struct BulkSaveClient<T: ?Sized> {
    transport: Arc<T>,
    url: String,
}

impl<T: HttpTransport + ?Sized> BulkSaveClient<T> {
    /// Create a client for `url` over a shared transport
    pub fn new(transport: Arc<T>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
        }
    }

    /// Destination URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Submit a pre-built body
    pub fn save_body(&self, body: String) -> SaveResult<BulkSaveResponse> {
        let response = self.transport.post(&self.url, JSON_CONTENT_TYPE, body)?;
        parse_response(response.status, response.body)
    }

    /// Submit documents as a single bulk request
    pub fn save(&self, docs: &[Document]) -> SaveResult<BulkSaveResponse> {
        self.save_body(build_body(docs.iter().map(|d| d.body.as_str())))
    }
}
