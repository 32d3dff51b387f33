//! Resolving a job's keys into decoded documents

use crate::error::FetchError;
use crate::store::KeyValueStore;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use std::sync::Arc;
use tracing::warn;

/// Keys starting with this prefix are never migrated (CouchDB reserves `_`)
pub const RESERVED_PREFIX: &str = "_";

/// Decoded document content together with the key it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Originating key
    pub key: String,

    /// Decoded body, expected to be JSON
    pub body: String,
}

/// Documents fetched for one job
#[derive(Debug, Default)]
pub struct FetchedBatch {
    /// Successfully decoded documents, in job order
    pub documents: Vec<Document>,

    /// Keys that could not be turned into documents
    pub failures: Vec<FetchError>,
}

impl FetchedBatch {
    /// Total decoded body bytes
    pub fn body_bytes(&self) -> u64 {
        self.documents.iter().map(|d| d.body.len() as u64).sum()
    }
}

/// Decode a stored value (standard base64 alphabet) into UTF-8 text
pub fn decode(key: &str, value: &str) -> Result<String, FetchError> {
    let bytes = BASE64_STANDARD
        .decode(value.trim())
        .map_err(|e| FetchError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

    String::from_utf8(bytes).map_err(|e| FetchError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Fetches and decodes documents from the source store
pub struct DocumentFetcher<S: ?Sized> {
    store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized> DocumentFetcher<S> {
    /// Create a fetcher over a shared store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fetch one key
    pub fn fetch_one(&self, key: &str) -> Result<Document, FetchError> {
        if key.starts_with(RESERVED_PREFIX) {
            return Err(FetchError::ReservedKey {
                key: key.to_string(),
            });
        }

        let value = self.store.read(key)?;
        let body = decode(key, &value)?;

        Ok(Document {
            key: key.to_string(),
            body,
        })
    }

    /// Fetch every key of a job, one result per key in job order
    pub fn fetch(&self, keys: &[String]) -> Vec<Result<Document, FetchError>> {
        keys.iter().map(|key| self.fetch_one(key)).collect()
    }

    /// Fetch a job, logging and skipping keys that fail
    pub fn fetch_documents(&self, worker_id: usize, keys: &[String]) -> FetchedBatch {
        let mut batch = FetchedBatch {
            documents: Vec::with_capacity(keys.len()),
            failures: Vec::new(),
        };

        for result in self.fetch(keys) {
            match result {
                Ok(doc) => batch.documents.push(doc),
                Err(e) => {
                    warn!(worker = worker_id, error = %e, "Skipping key");
                    batch.failures.push(e);
                }
            }
        }

        batch
    }
}
