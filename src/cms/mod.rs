//! CMS access - the Prismic REST API and the `ContentSource` seam

mod client;
mod document;
mod predicate;
pub mod retry;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub use client::PrismicClient;
pub use document::{ApiInfo, ApiPage, ApiRef, Document};
pub use predicate::{to_query, Predicate, QueryOptions};

/// Errors talking to the CMS
#[derive(Debug, thiserror::Error)]
pub enum CmsError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("no {doc_type} document with uid {uid:?}")]
    NotFound { doc_type: String, uid: String },

    #[error("API at {0} has no master ref")]
    MissingMasterRef(String),
}

impl CmsError {
    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            CmsError::Http { .. } | CmsError::Timeout(_) => true,
            CmsError::Status { status, .. } => *status >= 500 || *status == 429,
            CmsError::Decode { .. } | CmsError::NotFound { .. } | CmsError::MissingMasterRef(_) => {
                false
            }
        }
    }
}

/// Read access to the content repository
pub trait ContentSource: Send + Sync {
    /// Search documents matching all predicates
    fn query(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> impl Future<Output = Result<ApiPage, CmsError>> + Send;

    /// Fetch one document of `doc_type` by uid
    fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
    ) -> impl Future<Output = Result<Document, CmsError>> + Send;

    /// Follow a continuation URL returned in `ApiPage::next_page`
    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<ApiPage, CmsError>> + Send;

    /// Pick up content published since the last call
    fn refresh(&self) -> impl Future<Output = Result<(), CmsError>> + Send {
        async { Ok(()) }
    }
}

impl<T: ContentSource> ContentSource for Arc<T> {
    fn query(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> impl Future<Output = Result<ApiPage, CmsError>> + Send {
        (**self).query(predicates, options)
    }

    fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
    ) -> impl Future<Output = Result<Document, CmsError>> + Send {
        (**self).get_by_uid(doc_type, uid)
    }

    fn fetch_page(&self, url: &str) -> impl Future<Output = Result<ApiPage, CmsError>> + Send {
        (**self).fetch_page(url)
    }

    fn refresh(&self) -> impl Future<Output = Result<(), CmsError>> + Send {
        (**self).refresh()
    }
}
