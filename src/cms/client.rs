//! HTTP client for the Prismic REST API v2

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::retry::with_retry;
use super::{to_query, ApiInfo, ApiPage, CmsError, ContentSource, Document, Predicate, QueryOptions};
use crate::config::{CmsConfig, RetryConfig};

/// Prismic API client
#[derive(Clone)]
pub struct PrismicClient {
    http: Client,
    endpoint: String,
    access_token: Option<String>,
    timeout: Duration,
    retry: RetryConfig,
    master_ref: Arc<RwLock<Option<String>>>,
}

impl PrismicClient {
    /// Create a client from the site's CMS configuration
    pub fn new(config: &CmsConfig) -> Result<Self, CmsError> {
        let timeout = config.request_timeout();
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| CmsError::Http {
                url: config.endpoint.clone(),
                source,
            })?;

        let access_token = Some(config.access_token.clone()).filter(|t| !t.is_empty());

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token,
            timeout,
            retry: config.retry.clone(),
            master_ref: Arc::new(RwLock::new(None)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Look up the current master ref and remember it for later queries
    pub async fn refresh_ref(&self) -> Result<String, CmsError> {
        let info: ApiInfo = self.get_json(&self.endpoint, &self.auth_params()).await?;
        let master = info
            .master_ref()
            .ok_or_else(|| CmsError::MissingMasterRef(self.endpoint.clone()))?
            .to_string();

        tracing::debug!("Using master ref {}", master);
        *self.master_ref.write().await = Some(master.clone());
        Ok(master)
    }

    async fn current_ref(&self) -> Result<String, CmsError> {
        if let Some(master) = self.master_ref.read().await.as_ref() {
            return Ok(master.clone());
        }
        self.refresh_ref().await
    }

    fn auth_params(&self) -> Vec<(&'static str, String)> {
        match &self.access_token {
            Some(token) => vec![("access_token", token.clone())],
            None => Vec::new(),
        }
    }

    async fn search(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<ApiPage, CmsError> {
        let master = self.current_ref().await?;
        self.search_at(master, predicates, options).await
    }

    async fn search_at(
        &self,
        master: String,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<ApiPage, CmsError> {
        let mut params = vec![("ref", master), ("q", to_query(predicates))];

        if !options.fetch.is_empty() {
            params.push(("fetch", options.fetch.join(",")));
        }
        if let Some(size) = options.page_size {
            params.push(("pageSize", size.to_string()));
        }
        params.extend(self.auth_params());

        let url = format!("{}/documents/search", self.endpoint);
        self.get_json(&url, &params).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, CmsError> {
        with_retry(&self.retry, || self.get_json_once(url, params)).await
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, CmsError> {
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CmsError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                CmsError::Timeout(self.timeout)
            } else {
                CmsError::Decode {
                    url: url.to_string(),
                    source: e,
                }
            }
        })
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> CmsError {
        if error.is_timeout() {
            CmsError::Timeout(self.timeout)
        } else {
            CmsError::Http {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

impl ContentSource for PrismicClient {
    async fn query(
        &self,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<ApiPage, CmsError> {
        self.search(predicates, options).await
    }

    async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Document, CmsError> {
        let predicates = [Predicate::uid(doc_type, uid)];
        let options = QueryOptions::default();

        let used_ref = self.current_ref().await?;
        let page = self.search_at(used_ref.clone(), &predicates, &options).await?;
        if let Some(doc) = page.results.into_iter().next() {
            return Ok(doc);
        }

        // The post may have been published after the ref was looked up
        let latest = self.refresh_ref().await?;
        if latest != used_ref {
            let page = self.search_at(latest, &predicates, &options).await?;
            if let Some(doc) = page.results.into_iter().next() {
                return Ok(doc);
            }
        }

        Err(CmsError::NotFound {
            doc_type: doc_type.to_string(),
            uid: uid.to_string(),
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<ApiPage, CmsError> {
        // Continuation URLs already carry ref, query and token
        self.get_json(url, &[]).await
    }

    async fn refresh(&self) -> Result<(), CmsError> {
        self.refresh_ref().await.map(|_| ())
    }
}
