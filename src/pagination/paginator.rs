//! Async driver of the pagination state machine

use std::time::Duration;
use tokio::sync::watch;

use super::{apply, Effect, Event, PageState, PaginationError};
use crate::cms::{CmsError, ContentSource, Predicate, QueryOptions};
use crate::content::{Normalizer, Post};

/// Upper bound for one "load more", retries included
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// What a trigger did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and this many posts were appended
    Appended(usize),
    /// Nothing to do: no further pages, or the session is closed
    Ignored,
}

/// Lets another task end the session, cancelling any in-flight fetch
#[derive(Debug, Clone)]
pub struct NavigationHandle {
    tx: watch::Sender<bool>,
}

impl NavigationHandle {
    pub fn navigate_away(&self) {
        self.tx.send_replace(true);
    }
}

/// Owns a `PageState` and performs its fetches
pub struct Paginator<S> {
    source: S,
    normalizer: Normalizer,
    timeout: Duration,
    state: PageState,
    navigation: NavigationHandle,
    navigated: watch::Receiver<bool>,
}

impl<S: ContentSource> Paginator<S> {
    /// Resume from an already loaded first page
    pub fn new(source: S, normalizer: Normalizer, state: PageState) -> Self {
        let (tx, navigated) = watch::channel(false);
        Self {
            source,
            normalizer,
            timeout: DEFAULT_FETCH_TIMEOUT,
            state,
            navigation: NavigationHandle { tx },
            navigated,
        }
    }

    /// Query the first listing page of `doc_type` and start a session on it
    pub async fn first_page(
        source: S,
        normalizer: Normalizer,
        doc_type: &str,
        page_size: usize,
    ) -> Result<Self, PaginationError> {
        let options = QueryOptions::default()
            .fetch(&[
                format!("{}.title", doc_type),
                format!("{}.subtitle", doc_type),
                format!("{}.author", doc_type),
            ])
            .page_size(page_size);

        let query_url = format!("query:{}", doc_type);
        let page = source
            .query(&[Predicate::document_type(doc_type)], &options)
            .await
            .map_err(|e| PaginationError::PageLoadFailed {
                url: query_url.clone(),
                source: e,
            })?;

        let posts = normalizer
            .summaries(&page.results)
            .map_err(|e| PaginationError::MalformedPage {
                url: query_url,
                source: e,
            })?;

        tracing::debug!(
            "First page: {} posts, more: {}",
            posts.len(),
            page.next_page.is_some()
        );

        Ok(Self::new(
            source,
            normalizer,
            PageState::new(posts, page.next_page),
        ))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn handle(&self) -> NavigationHandle {
        self.navigation.clone()
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn into_state(self) -> PageState {
        self.state
    }

    fn dispatch(&mut self, event: Event) -> Option<Effect> {
        let (state, effect) = apply(std::mem::take(&mut self.state), event);
        self.state = state;
        effect
    }

    /// Fetch and append the next page
    ///
    /// On failure the state moves to `Failed` and keeps its token, so calling
    /// this again retries the same page.
    pub async fn load_more(&mut self) -> Result<LoadOutcome, PaginationError> {
        if *self.navigated.borrow() {
            self.dispatch(Event::NavigatedAway);
        }

        let Some(Effect::Fetch(url)) = self.dispatch(Event::LoadMore) else {
            return Ok(LoadOutcome::Ignored);
        };

        tracing::debug!("Loading next page {}", url);

        let mut navigated = self.navigated.clone();
        let fetched = tokio::select! {
            result = tokio::time::timeout(self.timeout, self.source.fetch_page(&url)) => Some(result),
            _ = navigated.wait_for(|away| *away) => None,
        };

        let page = match fetched {
            None => {
                self.dispatch(Event::NavigatedAway);
                tracing::debug!("Dropped page {} after navigation", url);
                return Err(PaginationError::Cancelled { url });
            }
            Some(Err(_elapsed)) => {
                return Err(self.fail(url, CmsError::Timeout(self.timeout)));
            }
            Some(Ok(Err(e))) => return Err(self.fail(url, e)),
            Some(Ok(Ok(page))) => page,
        };

        match self.normalizer.summaries(&page.results) {
            Ok(posts) => {
                let count = posts.len();
                self.dispatch(Event::Loaded {
                    posts,
                    next_page: page.next_page,
                });
                Ok(LoadOutcome::Appended(count))
            }
            Err(source) => {
                self.dispatch(Event::Failed {
                    reason: source.to_string(),
                });
                Err(PaginationError::MalformedPage { url, source })
            }
        }
    }

    /// Follow continuation tokens until the last page
    pub async fn load_all(&mut self) -> Result<&[Post], PaginationError> {
        while self.state.has_more() {
            if self.load_more().await? == LoadOutcome::Ignored {
                break;
            }
        }
        Ok(self.state.posts())
    }

    fn fail(&mut self, url: String, source: CmsError) -> PaginationError {
        tracing::warn!("Failed to load page {}: {}", url, source);
        self.dispatch(Event::Failed {
            reason: source.to_string(),
        });
        PaginationError::PageLoadFailed { url, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{ApiPage, Document};
    use crate::pagination::LoadStatus;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Serves canned pages keyed by URL
    #[derive(Default)]
    struct MockSource {
        pages: HashMap<String, ApiPage>,
        delay: Option<Duration>,
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl MockSource {
        fn page(mut self, url: &str, uids: &[&str], next: Option<&str>) -> Self {
            let docs = uids.iter().map(|u| doc(u)).collect();
            self.pages
                .insert(url.to_string(), ApiPage::new(docs, next.map(str::to_string)));
            self
        }
    }

    fn doc(uid: &str) -> Document {
        serde_json::from_value(json!({
            "uid": uid,
            "first_publication_date": "2021-05-01T00:00:00Z",
            "data": {"title": format!("Post {}", uid), "subtitle": "S", "author": "A"}
        }))
        .unwrap()
    }

    impl ContentSource for MockSource {
        async fn query(
            &self,
            _predicates: &[Predicate],
            _options: &QueryOptions,
        ) -> Result<ApiPage, CmsError> {
            self.fetch_page("first").await
        }

        async fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<Document, CmsError> {
            Err(CmsError::NotFound {
                doc_type: doc_type.to_string(),
                uid: uid.to_string(),
            })
        }

        async fn fetch_page(&self, url: &str) -> Result<ApiPage, CmsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(CmsError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            self.pages.get(url).cloned().ok_or_else(|| CmsError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn three_pages() -> MockSource {
        MockSource::default()
            .page("first", &["a", "b"], Some("t1"))
            .page("t1", &["c", "d"], Some("t2"))
            .page("t2", &["e", "f"], None)
    }

    fn uids(paginator: &Paginator<MockSource>) -> Vec<String> {
        paginator
            .state()
            .posts()
            .iter()
            .map(|p| p.uid.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_loads_every_page_in_order() {
        let mut paginator = Paginator::first_page(three_pages(), Normalizer::default(), "post", 2)
            .await
            .unwrap();
        assert_eq!(paginator.state().posts().len(), 2);
        assert_eq!(paginator.state().next_page(), Some("t1"));

        assert_eq!(paginator.load_more().await.unwrap(), LoadOutcome::Appended(2));
        assert_eq!(paginator.load_more().await.unwrap(), LoadOutcome::Appended(2));

        assert_eq!(uids(&paginator), vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(paginator.state().next_page(), None);

        assert_eq!(paginator.load_more().await.unwrap(), LoadOutcome::Ignored);
        assert_eq!(paginator.state().posts().len(), 6);
    }

    #[tokio::test]
    async fn test_load_all() {
        let mut paginator = Paginator::first_page(three_pages(), Normalizer::default(), "post", 2)
            .await
            .unwrap();
        let posts = paginator.load_all().await.unwrap();
        assert_eq!(posts.len(), 6);
        assert_eq!(posts[5].title, "Post f");
    }

    #[tokio::test]
    async fn test_failure_then_retry() {
        let source = three_pages();
        source.failures_left.store(1, Ordering::SeqCst);
        let state = PageState::new(Vec::new(), Some("t1".to_string()));
        let mut paginator = Paginator::new(source, Normalizer::default(), state);

        let err = paginator.load_more().await.unwrap_err();
        assert!(matches!(
            err,
            PaginationError::PageLoadFailed {
                source: CmsError::Status { status: 503, .. },
                ..
            }
        ));
        assert!(matches!(paginator.state().status(), LoadStatus::Failed { .. }));
        assert_eq!(paginator.state().next_page(), Some("t1"));

        assert_eq!(paginator.load_more().await.unwrap(), LoadOutcome::Appended(2));
        assert_eq!(paginator.state().status(), &LoadStatus::Idle);
        assert_eq!(paginator.state().next_page(), Some("t2"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let source = MockSource {
            delay: Some(Duration::from_secs(5)),
            ..three_pages()
        };
        let state = PageState::new(Vec::new(), Some("t1".to_string()));
        let mut paginator = Paginator::new(source, Normalizer::default(), state)
            .with_timeout(Duration::from_millis(20));

        let err = paginator.load_more().await.unwrap_err();
        assert!(matches!(
            err,
            PaginationError::PageLoadFailed {
                source: CmsError::Timeout(_),
                ..
            }
        ));
        assert!(paginator.state().posts().is_empty());
    }

    #[tokio::test]
    async fn test_navigation_cancels_fetch() {
        let source = MockSource {
            delay: Some(Duration::from_secs(5)),
            ..three_pages()
        };
        let state = PageState::new(Vec::new(), Some("t1".to_string()));
        let mut paginator = Paginator::new(source, Normalizer::default(), state);
        let handle = paginator.handle();

        let (result, _) = tokio::join!(paginator.load_more(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.navigate_away();
        });

        assert!(matches!(result, Err(PaginationError::Cancelled { .. })));
        assert_eq!(paginator.state().status(), &LoadStatus::Closed);
        assert!(paginator.state().posts().is_empty());

        assert_eq!(paginator.load_more().await.unwrap(), LoadOutcome::Ignored);
        assert_eq!(paginator.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_page() {
        let mut source = three_pages();
        let mut bad = doc("broken");
        bad.data.remove("author");
        source
            .pages
            .insert("t1".to_string(), ApiPage::new(vec![bad], None));

        let state = PageState::new(Vec::new(), Some("t1".to_string()));
        let mut paginator = Paginator::new(source, Normalizer::default(), state);

        let err = paginator.load_more().await.unwrap_err();
        assert!(matches!(err, PaginationError::MalformedPage { .. }));
        assert!(paginator.state().posts().is_empty());
        assert_eq!(paginator.state().next_page(), Some("t1"));
    }
}
