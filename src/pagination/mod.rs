//! Incremental "load more" pagination
//!
//! `PageState` is an append-only list of posts plus the continuation URL of
//! the next page. Transitions go through [`apply`], a pure function from a
//! state and an event to the next state and an optional effect; the async
//! [`Paginator`] runs the effects against a content source.

mod paginator;

pub use paginator::{LoadOutcome, NavigationHandle, Paginator, DEFAULT_FETCH_TIMEOUT};

use crate::cms::CmsError;
use crate::content::{ContentError, Post};

/// Where the controller is in its fetch cycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    /// A page is loaded and no request is in flight
    #[default]
    Idle,
    /// The page at `url` is being fetched
    Loading { url: String },
    /// The last fetch failed; the token is kept so a new trigger retries it
    Failed { reason: String },
    /// The session navigated away; nothing is applied anymore
    Closed,
}

/// Posts held by one rendering session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageState {
    posts: Vec<Post>,
    next_page: Option<String>,
    status: LoadStatus,
}

impl PageState {
    /// State after the first page has been loaded
    pub fn new(posts: Vec<Post>, next_page: Option<String>) -> Self {
        Self {
            posts,
            next_page,
            status: LoadStatus::Idle,
        }
    }

    /// Posts in arrival order
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Continuation URL, `None` once every page is loaded
    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref()
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, LoadStatus::Loading { .. })
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.posts
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The reader asked for more posts
    LoadMore,
    /// The in-flight page arrived, already normalized
    Loaded {
        posts: Vec<Post>,
        next_page: Option<String>,
    },
    /// The in-flight page could not be loaded
    Failed { reason: String },
    /// The session is going away
    NavigatedAway,
}

/// Work requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// GET this continuation URL
    Fetch(String),
}

/// Advance the state machine by one event
pub fn apply(mut state: PageState, event: Event) -> (PageState, Option<Effect>) {
    if state.status == LoadStatus::Closed {
        return (state, None);
    }
    let loading = state.is_loading();

    match event {
        Event::NavigatedAway => {
            state.status = LoadStatus::Closed;
            (state, None)
        }

        // At most one fetch in flight
        Event::LoadMore if loading => (state, None),
        Event::LoadMore => match state.next_page.clone() {
            Some(url) => {
                state.status = LoadStatus::Loading { url: url.clone() };
                (state, Some(Effect::Fetch(url)))
            }
            None => (state, None),
        },

        Event::Loaded { posts, next_page } if loading => {
            state.posts.extend(posts);
            state.next_page = next_page;
            state.status = LoadStatus::Idle;
            (state, None)
        }

        Event::Failed { reason } if loading => {
            state.status = LoadStatus::Failed { reason };
            (state, None)
        }

        // Results nobody is waiting for
        Event::Loaded { .. } | Event::Failed { .. } => (state, None),
    }
}

/// Pagination errors
#[derive(Debug, thiserror::Error)]
pub enum PaginationError {
    #[error("failed to load page {url}: {source}")]
    PageLoadFailed {
        url: String,
        #[source]
        source: CmsError,
    },

    #[error("page {url} holds a malformed post: {source}")]
    MalformedPage {
        url: String,
        #[source]
        source: ContentError,
    },

    #[error("navigated away while loading {url}")]
    Cancelled { url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(uid: &str) -> Post {
        Post {
            uid: uid.to_string(),
            published_at: None,
            published_label: None,
            title: format!("Title {}", uid),
            subtitle: "S".to_string(),
            author: "A".to_string(),
        }
    }

    fn posts(uids: &[&str]) -> Vec<Post> {
        uids.iter().map(|u| post(u)).collect()
    }

    fn uids(state: &PageState) -> Vec<&str> {
        state.posts().iter().map(|p| p.uid.as_str()).collect()
    }

    #[test]
    fn test_load_more_starts_fetch() {
        let state = PageState::new(posts(&["a", "b"]), Some("t1".to_string()));
        let (state, effect) = apply(state, Event::LoadMore);
        assert_eq!(effect, Some(Effect::Fetch("t1".to_string())));
        assert!(state.is_loading());
    }

    #[test]
    fn test_load_more_without_token_is_noop() {
        let state = PageState::new(posts(&["a"]), None);
        let (next, effect) = apply(state.clone(), Event::LoadMore);
        assert_eq!(effect, None);
        assert_eq!(next, state);
    }

    #[test]
    fn test_trigger_while_loading_is_ignored() {
        let state = PageState::new(posts(&["a", "b"]), Some("t1".to_string()));
        let (loading, _) = apply(state, Event::LoadMore);
        let (again, effect) = apply(loading.clone(), Event::LoadMore);
        assert_eq!(effect, None);
        assert_eq!(again, loading);
        assert_eq!(again.posts().len(), 2);
    }

    #[test]
    fn test_three_pages() {
        let pages = [
            (posts(&["c", "d"]), Some("t2".to_string())),
            (posts(&["e", "f"]), None),
        ];
        let mut state = PageState::new(posts(&["a", "b"]), Some("t1".to_string()));

        for (page, next_page) in pages {
            let (loading, effect) = apply(state, Event::LoadMore);
            assert!(matches!(effect, Some(Effect::Fetch(_))));
            state = apply(
                loading,
                Event::Loaded {
                    posts: page,
                    next_page,
                },
            )
            .0;
        }

        assert_eq!(uids(&state), vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(state.next_page(), None);
        assert_eq!(state.status(), &LoadStatus::Idle);

        let (done, effect) = apply(state.clone(), Event::LoadMore);
        assert_eq!(effect, None);
        assert_eq!(done, state);
    }

    #[test]
    fn test_failure_keeps_posts_and_token() {
        let state = PageState::new(posts(&["a"]), Some("t1".to_string()));
        let (loading, _) = apply(state, Event::LoadMore);
        let (failed, _) = apply(
            loading,
            Event::Failed {
                reason: "timeout".to_string(),
            },
        );

        assert_eq!(
            failed.status(),
            &LoadStatus::Failed {
                reason: "timeout".to_string()
            }
        );
        assert_eq!(uids(&failed), vec!["a"]);
        assert_eq!(failed.next_page(), Some("t1"));

        // Another trigger retries the same page
        let (_, effect) = apply(failed, Event::LoadMore);
        assert_eq!(effect, Some(Effect::Fetch("t1".to_string())));
    }

    #[test]
    fn test_stale_results_are_discarded() {
        let state = PageState::new(posts(&["a"]), Some("t1".to_string()));
        let (next, effect) = apply(
            state.clone(),
            Event::Loaded {
                posts: posts(&["x"]),
                next_page: None,
            },
        );
        assert_eq!(effect, None);
        assert_eq!(next, state);
    }

    #[test]
    fn test_navigation_closes_session() {
        let state = PageState::new(posts(&["a"]), Some("t1".to_string()));
        let (loading, _) = apply(state, Event::LoadMore);
        let (closed, _) = apply(loading, Event::NavigatedAway);
        assert_eq!(closed.status(), &LoadStatus::Closed);

        let (after, _) = apply(
            closed,
            Event::Loaded {
                posts: posts(&["b"]),
                next_page: None,
            },
        );
        assert_eq!(uids(&after), vec!["a"]);

        let (_, effect) = apply(after, Event::LoadMore);
        assert_eq!(effect, None);
    }
}
