#![allow(dead_code)]

use serde_json::{json, Value};
use spacetraveling::config::{CmsConfig, RetryConfig, SiteConfig};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_PATH: &str = "/api/v2";
pub const SEARCH_PATH: &str = "/api/v2/documents/search";
pub const MASTER_REF: &str = "YJ7bABIAACMAyHHd";

pub fn cms_config(server: &MockServer) -> CmsConfig {
    CmsConfig {
        endpoint: format!("{}{}", server.uri(), API_PATH),
        timeout: 5,
        retry: RetryConfig {
            max_retries: 1,
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
            backoff_multiplier: 2.0,
        },
        ..Default::default()
    }
}

pub fn site_config(server: &MockServer) -> SiteConfig {
    SiteConfig {
        cms: cms_config(server),
        ..Default::default()
    }
}

pub fn post_doc(uid: &str, title: &str) -> Value {
    json!({
        "id": format!("id-{}", uid),
        "uid": uid,
        "type": "post",
        "first_publication_date": "2021-03-15T19:25:28+0000",
        "last_publication_date": "2021-03-25T19:25:28+0000",
        "data": {
            "title": title,
            "subtitle": "Pensando em sincronização em vez de ciclos de vida",
            "author": "Joseph Oliveira",
            "banner": {"url": "https://images.prismic.io/spacetraveling/banner.png"},
            "content": [
                {
                    "heading": "Proin et varius",
                    "body": [
                        {"type": "paragraph", "text": "Lorem ipsum dolor sit amet", "spans": []}
                    ]
                }
            ]
        }
    })
}

pub fn page(results: Vec<Value>, next_page: Option<String>) -> Value {
    json!({
        "page": 1,
        "results_per_page": results.len(),
        "total_results_size": results.len(),
        "total_pages": 1,
        "next_page": next_page,
        "results": results,
    })
}

/// Serves the API entry point with a master ref
pub async fn mount_api(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "refs": [
                {"id": "preview", "ref": "preview-ref", "isMasterRef": false},
                {"id": "master", "ref": MASTER_REF, "isMasterRef": true}
            ]
        })))
        .mount(server)
        .await;
}

/// Serves the API entry point with `first` as master ref once, then `then`
pub async fn mount_api_refs(server: &MockServer, first: &str, then: &str) {
    for (reference, times) in [(first, Some(1)), (then, None)] {
        let mock = Mock::given(method("GET"))
            .and(path(API_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "refs": [{"id": "master", "ref": reference, "isMasterRef": true}]
            })));
        let mock = match times {
            Some(n) => mock.up_to_n_times(n),
            None => mock,
        };
        mock.mount(server).await;
    }
}

/// Serves the listing in pages of two, `posts` as (uid, title)
pub async fn mount_listing(server: &MockServer, posts: &[(&str, &str)]) {
    mount_listing_at(server, None, posts).await;
}

/// Like `mount_listing`, answering only queries made at `reference`
pub async fn mount_listing_at(server: &MockServer, reference: Option<&str>, posts: &[(&str, &str)]) {
    let chunks: Vec<_> = posts.chunks(2).collect();
    let ref_param = reference.map(|r| format!("&ref={}", r)).unwrap_or_default();
    for (i, chunk) in chunks.iter().enumerate() {
        let results = chunk
            .iter()
            .map(|(uid, title)| post_doc(uid, title))
            .collect();
        let next_page = (i + 1 < chunks.len()).then(|| {
            format!(
                "{}{}?page={}&pageSize=2{}",
                server.uri(),
                SEARCH_PATH,
                i + 2,
                ref_param
            )
        });

        let mut mock = Mock::given(method("GET")).and(path(SEARCH_PATH));
        mock = if i == 0 {
            mock.and(query_param("q", "[[at(document.type,\"post\")]]"))
        } else {
            mock.and(query_param("page", (i + 1).to_string()))
        };
        if let Some(reference) = reference {
            mock = mock.and(query_param("ref", reference));
        }
        mock.respond_with(ResponseTemplate::new(200).set_body_json(page(results, next_page)))
            .mount(server)
            .await;
    }
}

/// Serves single-post lookups for `posts`
pub async fn mount_details(server: &MockServer, posts: &[(&str, &str)]) {
    mount_details_at(server, None, posts).await;
}

/// Like `mount_details`, answering only lookups made at `reference`
pub async fn mount_details_at(server: &MockServer, reference: Option<&str>, posts: &[(&str, &str)]) {
    for (uid, title) in posts {
        let mut mock = Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("q", uid_query(uid)));
        if let Some(reference) = reference {
            mock = mock.and(query_param("ref", reference));
        }
        mock.respond_with(
            ResponseTemplate::new(200).set_body_json(page(vec![post_doc(uid, title)], None)),
        )
        .mount(server)
        .await;
    }
}

/// Serves an empty result for lookups of `uid`
pub async fn mount_missing(server: &MockServer, uid: &str) {
    mount_missing_at(server, None, uid).await;
}

pub async fn mount_missing_at(server: &MockServer, reference: Option<&str>, uid: &str) {
    let mut mock = Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("q", uid_query(uid)));
    if let Some(reference) = reference {
        mock = mock.and(query_param("ref", reference));
    }
    mock.respond_with(ResponseTemplate::new(200).set_body_json(page(vec![], None)))
        .mount(server)
        .await;
}

pub fn uid_query(uid: &str) -> String {
    format!("[[at(my.post.uid,\"{}\")]]", uid)
}
