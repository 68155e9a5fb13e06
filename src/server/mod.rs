//! Blog server with revalidation and on-demand post rendering

use anyhow::Result;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::Instant;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::cms::PrismicClient;
use crate::commands;
use crate::content::Post;
use crate::generator::Generator;
use crate::Blog;

/// Why a post route could not be rendered on demand
#[derive(Debug, Clone, thiserror::Error)]
pub enum FallbackError {
    #[error("no post with uid {0:?}")]
    PostNotFound(String),

    #[error("failed to build post {uid}: {reason}")]
    Build { uid: String, reason: String },
}

type Resolution = Result<String, FallbackError>;

/// How long a uid the CMS does not know is answered without asking again
const NOT_FOUND_TTL: Duration = Duration::from_secs(60);

/// Server state
pub struct ServerState {
    blog: Blog,
    client: PrismicClient,
    generator: Generator,
    /// Listing of the last generation, for prev/next links
    listing: RwLock<Vec<Post>>,
    /// In-flight resolutions, one per uid
    pending: Mutex<HashMap<String, watch::Receiver<Option<Resolution>>>>,
    /// Uids found missing, with when they were looked up
    missing: Mutex<HashMap<String, Instant>>,
}

impl ServerState {
    pub fn new(blog: &Blog, client: PrismicClient, generator: Generator, listing: Vec<Post>) -> Self {
        Self {
            blog: blog.clone(),
            client,
            generator,
            listing: RwLock::new(listing),
            pending: Mutex::new(HashMap::new()),
            missing: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `uid` was recently found missing
    async fn known_missing(&self, uid: &str) -> bool {
        let mut missing = self.missing.lock().await;
        match missing.get(uid) {
            Some(at) if at.elapsed() < NOT_FOUND_TTL => true,
            Some(_) => {
                missing.remove(uid);
                false
            }
            None => false,
        }
    }
}

/// Generate the site, then serve it until interrupted
pub async fn start(blog: &Blog, ip: &str, port: u16, open: bool) -> Result<()> {
    let client = blog.cms_client()?;

    tracing::info!("Generating static files...");
    let generator = Generator::new(blog)?;
    let (report, mut listing) = generator.generate(&client, false).await?;
    if report.skipped {
        // Output is fresh but the listing is still needed for post navigation
        listing = match commands::list::collect(blog, client.clone()).await {
            Ok(posts) => posts,
            Err(e) => {
                tracing::warn!("Could not load the listing: {:#}", e);
                Vec::new()
            }
        };
    }

    let state = Arc::new(ServerState::new(blog, client, generator, listing));
    spawn_revalidation(Arc::clone(&state));

    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    println!("Press Ctrl+C to stop.");

    // Open browser if requested
    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Router serving the public dir with on-demand post pages
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Regenerate the site every revalidation window
pub fn spawn_revalidation(state: Arc<ServerState>) {
    let period = state.blog.config.revalidate_window();
    if period.is_zero() {
        tracing::info!("Revalidation disabled");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            tracing::info!("Revalidating...");
            match state.generator.generate(&state.client, true).await {
                Ok((report, posts)) => {
                    *state.listing.write().await = posts;
                    state.missing.lock().await.clear();
                    tracing::info!(
                        "Revalidated: {} written, {} removed",
                        report.written,
                        report.removed
                    );
                }
                Err(e) => tracing::error!("Revalidation failed: {:#}", e),
            }
        }
    });
}

/// Serves generated files, resolving unknown post routes on demand
async fn fallback_handler(State(state): State<Arc<ServerState>>, request: Request<Body>) -> Response {
    if let Some(uid) = post_uid(request.uri().path()) {
        let generated = match state.generator.post_output_path(uid) {
            Ok(path) => path.exists(),
            Err(_) => return not_found(&state),
        };
        if !generated {
            if state.known_missing(uid).await {
                return not_found(&state);
            }
            return resolve_post(state, uid.to_string()).await;
        }
    }

    let mut service = ServeDir::new(&state.blog.public_dir).append_index_html_on_directories(true);
    match service.try_call(request).await {
        Ok(response) if response.status() == StatusCode::NOT_FOUND => not_found(&state),
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Wait a bounded time for the post, falling back to a loading page
async fn resolve_post(state: Arc<ServerState>, uid: String) -> Response {
    let mut rx = subscribe(&state, &uid).await;
    let wait = state.blog.config.fallback_timeout();

    let resolved = tokio::time::timeout(wait, async {
        rx.wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|resolution| (*resolution).clone())
    })
    .await;

    match resolved {
        Ok(Some(Ok(html))) => Html(html).into_response(),
        Ok(Some(Err(FallbackError::PostNotFound(_)))) => not_found(&state),
        Ok(Some(Err(e))) => {
            tracing::warn!("{}", e);
            loading(&state, StatusCode::SERVICE_UNAVAILABLE)
        }
        Ok(None) => loading(&state, StatusCode::SERVICE_UNAVAILABLE),
        Err(_) => {
            tracing::debug!("Post {} still resolving after {:?}", uid, wait);
            loading(&state, StatusCode::OK)
        }
    }
}

/// Join the resolution of `uid`, starting one if none is running
async fn subscribe(state: &Arc<ServerState>, uid: &str) -> watch::Receiver<Option<Resolution>> {
    let mut pending = state.pending.lock().await;
    if let Some(rx) = pending.get(uid) {
        return rx.clone();
    }

    let (tx, rx) = watch::channel(None);
    pending.insert(uid.to_string(), rx.clone());

    let task_state = Arc::clone(state);
    let uid = uid.to_string();
    tokio::spawn(async move {
        let resolution = build_fallback(&task_state, &uid).await;
        if let Err(FallbackError::PostNotFound(_)) = &resolution {
            task_state
                .missing
                .lock()
                .await
                .insert(uid.clone(), Instant::now());
        }
        tx.send_replace(Some(resolution));
        task_state.pending.lock().await.remove(&uid);
    });

    rx
}

async fn build_fallback(state: &ServerState, uid: &str) -> Resolution {
    tracing::info!("Rendering post {} on demand", uid);
    let listing = state.listing.read().await.clone();

    let html = match state.generator.build_post(&state.client, uid, &listing).await {
        Ok(Some(html)) => html,
        Ok(None) => return Err(FallbackError::PostNotFound(uid.to_string())),
        Err(e) => {
            return Err(FallbackError::Build {
                uid: uid.to_string(),
                reason: format!("{:#}", e),
            })
        }
    };

    // Later requests are served from disk
    let written = state
        .generator
        .post_output_path(uid)
        .and_then(|path| state.generator.write_page(&path, &html));
    if let Err(e) = written {
        tracing::warn!("Could not store post {}: {:#}", uid, e);
    }

    Ok(html)
}

fn not_found(state: &ServerState) -> Response {
    match state.generator.render_not_found() {
        Ok(html) => (StatusCode::NOT_FOUND, Html(html)).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn loading(state: &ServerState, status: StatusCode) -> Response {
    let retry_after = state.blog.config.fallback_wait.max(1);
    match state.generator.render_loading(retry_after) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(_) => (status, "Loading").into_response(),
    }
}

/// The uid of a `/post/{uid}` route
fn post_uid(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/post/")?;
    let rest = rest
        .strip_suffix("/index.html")
        .or_else(|| rest.strip_suffix('/'))
        .unwrap_or(rest);
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(rest)
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}
