//! Generator module - fetches posts from the CMS and writes static HTML

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tera::Context;

use crate::cache::{hash_content, CacheDb, CacheEntry, PageChange};
use crate::cms::{CmsError, ContentSource};
use crate::content::{Normalizer, Post, PostDetail};
use crate::i18n::I18n;
use crate::pagination::{PageState, Paginator};
use crate::templates::{ConfigData, NavPost, PostData, PostPageData, TemplateRenderer};
use crate::Blog;

/// Summary of one generation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    /// The cache was still fresh and nothing was fetched
    pub skipped: bool,
    /// Posts found in the listing
    pub posts: usize,
    /// Post pages written
    pub written: usize,
    /// Post pages left untouched
    pub unchanged: usize,
    /// Post pages deleted because the post is gone
    pub removed: usize,
    /// Posts that could not be built
    pub failed: usize,
}

/// Static site generator using Tera templates
pub struct Generator {
    blog: Blog,
    renderer: TemplateRenderer,
    normalizer: Normalizer,
    i18n: I18n,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog) -> Result<Self> {
        let renderer = TemplateRenderer::new()?;
        let normalizer = blog.normalizer()?;

        let mut i18n = I18n::new(&blog.config.language);
        i18n.load_languages(blog.base_dir.join("languages"))?;

        Ok(Self {
            blog: blog.clone(),
            renderer,
            normalizer,
            i18n,
        })
    }

    /// Generate the whole site
    ///
    /// Inside the revalidation window this is a no-op unless `force` is set.
    /// Returns the report and the full listing in arrival order.
    pub async fn generate<S: ContentSource + Clone>(
        &self,
        source: &S,
        force: bool,
    ) -> Result<(GenerateReport, Vec<Post>)> {
        let mut cache = CacheDb::load(&self.blog.base_dir);
        let now = chrono::Utc::now();

        if !force && cache.is_fresh(now, self.blog.config.revalidate_window()) {
            tracing::info!("Output is fresh, skipping generation");
            return Ok((
                GenerateReport {
                    skipped: true,
                    ..Default::default()
                },
                Vec::new(),
            ));
        }

        fs::create_dir_all(&self.blog.public_dir)?;
        let cms = &self.blog.config.cms;

        // Read the latest published release
        source.refresh().await?;

        // Listing page: first page only, the rest is loaded on demand
        let mut paginator = Paginator::first_page(
            source.clone(),
            self.normalizer,
            &cms.document_type,
            cms.page_size,
        )
        .await?
        .with_timeout(cms.page_timeout());

        let index = self.render_index(paginator.state())?;
        let index_hash = hash_content(&index);
        let index_path = self.blog.public_dir.join("index.html");
        if cache.index_hash != index_hash || !index_path.exists() {
            fs::write(&index_path, index)?;
            cache.index_hash = index_hash;
            tracing::info!("Generated index.html");
        } else {
            tracing::debug!("index.html unchanged");
        }

        // Every post page
        let posts = paginator.load_all().await?.to_vec();
        let mut report = GenerateReport {
            posts: posts.len(),
            ..Default::default()
        };
        let mut current = HashSet::new();

        for post in &posts {
            let html = match self.build_post(source, &post.uid, &posts).await {
                Ok(Some(html)) => html,
                Ok(None) => {
                    tracing::warn!("Post {} disappeared while generating", post.uid);
                    report.failed += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Skipping post {}: {:#}", post.uid, e);
                    report.failed += 1;
                    // Keep the previous output of a post that failed to build
                    current.insert(post.uid.clone());
                    continue;
                }
            };
            current.insert(post.uid.clone());

            let hash = hash_content(&html);
            let output = self.post_output_path(&post.uid)?;
            let change = cache.compare_post(&post.uid, hash);

            if change == PageChange::Unchanged && output.exists() {
                report.unchanged += 1;
                continue;
            }

            self.write_page(&output, &html)?;
            tracing::debug!("Generated {} ({:?})", post.path(), change);
            report.written += 1;

            cache.posts.insert(
                post.uid.clone(),
                CacheEntry {
                    content_hash: hash,
                    output_path: output
                        .strip_prefix(&self.blog.public_dir)
                        .unwrap_or(&output)
                        .to_string_lossy()
                        .into_owned(),
                },
            );
        }

        // Pages of posts that are gone
        let removed: Vec<(String, String)> = cache
            .removed_posts(&current)
            .into_iter()
            .map(|(uid, entry)| (uid.to_string(), entry.output_path.clone()))
            .collect();
        for (uid, output_path) in removed {
            let page = self.blog.public_dir.join(&output_path);
            if page.exists() {
                fs::remove_file(&page)?;
                if let Some(dir) = page.parent() {
                    // Only removes the directory once it is empty
                    let _ = fs::remove_dir(dir);
                }
            }
            cache.posts.remove(&uid);
            tracing::info!("Removed {}", output_path);
            report.removed += 1;
        }

        cache.generated_at = Some(chrono::Utc::now());
        cache.save(&self.blog.base_dir)?;

        tracing::info!(
            "Generated {} posts ({} written, {} unchanged, {} removed, {} failed)",
            report.posts,
            report.written,
            report.unchanged,
            report.removed,
            report.failed
        );

        Ok((report, posts))
    }

    /// Fetch and render one post page. `Ok(None)` when the CMS has no such post.
    pub async fn build_post<S: ContentSource>(
        &self,
        source: &S,
        uid: &str,
        listing: &[Post],
    ) -> Result<Option<String>> {
        let doc_type = &self.blog.config.cms.document_type;
        let doc = match source.get_by_uid(doc_type, uid).await {
            Ok(doc) => doc,
            Err(CmsError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let detail = self.normalizer.detail(&doc)?;
        Ok(Some(self.render_post(&detail, listing)?))
    }

    /// Create a base context with common variables
    fn create_base_context(&self, page_title: Option<&str>) -> Context {
        let config = &self.blog.config;
        let mut context = Context::new();
        context.insert(
            "config",
            &ConfigData {
                title: config.title.clone(),
                language: config.language.clone(),
                timezone: config.timezone.clone(),
            },
        );
        context.insert("t", &self.i18n.get_all_translations());
        context.insert("version", env!("CARGO_PKG_VERSION"));
        context.insert("page_title", &page_title);
        context
    }

    /// Listing page for a pagination state
    pub fn render_index(&self, state: &PageState) -> Result<String> {
        let posts: Vec<PostData> = state.posts().iter().map(PostData::from).collect();

        let mut context = self.create_base_context(None);
        context.insert("posts", &posts);
        context.insert("next_page", &state.next_page());
        self.renderer.render("index.html", &context)
    }

    /// Page of a single post, linked to its neighbours in `listing`
    pub fn render_post(&self, detail: &PostDetail, listing: &[Post]) -> Result<String> {
        let mut context = self.create_base_context(Some(&detail.post.title));
        context.insert("post", &PostPageData::from(detail));
        context.insert("prev_post", &detail.post.prev(listing).map(NavPost::from));
        context.insert("next_post", &detail.post.next(listing).map(NavPost::from));
        self.renderer.render("post.html", &context)
    }

    /// Placeholder shown while a post is resolved
    pub fn render_loading(&self, retry_after_secs: u64) -> Result<String> {
        let mut context = self.create_base_context(None);
        context.insert("retry_after", &retry_after_secs);
        self.renderer.render("loading.html", &context)
    }

    pub fn render_not_found(&self) -> Result<String> {
        let title = self.i18n.get("not_found.title");
        let context = self.create_base_context(Some(&title));
        self.renderer.render("not_found.html", &context)
    }

    /// Where the page of `uid` is written
    pub fn post_output_path(&self, uid: &str) -> Result<PathBuf> {
        if uid.is_empty()
            || uid == "."
            || uid == ".."
            || uid.contains(|c| c == '/' || c == '\\')
        {
            bail!("Refusing to write a page for uid {:?}", uid);
        }
        Ok(self
            .blog
            .public_dir
            .join("post")
            .join(uid)
            .join("index.html"))
    }

    /// Write a rendered page, creating parent directories
    pub fn write_page(&self, path: &Path, html: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, html)?;
        Ok(())
    }
}
