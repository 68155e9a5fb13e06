//! Built-in templates using the Tera template engine
//!
//! All templates are embedded directly in the binary. Autoescaping is off so
//! paths and URLs render verbatim; templates escape CMS text explicitly.

use anyhow::Result;
use serde::Serialize;
use tera::{Context, Tera};

use crate::content::{ContentBlock, Post, PostDetail};

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("spacetraveling/layout.html")),
            ("index.html", include_str!("spacetraveling/index.html")),
            ("post.html", include_str!("spacetraveling/post.html")),
            ("loading.html", include_str!("spacetraveling/loading.html")),
            ("not_found.html", include_str!("spacetraveling/not_found.html")),
            // Partials
            (
                "partials/head.html",
                include_str!("spacetraveling/partials/head.html"),
            ),
            (
                "partials/header.html",
                include_str!("spacetraveling/partials/header.html"),
            ),
            (
                "partials/post_info.html",
                include_str!("spacetraveling/partials/post_info.html"),
            ),
        ])?;

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub language: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub uid: String,
    pub path: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub published_at: Option<String>,
    pub published_label: Option<String>,
}

impl From<&Post> for PostData {
    fn from(post: &Post) -> Self {
        Self {
            uid: post.uid.clone(),
            path: post.path(),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            published_at: post.published_at.map(|d| d.to_rfc3339()),
            published_label: post.published_label.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostPageData {
    #[serde(flatten)]
    pub post: PostData,
    pub banner_url: String,
    pub last_edited_label: Option<String>,
    pub content: Vec<ContentBlock>,
    pub reading_time: u32,
}

impl From<&PostDetail> for PostPageData {
    fn from(detail: &PostDetail) -> Self {
        Self {
            post: PostData::from(&detail.post),
            banner_url: detail.banner_url.clone(),
            last_edited_label: detail.last_edited_label.clone(),
            content: detail.content.clone(),
            reading_time: detail.reading_time,
        }
    }
}

/// Link to a neighbouring post
#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub path: String,
}

impl From<&Post> for NavPost {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            path: post.path(),
        }
    }
}
