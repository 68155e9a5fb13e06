//! Maps raw CMS documents onto `Post` and `PostDetail`

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::reading_time::reading_time;
use super::{ContentBlock, Post, PostDetail};
use crate::cms::Document;
use crate::helpers::{parse_timestamp, DateFormatter};

/// Which post shape to extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Listing fields: title, subtitle, author
    Summary,
    /// Full post: title, author, banner, content
    Detail,
}

/// Result of normalizing a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Summary(Post),
    Detail(PostDetail),
}

/// Content errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("malformed document {uid:?}: {field} {problem}")]
    MalformedDocument {
        uid: String,
        field: String,
        problem: &'static str,
    },
}

impl ContentError {
    fn missing(uid: &str, field: impl Into<String>) -> Self {
        ContentError::MalformedDocument {
            uid: uid.to_string(),
            field: field.into(),
            problem: "is missing or empty",
        }
    }

    fn invalid(uid: &str, field: impl Into<String>) -> Self {
        ContentError::MalformedDocument {
            uid: uid.to_string(),
            field: field.into(),
            problem: "has an invalid value",
        }
    }
}

/// Pure transform from documents to posts, with dates rendered for display
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    dates: DateFormatter,
}

impl Normalizer {
    pub fn new(dates: DateFormatter) -> Self {
        Self { dates }
    }

    /// Extract the fields of `shape` from a document
    pub fn normalize(&self, doc: &Document, shape: Shape) -> Result<Normalized, ContentError> {
        let uid = doc
            .uid
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ContentError::missing(&doc.id, "uid"))?;

        let published = doc
            .first_publication_date
            .as_ref()
            .ok_or_else(|| ContentError::missing(uid, "first_publication_date"))?;
        let published_at = timestamp(uid, "first_publication_date", published)?;
        let title = required_text(&doc.data, uid, "title")?;
        let author = required_text(&doc.data, uid, "author")?;
        let subtitle = match shape {
            Shape::Summary => required_text(&doc.data, uid, "subtitle")?,
            Shape::Detail => doc.data.get("subtitle").and_then(text_of).unwrap_or_default(),
        };

        let post = Post {
            uid: uid.to_string(),
            published_label: published_at.as_ref().map(|d| self.dates.date(d)),
            published_at,
            title,
            subtitle,
            author,
        };

        match shape {
            Shape::Summary => Ok(Normalized::Summary(post)),
            Shape::Detail => {
                let last_edited_at =
                    timestamp(uid, "last_publication_date", &doc.last_publication_date)?;

                let banner_url = doc
                    .data
                    .get("banner")
                    .and_then(|b| b.get("url"))
                    .and_then(Value::as_str)
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| ContentError::missing(uid, "data.banner.url"))?
                    .to_string();

                let content = content_blocks(&doc.data, uid)?;

                Ok(Normalized::Detail(PostDetail {
                    post,
                    last_edited_label: last_edited_at.as_ref().map(|d| self.dates.date_time(d)),
                    last_edited_at,
                    banner_url,
                    reading_time: reading_time(&content),
                    content,
                }))
            }
        }
    }

    /// Listing shape
    pub fn summary(&self, doc: &Document) -> Result<Post, ContentError> {
        match self.normalize(doc, Shape::Summary)? {
            Normalized::Summary(post) => Ok(post),
            Normalized::Detail(detail) => Ok(detail.post),
        }
    }

    /// Full post shape
    pub fn detail(&self, doc: &Document) -> Result<PostDetail, ContentError> {
        match self.normalize(doc, Shape::Detail)? {
            Normalized::Detail(detail) => Ok(detail),
            Normalized::Summary(post) => Err(ContentError::missing(&post.uid, "data.content")),
        }
    }

    /// Normalize a whole page of results, failing on the first bad document
    pub fn summaries(&self, docs: &[Document]) -> Result<Vec<Post>, ContentError> {
        docs.iter().map(|doc| self.summary(doc)).collect()
    }
}

fn timestamp(
    uid: &str,
    field: &str,
    value: &Option<String>,
) -> Result<Option<DateTime<Utc>>, ContentError> {
    match value.as_deref() {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| ContentError::invalid(uid, field)),
    }
}

fn required_text(data: &Map<String, Value>, uid: &str, field: &str) -> Result<String, ContentError> {
    data.get(field)
        .and_then(text_of)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ContentError::missing(uid, format!("data.{}", field)))
}

/// Text of a key-text field (plain string) or a rich-text field (array of blocks)
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            }
        }
        _ => None,
    }
}

fn content_blocks(data: &Map<String, Value>, uid: &str) -> Result<Vec<ContentBlock>, ContentError> {
    let groups = data
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ContentError::missing(uid, "data.content"))?;

    groups
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let heading = group
                .get("heading")
                .and_then(text_of)
                .filter(|h| !h.trim().is_empty());

            let paragraphs = match group.get("body") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|item| item.get("text").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect(),
                Some(_) => return Err(ContentError::invalid(uid, format!("data.content[{}].body", i))),
            };

            Ok(ContentBlock {
                heading,
                paragraphs,
            })
        })
        .collect()
}
