//! Post models

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A blog post as shown in the listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    /// URL-friendly identifier
    pub uid: String,

    /// First publication date
    pub published_at: Option<DateTime<Utc>>,

    /// `published_at` formatted for display
    pub published_label: Option<String>,

    pub title: String,
    pub subtitle: String,
    pub author: String,
}

impl Post {
    /// Route of the post page
    pub fn path(&self) -> String {
        format!("/post/{}/", self.uid)
    }

    /// Get the previous post in a list
    pub fn prev<'a>(&self, posts: &'a [Post]) -> Option<&'a Post> {
        let pos = posts.iter().position(|p| p.uid == self.uid)?;
        if pos > 0 {
            Some(&posts[pos - 1])
        } else {
            None
        }
    }

    /// Get the next post in a list
    pub fn next<'a>(&self, posts: &'a [Post]) -> Option<&'a Post> {
        let pos = posts.iter().position(|p| p.uid == self.uid)?;
        posts.get(pos + 1)
    }
}

/// A section of a post body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentBlock {
    pub heading: Option<String>,
    pub paragraphs: Vec<String>,
}

/// A full post, as shown on its own page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,

    /// Last publication date
    pub last_edited_at: Option<DateTime<Utc>>,

    /// `last_edited_at` formatted for display
    pub last_edited_label: Option<String>,

    pub banner_url: String,

    pub content: Vec<ContentBlock>,

    /// Estimated reading time in minutes
    pub reading_time: u32,
}
