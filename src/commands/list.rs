//! List published posts

use anyhow::Result;

use crate::cms::ContentSource;
use crate::content::Post;
use crate::pagination::Paginator;
use crate::Blog;

/// Print every post, walking the listing page by page
pub async fn run(blog: &Blog) -> Result<()> {
    let client = blog.cms_client()?;
    let posts = collect(blog, client).await?;

    println!("Posts ({}):", posts.len());
    for post in &posts {
        println!("{}", describe(post));
    }
    Ok(())
}

/// All posts of the listing in arrival order
pub async fn collect<S: ContentSource>(blog: &Blog, source: S) -> Result<Vec<Post>> {
    let cms = &blog.config.cms;
    let mut paginator =
        Paginator::first_page(source, blog.normalizer()?, &cms.document_type, cms.page_size)
            .await?
            .with_timeout(cms.page_timeout());

    paginator.load_all().await?;
    Ok(paginator.into_state().into_posts())
}

fn describe(post: &Post) -> String {
    let date = post
        .published_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "----------".to_string());
    format!("  {} - {} ({}) [{}]", date, post.title, post.author, post.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_describe() {
        let mut post = Post {
            uid: "hooks".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2021, 3, 15, 19, 25, 0).unwrap()),
            published_label: None,
            title: "Como utilizar Hooks".to_string(),
            subtitle: "Pensando em sincronização".to_string(),
            author: "Joseph Oliveira".to_string(),
        };
        assert_eq!(
            describe(&post),
            "  2021-03-15 - Como utilizar Hooks (Joseph Oliveira) [/post/hooks/]"
        );

        post.published_at = None;
        assert!(describe(&post).starts_with("  ---------- - "));
    }
}
