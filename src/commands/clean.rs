//! Clean the public directory

use anyhow::Result;
use std::fs;

use crate::cache::CACHE_DIR;
use crate::Blog;

/// Clean the public directory and the generation cache
pub fn run(blog: &Blog) -> Result<()> {
    if blog.public_dir.exists() {
        fs::remove_dir_all(&blog.public_dir)?;
        tracing::info!("Deleted: {:?}", blog.public_dir);
    }

    let cache_dir = blog.base_dir.join(CACHE_DIR);
    if cache_dir.exists() {
        fs::remove_dir_all(&cache_dir)?;
        tracing::info!("Deleted: {:?}", cache_dir);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    #[test]
    fn test_clean_removes_output_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let blog = Blog::with_config(dir.path(), SiteConfig::default());
        fs::create_dir_all(blog.public_dir.join("post/a")).unwrap();
        fs::write(blog.public_dir.join("index.html"), "x").unwrap();
        fs::create_dir_all(dir.path().join(CACHE_DIR)).unwrap();

        run(&blog).unwrap();
        assert!(!blog.public_dir.exists());
        assert!(!dir.path().join(CACHE_DIR).exists());

        // Nothing to clean is fine
        run(&blog).unwrap();
    }
}
