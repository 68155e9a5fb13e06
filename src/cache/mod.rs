//! Cache module for revalidation
//!
//! Records when the site was last generated and a hash of every rendered
//! post page. Inside the revalidation window generation is skipped; outside
//! it, unchanged pages are left alone and pages of deleted posts are removed.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Cache directory, relative to the site directory
pub const CACHE_DIR: &str = ".spacetraveling-cache";

/// Cache file name
const CACHE_FILE: &str = "db.json";

/// Represents a cached entry for a rendered post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Hash of the rendered page
    pub content_hash: u64,
    /// Output path relative to public dir
    pub output_path: String,
}

/// Cache database for tracking generated output
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheDb {
    /// Version of the cache format
    pub version: u32,
    /// End of the last successful generation
    pub generated_at: Option<DateTime<Utc>>,
    /// Hash of the rendered listing page
    pub index_hash: u64,
    /// Rendered posts, keyed by uid
    pub posts: HashMap<String, CacheEntry>,
}

/// What happened to a page when comparing against the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageChange {
    New,
    Changed,
    Unchanged,
}

impl CacheDb {
    /// Current cache format version
    const VERSION: u32 = 1;

    /// Load cache from disk, or create a new empty cache
    pub fn load(base_dir: &Path) -> Self {
        let cache_path = base_dir.join(CACHE_DIR).join(CACHE_FILE);
        if let Ok(content) = fs::read_to_string(&cache_path) {
            match serde_json::from_str::<CacheDb>(&content) {
                Ok(cache) if cache.version == Self::VERSION => return cache,
                Ok(_) => tracing::info!("Cache version mismatch, rebuilding cache"),
                Err(e) => tracing::warn!("Ignoring unreadable cache {:?}: {}", cache_path, e),
            }
        }
        Self::new()
    }

    /// Save cache to disk
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let cache_dir = base_dir.join(CACHE_DIR);
        fs::create_dir_all(&cache_dir)?;

        let content = serde_json::to_string_pretty(self)?;
        fs::write(cache_dir.join(CACHE_FILE), content)?;
        Ok(())
    }

    /// Create a new cache with version set
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            ..Default::default()
        }
    }

    /// Whether output generated at `generated_at` is still within `window`
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let Some(generated_at) = self.generated_at else {
            return false;
        };
        match chrono::Duration::from_std(window) {
            Ok(window) => now.signed_duration_since(generated_at) < window,
            Err(_) => true,
        }
    }

    /// Compare a freshly rendered post page against the cache
    pub fn compare_post(&self, uid: &str, content_hash: u64) -> PageChange {
        match self.posts.get(uid) {
            None => PageChange::New,
            Some(entry) if entry.content_hash == content_hash => PageChange::Unchanged,
            Some(_) => PageChange::Changed,
        }
    }

    /// Entries of posts that are no longer published
    pub fn removed_posts<'a>(&'a self, current: &HashSet<String>) -> Vec<(&'a str, &'a CacheEntry)> {
        let mut removed: Vec<_> = self
            .posts
            .iter()
            .filter(|(uid, _)| !current.contains(*uid))
            .map(|(uid, entry)| (uid.as_str(), entry))
            .collect();
        removed.sort_by(|a, b| a.0.cmp(b.0));
        removed
    }
}

/// Calculate a hash for content
pub fn hash_content(content: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(hash: u64, path: &str) -> CacheEntry {
        CacheEntry {
            content_hash: hash,
            output_path: path.to_string(),
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = CacheDb::new();
        cache.generated_at = Some(Utc.with_ymd_and_hms(2021, 5, 1, 12, 0, 0).unwrap());
        cache
            .posts
            .insert("a1".to_string(), entry(42, "post/a1/index.html"));
        cache.save(dir.path()).unwrap();

        let loaded = CacheDb::load(dir.path());
        assert_eq!(loaded.version, CacheDb::VERSION);
        assert_eq!(loaded.generated_at, cache.generated_at);
        assert_eq!(loaded.posts.get("a1"), Some(&entry(42, "post/a1/index.html")));
    }

    #[test]
    fn test_load_missing_or_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CacheDb::load(dir.path()).generated_at.is_none());

        fs::create_dir_all(dir.path().join(CACHE_DIR)).unwrap();
        fs::write(dir.path().join(CACHE_DIR).join(CACHE_FILE), "{not json").unwrap();
        let cache = CacheDb::load(dir.path());
        assert!(cache.posts.is_empty());
        assert_eq!(cache.version, CacheDb::VERSION);
    }

    #[test]
    fn test_is_fresh() {
        let generated = Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap();
        let window = Duration::from_secs(24 * 60 * 60);
        let mut cache = CacheDb::new();
        assert!(!cache.is_fresh(generated, window));

        cache.generated_at = Some(generated);
        assert!(cache.is_fresh(generated + chrono::Duration::hours(23), window));
        assert!(!cache.is_fresh(generated + chrono::Duration::hours(24), window));
        assert!(!cache.is_fresh(generated, Duration::ZERO));
    }

    #[test]
    fn test_compare_and_removed() {
        let mut cache = CacheDb::new();
        cache.posts.insert("a".to_string(), entry(1, "post/a/index.html"));
        cache.posts.insert("b".to_string(), entry(2, "post/b/index.html"));
        cache.posts.insert("c".to_string(), entry(3, "post/c/index.html"));

        assert_eq!(cache.compare_post("a", 1), PageChange::Unchanged);
        assert_eq!(cache.compare_post("b", 9), PageChange::Changed);
        assert_eq!(cache.compare_post("z", 1), PageChange::New);

        let current: HashSet<String> = ["a".to_string()].into_iter().collect();
        let removed: Vec<&str> = cache.removed_posts(&current).iter().map(|(u, _)| *u).collect();
        assert_eq!(removed, vec!["b", "c"]);
    }

    #[test]
    fn test_hash_content() {
        assert_eq!(hash_content("<p>a</p>"), hash_content("<p>a</p>"));
        assert_ne!(hash_content("<p>a</p>"), hash_content("<p>b</p>"));
    }
}
