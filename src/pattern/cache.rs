// pattern/cache.rs
use crate::error::{Result, WatchError};
use globset::{GlobBuilder, GlobMatcher};
use lru::LruCache;
use regex::Regex;
use std::{num::NonZeroUsize, sync::Mutex};

// Limit cache size to prevent uncontrolled memory growth
const MAX_CACHE_SIZE: usize = 1000;

/// Cache for compiled glob matchers and regexes
///
/// Owned by the runtime context rather than living in process globals, so
/// compiled patterns share the runtime's lifecycle. Both maps use LRU
/// eviction; compiled artifacts are cheap to clone.
pub struct PatternCache {
    globs: Mutex<LruCache<String, GlobMatcher>>,
    regexes: Mutex<LruCache<String, Regex>>,
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternCache {
    pub fn new() -> Self {
        let cap = NonZeroUsize::new(MAX_CACHE_SIZE).expect("cache size is non-zero");
        Self {
            globs: Mutex::new(LruCache::new(cap)),
            regexes: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Retrieves a compiled glob matcher from cache or compiles and caches it
    ///
    /// Separators are literal: `*` and `?` never match across `/`.
    pub fn glob(&self, pattern: &str) -> Result<GlobMatcher> {
        let mut cache = self.globs.lock().unwrap();
        if let Some(matcher) = cache.get(pattern) {
            return Ok(matcher.clone());
        }

        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| WatchError::InvalidPattern(e.to_string()))?;
        let matcher = glob.compile_matcher();
        cache.put(pattern.to_string(), matcher.clone());
        Ok(matcher)
    }

    /// Retrieves a compiled regex from cache or compiles and caches it
    pub fn regex(&self, pattern: &str) -> Result<Regex> {
        let mut cache = self.regexes.lock().unwrap();
        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }

        let re = Regex::new(pattern).map_err(WatchError::Regex)?;
        cache.put(pattern.to_string(), re.clone());
        Ok(re)
    }
}
