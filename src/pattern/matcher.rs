// pattern/matcher.rs
use crate::error::Result;
use crate::pattern::cache::PatternCache;
use crate::pattern::{fix_path_separators, translate, ResolvedPattern};
use camino::{Utf8Path, Utf8PathBuf};
use globset::GlobMatcher;
use regex::Regex;
use std::sync::Arc;

/// A compiled predicate over one path segment or one full path
///
/// Simple patterns compile to a glob matcher; anything carrying extended
/// syntax is translated to a regex.
#[derive(Clone, Debug)]
pub enum PatternPredicate {
    Glob(GlobMatcher),
    Regex(Regex),
}

impl PatternPredicate {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            PatternPredicate::Glob(glob) => glob.is_match(text),
            PatternPredicate::Regex(re) => re.is_match(text),
        }
    }
}

/// Checks if a pattern carries syntax beyond what plain globs express
fn is_complex_pattern(pattern: &str) -> bool {
    pattern.contains('@')
        || pattern.contains('!')
        || pattern.contains('+')
        || pattern.contains('?')
        || pattern.contains('(')
        || pattern.contains(')')
        || pattern.contains('[')
        || pattern.contains(']')
        || pattern.contains('{')
        || pattern.contains('}')
        || pattern.contains('|')
}

fn compile(pattern: &str, cache: &PatternCache) -> Result<PatternPredicate> {
    if is_complex_pattern(pattern) {
        let source =
            translate::to_regex(pattern).unwrap_or_else(|_| translate::literal_regex(pattern));
        Ok(PatternPredicate::Regex(cache.regex(&source)?))
    } else {
        Ok(PatternPredicate::Glob(cache.glob(pattern)?))
    }
}

/// Runtime predicates for one `(pattern, options)` pair
///
/// Bundles the traversal structure from the splitter with three compiled
/// predicates: the per-level prune-segment matchers (an immutable sequence
/// consumed by index, safe to share across concurrent walks), the bare-name
/// ignore matcher, and the full-path matcher used once pruning structure is
/// exhausted.
#[derive(Clone)]
pub struct PathMatcher {
    base_path: Utf8PathBuf,
    prune_segments: Arc<[PatternPredicate]>,
    has_globstar: bool,
    ignore: Option<PatternPredicate>,
    full_path: PatternPredicate,
}

impl PathMatcher {
    pub fn build(
        resolved: &ResolvedPattern,
        ignore_pattern: Option<&str>,
        cache: &PatternCache,
    ) -> Result<Self> {
        let prune_segments: Vec<PatternPredicate> = resolved
            .prune_segments
            .iter()
            .map(|segment| compile(segment, cache))
            .collect::<Result<_>>()?;

        let ignore = match ignore_pattern {
            Some(pattern) if !pattern.is_empty() => Some(compile(pattern, cache)?),
            _ => None,
        };

        let full_path = compile(&resolved.full_pattern, cache)?;

        Ok(Self {
            base_path: resolved.base_path.clone(),
            prune_segments: prune_segments.into(),
            has_globstar: resolved.has_globstar,
            ignore,
            full_path,
        })
    }

    pub fn base_path(&self) -> &Utf8Path {
        &self.base_path
    }

    pub fn has_globstar(&self) -> bool {
        self.has_globstar
    }

    /// Number of prunable segments below the base path
    pub fn segment_count(&self) -> usize {
        self.prune_segments.len()
    }

    /// Tests a bare child name against the prune segment at `level`
    pub fn segment_matches(&self, level: usize, name: &str) -> bool {
        self.prune_segments
            .get(level)
            .map_or(true, |segment| segment.matches(name))
    }

    /// Whole-subtree pruning: a matching bare name is skipped anywhere
    pub fn ignores_name(&self, name: &str) -> bool {
        self.ignore
            .as_ref()
            .map_or(false, |ignore| ignore.matches(name))
    }

    /// Tests a candidate absolute path against the complete pattern
    pub fn matches_full(&self, path: &Utf8Path) -> bool {
        self.full_path.matches(&fix_path_separators(path.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{resolve_pattern_in, SeparatorStyle};

    fn build(pattern: &str, cwd: Option<&str>, ignore: Option<&str>) -> PathMatcher {
        let resolved = resolve_pattern_in(
            pattern,
            cwd.map(Utf8Path::new),
            None,
            SeparatorStyle::default(),
        );
        PathMatcher::build(&resolved, ignore, &PatternCache::new()).unwrap()
    }

    #[test]
    fn literal_pattern_matches_exactly_itself() {
        let matcher = build("/var/log/app.log", None, None);
        assert_eq!(matcher.segment_count(), 0);
        assert!(!matcher.has_globstar());
        assert!(matcher.matches_full(Utf8Path::new("/var/log/app.log")));
        assert!(!matcher.matches_full(Utf8Path::new("/var/log/app.log.1")));
    }

    #[test]
    fn segment_predicates_follow_split_order() {
        let matcher = build("(bar|baz)/*.d/**/*asd*", Some("/home/u"), None);
        assert_eq!(matcher.segment_count(), 2);
        assert!(matcher.segment_matches(0, "bar"));
        assert!(matcher.segment_matches(0, "baz"));
        assert!(!matcher.segment_matches(0, "qux"));
        assert!(matcher.segment_matches(1, "conf.d"));
        assert!(!matcher.segment_matches(1, "conf"));
    }

    #[test]
    fn full_path_enforces_the_globstar_suffix() {
        let matcher = build("/var/log/**/*.log", None, None);
        assert!(matcher.matches_full(Utf8Path::new("/var/log/a/b/app.log")));
        assert!(!matcher.matches_full(Utf8Path::new("/var/log/a/b/app.txt")));
    }

    #[test]
    fn default_ignore_prunes_by_bare_name() {
        let matcher = build("**/*.log", Some("/srv"), Some("(node_modules|.git)"));
        assert!(matcher.ignores_name("node_modules"));
        assert!(matcher.ignores_name(".git"));
        assert!(!matcher.ignores_name("src"));
    }
}
