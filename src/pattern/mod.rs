// pattern/mod.rs
pub mod cache;
pub mod matcher;
pub mod translate;

use camino::{Utf8Path, Utf8PathBuf};
use std::borrow::Cow;
use std::path::MAIN_SEPARATOR;

/// How pattern strings are split into path segments
///
/// Patterns always accept `/`; on installations where the OS separator is
/// `\`, backslash may additionally be treated as a separator instead of an
/// escape character.
#[derive(Clone, Copy, Debug, Default)]
pub struct SeparatorStyle {
    pub backslash_is_separator: bool,
}

impl SeparatorStyle {
    fn backslash_separates(&self) -> bool {
        MAIN_SEPARATOR == '\\' && self.backslash_is_separator
    }
}

/// A glob pattern decomposed for traversal pruning
///
/// `base_path` is the longest literal (glob-free) prefix rebuilt with the OS
/// separator; a trailing separator marks patterns that still carry a glob
/// tail, so an absolute root stays distinguishable from an empty relative
/// prefix. `glob` is the `/`-separated remainder, `None` when the whole
/// pattern is a literal path. `prune_segments` holds the glob segments before
/// the first recursive wildcard, in traversal order; nothing past a `**` is
/// ever recorded there.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedPattern {
    pub base_path: String,
    pub glob: Option<String>,
    pub prune_segments: Vec<String>,
    pub has_globstar: bool,
}

/// A parsed pattern anchored to an absolute location
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPattern {
    pub base_path: Utf8PathBuf,
    pub full_pattern: String,
    pub glob: Option<String>,
    pub prune_segments: Vec<String>,
    pub has_globstar: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum SplitMode {
    Base,
    Prune,
    AfterGlobstar,
}

/// Splits a pattern into base path, prunable segments and glob tail
///
/// Splitting is total: every input produces a usable (if semantically odd)
/// result, never an error.
pub fn parse_pattern(pattern: &str, style: SeparatorStyle) -> ParsedPattern {
    let parts = split_segments(pattern, style);

    let mut mode = SplitMode::Base;
    let mut base_parts: Vec<String> = Vec::new();
    let mut glob_parts: Vec<&str> = Vec::new();
    let mut prune_segments: Vec<String> = Vec::new();

    for &part in &parts {
        if mode != SplitMode::AfterGlobstar {
            if is_globstar(part) {
                mode = SplitMode::AfterGlobstar;
            } else if mode == SplitMode::Base {
                match literal_segment(part) {
                    Some(literal) => {
                        base_parts.push(literal);
                        continue;
                    }
                    None => mode = SplitMode::Prune,
                }
            }
        }

        glob_parts.push(part);
        if mode == SplitMode::Prune {
            prune_segments.push(part.to_string());
        }
    }

    if !glob_parts.is_empty() {
        // trailing empty segment: root ["", ""] joins to "/", a bare
        // relative prefix [""] joins to ""
        base_parts.push(String::new());
    }

    let sep = MAIN_SEPARATOR.to_string();
    let base_path = base_parts.join(&sep);
    let glob = if glob_parts.is_empty() {
        None
    } else {
        Some(glob_parts.join("/"))
    };

    ParsedPattern {
        base_path,
        glob,
        prune_segments,
        has_globstar: mode == SplitMode::AfterGlobstar,
    }
}

/// Anchors a pattern: home prefix expanded, relative base joined to `cwd`
///
/// The join happens here, at the point of use; [`parse_pattern`] itself never
/// looks at the working directory.
pub fn resolve_pattern(pattern: &str, cwd: Option<&Utf8Path>, style: SeparatorStyle) -> ResolvedPattern {
    let home = dirs::home_dir()
        .and_then(|p| Utf8PathBuf::from_path_buf(p).ok());
    resolve_pattern_in(pattern, cwd, home.as_deref(), style)
}

pub(crate) fn resolve_pattern_in(
    pattern: &str,
    cwd: Option<&Utf8Path>,
    home: Option<&Utf8Path>,
    style: SeparatorStyle,
) -> ResolvedPattern {
    let pattern = expand_home(pattern, home);
    let parsed = parse_pattern(&pattern, style);

    let mut base_path = parsed.base_path;
    let mut full_pattern = fix_pattern_separators(&pattern, style).into_owned();
    if let Some(cwd) = cwd {
        if !Utf8Path::new(&base_path).is_absolute() {
            base_path = join_normalize(cwd.as_str(), &base_path);
            full_pattern = resolve_full_pattern(&base_path, parsed.glob.as_deref());
        }
    }

    ResolvedPattern {
        base_path: Utf8PathBuf::from(base_path),
        full_pattern,
        glob: parsed.glob,
        prune_segments: parsed.prune_segments,
        has_globstar: parsed.has_globstar,
    }
}

fn split_segments<'a>(pattern: &'a str, style: SeparatorStyle) -> Vec<&'a str> {
    if style.backslash_separates() {
        pattern.split(['/', '\\']).collect()
    } else {
        pattern.split('/').collect()
    }
}

/// A recursive wildcard is a whole segment; `a**b` is just two stars.
fn is_globstar(segment: &str) -> bool {
    segment == "**"
}

/// Returns the unescaped text of a segment containing no glob syntax,
/// `None` as soon as an unescaped metacharacter shows up.
fn literal_segment(segment: &str) -> Option<String> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => out.push(escaped),
                None => out.push('\\'),
            },
            '*' | '?' | '[' | ']' | '{' | '}' | '(' | ')' | '|' => return None,
            '+' | '@' | '!' => {
                // extended-glob operators only open a group right before "("
                if chars.peek() == Some(&'(') {
                    return None;
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    Some(out)
}

fn expand_home(pattern: &str, home: Option<&Utf8Path>) -> String {
    let Some(home) = home else {
        return pattern.to_string();
    };
    for prefix in ["~", "$HOME"] {
        if let Some(rest) = pattern.strip_prefix(prefix) {
            let at_boundary = rest
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric() && c != '_');
            if at_boundary {
                return format!("{}{}", home, rest);
            }
        }
    }
    pattern.to_string()
}

/// Patterns always use `/` internally; when backslash doubles as a
/// separator it cannot be an escape, so rewriting is safe.
pub(crate) fn fix_pattern_separators<'a>(pattern: &'a str, style: SeparatorStyle) -> Cow<'a, str> {
    if style.backslash_separates() {
        Cow::Owned(pattern.replace('\\', "/"))
    } else {
        Cow::Borrowed(pattern)
    }
}

/// Candidate paths are matched with `/` separators regardless of OS.
pub(crate) fn fix_path_separators(path: &str) -> Cow<'_, str> {
    if MAIN_SEPARATOR == '\\' {
        Cow::Owned(path.replace('\\', "/"))
    } else {
        Cow::Borrowed(path)
    }
}

fn resolve_full_pattern(base_path: &str, glob: Option<&str>) -> String {
    let base = fix_path_separators(base_path);
    let base = base.trim_end_matches('/');
    match glob {
        Some(glob) => format!("{}/{}", base, glob),
        None => base.to_string(),
    }
}

/// Lexically joins `rel` onto `cwd`, folding `.` and `..`, preserving a
/// trailing separator so base paths keep their glob-tail marker.
fn join_normalize(cwd: &str, rel: &str) -> String {
    let sep = MAIN_SEPARATOR;
    let trailing = rel.ends_with(sep) || (rel.is_empty() && cwd.ends_with(sep));
    let combined = format!("{}{}{}", cwd.trim_end_matches(sep), sep, rel);
    let absolute = combined.starts_with(sep);

    let mut stack: Vec<&str> = Vec::new();
    for comp in combined.split(sep) {
        match comp {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    let mut out = String::new();
    if absolute {
        out.push(sep);
    }
    out.push_str(&stack.join(&sep.to_string()));
    if trailing && !out.ends_with(sep) {
        out.push(sep);
    }
    out
}
