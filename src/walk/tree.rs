// walk/tree.rs
use crate::pattern::matcher::PathMatcher;
use crate::walk::{FileInfo, WalkEvent, WalkHandle};
use camino::Utf8PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc::UnboundedSender;

/// In-process tree walker driven by a [`PathMatcher`]
///
/// Descends level by level from the matcher's base path. While prune
/// segments remain, only children whose bare name matches the current
/// level's segment are entered; once they are exhausted, directories are
/// entered only if the pattern carries a recursive wildcard, and files are
/// accepted when the full-path predicate passes. Ignored names prune whole
/// subtrees at any level.
pub struct TreeWalker {
    matcher: Arc<PathMatcher>,
}

impl TreeWalker {
    pub fn new(matcher: Arc<PathMatcher>) -> Self {
        Self { matcher }
    }

    pub(crate) fn start(&self, tx: UnboundedSender<WalkEvent>) {
        step(
            self.matcher.clone(),
            self.matcher.base_path().to_owned(),
            0,
            tx,
        );
    }
}

/// Walks everything under `root`, emitting every file found
///
/// The unconstrained strategy: stat-classify each entry, recurse into
/// directories, no pattern filtering at all.
pub fn walk_unconstrained(root: Utf8PathBuf) -> WalkHandle {
    let (tx, handle) = WalkHandle::channel();
    step_unconstrained(root, tx);
    handle
}

fn step(matcher: Arc<PathMatcher>, path: Utf8PathBuf, level: usize, tx: UnboundedSender<WalkEvent>) {
    tokio::spawn(async move {
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(err) => {
                let _ = tx.send(WalkEvent::Error(err.into()));
                return;
            }
        };

        if meta.is_dir() {
            if level < matcher.segment_count() || matcher.has_globstar() {
                descend(matcher, path, level, tx).await;
            }
        } else if level >= matcher.segment_count() && matcher.matches_full(&path) {
            let _ = tx.send(WalkEvent::File(FileInfo::from_metadata(path, &meta)));
        }
    });
}

async fn descend(
    matcher: Arc<PathMatcher>,
    dir: Utf8PathBuf,
    level: usize,
    tx: UnboundedSender<WalkEvent>,
) {
    let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(err) => {
            let _ = tx.send(WalkEvent::Error(err.into()));
            return;
        }
    };

    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let name = match entry.file_name().to_str() {
                    Some(name) => name.to_owned(),
                    // non-UTF8 names cannot match a pattern, skip
                    None => continue,
                };
                if matcher.ignores_name(&name) {
                    continue;
                }
                if level < matcher.segment_count() && !matcher.segment_matches(level, &name) {
                    continue;
                }
                step(matcher.clone(), dir.join(&name), level + 1, tx.clone());
            }
            Ok(None) => break,
            Err(err) => {
                let _ = tx.send(WalkEvent::Error(err.into()));
                break;
            }
        }
    }
}

fn step_unconstrained(path: Utf8PathBuf, tx: UnboundedSender<WalkEvent>) {
    tokio::spawn(async move {
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(err) => {
                let _ = tx.send(WalkEvent::Error(err.into()));
                return;
            }
        };

        if meta.is_dir() {
            let mut entries = match fs::read_dir(&path).await {
                Ok(entries) => entries,
                Err(err) => {
                    let _ = tx.send(WalkEvent::Error(err.into()));
                    return;
                }
            };
            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        if let Some(name) = entry.file_name().to_str() {
                            step_unconstrained(path.join(name), tx.clone());
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        let _ = tx.send(WalkEvent::Error(err.into()));
                        break;
                    }
                }
            }
        } else {
            let _ = tx.send(WalkEvent::File(FileInfo::from_metadata(path, &meta)));
        }
    });
}
