// walk/mod.rs
pub mod external;
pub mod tree;

pub use external::ExternalWalker;
pub use tree::TreeWalker;

use crate::error::WatchError;
use async_stream::stream;
use camino::{Utf8Path, Utf8PathBuf};
use futures::Stream;
use std::fs::Metadata;
use std::time::SystemTime;
use tokio::sync::mpsc;

/// One enumerated filesystem entry
///
/// Ephemeral: produced by a walker, compared once by the change detector,
/// never retained across cycles.
#[derive(Clone, Debug)]
pub struct FileInfo {
    pub path: Utf8PathBuf,
    pub mtime: SystemTime,
    pub size: u64,
    pub is_directory: bool,
}

impl FileInfo {
    pub(crate) fn from_metadata(path: Utf8PathBuf, meta: &Metadata) -> Self {
        Self {
            path,
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: meta.len(),
            is_directory: meta.is_dir(),
        }
    }
}

/// Events streamed out of a walk
///
/// Errors are per-branch and never abort the walk; the failing branch is
/// abandoned and enumeration continues elsewhere.
#[derive(Debug)]
pub enum WalkEvent {
    File(FileInfo),
    Error(WatchError),
}

/// A walk in progress
///
/// Results stream as they resolve. The walk is complete when [`recv`]
/// returns `None`: every stat/readdir task holds a sender clone, and the
/// initial handle created before the first step guards against a walk with
/// zero matches finishing before it even started.
///
/// [`recv`]: WalkHandle::recv
pub struct WalkHandle {
    rx: mpsc::UnboundedReceiver<WalkEvent>,
}

impl WalkHandle {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<WalkEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Next walk event, `None` once the walk has fully settled
    pub async fn recv(&mut self) -> Option<WalkEvent> {
        self.rx.recv().await
    }

    /// The same events as a [`Stream`]
    pub fn into_stream(mut self) -> impl Stream<Item = WalkEvent> {
        stream! {
            while let Some(event) = self.rx.recv().await {
                yield event;
            }
        }
    }
}

/// The traversal strategy picked for a watch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkerKind {
    Tree,
    External,
}

/// Pure strategy selection from configuration and the discovery probe
///
/// The external lister needs both the opt-in flag and a discovered
/// executable; everything else walks in-process.
pub fn select_walker(use_external: bool, lister: Option<&Utf8Path>) -> WalkerKind {
    if use_external && lister.is_some() {
        WalkerKind::External
    } else {
        WalkerKind::Tree
    }
}

/// A ready-to-run walker for one watch
///
/// Both variants fulfill the same contract: for any pattern resolvable by
/// both, they enumerate the same set of absolute paths.
pub enum Walker {
    Tree(TreeWalker),
    External(ExternalWalker),
}

impl Walker {
    /// Starts one full enumeration
    pub fn walk(&self) -> WalkHandle {
        let (tx, handle) = WalkHandle::channel();
        match self {
            Walker::Tree(walker) => walker.start(tx),
            Walker::External(walker) => walker.start(tx),
        }
        handle
    }
}
