// watch.rs
use crate::options::WatchOptions;
use crate::walk::{FileInfo, WalkEvent, Walker};
use camino::Utf8PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// A change in the watched pattern's resolution
///
/// `filename` carries the tracked path for content changes and for a newly
/// tracked file; `None` means no file matches anymore.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobChange {
    pub filename: Option<Utf8PathBuf>,
}

struct WatcherShared {
    walker: Walker,
    pattern: String,
    tracked: Mutex<Option<FileInfo>>,
    tx: UnboundedSender<GlobChange>,
    disposed: AtomicBool,
}

impl WatcherShared {
    fn emit(&self, change: GlobChange) {
        if !self.disposed.load(Ordering::SeqCst) {
            let _ = self.tx.send(change);
        }
    }
}

/// Polls a walker on two independent intervals to track the single newest
/// matching file
///
/// The fast timer re-stats the tracked file to catch content changes; the
/// slow timer re-walks the whole pattern to catch identity changes. The two
/// interleave freely. Lifecycle is idle until [`start`], polling until
/// [`dispose`], and disposal is terminal: timers stop, no further events are
/// emitted, and anything still in flight is discarded rather than cancelled.
///
/// [`start`]: GlobWatcher::start
/// [`dispose`]: GlobWatcher::dispose
pub struct GlobWatcher {
    shared: Arc<WatcherShared>,
    options: WatchOptions,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl GlobWatcher {
    pub fn new(
        walker: Walker,
        pattern: impl Into<String>,
        options: WatchOptions,
    ) -> (Self, UnboundedReceiver<GlobChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = Self {
            shared: Arc::new(WatcherShared {
                walker,
                pattern: pattern.into(),
                tracked: Mutex::new(None),
                tx,
                disposed: AtomicBool::new(false),
            }),
            options,
            timers: Mutex::new(Vec::new()),
        };
        (watcher, rx)
    }

    /// Runs one immediate fast check and one immediate slow scan, then arms
    /// both timers
    ///
    /// The first scan is awaited, so [`last_file`](GlobWatcher::last_file)
    /// reflects the current resolution when this returns.
    pub async fn start(&self) {
        fast_check(&self.shared).await;
        slow_scan(&self.shared).await;

        let mut timers = self.timers.lock().unwrap();
        if self.shared.disposed.load(Ordering::SeqCst) {
            return;
        }
        timers.push(arm(
            self.shared.clone(),
            self.options.file_check_interval,
            |shared| async move { fast_check(&shared).await },
        ));
        timers.push(arm(
            self.shared.clone(),
            self.options.file_list_interval,
            |shared| async move { slow_scan(&shared).await },
        ));
    }

    /// Path of the currently tracked file, if any
    pub fn last_file(&self) -> Option<Utf8PathBuf> {
        self.shared
            .tracked
            .lock()
            .unwrap()
            .as_ref()
            .map(|info| info.path.clone())
    }

    /// Stops both timers; idempotent, and nothing is emitted afterwards
    pub fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::SeqCst);
        let mut timers = self.timers.lock().unwrap();
        for timer in timers.drain(..) {
            timer.abort();
        }
    }
}

impl Drop for GlobWatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Re-arms after each tick completes, so a slow pass never overlaps itself
fn arm<F, Fut>(shared: Arc<WatcherShared>, period: Duration, tick: F) -> JoinHandle<()>
where
    F: Fn(Arc<WatcherShared>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            if shared.disposed.load(Ordering::SeqCst) {
                break;
            }
            tick(shared.clone()).await;
        }
    })
}

/// Re-stats the tracked file; emits a content change when mtime or size
/// moved, a cleared change when the file disappeared.
async fn fast_check(shared: &WatcherShared) {
    let previous = shared.tracked.lock().unwrap().clone();
    let Some(previous) = previous else {
        return;
    };

    match fs::metadata(&previous.path).await {
        Ok(meta) => {
            let mtime = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            if mtime != previous.mtime || meta.len() != previous.size {
                {
                    let mut tracked = shared.tracked.lock().unwrap();
                    if let Some(current) = tracked.as_mut() {
                        if current.path == previous.path {
                            current.mtime = mtime;
                            current.size = meta.len();
                        }
                    }
                }
                shared.emit(GlobChange {
                    filename: Some(previous.path),
                });
            }
        }
        Err(err) => {
            error!("stat of tracked file {} failed: {}", previous.path, err);
            *shared.tracked.lock().unwrap() = None;
            shared.emit(GlobChange { filename: None });
        }
    }
}

/// Strictly newer wins; the first file discovered keeps an exact mtime tie,
/// except that the currently tracked file always keeps a tie against rivals
/// so concurrent discovery order cannot flap the tracked identity between
/// scans.
fn newer(best: &Option<FileInfo>, candidate: &FileInfo, incumbent: Option<&Utf8PathBuf>) -> bool {
    match best {
        None => true,
        Some(best) => {
            candidate.mtime > best.mtime
                || (candidate.mtime == best.mtime && Some(&candidate.path) == incumbent)
        }
    }
}

/// Re-walks the pattern and retargets the tracked file when the newest
/// match changed identity.
async fn slow_scan(shared: &WatcherShared) {
    let started = Instant::now();
    let incumbent = shared
        .tracked
        .lock()
        .unwrap()
        .as_ref()
        .map(|info| info.path.clone());
    let mut handle = shared.walker.walk();
    let mut best: Option<FileInfo> = None;

    while let Some(event) = handle.recv().await {
        match event {
            WalkEvent::File(info) => {
                if newer(&best, &info, incumbent.as_ref()) {
                    best = Some(info);
                }
            }
            WalkEvent::Error(err) => debug!("walk error for {}: {}", shared.pattern, err),
        }
    }
    debug!(pattern = %shared.pattern, elapsed = ?started.elapsed(), "pattern walk finished");

    let change = {
        let mut tracked = shared.tracked.lock().unwrap();
        let unchanged = match (&best, tracked.as_ref()) {
            (Some(found), Some(current)) => found.path == current.path,
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            None
        } else {
            let filename = best.as_ref().map(|info| info.path.clone());
            *tracked = best;
            Some(GlobChange { filename })
        }
    };

    if let Some(change) = change {
        shared.emit(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn info(path: &str, mtime: SystemTime) -> FileInfo {
        FileInfo {
            path: Utf8PathBuf::from(path),
            mtime,
            size: 0,
            is_directory: false,
        }
    }

    #[test]
    fn first_discovered_keeps_an_exact_tie() {
        let now = SystemTime::now();
        let mut best = None;
        for candidate in [info("/a", now), info("/b", now)] {
            if newer(&best, &candidate, None) {
                best = Some(candidate);
            }
        }
        assert_eq!(best.unwrap().path, "/a");
    }

    #[test]
    fn strictly_newer_replaces() {
        let earlier = SystemTime::UNIX_EPOCH;
        let later = SystemTime::now();
        let mut best = Some(info("/a", earlier));
        let candidate = info("/b", later);
        assert!(newer(&best, &candidate, None));
        best = Some(candidate);
        assert_eq!(best.unwrap().path, "/b");
    }

    #[test]
    fn incumbent_keeps_a_tie_regardless_of_order() {
        let now = SystemTime::now();
        let incumbent = Utf8PathBuf::from("/b");
        let mut best = None;
        for candidate in [info("/a", now), info("/b", now)] {
            if newer(&best, &candidate, Some(&incumbent)) {
                best = Some(candidate);
            }
        }
        assert_eq!(best.unwrap().path, "/b");
    }
}
