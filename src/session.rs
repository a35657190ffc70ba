// session.rs
use crate::error::Result;
use crate::options::WatchOptions;
use crate::runtime::Runtime;
use crate::tail::TextDecoder;
use crate::walk::Walker;
use crate::watch::GlobWatcher;
use camino::Utf8PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::SystemTime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// One observable state of a watch: the tracked file and its decoded tail
#[derive(Clone, Debug)]
pub struct TailSnapshot {
    /// Tracked file, `None` while no file matches the pattern
    pub filename: Option<Utf8PathBuf>,
    /// Decoded tail text, `None` while no file matches
    pub text: Option<String>,
    /// When filename or text last changed
    pub changed_at: SystemTime,
}

struct TailState {
    filename: Option<Utf8PathBuf>,
    offset: Option<u64>,
    text: Option<String>,
    changed_at: SystemTime,
}

struct SessionShared {
    runtime: Arc<Runtime>,
    decoder: Arc<StdMutex<TextDecoder>>,
    state: Mutex<TailState>,
    snapshots: UnboundedSender<TailSnapshot>,
}

/// One pattern+options subscription tracking the newest matching file
///
/// Owns a change detector, a decoder and the tail state; emits a
/// [`TailSnapshot`] whenever the tracked filename or the decoded tail text
/// changes. Dropping the session stops the watcher; nothing is emitted
/// afterwards.
pub struct WatchSession {
    shared: Arc<SessionShared>,
    watcher: GlobWatcher,
    pump: JoinHandle<()>,
    rx: UnboundedReceiver<TailSnapshot>,
}

impl WatchSession {
    pub(crate) async fn start(
        runtime: Arc<Runtime>,
        walker: Walker,
        pattern: &str,
        options: WatchOptions,
    ) -> Result<Self> {
        let decoder = runtime.decoder(&options.encoding);
        let (watcher, mut changes) = GlobWatcher::new(walker, pattern, options);
        watcher.start().await;

        let (snap_tx, snap_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SessionShared {
            runtime,
            decoder,
            state: Mutex::new(TailState {
                filename: None,
                offset: None,
                text: None,
                changed_at: SystemTime::now(),
            }),
            snapshots: snap_tx,
        });

        // without this the first snapshot would wait for the next change
        check_change(&shared, watcher.last_file()).await;

        let pump = tokio::spawn({
            let shared = shared.clone();
            async move {
                while let Some(change) = changes.recv().await {
                    check_change(&shared, change.filename).await;
                }
            }
        });

        Ok(Self {
            shared,
            watcher,
            pump,
            rx: snap_rx,
        })
    }

    /// Next snapshot; `None` after the session is closed
    pub async fn recv(&mut self) -> Option<TailSnapshot> {
        self.rx.recv().await
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> TailSnapshot {
        let state = self.shared.state.lock().await;
        TailSnapshot {
            filename: state.filename.clone(),
            text: state.text.clone(),
            changed_at: state.changed_at,
        }
    }

    /// Path of the currently tracked file, if any
    pub fn last_file(&self) -> Option<Utf8PathBuf> {
        self.watcher.last_file()
    }

    /// Marks the current content as seen: pins the read offset to the
    /// file's present size, so only growth past this point shows up
    pub async fn clear(&self) -> Result<()> {
        let filename = {
            let mut state = self.shared.state.lock().await;
            let Some(filename) = state.filename.clone() else {
                return Ok(());
            };
            let size = tokio::fs::metadata(&filename).await?.len();
            state.offset = Some(size);
            filename
        };
        check_change(&self.shared, Some(filename)).await;
        Ok(())
    }

    /// Drops the pinned offset and re-reads the whole tail window
    pub async fn restore(&self) -> Result<()> {
        let filename = {
            let mut state = self.shared.state.lock().await;
            let Some(filename) = state.filename.clone() else {
                return Ok(());
            };
            state.offset = None;
            filename
        };
        check_change(&self.shared, Some(filename)).await;
        Ok(())
    }

    /// Stops watching; idempotent with drop
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.watcher.dispose();
        self.pump.abort();
    }
}

/// Folds one watcher change into the tail state, emitting at most one
/// snapshot: an identity change resets the offset and forces a fresh full
/// tail read; a content comparison decides whether anything is emitted.
async fn check_change(shared: &SessionShared, filename: Option<Utf8PathBuf>) {
    let mut state = shared.state.lock().await;

    let mut changed = false;
    if state.filename != filename {
        state.filename = filename;
        state.offset = None;
        changed = true;
    }

    let text = match state.filename.clone() {
        Some(file) => {
            match shared
                .runtime
                .read_tail(&file, &shared.decoder, state.offset)
                .await
            {
                Ok(text) => Some(text),
                Err(err) => {
                    debug!("tail read of {} failed: {}", file, err);
                    None
                }
            }
        }
        None => None,
    };

    if state.text != text {
        state.text = text;
        state.changed_at = SystemTime::now();
        changed = true;
    }

    if changed {
        let _ = shared.snapshots.send(TailSnapshot {
            filename: state.filename.clone(),
            text: state.text.clone(),
            changed_at: state.changed_at,
        });
    }
}
