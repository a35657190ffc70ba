// tests/watcher.rs
use camino::Utf8PathBuf;
use globtail::pattern::cache::PatternCache;
use globtail::pattern::matcher::PathMatcher;
use globtail::walk::tree::TreeWalker;
use globtail::walk::Walker;
use globtail::{resolve_pattern, GlobChange, GlobWatcher, SeparatorStyle, WatchOptions};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

fn walker(pattern: &str) -> Walker {
    let resolved = resolve_pattern(pattern, None, SeparatorStyle::default());
    let matcher = PathMatcher::build(&resolved, None, &PatternCache::new()).unwrap();
    Walker::Tree(TreeWalker::new(Arc::new(matcher)))
}

fn fast_options() -> WatchOptions {
    WatchOptions {
        file_check_interval: Duration::from_millis(20),
        file_list_interval: Duration::from_millis(50),
        ignore_pattern: None,
        encoding: "utf8".into(),
    }
}

fn set_mtime(path: &Path, mtime: SystemTime) {
    let file = fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(mtime).unwrap();
}

async fn next_change(rx: &mut UnboundedReceiver<GlobChange>) -> GlobChange {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a change")
        .expect("watcher closed unexpectedly")
}

fn utf8(path: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

#[tokio::test]
async fn newest_file_wins_the_first_scan() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    fs::write(root.join("old.log"), "old").unwrap();
    fs::write(root.join("new.log"), "new").unwrap();
    let earlier = SystemTime::now() - Duration::from_secs(60);
    set_mtime(root.join("old.log").as_std_path(), earlier);

    let (watcher, mut rx) = GlobWatcher::new(
        walker(&format!("{root}/*.log")),
        "*.log",
        fast_options(),
    );
    watcher.start().await;

    assert_eq!(watcher.last_file(), Some(root.join("new.log")));
    let change = next_change(&mut rx).await;
    assert_eq!(change.filename, Some(root.join("new.log")));
    watcher.dispose();
}

#[tokio::test]
async fn newer_file_takes_over_tracking() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    fs::write(root.join("a.log"), "a").unwrap();

    let (watcher, mut rx) = GlobWatcher::new(
        walker(&format!("{root}/*.log")),
        "*.log",
        fast_options(),
    );
    watcher.start().await;
    assert_eq!(next_change(&mut rx).await.filename, Some(root.join("a.log")));

    fs::write(root.join("b.log"), "b").unwrap();
    set_mtime(
        root.join("b.log").as_std_path(),
        SystemTime::now() + Duration::from_secs(60),
    );

    loop {
        let change = next_change(&mut rx).await;
        if change.filename == Some(root.join("b.log")) {
            break;
        }
    }
    assert_eq!(watcher.last_file(), Some(root.join("b.log")));
    watcher.dispose();
}

#[tokio::test]
async fn content_change_keeps_the_filename() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    let file = root.join("app.log");
    fs::write(&file, "line 1\n").unwrap();

    let (watcher, mut rx) = GlobWatcher::new(
        walker(&format!("{root}/*.log")),
        "*.log",
        fast_options(),
    );
    watcher.start().await;
    assert_eq!(next_change(&mut rx).await.filename, Some(file.clone()));

    let mut f = fs::OpenOptions::new().append(true).open(&file).unwrap();
    use std::io::Write;
    writeln!(f, "line 2").unwrap();
    drop(f);

    let change = next_change(&mut rx).await;
    assert_eq!(change.filename, Some(file.clone()));
    assert_eq!(watcher.last_file(), Some(file));
    watcher.dispose();
}

#[tokio::test]
async fn disappearance_clears_the_tracked_file() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    let file = root.join("app.log");
    fs::write(&file, "data").unwrap();

    let (watcher, mut rx) = GlobWatcher::new(
        walker(&format!("{root}/*.log")),
        "*.log",
        fast_options(),
    );
    watcher.start().await;
    assert_eq!(next_change(&mut rx).await.filename, Some(file.clone()));

    fs::remove_file(&file).unwrap();

    loop {
        let change = next_change(&mut rx).await;
        if change.filename.is_none() {
            break;
        }
    }
    assert_eq!(watcher.last_file(), None);
    watcher.dispose();
}

#[tokio::test]
async fn exact_mtime_tie_never_flaps() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    fs::write(root.join("a.log"), "a").unwrap();
    fs::write(root.join("b.log"), "b").unwrap();
    let shared = SystemTime::now() - Duration::from_secs(30);
    set_mtime(root.join("a.log").as_std_path(), shared);
    set_mtime(root.join("b.log").as_std_path(), shared);

    let (watcher, mut rx) = GlobWatcher::new(
        walker(&format!("{root}/*.log")),
        "*.log",
        fast_options(),
    );
    watcher.start().await;

    let first = next_change(&mut rx).await.filename.unwrap();
    assert_eq!(watcher.last_file(), Some(first.clone()));

    // several list intervals: the incumbent must survive every re-scan
    let quiet = timeout(Duration::from_millis(400), rx.recv()).await;
    assert!(quiet.is_err(), "tie produced a spurious change: {quiet:?}");
    assert_eq!(watcher.last_file(), Some(first));
    watcher.dispose();
}

#[tokio::test]
async fn nothing_fires_after_dispose() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    fs::write(root.join("a.log"), "a").unwrap();

    let (watcher, mut rx) = GlobWatcher::new(
        walker(&format!("{root}/*.log")),
        "*.log",
        fast_options(),
    );
    watcher.start().await;
    assert!(next_change(&mut rx).await.filename.is_some());

    watcher.dispose();
    watcher.dispose(); // idempotent

    fs::write(root.join("b.log"), "much newer").unwrap();
    set_mtime(
        root.join("b.log").as_std_path(),
        SystemTime::now() + Duration::from_secs(60),
    );

    let quiet = timeout(Duration::from_millis(200), rx.recv()).await;
    match quiet {
        Err(_) => {}
        Ok(None) => {}
        Ok(Some(change)) => panic!("change after dispose: {change:?}"),
    }
}
