// tests/session.rs
use camino::Utf8PathBuf;
use globtail::{Runtime, SettingsBuilder, TailSnapshot, WatchOptionsPatch, WatchSession};
use std::fs;
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

fn fast_runtime() -> std::sync::Arc<Runtime> {
    Runtime::new(
        SettingsBuilder::new()
            .options(WatchOptionsPatch {
                file_check_interval: Some(Duration::from_millis(20)),
                file_list_interval: Some(Duration::from_millis(50)),
                ..Default::default()
            })
            .build(),
    )
}

async fn next_snapshot(session: &mut WatchSession) -> TailSnapshot {
    timeout(Duration::from_secs(5), session.recv())
        .await
        .expect("timed out waiting for a snapshot")
        .expect("session closed unexpectedly")
}

fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
}

#[tokio::test]
async fn first_snapshot_carries_the_full_tail() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    fs::write(root.join("app.log"), "first line\n").unwrap();

    let runtime = fast_runtime();
    let mut session = runtime
        .watch(&format!("{root}/*.log"), None, None)
        .await
        .unwrap();

    let snapshot = next_snapshot(&mut session).await;
    assert_eq!(snapshot.filename, Some(root.join("app.log")));
    assert_eq!(snapshot.text.as_deref(), Some("first line\n"));
}

#[tokio::test]
async fn growth_produces_a_new_snapshot() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    let file = root.join("app.log");
    fs::write(&file, "one\n").unwrap();

    let runtime = fast_runtime();
    let mut session = runtime
        .watch(&format!("{root}/*.log"), None, None)
        .await
        .unwrap();
    assert_eq!(
        next_snapshot(&mut session).await.text.as_deref(),
        Some("one\n")
    );

    let mut f = fs::OpenOptions::new().append(true).open(&file).unwrap();
    writeln!(f, "two").unwrap();
    drop(f);

    let snapshot = next_snapshot(&mut session).await;
    assert_eq!(snapshot.text.as_deref(), Some("one\ntwo\n"));
}

#[tokio::test]
async fn clear_pins_the_offset_and_restore_unpins_it() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    let file = root.join("app.log");
    fs::write(&file, "old content\n").unwrap();

    let runtime = fast_runtime();
    let mut session = runtime
        .watch(&format!("{root}/*.log"), None, None)
        .await
        .unwrap();
    assert_eq!(
        next_snapshot(&mut session).await.text.as_deref(),
        Some("old content\n")
    );

    session.clear().await.unwrap();
    let cleared = next_snapshot(&mut session).await;
    assert_eq!(cleared.text.as_deref(), Some(""));

    let mut f = fs::OpenOptions::new().append(true).open(&file).unwrap();
    write!(f, "fresh\n").unwrap();
    drop(f);

    // only growth past the pin shows up
    loop {
        let snapshot = next_snapshot(&mut session).await;
        if snapshot.text.as_deref() == Some("fresh\n") {
            break;
        }
    }

    session.restore().await.unwrap();
    let restored = next_snapshot(&mut session).await;
    assert_eq!(restored.text.as_deref(), Some("old content\nfresh\n"));
}

#[tokio::test]
async fn new_file_resets_the_offset() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    fs::write(root.join("a.log"), "from a\n").unwrap();

    let runtime = fast_runtime();
    let mut session = runtime
        .watch(&format!("{root}/*.log"), None, None)
        .await
        .unwrap();
    assert_eq!(
        next_snapshot(&mut session).await.filename,
        Some(root.join("a.log"))
    );
    session.clear().await.unwrap();
    assert_eq!(next_snapshot(&mut session).await.text.as_deref(), Some(""));

    // a newer file takes over; its whole tail must show despite the pin
    fs::write(root.join("b.log"), "from b\n").unwrap();
    let newer = std::time::SystemTime::now() + Duration::from_secs(60);
    let f = fs::OpenOptions::new()
        .write(true)
        .open(root.join("b.log"))
        .unwrap();
    f.set_modified(newer).unwrap();
    drop(f);

    loop {
        let snapshot = next_snapshot(&mut session).await;
        if snapshot.filename == Some(root.join("b.log")) {
            assert_eq!(snapshot.text.as_deref(), Some("from b\n"));
            break;
        }
    }
}

#[tokio::test]
async fn disappearance_clears_text_rather_than_showing_stale_data() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    let file = root.join("app.log");
    fs::write(&file, "here\n").unwrap();

    let runtime = fast_runtime();
    let mut session = runtime
        .watch(&format!("{root}/*.log"), None, None)
        .await
        .unwrap();
    assert!(next_snapshot(&mut session).await.text.is_some());

    fs::remove_file(&file).unwrap();

    loop {
        let snapshot = next_snapshot(&mut session).await;
        if snapshot.filename.is_none() {
            assert_eq!(snapshot.text, None);
            break;
        }
    }
    assert_eq!(session.last_file(), None);
}

#[tokio::test]
async fn per_watch_overrides_beat_runtime_options() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    fs::write(root.join("app.log"), "latin text: café\n").unwrap();

    let runtime = fast_runtime();
    let overrides = WatchOptionsPatch {
        encoding: Some("utf-8".into()),
        ..Default::default()
    };
    let mut session = runtime
        .watch(&format!("{root}/*.log"), Some(&overrides), None)
        .await
        .unwrap();
    let snapshot = next_snapshot(&mut session).await;
    assert_eq!(snapshot.text.as_deref(), Some("latin text: café\n"));
}

#[tokio::test]
async fn closed_session_emits_nothing() {
    let dir = TempDir::new().unwrap();
    let root = utf8(dir.path());
    fs::write(root.join("app.log"), "data\n").unwrap();

    let runtime = fast_runtime();
    let mut session = runtime
        .watch(&format!("{root}/*.log"), None, None)
        .await
        .unwrap();
    assert!(next_snapshot(&mut session).await.text.is_some());
    session.close();
}
