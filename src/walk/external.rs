// walk/external.rs
use crate::options::Settings;
use crate::pattern::ResolvedPattern;
use crate::walk::{tree, FileInfo, WalkEvent};
use camino::{Utf8Path, Utf8PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Executable name of the external file lister
pub const LISTER_BIN: &str = if cfg!(windows) { "rg.exe" } else { "rg" };

/// Walker delegating enumeration to an external fast file lister
///
/// The lister is asked for all files (no ignore files, hidden entries
/// included), optionally constrained by the pattern's glob tail and a
/// negated ignore glob. Its stdout is consumed incrementally as
/// newline-delimited relative paths; each is resolved against the base path
/// and stat'ed concurrently, so results stream to the caller as they
/// resolve. Completion is the subprocess exiting plus every pending stat
/// finishing.
pub struct ExternalWalker {
    lister: Utf8PathBuf,
    base_path: Utf8PathBuf,
    include_glob: Option<String>,
    exclude_glob: Option<String>,
}

impl ExternalWalker {
    pub fn new(
        lister: Utf8PathBuf,
        resolved: &ResolvedPattern,
        ignore_pattern: Option<&str>,
    ) -> Self {
        Self {
            lister,
            base_path: resolved.base_path.clone(),
            include_glob: resolved.glob.clone(),
            exclude_glob: ignore_pattern.map(str::to_owned),
        }
    }

    pub(crate) fn start(&self, tx: UnboundedSender<WalkEvent>) {
        let lister = self.lister.clone();
        let base = self.base_path.clone();
        let include = self.include_glob.clone();
        let exclude = self.exclude_glob.clone();

        tokio::spawn(async move {
            let mut cmd = Command::new(lister.as_std_path());
            cmd.arg("--files").arg("--no-ignore").arg("--hidden");
            if let Some(glob) = &include {
                cmd.arg("--glob").arg(glob);
            }
            if let Some(ignore) = &exclude {
                cmd.arg("--glob").arg(format!("!{}", ignore));
            }
            cmd.current_dir(base.as_std_path())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(err) => {
                    let _ = tx.send(WalkEvent::Error(err.into()));
                    return;
                }
            };

            // never fatal, but worth seeing when diagnosing the lister
            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(async move {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        debug!("lister stderr: {}", line.trim_end());
                    }
                });
            }

            if let Some(stdout) = child.stdout.take() {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if line.is_empty() {
                                continue;
                            }
                            let full_path = base.join(&line);
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                match fs::metadata(&full_path).await {
                                    Ok(meta) => {
                                        let _ = tx.send(WalkEvent::File(
                                            FileInfo::from_metadata(full_path, &meta),
                                        ));
                                    }
                                    Err(err) => {
                                        let _ = tx.send(WalkEvent::Error(err.into()));
                                    }
                                }
                            });
                        }
                        Ok(None) => break,
                        Err(err) => {
                            let _ = tx.send(WalkEvent::Error(err.into()));
                            break;
                        }
                    }
                }
            }

            match child.wait().await {
                Ok(status) => debug!("lister exited with {}", status),
                Err(err) => {
                    let _ = tx.send(WalkEvent::Error(err.into()));
                }
            }
        });
    }
}

/// One-time discovery probe for the external lister
///
/// Checked in order: well-known install locations, the configured override
/// path, and finally a recursive scan below the configured search root for
/// an OS-appropriate executable name. Returns `None` when nothing usable is
/// found, which pins the runtime to the tree walker.
pub async fn discover_lister(settings: &Settings) -> Option<Utf8PathBuf> {
    let mut candidates: Vec<Utf8PathBuf> = Vec::new();
    if let Some(home) = home_dir() {
        candidates.push(home.join(".cargo/bin").join(LISTER_BIN));
    }
    candidates.push(Utf8PathBuf::from("/usr/local/bin").join(LISTER_BIN));
    candidates.push(Utf8PathBuf::from("/usr/bin").join(LISTER_BIN));
    if let Some(configured) = &settings.external_lister_path {
        candidates.push(configured.clone());
    }

    for candidate in candidates {
        if is_file(&candidate).await {
            debug!("external lister found at {}", candidate);
            return Some(candidate);
        }
    }

    let root = settings.lister_search_root.clone()?;
    let mut handle = tree::walk_unconstrained(root);
    let mut found = None;
    while let Some(event) = handle.recv().await {
        if let WalkEvent::File(info) = event {
            if info.path.file_name() == Some(LISTER_BIN) {
                found = Some(info.path);
            }
        }
    }
    if let Some(path) = &found {
        debug!("external lister found by scan at {}", path);
    }
    found
}

async fn is_file(path: &Utf8Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

fn home_dir() -> Option<Utf8PathBuf> {
    dirs::home_dir().and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
}
