// lib.rs
#![forbid(unsafe_code)]

//! Track the newest file matching a glob pattern and stream its decoded
//! tail as it grows.
//!
//! A [`Runtime`] owns the process-wide resources (compiled-pattern cache,
//! decoder registry, external-lister probe, shared read buffer); each call
//! to [`Runtime::watch`] starts one independent [`WatchSession`] that polls
//! the pattern on two intervals — a fast re-stat of the tracked file and a
//! slow re-walk of the whole pattern — and emits a [`TailSnapshot`]
//! whenever the tracked filename or its decoded tail text changes.
//!
//! ```no_run
//! use globtail::{Runtime, Settings};
//!
//! # async fn demo() -> globtail::Result<()> {
//! let runtime = Runtime::new(Settings::default());
//! let mut session = runtime.watch("/var/log/app/**/*.log", None, None).await?;
//! while let Some(snapshot) = session.recv().await {
//!     match (&snapshot.filename, &snapshot.text) {
//!         (Some(file), Some(text)) => println!("{file}:\n{text}"),
//!         _ => println!("no matching file"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod options;
pub mod pattern;
pub mod runtime;
pub mod session;
pub mod tail;
pub mod walk;
pub mod watch;

pub use crate::error::{Result, WatchError};
pub use crate::options::{Settings, SettingsBuilder, WatchOptions, WatchOptionsPatch};
pub use crate::pattern::{
    parse_pattern, resolve_pattern, ParsedPattern, ResolvedPattern, SeparatorStyle,
};
pub use crate::runtime::Runtime;
pub use crate::session::{TailSnapshot, WatchSession};
pub use crate::watch::{GlobChange, GlobWatcher};
