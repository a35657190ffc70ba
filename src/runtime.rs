// runtime.rs
use crate::error::Result;
use crate::options::{Settings, WatchOptions, WatchOptionsPatch};
use crate::pattern::cache::PatternCache;
use crate::pattern::matcher::PathMatcher;
use crate::pattern::{self, ResolvedPattern, SeparatorStyle};
use crate::session::WatchSession;
use crate::tail::{self, TailBuffer, TextDecoder};
use crate::walk::{self, ExternalWalker, TreeWalker, Walker, WalkerKind};
use camino::{Utf8Path, Utf8PathBuf};
use dashmap::DashMap;
use encoding_rs::Encoding;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Process-wide resources for watching and tailing
///
/// Everything that used to be an ambient global lives here with the
/// runtime's lifecycle: the compiled-pattern cache, the per-encoding decoder
/// registry, the one-time external-lister discovery result and the shared
/// tail read buffer. One runtime serves any number of concurrent watches;
/// dropping it releases everything.
pub struct Runtime {
    settings: Settings,
    patterns: PatternCache,
    decoders: DashMap<String, Arc<StdMutex<TextDecoder>>>,
    warned_encodings: DashMap<String, ()>,
    lister: OnceCell<Option<Utf8PathBuf>>,
    tail_buffer: Mutex<TailBuffer>,
}

impl Runtime {
    pub fn new(settings: Settings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            patterns: PatternCache::new(),
            decoders: DashMap::new(),
            warned_encodings: DashMap::new(),
            lister: OnceCell::new(),
            tail_buffer: Mutex::new(TailBuffer::new()),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Starts watching a pattern
    ///
    /// Options resolve by shallow merge: built-in defaults, then the
    /// runtime's global patch, then `overrides`. A relative pattern is
    /// anchored to `cwd` here, at the point of use.
    pub async fn watch(
        self: &Arc<Self>,
        pattern: &str,
        overrides: Option<&WatchOptionsPatch>,
        cwd: Option<&Utf8Path>,
    ) -> Result<WatchSession> {
        let options = WatchOptions::effective(&self.settings.options, overrides);
        let resolved = pattern::resolve_pattern(pattern, cwd, self.separator_style());
        let walker = self
            .build_walker(&resolved, options.ignore_pattern.as_deref())
            .await?;
        WatchSession::start(self.clone(), walker, pattern, options).await
    }

    pub(crate) fn separator_style(&self) -> SeparatorStyle {
        SeparatorStyle {
            backslash_is_separator: self.settings.allow_backslash_separator,
        }
    }

    pub(crate) async fn build_walker(
        &self,
        resolved: &ResolvedPattern,
        ignore_pattern: Option<&str>,
    ) -> Result<Walker> {
        let lister = if self.settings.use_external_lister {
            self.lister_path().await
        } else {
            None
        };

        match (
            walk::select_walker(self.settings.use_external_lister, lister.as_deref()),
            lister,
        ) {
            (WalkerKind::External, Some(lister)) => Ok(Walker::External(ExternalWalker::new(
                lister,
                resolved,
                ignore_pattern,
            ))),
            _ => {
                let matcher = PathMatcher::build(resolved, ignore_pattern, &self.patterns)?;
                Ok(Walker::Tree(TreeWalker::new(Arc::new(matcher))))
            }
        }
    }

    /// Runs the discovery probe at most once per runtime
    async fn lister_path(&self) -> Option<Utf8PathBuf> {
        if let Some(cached) = self.lister.get() {
            return cached.clone();
        }
        let found = walk::external::discover_lister(&self.settings).await;
        if found.is_none() {
            debug!("no external lister discovered, tree walker pinned for this runtime");
        }
        let _ = self.lister.set(found);
        self.lister.get().and_then(|cached| cached.clone())
    }

    /// Fetches the decoder for an encoding label, reset for a new owner
    ///
    /// Unsupported labels warn once per label and fall back to UTF-8 for the
    /// lifetime of the watch that asked.
    pub fn decoder(&self, label: &str) -> Arc<StdMutex<TextDecoder>> {
        let encoding = self.resolve_encoding(label);
        let entry = self
            .decoders
            .entry(encoding.name().to_string())
            .or_insert_with(|| Arc::new(StdMutex::new(TextDecoder::new(encoding))));
        let decoder = entry.value().clone();
        drop(entry);
        // the previous owner may have left partial multi-byte state behind
        decoder.lock().unwrap().reset();
        decoder
    }

    fn resolve_encoding(&self, label: &str) -> &'static Encoding {
        match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) => encoding,
            None => {
                if self
                    .warned_encodings
                    .insert(label.to_string(), ())
                    .is_none()
                {
                    warn!("unsupported encoding {:?}, falling back to utf-8", label);
                }
                encoding_rs::UTF_8
            }
        }
    }

    /// Reads the decoded tail of `file` past `offset` through the shared
    /// buffer
    pub async fn read_tail(
        &self,
        file: &Utf8Path,
        decoder: &StdMutex<TextDecoder>,
        offset: Option<u64>,
    ) -> Result<String> {
        tail::last_chunk(
            &self.tail_buffer,
            self.settings.chunk_size(),
            file,
            decoder,
            offset,
        )
        .await
    }
}
