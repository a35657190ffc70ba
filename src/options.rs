// options.rs
use camino::Utf8PathBuf;
use std::time::Duration;

/// Effective options for one watch
///
/// Resolved once per watch by [`WatchOptions::effective`] with a 3-level
/// shallow merge: built-in defaults, then the global patch from
/// [`Settings::options`], then the per-watch patch.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchOptions {
    /// Interval between re-stats of the tracked file
    pub file_check_interval: Duration,

    /// Interval between full re-walks of the pattern
    pub file_list_interval: Duration,

    /// Bare-name ignore glob, pruning whole subtrees (e.g. `(node_modules|.git)`)
    pub ignore_pattern: Option<String>,

    /// Encoding label for tail decoding (WHATWG label, e.g. `utf8`, `shift_jis`)
    pub encoding: String,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            file_check_interval: Duration::from_millis(500),
            file_list_interval: Duration::from_millis(2000),
            ignore_pattern: Some("(node_modules|.git)".to_string()),
            encoding: "utf8".to_string(),
        }
    }
}

impl WatchOptions {
    /// Applies defaults < global patch < per-watch patch, shallow per field.
    pub fn effective(global: &WatchOptionsPatch, local: Option<&WatchOptionsPatch>) -> Self {
        let mut opts = Self::default();
        opts.apply(global);
        if let Some(local) = local {
            opts.apply(local);
        }
        opts
    }

    fn apply(&mut self, patch: &WatchOptionsPatch) {
        if let Some(v) = patch.file_check_interval {
            self.file_check_interval = v;
        }
        if let Some(v) = patch.file_list_interval {
            self.file_list_interval = v;
        }
        if let Some(v) = &patch.ignore_pattern {
            // an explicitly empty pattern disables subtree pruning
            self.ignore_pattern = if v.is_empty() { None } else { Some(v.clone()) };
        }
        if let Some(v) = &patch.encoding {
            self.encoding = v.clone();
        }
    }
}

/// Partial override of [`WatchOptions`], absent fields inherit the lower level
#[derive(Clone, Debug, Default)]
pub struct WatchOptionsPatch {
    pub file_check_interval: Option<Duration>,
    pub file_list_interval: Option<Duration>,
    pub ignore_pattern: Option<String>,
    pub encoding: Option<String>,
}

/// Crate-level configuration for a [`Runtime`](crate::Runtime)
#[derive(Clone, Debug)]
pub struct Settings {
    /// Whether to delegate enumeration to an external file lister when one is found
    pub use_external_lister: bool,

    /// Explicit lister executable path, probed after the well-known locations
    pub external_lister_path: Option<Utf8PathBuf>,

    /// Root of the last-resort recursive scan for the lister executable
    pub lister_search_root: Option<Utf8PathBuf>,

    /// Treat `\` as a path separator in patterns (Windows installations only)
    pub allow_backslash_separator: bool,

    /// Tail chunk size in KiB; non-positive falls back to 64
    pub chunk_size_kb: u32,

    /// Global watch-option overrides, merged under per-watch patches
    pub options: WatchOptionsPatch,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_external_lister: false,
            external_lister_path: None,
            lister_search_root: None,
            allow_backslash_separator: false,
            chunk_size_kb: 64,
            options: WatchOptionsPatch::default(),
        }
    }
}

impl Settings {
    /// Tail chunk size in bytes, defaulting when unset or non-positive.
    pub fn chunk_size(&self) -> usize {
        let kb = if self.chunk_size_kb == 0 { 64 } else { self.chunk_size_kb };
        kb as usize * 1024
    }
}

/// Builder for Settings for fluent configuration
pub struct SettingsBuilder(Settings);

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsBuilder {
    /// Creates a new builder with default settings
    pub fn new() -> Self {
        Self(Settings::default())
    }

    /// Enables delegation to an external file lister when one is discovered
    pub fn use_external_lister(mut self, v: bool) -> Self {
        self.0.use_external_lister = v;
        self
    }

    /// Sets an explicit lister executable path
    pub fn external_lister_path(mut self, p: Utf8PathBuf) -> Self {
        self.0.external_lister_path = Some(p);
        self
    }

    /// Sets the root for the last-resort lister scan
    pub fn lister_search_root(mut self, p: Utf8PathBuf) -> Self {
        self.0.lister_search_root = Some(p);
        self
    }

    /// Allows `\` as a pattern path separator
    pub fn allow_backslash_separator(mut self, v: bool) -> Self {
        self.0.allow_backslash_separator = v;
        self
    }

    /// Sets the tail chunk size in KiB
    pub fn chunk_size_kb(mut self, kb: u32) -> Self {
        self.0.chunk_size_kb = kb;
        self
    }

    /// Sets the global watch-option overrides
    pub fn options(mut self, patch: WatchOptionsPatch) -> Self {
        self.0.options = patch;
        self
    }

    /// Builds the final Settings instance
    pub fn build(self) -> Settings {
        self.0
    }
}
