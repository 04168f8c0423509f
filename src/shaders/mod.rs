//! Effect source loading and hot-reload
//!
//! Effect definitions live in GLSL source files. This module provides the
//! source providers the pipeline synchronizer fetches from, plus a watcher
//! that reports when a source file changes on disk so effects can be
//! re-parsed without restarting.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use crate::effects::EffectSourceProvider;

/// The built-in impairment effect definitions
pub const BUILTIN_EFFECTS: &str = include_str!("effects.glsl");

/// File extensions treated as effect sources
pub const SOURCE_EXTENSIONS: &[&str] = &["glsl", "frag", "fs"];

/// Errors fetching effect source text
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("no source for effect `{0}`")]
    NotFound(String),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whether `path` has one of the effect source extensions
pub fn is_effect_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Load an effect source file from disk
pub fn load_effect_source(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Source providers
// ============================================================================

/// In-memory sources, keyed by effect name
#[derive(Debug, Clone, Default)]
pub struct StaticSourceProvider {
    sources: HashMap<String, String>,
    /// Returned for effects without their own entry
    fallback: Option<String>,
}

impl StaticSourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that serves `source` for every effect
    pub fn with_fallback(source: impl Into<String>) -> Self {
        Self {
            sources: HashMap::new(),
            fallback: Some(source.into()),
        }
    }

    /// Add a source for one effect
    pub fn with_source(mut self, effect: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(effect.into(), source.into());
        self
    }
}

impl EffectSourceProvider for StaticSourceProvider {
    async fn fetch_source(&self, effect: &str) -> Result<String, SourceError> {
        self.sources
            .get(effect)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| SourceError::NotFound(effect.to_string()))
    }
}

/// Reads `<dir>/<Effect>.<ext>`, falling back to a shared source file that
/// declares every effect
#[derive(Debug, Clone)]
pub struct FileSourceProvider {
    dir: PathBuf,
    extension: String,
    shared: Option<PathBuf>,
}

impl FileSourceProvider {
    /// Look up per-effect `.glsl` files in `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: "glsl".to_string(),
            shared: None,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Serve `path` for effects without their own file
    pub fn with_shared_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.shared = Some(path.into());
        self
    }

    /// Path of the per-effect file for `effect`
    pub fn effect_path(&self, effect: &str) -> PathBuf {
        self.dir.join(format!("{effect}.{}", self.extension))
    }

    async fn read(path: &Path) -> Result<String, SourceError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SourceError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl EffectSourceProvider for FileSourceProvider {
    async fn fetch_source(&self, effect: &str) -> Result<String, SourceError> {
        let path = self.effect_path(effect);
        match tokio::fs::read_to_string(&path).await {
            Ok(source) => Ok(source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => match &self.shared {
                Some(shared) => Self::read(shared).await,
                None => Err(SourceError::NotFound(effect.to_string())),
            },
            Err(source) => Err(SourceError::Io { path, source }),
        }
    }
}

// ============================================================================
// Effect Source Hot-Reload
// ============================================================================

/// Watches effect source files for changes and signals when reloading is
/// needed
pub struct ShaderWatcher {
    /// The file watcher (kept alive to maintain watch)
    _watcher: RecommendedWatcher,
    /// Receiver for file change events
    receiver: Receiver<Result<Event, notify::Error>>,
    /// Last time we detected a change (for debouncing)
    last_change: Option<Instant>,
    /// Debounce duration (ignore rapid successive changes)
    debounce_duration: Duration,
    /// Every source path that changed since the last report
    pending_paths: BTreeSet<PathBuf>,
}

impl ShaderWatcher {
    /// Watch the directory containing `path` (or `path` itself if it is a
    /// directory) for changes to effect source files
    pub fn new(path: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        let dir = if path.is_dir() {
            path
        } else {
            path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."))
        };
        log::info!("Effect source hot-reload enabled, watching: {}", dir.display());
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            last_change: None,
            debounce_duration: Duration::from_millis(100),
            pending_paths: BTreeSet::new(),
        })
    }

    /// Poll for source changes
    ///
    /// Returns every effect source that changed once enough time has passed
    /// since the last change (debouncing), in path order. Returns an empty
    /// list otherwise; unsettled changes stay pending for the next poll.
    pub fn poll(&mut self) -> Vec<PathBuf> {
        loop {
            match self.receiver.try_recv() {
                Ok(Ok(event)) => {
                    for path in event.paths {
                        if is_effect_source(&path) {
                            self.last_change = Some(Instant::now());
                            self.pending_paths.insert(path);
                        }
                    }
                }
                Ok(Err(e)) => {
                    log::warn!("Source watcher error: {:?}", e);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::error!("Source watcher channel disconnected");
                    break;
                }
            }
        }

        match self.last_change {
            Some(last) if last.elapsed() >= self.debounce_duration => {
                self.last_change = None;
                let changed: Vec<PathBuf> = std::mem::take(&mut self.pending_paths).into_iter().collect();
                for path in &changed {
                    log::info!("Effect source changed: {}", path.display());
                }
                changed
            }
            _ => Vec::new(),
        }
    }
}

/// Whether `changed` contains `file`, compared by file name since watcher
/// events may report a differently rooted path
pub fn includes_file(changed: &[PathBuf], file: &Path) -> bool {
    file.file_name()
        .is_some_and(|name| changed.iter().any(|p| p.file_name() == Some(name)))
}
