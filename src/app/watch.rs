use std::collections::BTreeSet;
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

/// Collects changed file names and hands them out once no new change has
/// arrived for `delay`.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: BTreeSet<String>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: BTreeSet::new(),
            last_event: None,
        }
    }

    pub fn note(&mut self, file_name: String, now: Instant) {
        self.pending.insert(file_name);
        self.last_event = Some(now);
    }

    pub fn take(&mut self, now: Instant) -> Vec<String> {
        match self.last_event {
            Some(last) if now.duration_since(last) >= self.delay => {
                self.last_event = None;
                std::mem::take(&mut self.pending).into_iter().collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Watches the shader asset folder for edited descriptions and sources.
pub struct AssetWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::Receiver<String>,
    debounce: Debouncer,
}

impl AssetWatcher {
    pub fn new(dir: &Path, delay: Duration) -> Option<Self> {
        let (tx, receiver) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res {
                if event.kind.is_modify() || event.kind.is_create() {
                    for path in event.paths {
                        if let Some(name) = path.file_name() {
                            let _ = tx.send(name.to_string_lossy().into_owned());
                        }
                    }
                }
            }
        })
        .ok()?;

        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            log::warn!("not watching {}: {e}", dir.display());
            return None;
        }
        log::info!("watching {} for shader changes", dir.display());
        Some(Self {
            _watcher: watcher,
            receiver,
            debounce: Debouncer::new(delay),
        })
    }

    /// File names whose changes have settled since the last call.
    pub fn settled(&mut self) -> Vec<String> {
        let now = Instant::now();
        while let Ok(name) = self.receiver.try_recv() {
            self.debounce.note(name, now);
        }
        self.debounce.take(now)
    }
}
