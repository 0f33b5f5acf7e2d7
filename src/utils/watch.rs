//! Watch mode: rebuild the snapshot when source files change

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::Result;
use crate::fs::{has_extension, has_ignored_segment};

/// Watch event for file changes
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Modified(PathBuf),
    Created(PathBuf),
    Deleted(PathBuf),
    Error(String),
}

impl WatchEvent {
    pub fn path(&self) -> Option<&Path> {
        match self {
            WatchEvent::Modified(p) | WatchEvent::Created(p) | WatchEvent::Deleted(p) => {
                Some(p.as_path())
            }
            WatchEvent::Error(_) => None,
        }
    }
}

/// Recursive watcher over a repository root
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<WatchEvent>,
}

impl FileWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        let (tx, rx) = unbounded();

        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    for path in event.paths {
                        let watch_event = match event.kind {
                            notify::EventKind::Modify(_) => WatchEvent::Modified(path),
                            notify::EventKind::Create(_) => WatchEvent::Created(path),
                            notify::EventKind::Remove(_) => WatchEvent::Deleted(path),
                            _ => continue,
                        };
                        let _ = tx.send(watch_event);
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            },
            Config::default(),
        )?;

        watcher.watch(path, RecursiveMode::Recursive)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Next event, waiting at most `timeout`
    pub fn next_event(&self, timeout: Duration) -> Option<WatchEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// All queued events, without blocking
    pub fn pending_events(&self) -> Vec<WatchEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Drops repeat events for the same path within `delay`
pub struct Debouncer {
    last_events: HashMap<PathBuf, Instant>,
    delay: Duration,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            last_events: HashMap::new(),
            delay,
        }
    }

    pub fn should_process(&mut self, path: &Path) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_events.get(path)
            && now.duration_since(*last) < self.delay
        {
            return false;
        }
        self.last_events.insert(path.to_path_buf(), now);
        true
    }

    /// Forget entries older than ten delays
    pub fn cleanup(&mut self) {
        let now = Instant::now();
        self.last_events
            .retain(|_, last| now.duration_since(*last) < self.delay * 10);
    }
}

/// True when a change to `path` can alter the index: an eligible extension,
/// outside every ignored directory below `root`.
pub fn is_relevant_change(
    path: &Path,
    root: &Path,
    extensions: &[String],
    ignore_dirs: &[String],
) -> bool {
    has_extension(path, extensions) && !has_ignored_segment(path, root, ignore_dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TidemarkConfig;

    #[test]
    fn test_debouncer() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let path = Path::new("app/models.py");

        assert!(debouncer.should_process(path));
        assert!(!debouncer.should_process(path));
        assert!(debouncer.should_process(Path::new("app/views.py")));

        std::thread::sleep(Duration::from_millis(150));
        assert!(debouncer.should_process(path));
    }

    #[test]
    fn test_relevant_change() {
        let root = Path::new("/repo");
        let extensions = vec!["py".to_string()];
        let ignore_dirs = vec!["__pycache__".to_string(), ".git".to_string()];

        assert!(is_relevant_change(
            Path::new("/repo/app/models.py"),
            root,
            &extensions,
            &ignore_dirs
        ));
        assert!(!is_relevant_change(
            Path::new("/repo/README.md"),
            root,
            &extensions,
            &ignore_dirs
        ));
        assert!(!is_relevant_change(
            Path::new("/repo/app/__pycache__/models.py"),
            root,
            &extensions,
            &ignore_dirs
        ));
        assert!(!is_relevant_change(
            Path::new("/repo/.git/hooks/pre-commit.py"),
            root,
            &extensions,
            &ignore_dirs
        ));
    }

    #[test]
    fn test_ignored_name_above_root_still_relevant() {
        let defaults = TidemarkConfig::default();
        let root = Path::new("/home/u/env/project");

        assert!(is_relevant_change(
            Path::new("/home/u/env/project/app.py"),
            root,
            &defaults.extensions,
            &defaults.ignore_dirs
        ));
        assert!(is_relevant_change(
            Path::new("/srv/vendor/repo/pkg/mod.py"),
            Path::new("/srv/vendor/repo"),
            &defaults.extensions,
            &defaults.ignore_dirs
        ));
        assert!(!is_relevant_change(
            Path::new("/home/u/env/project/env/lib/site.py"),
            root,
            &defaults.extensions,
            &defaults.ignore_dirs
        ));
    }

    #[test]
    fn test_event_path() {
        let event = WatchEvent::Created(PathBuf::from("a.py"));
        assert_eq!(event.path(), Some(Path::new("a.py")));
        assert!(WatchEvent::Error("boom".into()).path().is_none());
    }
}
