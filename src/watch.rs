use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::Result;

const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Watches a local checkout and reports when it has settled after a change.
pub struct RepoWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    root: PathBuf,
    quiet_period: Duration,
    last_change: Option<Instant>,
}

impl RepoWatcher {
    pub fn new(root: &Path) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(sender)?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!(root = %root.display(), "watching for changes");
        Ok(Self {
            _watcher: watcher,
            receiver,
            root: root.to_path_buf(),
            quiet_period: DEFAULT_QUIET_PERIOD,
            last_change: None,
        })
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True once after a burst of relevant changes has gone quiet.
    pub fn poll_changed(&mut self) -> bool {
        while let Ok(event) = self.receiver.try_recv() {
            match event {
                Ok(event) if is_relevant(&event) => self.last_change = Some(Instant::now()),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "watch error"),
            }
        }
        match self.last_change {
            Some(at) if at.elapsed() >= self.quiet_period => {
                self.last_change = None;
                true
            }
            _ => false,
        }
    }
}

/// Structural changes outside `.git`.
pub fn is_relevant(event: &Event) -> bool {
    let structural = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_)
    );
    structural && event.paths.iter().any(|p| !inside_git_dir(p))
}

fn inside_git_dir(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == ".git"))
}
