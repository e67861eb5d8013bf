//! Repository identity and background fetching.
//!
//! Each submitted request gets a ticket. Results come back over a channel
//! from a worker thread and are only handed out when their ticket is still
//! the current one; anything older is dropped.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{RadialError, Result};
use crate::provider::{fetch_records, scan_local, RepositoryProvider};
use crate::record::PathRecord;

/// `<owner>/<repo>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl FromStr for RepoId {
    type Err = RadialError;

    /// Anything after a second `/` (e.g. a pasted `tree/main` suffix) is ignored.
    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let mut parts = trimmed.split('/').map(str::trim);
        match (parts.next(), parts.next()) {
            (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(RadialError::MalformedInput(trimmed.to_string())),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSource {
    GitHub(RepoId),
    Local(PathBuf),
}

impl fmt::Display for RepoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoSource::GitHub(id) => write!(f, "{id}"),
            RepoSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug)]
struct FetchOutcome {
    ticket: Ticket,
    source: RepoSource,
    result: Result<Vec<PathRecord>>,
}

/// A result that is still current when it arrives.
#[derive(Debug)]
pub struct Delivery {
    pub ticket: Ticket,
    pub source: RepoSource,
    pub result: Result<Vec<PathRecord>>,
}

pub struct FetchCoordinator {
    provider: Arc<dyn RepositoryProvider>,
    sender: Sender<FetchOutcome>,
    receiver: Receiver<FetchOutcome>,
    generation: u64,
    current: Option<(Ticket, RepoSource)>,
    worker: Option<JoinHandle<()>>,
}

impl FetchCoordinator {
    pub fn new(provider: Arc<dyn RepositoryProvider>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            provider,
            sender,
            receiver,
            generation: 0,
            current: None,
            worker: None,
        }
    }

    /// Parse `<owner>/<repo>` and fetch it. Malformed input starts nothing.
    pub fn submit_input(&mut self, input: &str) -> Result<Ticket> {
        let id: RepoId = input.parse()?;
        Ok(self.submit(RepoSource::GitHub(id)))
    }

    /// Start fetching `source`, superseding any request in flight.
    pub fn submit(&mut self, source: RepoSource) -> Ticket {
        self.generation += 1;
        let ticket = Ticket(self.generation);
        info!(%source, ?ticket, "fetch requested");

        let provider = Arc::clone(&self.provider);
        let sender = self.sender.clone();
        let worker_source = source.clone();
        let handle = thread::spawn(move || {
            let result = match &worker_source {
                RepoSource::GitHub(id) => fetch_records(provider.as_ref(), id),
                RepoSource::Local(path) => scan_local(path),
            };
            let _ = sender.send(FetchOutcome {
                ticket,
                source: worker_source,
                result,
            });
        });

        self.current = Some((ticket, source));
        self.worker = Some(handle);
        ticket
    }

    /// Re-fetch the most recently submitted source.
    pub fn reload(&mut self) -> Option<Ticket> {
        let source = self.current.as_ref().map(|(_, source)| source.clone())?;
        Some(self.submit(source))
    }

    pub fn current_source(&self) -> Option<&RepoSource> {
        self.current.as_ref().map(|(_, source)| source)
    }

    pub fn is_pending(&self) -> bool {
        self.worker.is_some()
    }

    /// Non-blocking: the current request's result if it has arrived.
    pub fn poll(&mut self) -> Option<Delivery> {
        let worker_done = self.worker.as_ref().map(|w| w.is_finished()).unwrap_or(false);
        while let Ok(outcome) = self.receiver.try_recv() {
            if let Some(delivery) = self.accept(outcome) {
                return Some(delivery);
            }
        }
        if worker_done {
            return self.worker_lost();
        }
        None
    }

    /// Block until the current request completes or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Option<Delivery> {
        let deadline = Instant::now() + timeout;
        while self.is_pending() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining.min(Duration::from_millis(50))) {
                Ok(outcome) => {
                    if let Some(delivery) = self.accept(outcome) {
                        return Some(delivery);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(delivery) = self.poll() {
                        return Some(delivery);
                    }
                    if Instant::now() >= deadline {
                        return None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return self.worker_lost(),
            }
        }
        None
    }

    fn accept(&mut self, outcome: FetchOutcome) -> Option<Delivery> {
        let is_current = matches!(
            &self.current,
            Some((ticket, source)) if *ticket == outcome.ticket && *source == outcome.source
        );
        if !is_current {
            warn!(source = %outcome.source, ticket = ?outcome.ticket, "dropping stale fetch result");
            return None;
        }
        self.worker = None;
        match &outcome.result {
            Ok(records) => debug!(source = %outcome.source, records = records.len(), "fetch complete"),
            Err(err) => warn!(source = %outcome.source, error = %err, "fetch failed"),
        }
        Some(Delivery {
            ticket: outcome.ticket,
            source: outcome.source,
            result: outcome.result,
        })
    }

    fn worker_lost(&mut self) -> Option<Delivery> {
        self.worker.take()?;
        let (ticket, source) = self.current.clone()?;
        warn!(%source, "fetch worker exited without a result");
        Some(Delivery {
            ticket,
            source,
            result: Err(RadialError::WorkerDisconnected),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Branch;
    use std::fs;
    use std::sync::Mutex;

    #[test]
    fn test_parse_repo_id() {
        let id: RepoId = " rust-lang/rust ".parse().unwrap();
        assert_eq!(id.owner, "rust-lang");
        assert_eq!(id.repo, "rust");
        assert_eq!(id.to_string(), "rust-lang/rust");

        let id: RepoId = "octo/hello/tree/main".parse().unwrap();
        assert_eq!(id.repo, "hello");
    }

    #[test]
    fn test_malformed_repo_id() {
        for input in ["", "noslash", "/repo", "owner/", "  /  "] {
            assert!(
                matches!(input.parse::<RepoId>(), Err(RadialError::MalformedInput(_))),
                "{input:?} should be rejected"
            );
        }
    }

    /// Serves a fixed tree, optionally blocking until released.
    struct GatedProvider {
        gate: Mutex<Option<Receiver<()>>>,
    }

    impl RepositoryProvider for GatedProvider {
        fn default_branch_name(&self, repo: &RepoId) -> Result<String> {
            if repo.repo == "slow" {
                if let Some(gate) = self.gate.lock().unwrap().take() {
                    let _ = gate.recv();
                }
            }
            if repo.repo == "missing" {
                return Err(RadialError::Api {
                    status: 404,
                    url: format!("/repos/{repo}"),
                });
            }
            Ok("main".into())
        }

        fn list_branches(&self, _repo: &RepoId) -> Result<Vec<Branch>> {
            Ok(vec![Branch {
                name: "main".into(),
                protected: false,
                commit_sha: "abc".into(),
            }])
        }

        fn tree_entries(&self, repo: &RepoId, _tree_ref: &str) -> Result<Vec<PathRecord>> {
            Ok(vec![PathRecord::blob(format!("{}.md", repo.repo))])
        }
    }

    fn coordinator(gate: Option<Receiver<()>>) -> FetchCoordinator {
        FetchCoordinator::new(Arc::new(GatedProvider {
            gate: Mutex::new(gate),
        }))
    }

    #[test]
    fn test_malformed_input_starts_nothing() {
        let mut fetcher = coordinator(None);
        assert!(fetcher.submit_input("nope").is_err());
        assert!(!fetcher.is_pending());
        assert!(fetcher.current_source().is_none());
    }

    #[test]
    fn test_fetch_delivers_records() {
        let mut fetcher = coordinator(None);
        let ticket = fetcher.submit_input("octo/hello").unwrap();
        let delivery = fetcher.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(delivery.ticket, ticket);
        let records = delivery.result.unwrap();
        assert_eq!(records[0].path, "hello.md");
        assert!(!fetcher.is_pending());
    }

    #[test]
    fn test_stale_result_is_dropped() {
        let (release, gate) = mpsc::channel();
        let mut fetcher = coordinator(Some(gate));

        let stale = fetcher.submit_input("octo/slow").unwrap();
        let fresh = fetcher.submit_input("octo/fast").unwrap();
        assert_ne!(stale, fresh);

        let delivery = fetcher.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(delivery.ticket, fresh);
        assert_eq!(delivery.result.unwrap()[0].path, "fast.md");

        release.send(()).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(fetcher.poll().is_none());
    }

    #[test]
    fn test_fetch_failure_is_delivered() {
        let mut fetcher = coordinator(None);
        fetcher.submit_input("octo/missing").unwrap();
        let delivery = fetcher.wait(Duration::from_secs(5)).unwrap();
        assert!(matches!(delivery.result, Err(RadialError::Api { status: 404, .. })));
    }

    #[test]
    fn test_local_source_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();

        let mut fetcher = coordinator(None);
        fetcher.submit(RepoSource::Local(dir.path().to_path_buf()));
        let first = fetcher.wait(Duration::from_secs(5)).unwrap().result.unwrap();
        assert_eq!(first.len(), 1);

        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fetcher.reload().unwrap();
        let second = fetcher.wait(Duration::from_secs(5)).unwrap().result.unwrap();
        assert_eq!(second.len(), 2);
    }
}
