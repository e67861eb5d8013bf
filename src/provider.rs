//! Sources of flat path records: the GitHub REST API and local checkouts.

use jwalk::WalkDir;
use rayon::prelude::*;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::GithubConfig;
use crate::error::{RadialError, Result};
use crate::record::PathRecord;
use crate::request::RepoId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub protected: bool,
    pub commit_sha: String,
}

/// Remote repository metadata and contents.
pub trait RepositoryProvider: Send + Sync {
    fn default_branch_name(&self, repo: &RepoId) -> Result<String>;

    fn list_branches(&self, repo: &RepoId) -> Result<Vec<Branch>>;

    /// Every file and directory reachable from `tree_ref`, flat.
    fn tree_entries(&self, repo: &RepoId, tree_ref: &str) -> Result<Vec<PathRecord>>;
}

/// Default branch, then branch listing, then the recursive tree of the
/// default branch's head commit. Falls back to the branch name as tree
/// reference when the listing does not contain the default branch.
pub fn fetch_records(provider: &dyn RepositoryProvider, repo: &RepoId) -> Result<Vec<PathRecord>> {
    let default_branch = provider.default_branch_name(repo)?;
    let branches = provider.list_branches(repo)?;
    let tree_ref = resolve_tree_ref(&branches, &default_branch);
    debug!(%repo, %default_branch, %tree_ref, branches = branches.len(), "resolved tree reference");
    provider.tree_entries(repo, &tree_ref)
}

pub fn resolve_tree_ref(branches: &[Branch], default_branch: &str) -> String {
    match branches.iter().find(|b| b.name == default_branch) {
        Some(branch) => branch.commit_sha.clone(),
        None => {
            warn!(%default_branch, "default branch missing from listing, using its name");
            default_branch.to_string()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    name: String,
    #[serde(default)]
    protected: bool,
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    truncated: bool,
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sha: Option<String>,
}

impl TreeEntry {
    fn into_record(self) -> Option<PathRecord> {
        let record = match self.kind.as_str() {
            "blob" => PathRecord::blob(self.path),
            "tree" => PathRecord::tree(self.path),
            // submodule
            "commit" => PathRecord::blob(self.path),
            other => {
                debug!(path = %self.path, kind = other, "skipping tree entry");
                return None;
            }
        };
        let record = match self.sha {
            Some(sha) => record.with_hash(sha),
            None => record,
        };
        Some(match self.mode {
            Some(mode) => record.with_mode(mode),
            None => record,
        })
    }
}

/// Decode a `git/trees` response body. The flag reports a truncated listing.
pub fn decode_tree(body: &str) -> serde_json::Result<(Vec<PathRecord>, bool)> {
    let response: TreeResponse = serde_json::from_str(body)?;
    let records = response
        .tree
        .into_iter()
        .filter_map(TreeEntry::into_record)
        .collect();
    Ok((records, response.truncated))
}

pub fn decode_branches(body: &str) -> serde_json::Result<Vec<Branch>> {
    let branches: Vec<BranchResponse> = serde_json::from_str(body)?;
    Ok(branches
        .into_iter()
        .map(|b| Branch {
            name: b.name,
            protected: b.protected,
            commit_sha: b.commit.sha,
        })
        .collect())
}

pub fn decode_default_branch(body: &str) -> serde_json::Result<String> {
    let repo: RepoResponse = serde_json::from_str(body)?;
    Ok(repo.default_branch)
}

/// GitHub REST v3 over a blocking client.
pub struct GitHubProvider {
    client: Client,
    api_base: String,
    per_page: u32,
}

impl GitHubProvider {
    /// Reads the token from the configured environment variable, if set.
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::with_token(config, token)
    }

    pub fn with_token(config: &GithubConfig, token: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = token {
            match HeaderValue::from_str(&format!("Bearer {}", token.trim())) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!(env = %config.token_env, "ignoring token with invalid characters"),
            }
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|source| RadialError::Fetch {
                url: config.api_base.clone(),
                source,
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            per_page: config.per_page,
        })
    }

    fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|source| RadialError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RadialError::Api {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text().map_err(|source| RadialError::Fetch {
            url: url.to_string(),
            source,
        })?;
        debug!(url, bytes = body.len(), elapsed_ms = started.elapsed().as_millis() as u64, "GET ok");
        Ok(body)
    }

    fn decode<T, F>(url: &str, body: &str, decoder: F) -> Result<T>
    where
        F: FnOnce(&str) -> serde_json::Result<T>,
    {
        decoder(body).map_err(|source| RadialError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl RepositoryProvider for GitHubProvider {
    fn default_branch_name(&self, repo: &RepoId) -> Result<String> {
        let url = format!("{}/repos/{}/{}", self.api_base, repo.owner, repo.repo);
        let body = self.get_text(&url, &[])?;
        Self::decode(&url, &body, decode_default_branch)
    }

    fn list_branches(&self, repo: &RepoId) -> Result<Vec<Branch>> {
        let url = format!("{}/repos/{}/{}/branches", self.api_base, repo.owner, repo.repo);
        let body = self.get_text(&url, &[("per_page", self.per_page.to_string())])?;
        Self::decode(&url, &body, decode_branches)
    }

    fn tree_entries(&self, repo: &RepoId, tree_ref: &str) -> Result<Vec<PathRecord>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}",
            self.api_base, repo.owner, repo.repo, tree_ref
        );
        let body = self.get_text(&url, &[("recursive", "true".to_string())])?;
        let (records, truncated) = Self::decode(&url, &body, decode_tree)?;
        if truncated {
            warn!(%repo, entries = records.len(), "tree listing truncated by the API");
        }
        info!(%repo, entries = records.len(), "fetched repository tree");
        Ok(records)
    }
}

/// Walk a local checkout into path records, skipping `.git`.
pub fn scan_local(root: &Path) -> Result<Vec<PathRecord>> {
    if !root.is_dir() {
        return Err(RadialError::PathNotFound(root.to_path_buf()));
    }
    let started = Instant::now();

    let entries: Vec<_> = WalkDir::new(root)
        .sort(true)
        .skip_hidden(false)
        .process_read_dir(|_, _, _, children| {
            children.retain(|entry| {
                entry
                    .as_ref()
                    .map(|dir_entry| dir_entry.file_name() != ".git")
                    .unwrap_or(true)
            });
        })
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.depth > 0)
        .collect();

    let records: Vec<PathRecord> = entries
        .par_iter()
        .filter_map(|entry| {
            let path = entry.path();
            let relative = path.strip_prefix(root).ok()?;
            let joined = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let file_type = entry.file_type();
            let record = if file_type.is_dir() {
                PathRecord::tree(joined)
            } else {
                PathRecord::blob(joined)
            };
            Some(record.with_mode(local_mode(&path, file_type.is_dir(), file_type.is_symlink())))
        })
        .collect();

    info!(
        root = %root.display(),
        entries = records.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scanned local checkout"
    );
    Ok(records)
}

/// Git-style file mode for a local entry.
fn local_mode(path: &Path, is_dir: bool, is_symlink: bool) -> &'static str {
    if is_dir {
        return "040000";
    }
    if is_symlink {
        return "120000";
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            if metadata.permissions().mode() & 0o111 != 0 {
                return "100755";
            }
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    "100644"
}
