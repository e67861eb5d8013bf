use clap::Parser;
use std::path::PathBuf;

use crate::error::Result;
use crate::request::{RepoId, RepoSource};

/// Arguments shared by the GUI and terminal front ends.
#[derive(Parser, Debug, Clone)]
#[command(about = "Explore a repository's file tree as a radial diagram")]
#[command(version)]
pub struct Cli {
    /// GitHub repository as <owner>/<repo>
    pub repo: Option<String>,

    /// Visualise a local checkout instead of a GitHub repository
    #[arg(short, long, conflicts_with = "repo")]
    pub local: Option<PathBuf>,

    /// Rebuild the diagram when the local checkout changes
    #[arg(short, long, requires = "local")]
    pub watch: bool,

    /// Configuration file (defaults to ./reporadial.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// The source to fetch on startup, if one was given.
    pub fn initial_source(&self) -> Result<Option<RepoSource>> {
        if let Some(path) = &self.local {
            return Ok(Some(RepoSource::Local(path.clone())));
        }
        match &self.repo {
            Some(input) => Ok(Some(RepoSource::GitHub(input.parse::<RepoId>()?))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_argument() {
        let cli = Cli::try_parse_from(["reporadial", "octo/hello"]).unwrap();
        let source = cli.initial_source().unwrap().unwrap();
        assert_eq!(
            source,
            RepoSource::GitHub(RepoId {
                owner: "octo".into(),
                repo: "hello".into()
            })
        );
    }

    #[test]
    fn test_local_with_watch() {
        let cli = Cli::try_parse_from(["reporadial", "--local", "/tmp/x", "--watch"]).unwrap();
        assert!(cli.watch);
        assert_eq!(
            cli.initial_source().unwrap(),
            Some(RepoSource::Local(PathBuf::from("/tmp/x")))
        );
    }

    #[test]
    fn test_watch_requires_local() {
        assert!(Cli::try_parse_from(["reporadial", "octo/hello", "--watch"]).is_err());
    }

    #[test]
    fn test_no_source() {
        let cli = Cli::try_parse_from(["reporadial"]).unwrap();
        assert!(cli.initial_source().unwrap().is_none());
        let bad = Cli::try_parse_from(["reporadial", "noslash"]).unwrap();
        assert!(bad.initial_source().is_err());
    }
}
