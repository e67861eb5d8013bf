use serde::{Deserialize, Serialize};

/// Kind of a repository entry as reported by the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
}

/// One flat entry of a repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecord {
    /// Slash-delimited path relative to the repository root.
    pub path: String,
    pub kind: EntryKind,
    pub content_hash: Option<String>,
    pub mode: Option<String>,
}

impl PathRecord {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
            content_hash: None,
            mode: None,
        }
    }

    pub fn tree(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Tree,
            content_hash: None,
            mode: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Non-empty path segments in order. Empty segments (`a//b`, leading or
    /// trailing slashes) are dropped.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|segment| !segment.is_empty())
    }

    /// A record is usable when it names at least one segment.
    pub fn is_well_formed(&self) -> bool {
        self.segments().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_skip_empty() {
        let record = PathRecord::blob("/src//utils/helper.ts/");
        let segments: Vec<_> = record.segments().collect();
        assert_eq!(segments, vec!["src", "utils", "helper.ts"]);
    }

    #[test]
    fn test_empty_path_is_malformed() {
        assert!(!PathRecord::blob("").is_well_formed());
        assert!(!PathRecord::tree("///").is_well_formed());
        assert!(PathRecord::blob("README.md").is_well_formed());
    }

    #[test]
    fn test_builder_fields() {
        let record = PathRecord::blob("a.sh").with_hash("abc123").with_mode("100755");
        assert_eq!(record.content_hash.as_deref(), Some("abc123"));
        assert_eq!(record.mode.as_deref(), Some("100755"));
        assert_eq!(record.kind, EntryKind::Blob);
    }
}
