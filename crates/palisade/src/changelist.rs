//! The pending-change journal
//!
//! An ordered, durable record of mutations that have been requested but
//! not yet published. One JSON file per change, named by a zero-padded
//! sequence number so insertion order is the lexicographic file order.
//! `add` does not return until the change and the directory entry are
//! synced, so an acknowledged change survives a crash.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use palisade_types::{base64_bytes, RoleName};

use crate::error::{Error, Result};

/// Journal file extension
const CHANGE_EXT: &str = "change";

/// Width of the zero-padded sequence number
const SEQ_WIDTH: usize = 20;

/// The change type for target mutations
pub const TYPE_TARGET: &str = "target";

/// What a change does to its path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Add a new entry
    Create,
    /// Replace an existing entry
    Update,
    /// Remove an entry
    Delete,
}

/// One journaled mutation against a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// What the change does
    pub action: Action,
    /// The role the change applies to
    #[serde(rename = "role")]
    pub scope: RoleName,
    /// What kind of entry is changed (e.g. [`TYPE_TARGET`])
    #[serde(rename = "type")]
    pub kind: String,
    /// The entry's path within the role
    pub path: String,
    /// Opaque serialized content (target file metadata for targets)
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

impl Change {
    /// Build a change record
    pub fn new(
        action: Action,
        scope: RoleName,
        kind: impl Into<String>,
        path: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Change {
            action,
            scope,
            kind: kind.into(),
            path: path.into(),
            content,
        }
    }
}

/// Directory-backed change journal
pub struct FileChangelist {
    dir: PathBuf,
    next_seq: u64,
}

impl FileChangelist {
    /// Open (creating if needed) the journal at a directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut next_seq = 0;
        for path in change_files(&dir)? {
            let seq = parse_seq(&path)?;
            next_seq = next_seq.max(seq + 1);
        }
        Ok(FileChangelist { dir, next_seq })
    }

    /// Append a change; durable before return
    pub fn add(&mut self, change: &Change) -> Result<()> {
        let body = serde_json::to_vec_pretty(change)
            .map_err(|e| Error::ChangelistCorrupt(e.to_string()))?;

        let name = format!("{:0width$}.{CHANGE_EXT}", self.next_seq, width = SEQ_WIDTH);
        let tmp_path = self.dir.join(format!(".{name}.tmp"));
        let final_path = self.dir.join(&name);

        let mut file = File::create(&tmp_path)?;
        file.write_all(&body)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, &final_path)?;
        // The rename itself must be on disk before acknowledging.
        File::open(&self.dir)?.sync_all()?;

        self.next_seq += 1;
        Ok(())
    }

    /// Iterate changes in insertion order
    ///
    /// Reading is lazy (one file per step) and restartable: each call
    /// starts a fresh pass over the journal.
    pub fn iter(&self) -> Result<ChangeIter> {
        Ok(ChangeIter {
            paths: change_files(&self.dir)?.into_iter(),
        })
    }

    /// Number of pending changes
    pub fn len(&self) -> Result<usize> {
        Ok(change_files(&self.dir)?.len())
    }

    /// Whether the journal has no pending changes
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every entry
    ///
    /// Only publish calls this, after a fully successful upload.
    pub fn clear(&mut self) -> Result<()> {
        for path in change_files(&self.dir)? {
            fs::remove_file(&path)?;
        }
        File::open(&self.dir)?.sync_all()?;
        self.next_seq = 0;
        Ok(())
    }

    /// Release the journal handle
    pub fn close(self) {}
}

/// Lazy reader over journal entries
pub struct ChangeIter {
    paths: std::vec::IntoIter<PathBuf>,
}

impl Iterator for ChangeIter {
    type Item = Result<Change>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        Some(read_change(&path))
    }
}

fn read_change(path: &Path) -> Result<Change> {
    let raw = fs::read(path)?;
    serde_json::from_slice(&raw).map_err(|e| {
        Error::ChangelistCorrupt(format!("{}: {e}", path.display()))
    })
}

/// Sorted list of journal entries in a directory
fn change_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(CHANGE_EXT) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Parse the sequence number out of a journal filename
fn parse_seq(path: &Path) -> Result<u64> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            Error::ChangelistCorrupt(format!("bad journal entry name: {}", path.display()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn target_change(path: &str) -> Change {
        Change::new(
            Action::Create,
            RoleName::Targets,
            TYPE_TARGET,
            path,
            br#"{"length":6,"hashes":{}}"#.to_vec(),
        )
    }

    #[test]
    fn test_add_iter_order() {
        let dir = TempDir::new().unwrap();
        let mut cl = FileChangelist::open(dir.path()).unwrap();
        for name in ["a", "b", "c"] {
            cl.add(&target_change(name)).unwrap();
        }

        let paths: Vec<String> = cl
            .iter()
            .unwrap()
            .map(|c| c.unwrap().path)
            .collect();
        assert_eq!(paths, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_order_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut cl = FileChangelist::open(dir.path()).unwrap();
            cl.add(&target_change("first")).unwrap();
        }
        {
            let mut cl = FileChangelist::open(dir.path()).unwrap();
            cl.add(&target_change("second")).unwrap();
        }

        let cl = FileChangelist::open(dir.path()).unwrap();
        let paths: Vec<String> = cl.iter().unwrap().map(|c| c.unwrap().path).collect();
        assert_eq!(paths, vec!["first", "second"]);
    }

    #[test]
    fn test_iter_is_restartable() {
        let dir = TempDir::new().unwrap();
        let mut cl = FileChangelist::open(dir.path()).unwrap();
        cl.add(&target_change("x")).unwrap();

        assert_eq!(cl.iter().unwrap().count(), 1);
        assert_eq!(cl.iter().unwrap().count(), 1);
    }

    #[test]
    fn test_clear_empties_journal() {
        let dir = TempDir::new().unwrap();
        let mut cl = FileChangelist::open(dir.path()).unwrap();
        cl.add(&target_change("x")).unwrap();
        cl.add(&target_change("y")).unwrap();
        assert_eq!(cl.len().unwrap(), 2);

        cl.clear().unwrap();
        assert!(cl.is_empty().unwrap());
        assert_eq!(cl.iter().unwrap().count(), 0);
    }

    #[test]
    fn test_corrupt_entry_surfaces_on_read() {
        let dir = TempDir::new().unwrap();
        let mut cl = FileChangelist::open(dir.path()).unwrap();
        cl.add(&target_change("x")).unwrap();

        fs::write(
            dir.path().join(format!("{:020}.change", 1)),
            b"not json at all",
        )
        .unwrap();

        let cl = FileChangelist::open(dir.path()).unwrap();
        let results: Vec<Result<Change>> = cl.iter().unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::ChangelistCorrupt(_))));
    }

    #[test]
    fn test_bad_entry_name_fails_open() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("not-a-number.change"), b"{}").unwrap();
        assert!(matches!(
            FileChangelist::open(dir.path()),
            Err(Error::ChangelistCorrupt(_))
        ));
    }

    #[test]
    fn test_change_roundtrip() {
        let change = target_change("app/v1");
        let json = serde_json::to_string(&change).unwrap();
        let back: Change = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
    }
}
