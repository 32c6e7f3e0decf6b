// src/watch/hash.rs

//! Content hashing for `use_hash` watch rules.
//!
//! Editors often touch or rewrite a file without changing it. For rules with
//! `use_hash = true` the watcher only fires when the blake3 hash of the file
//! differs from the last one seen. Hashes live in memory for the lifetime of
//! the dev run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use blake3::Hash;
use tracing::debug;

use crate::fs::FileSystem;
use crate::patterns::collect_matching_files;
use crate::watch::patterns::WatchRule;

/// Hash a byte slice.
pub fn content_hash(bytes: &[u8]) -> Hash {
    blake3::hash(bytes)
}

/// Remembers the last content hash of every file seen by a `use_hash` rule.
#[derive(Debug)]
pub struct ContentFilter {
    fs: Arc<dyn FileSystem>,
    hashes: HashMap<PathBuf, Hash>,
}

impl ContentFilter {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            hashes: HashMap::new(),
        }
    }

    /// Record the current hash of every file matched by a `use_hash` rule,
    /// so the first no-op save after startup is already filtered.
    pub fn seed(&mut self, source_root: &Path, rules: &[WatchRule]) -> Result<()> {
        for rule in rules.iter().filter(|r| r.use_hash()) {
            for (abs, _) in collect_matching_files(self.fs.as_ref(), source_root, rule.paths())? {
                if let Ok(bytes) = self.fs.read(&abs) {
                    self.hashes.insert(abs, content_hash(&bytes));
                }
            }
        }
        debug!(files = self.hashes.len(), "seeded content hashes");
        Ok(())
    }

    /// Whether `path` changed since it was last seen, updating the record.
    ///
    /// Unreadable (e.g. deleted) files always count as changed.
    pub fn changed(&mut self, path: &Path) -> bool {
        match self.fs.read(path) {
            Ok(bytes) => {
                let hash = content_hash(&bytes);
                let previous = self.hashes.insert(path.to_path_buf(), hash);
                previous != Some(hash)
            }
            Err(_) => {
                self.hashes.remove(path);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::WatchRuleConfig;
    use crate::fs::mock::MockFileSystem;
    use crate::types::NotifyAction;

    #[test]
    fn same_contents_are_not_a_change() {
        let fs = MockFileSystem::new();
        fs.add_file("/src/a.scss", b"a{}".to_vec());
        let mut filter = ContentFilter::new(Arc::new(fs.clone()));

        assert!(filter.changed(Path::new("/src/a.scss")));
        assert!(!filter.changed(Path::new("/src/a.scss")));

        fs.add_file("/src/a.scss", b"b{}".to_vec());
        assert!(filter.changed(Path::new("/src/a.scss")));
    }

    #[test]
    fn deleted_files_count_as_changed() {
        let fs = MockFileSystem::new();
        let mut filter = ContentFilter::new(Arc::new(fs));
        assert!(filter.changed(Path::new("/src/gone.scss")));
        assert!(filter.is_empty());
    }

    #[test]
    fn seeding_covers_only_hashed_rules() {
        let fs = MockFileSystem::new();
        fs.add_file("/src/sass/a.scss", b"a".to_vec());
        fs.add_file("/src/js/a.js", b"j".to_vec());

        let rule = |name: &str, path: &str, use_hash| {
            WatchRule::from_config(
                0,
                &WatchRuleConfig {
                    name: Some(name.to_string()),
                    paths: vec![path.to_string()],
                    run: vec!["t".to_string()],
                    notify: NotifyAction::None,
                    use_hash,
                },
            )
            .unwrap()
        };
        let rules = vec![rule("s", "sass/*.scss", true), rule("j", "js/*.js", false)];

        let mut filter = ContentFilter::new(Arc::new(fs));
        filter.seed(Path::new("/src"), &rules).unwrap();
        assert_eq!(filter.len(), 1);
        assert!(!filter.changed(Path::new("/src/sass/a.scss")));
    }
}
