// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory filesystem holding files only; directories exist implicitly as
/// prefixes of file paths.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<BTreeMap<PathBuf, Vec<u8>>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut files = self.files.lock().unwrap();
        files.insert(path.as_ref().to_path_buf(), content.into());
    }

    /// Contents of a file, if present.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    /// All file paths below `dir`, sorted.
    pub fn files_under(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let dir = dir.as_ref();
        self.files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect()
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| anyhow!("file not found: {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents.to_vec());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files
            .lock()
            .unwrap()
            .keys()
            .any(|p| p != path && p.starts_with(path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.files.lock().unwrap().retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        let mut children: Vec<PathBuf> = files
            .keys()
            .filter_map(|p| {
                let rel = p.strip_prefix(path).ok()?;
                let first = rel.components().next()?;
                Some(path.join(first.as_os_str()))
            })
            .collect();
        children.dedup();
        if children.is_empty() && !files.keys().any(|p| p.starts_with(path)) {
            return Err(anyhow!("directory not found: {:?}", path));
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_implied_by_files() {
        let fs = MockFileSystem::new();
        fs.add_file("root/a/b.txt", "x");
        fs.add_file("root/c.txt", "y");

        assert!(fs.is_dir(Path::new("root")));
        assert!(fs.is_dir(Path::new("root/a")));
        assert!(!fs.is_dir(Path::new("root/c.txt")));

        let mut entries = fs.read_dir(Path::new("root")).unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![PathBuf::from("root/a"), PathBuf::from("root/c.txt")]
        );
    }

    #[test]
    fn remove_dir_all_drops_subtree() {
        let fs = MockFileSystem::new();
        fs.add_file("build/css/a.css", "a");
        fs.add_file("source/a.css", "a");
        fs.remove_dir_all(Path::new("build")).unwrap();
        assert!(!fs.exists(Path::new("build/css/a.css")));
        assert!(fs.exists(Path::new("source/a.css")));
    }
}
