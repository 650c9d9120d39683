//! Directory-backed storage view.
//!
//! # File Layout
//!
//! ```text
//! root/
//! └── counters/
//!     └── requests/
//!         ├── 2018/
//!         │   ├── 11          <- {"total":1204}
//!         │   └── 12          <- {"total":556}
//!         └── 2019/
//!             └── 01          <- {"total":0}
//! ```
//!
//! Each record is one file. Writes go to a hidden sibling (`.<name>.tmp`),
//! are synced, and are then renamed over the target, so a crash mid-save
//! leaves either the old record or the new one. Hidden entries are never
//! listed.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::ViewError;
use crate::view::StorageView;

/// A [`StorageView`] that keeps one file per record under a root directory.
#[derive(Debug, Clone)]
pub struct FileView {
    root: PathBuf,
}

impl FileView {
    /// Opens a view rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Io`] if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, ViewError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| ViewError::Io {
            path: root.clone(),
            source: e,
        })?;
        Ok(Self { root })
    }

    /// The directory this view is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a `/`-separated key onto a path under the root.
    fn resolve(&self, key: &str, allow_folder: bool) -> Result<PathBuf, ViewError> {
        let invalid = |reason| ViewError::InvalidKey {
            key: key.to_string(),
            reason,
        };

        if key.starts_with('/') {
            return Err(invalid("keys must be relative"));
        }
        let trimmed = match key.strip_suffix('/') {
            Some(folder) if allow_folder => folder,
            Some(_) => return Err(invalid("record keys must name a leaf")),
            None if allow_folder && !key.is_empty() => {
                return Err(invalid("list prefixes must end in '/'"));
            }
            None => key,
        };

        let mut path = self.root.clone();
        if trimmed.is_empty() {
            return if allow_folder {
                Ok(path)
            } else {
                Err(invalid("record keys must name a leaf"))
            };
        }
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if segment == "." || segment == ".." {
                return Err(invalid("relative path segment"));
            }
            if segment.starts_with('.') {
                return Err(invalid("hidden path segment"));
            }
            if segment.contains('\\') {
                return Err(invalid("backslash in path segment"));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl StorageView for FileView {
    fn list(&self, prefix: &str) -> Result<Vec<String>, ViewError> {
        let dir = self.resolve(prefix, true)?;
        let io_err = |e| ViewError::Io {
            path: dir.clone(),
            source: e,
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::NotADirectory => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err)?;
            let name = entry
                .file_name()
                .into_string()
                .map_err(|raw| ViewError::InvalidKey {
                    key: format!("{prefix}{}", raw.to_string_lossy()),
                    reason: "entry name is not valid UTF-8",
                })?;
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().map_err(io_err)?.is_dir() {
                children.push(format!("{name}/"));
            } else {
                children.push(name);
            }
        }
        Ok(children)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ViewError> {
        let path = self.resolve(key, false)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ViewError::Io { path, source: e }),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), ViewError> {
        let path = self.resolve(key, false)?;
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(ViewError::InvalidKey {
                key: key.to_string(),
                reason: "record keys must name a leaf",
            });
        };

        fs::create_dir_all(parent).map_err(|e| ViewError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;

        let tmp = parent.join(format!(".{}.tmp", name.to_string_lossy()));
        let write_tmp = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(value)?;
            file.sync_all()
        };
        write_tmp().map_err(|e| ViewError::Io {
            path: tmp.clone(),
            source: e,
        })?;

        fs::rename(&tmp, &path).map_err(|e| ViewError::Io { path: path.clone(), source: e })?;
        sync_dir(parent)
    }
}

/// Flushes a directory so a rename into it survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), ViewError> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| ViewError::Io {
            path: dir.to_path_buf(),
            source: e,
        })
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), ViewError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_put_get_round_trip() {
        let temp_dir = tempdir().unwrap();
        let view = FileView::open(temp_dir.path()).unwrap();

        assert_eq!(view.get("counters/requests/2018/12").unwrap(), None);
        view.put("counters/requests/2018/12", br#"{"total":555}"#)
            .unwrap();
        view.put("counters/requests/2018/12", br#"{"total":556}"#)
            .unwrap();
        assert_eq!(
            view.get("counters/requests/2018/12").unwrap(),
            Some(br#"{"total":556}"#.to_vec())
        );

        let on_disk = temp_dir.path().join("counters/requests/2018/12");
        assert_eq!(fs::read(on_disk).unwrap(), br#"{"total":556}"#);
    }

    #[test]
    fn test_list_marks_folders_and_hides_temp_files() {
        let temp_dir = tempdir().unwrap();
        let view = FileView::open(temp_dir.path()).unwrap();
        view.put("c/2018/12", b"{}").unwrap();
        view.put("c/2019/01", b"{}").unwrap();
        fs::write(temp_dir.path().join("c/2018/.12.tmp"), b"partial").unwrap();

        let mut years = view.list("c/").unwrap();
        years.sort();
        assert_eq!(years, vec!["2018/", "2019/"]);
        assert_eq!(view.list("c/2018/").unwrap(), vec!["12"]);
        assert_eq!(view.list("").unwrap(), vec!["c/"]);
    }

    #[test]
    fn test_list_missing_prefix_is_empty() {
        let temp_dir = tempdir().unwrap();
        let view = FileView::open(temp_dir.path()).unwrap();
        assert!(view.list("counters/requests/").unwrap().is_empty());

        // A leaf is not a folder, so it has no children.
        view.put("leaf", b"x").unwrap();
        assert!(view.list("leaf/").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_invalid_keys() {
        let temp_dir = tempdir().unwrap();
        let view = FileView::open(temp_dir.path()).unwrap();

        for key in ["", "/abs", "a//b", "a/../b", "./a", "a/", ".hidden", "a\\b"] {
            assert!(
                matches!(view.put(key, b"x"), Err(ViewError::InvalidKey { .. })),
                "expected '{key}' to be rejected"
            );
        }
        assert!(matches!(
            view.list("no-trailing-slash"),
            Err(ViewError::InvalidKey { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_list_rejects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = tempdir().unwrap();
        let view = FileView::open(temp_dir.path()).unwrap();
        view.put("c/2018/12", b"{}").unwrap();
        let bad = temp_dir.path().join("c").join(OsStr::from_bytes(b"20\xff9"));
        fs::create_dir(bad).unwrap();

        assert!(matches!(
            view.list("c/"),
            Err(ViewError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_put_creates_and_syncs_new_folders() {
        let temp_dir = tempdir().unwrap();
        let view = FileView::open(temp_dir.path()).unwrap();
        view.put("c/2019/01", br#"{"total":0}"#).unwrap();

        let reopened = FileView::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.list("c/").unwrap(), vec!["2019/"]);
        assert_eq!(
            reopened.get("c/2019/01").unwrap(),
            Some(br#"{"total":0}"#.to_vec())
        );
        assert!(!temp_dir.path().join("c/2019/.01.tmp").exists());
    }

    #[test]
    fn test_reopen_sees_previous_writes() {
        let temp_dir = tempdir().unwrap();
        {
            let view = FileView::open(temp_dir.path()).unwrap();
            view.put("a/b", b"persisted").unwrap();
        }
        let view = FileView::open(temp_dir.path()).unwrap();
        assert_eq!(view.get("a/b").unwrap(), Some(b"persisted".to_vec()));
    }
}
