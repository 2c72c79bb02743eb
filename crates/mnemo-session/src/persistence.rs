//! Snapshot files: one indented JSON document per session.
//!
//! Writes go to a temporary file in the storage directory which is synced
//! and then renamed over the final name, so a crash never leaves a torn
//! snapshot behind. On any failure the temporary file is removed.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::Session;

const SNAPSHOT_EXT: &str = "json";

/// Turn a session key into a filename stem (`telegram:1` -> `telegram_1`).
pub fn sanitize_filename(key: &str) -> String {
    key.replace(':', "_")
}

/// Check that `name` is a single, plain path component.
///
/// Rejects the empty string, `.`, `..`, absolute paths and anything
/// containing `/` or `\`.
pub fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(Error::InvalidKey(name.to_string()));
    }

    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(Error::InvalidKey(name.to_string())),
    }
}

/// Directory holding session snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    root: PathBuf,
}

impl SnapshotDir {
    /// Use `root`, creating it if necessary.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot path for `key`, or `InvalidKey` if it would not be a plain
    /// file inside the directory.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let stem = sanitize_filename(key);
        validate_filename(&stem)?;
        Ok(self.root.join(format!("{stem}.{SNAPSHOT_EXT}")))
    }

    /// Atomically write `session` to `path`.
    pub fn write(&self, path: &Path, session: &Session) -> Result<()> {
        let data = serde_json::to_vec_pretty(session)?;

        let mut tmp = tempfile::Builder::new()
            .prefix("session-")
            .suffix(".tmp")
            .tempfile_in(&self.root)?;
        tmp.write_all(&data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))?;
        }

        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        debug!(key = %session.key, path = %path.display(), "Saved session snapshot");
        Ok(())
    }

    /// Load every snapshot in the directory.
    ///
    /// Unreadable or unparseable files are skipped.
    pub fn load_all(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(error = %e, "Failed to read session directory entry");
                    continue;
                }
            };
            if !path.is_file() || path.extension().is_none_or(|ext| ext != SNAPSHOT_EXT) {
                continue;
            }

            match read_snapshot(&path) {
                Ok(session) => sessions.push(session),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable session snapshot"),
            }
        }

        debug!(dir = %self.root.display(), count = sessions.len(), "Loaded session snapshots");
        Ok(sessions)
    }
}

fn read_snapshot(path: &Path) -> Result<Session> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_types::Message;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_replaces_every_colon() {
        assert_eq!(sanitize_filename("a:b:c"), "a_b_c");
        assert_eq!(sanitize_filename("telegram:123456"), "telegram_123456");
        assert!(!sanitize_filename("::x::").contains(':'));
    }

    #[test]
    fn test_validate_rejects_unsafe_names() {
        for bad in ["", ".", "..", "foo/bar", "foo\\bar", "/etc", "../up"] {
            assert!(
                matches!(validate_filename(bad), Err(Error::InvalidKey(_))),
                "{bad:?} should be rejected"
            );
        }
        for good in ["telegram_1", "cli", "a.b", "..hidden"] {
            assert!(validate_filename(good).is_ok(), "{good:?} should be accepted");
        }
    }

    #[test]
    fn test_write_then_load() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::open(tmp.path().join("sessions")).unwrap();

        let mut session = Session::new("telegram:1");
        session.push(Message::user("hello"));
        let path = dir.path_for(&session.key).unwrap();
        assert!(path.ends_with("telegram_1.json"));
        dir.write(&path, &session).unwrap();

        let loaded = dir.load_all().unwrap();
        assert_eq!(loaded, vec![session]);
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::open(tmp.path()).unwrap();
        let session = Session::new("k");
        let path = dir.path_for("k").unwrap();
        dir.write(&path, &session).unwrap();
        dir.write(&path, &session).unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["k.json"]);
    }

    #[test]
    fn test_failed_rename_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::open(tmp.path()).unwrap();
        // A directory occupying the target name makes the rename fail.
        let path = dir.path_for("k").unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("child"), b"x").unwrap();

        assert!(dir.write(&path, &Session::new("k")).is_err());
        let leftovers = fs::read_dir(tmp.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_load_skips_corrupt_and_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let dir = SnapshotDir::open(tmp.path()).unwrap();
        let good = Session::new("good");
        dir.write(&dir.path_for("good").unwrap(), &good).unwrap();
        fs::write(tmp.path().join("broken.json"), b"{not json").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();
        fs::create_dir(tmp.path().join("nested.json")).unwrap();

        let loaded = dir.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key, "good");
    }
}
