use crate::error::app_error::AppError;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Durable key/value storage for client credentials.
///
/// Reads, writes and removals take several keys at once so callers can keep
/// related values consistent; each call is applied under one lock.
pub trait TokenStorage: Send + Sync {
    /// Values for `keys`, in the same order.
    fn load_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, AppError>;

    fn load(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.load_many(&[key])?.pop().flatten())
    }

    fn store(&self, entries: &[(&str, &str)]) -> Result<(), AppError>;

    fn remove(&self, keys: &[&str]) -> Result<(), AppError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// TOML file holding one string per key. Updates are written to a sibling
/// temp file and renamed into place.
#[derive(Debug)]
pub struct FileTokenStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, AppError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(AppError::storage(format!("Failed to read {}", self.path.display()), e)),
        };

        toml::from_str(&contents).map_err(|e| AppError::StorageFormat(format!("{} is not a valid session file: {}", self.path.display(), e)))
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), AppError> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(AppError::storage(format!("Failed to remove {}", self.path.display()), e)),
            };
        }

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AppError::storage(format!("Failed to create {}", parent.display()), e))?;
        }

        let contents = toml::to_string(entries).map_err(|e| AppError::StorageFormat(format!("Failed to encode session file: {}", e)))?;
        let tmp_path = self.path.with_extension("tmp");
        write_private(&tmp_path, contents.as_bytes()).map_err(|e| AppError::storage(format!("Failed to write {}", tmp_path.display()), e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| AppError::storage(format!("Failed to replace {}", self.path.display()), e))?;

        debug!(path = %self.path.display(), keys = entries.len(), "session file written");
        Ok(())
    }
}

/// Creates `path` readable by the owner only; the file holds bearer credentials.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    // A leftover temp file would keep its old mode.
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl TokenStorage for FileTokenStorage {
    fn load_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, AppError> {
        let _guard = lock(&self.write_lock);
        let mut current = self.read_entries()?;
        Ok(keys.iter().map(|key| current.remove(*key)).collect())
    }

    fn store(&self, entries: &[(&str, &str)]) -> Result<(), AppError> {
        let _guard = lock(&self.write_lock);
        let mut current = self.read_entries()?;
        for (key, value) in entries {
            current.insert((*key).to_string(), (*value).to_string());
        }
        self.write_entries(&current)
    }

    fn remove(&self, keys: &[&str]) -> Result<(), AppError> {
        let _guard = lock(&self.write_lock);
        let mut current = self.read_entries()?;
        let before = current.len();
        current.retain(|key, _| !keys.contains(&key.as_str()));
        if current.len() == before {
            return Ok(());
        }
        self.write_entries(&current)
    }
}

/// Process-local storage, for embedding hosts that persist elsewhere and for tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, AppError> {
        let current = lock(&self.entries);
        Ok(keys.iter().map(|key| current.get(*key).cloned()).collect())
    }

    fn store(&self, entries: &[(&str, &str)]) -> Result<(), AppError> {
        let mut current = lock(&self.entries);
        for (key, value) in entries {
            current.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), AppError> {
        let mut current = lock(&self.entries);
        for key in keys {
            current.remove(*key);
        }
        Ok(())
    }
}
