//! Directory-tree artifact store: entries live at
//! `<root>/<shard>/<key>.bin`, written atomically via a temp file plus
//! rename, with per-entry lock files serializing concurrent writers
//! while leaving readers unblocked.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::CacheError;
use crate::key::CacheKey;
use crate::record::CacheRecord;

/// A content-addressed store rooted at one directory, with a byte budget
/// enforced by evicting the least-recently-used entries.
pub struct CacheStore {
    root: PathBuf,
    budget_bytes: u64,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, budget_bytes: u64) -> Self {
        CacheStore { root: root.into(), budget_bytes }
    }

    fn entry_dir(&self, key: CacheKey) -> PathBuf {
        self.root.join(key.shard())
    }

    fn entry_path(&self, key: CacheKey) -> PathBuf {
        self.entry_dir(key).join(format!("{key}.bin"))
    }

    fn lock_path(&self, key: CacheKey) -> PathBuf {
        self.entry_dir(key).join(format!("{key}.lock"))
    }

    fn temp_path(&self, key: CacheKey) -> PathBuf {
        self.entry_dir(key).join(format!("{key}.tmp"))
    }

    /// Looks up an entry, returning `None` on a miss. A corrupt entry is
    /// treated as a miss after the bad file is removed, so one damaged
    /// entry doesn't wedge every future lookup for that key.
    pub fn get(&self, key: CacheKey) -> Result<Option<CacheRecord>, CacheError> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_err(&path, err)),
        };
        match bincode::deserialize::<CacheRecord>(&bytes) {
            Ok(record) => {
                self.touch(&path);
                Ok(Some(record))
            }
            Err(err) => {
                let _ = fs::remove_file(&path);
                Err(CacheError::Corrupt { path: path.display().to_string(), reason: err.to_string() })
            }
        }
    }

    /// Writes an entry, serializing concurrent writers for the same key
    /// through a lock file. Builds are deterministic, so a writer
    /// that loses the race to acquire the lock simply treats the
    /// in-flight write as equivalent and returns rather than waiting.
    pub fn put(&self, key: CacheKey, record: &CacheRecord) -> Result<(), CacheError> {
        let dir = self.entry_dir(key);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let lock_path = self.lock_path(key);
        let lock = fs::OpenOptions::new().write(true).create_new(true).open(&lock_path);
        let _lock = match lock {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(()),
            Err(err) => return Err(io_err(&lock_path, err)),
        };

        let bytes = bincode::serialize(record)
            .map_err(|err| CacheError::Corrupt { path: dir.display().to_string(), reason: err.to_string() })?;

        let temp_path = self.temp_path(key);
        fs::write(&temp_path, &bytes).map_err(|e| io_err(&temp_path, e))?;
        let final_path = self.entry_path(key);
        fs::rename(&temp_path, &final_path).map_err(|e| io_err(&final_path, e))?;

        let _ = fs::remove_file(&lock_path);
        self.evict_if_over_budget()?;
        Ok(())
    }

    /// Bumps an entry's modification time so the next eviction pass
    /// treats it as freshly used. Best-effort: a failure here doesn't
    /// fail the lookup that triggered it.
    fn touch(&self, path: &Path) {
        if let Ok(file) = fs::OpenOptions::new().append(true).open(path) {
            let _ = file.set_modified(SystemTime::now());
        }
    }

    /// Walks every shard, evicting the oldest entries (by modification
    /// time) until total size is back under budget. A budget of zero
    /// disables eviction, for tests and for callers that manage their
    /// own retention.
    fn evict_if_over_budget(&self) -> Result<(), CacheError> {
        if self.budget_bytes == 0 {
            return Ok(());
        }
        let mut entries = self.list_entries()?;
        let mut total: u64 = entries.iter().map(|(_, size, _)| size).sum();
        if total <= self.budget_bytes {
            return Ok(());
        }
        entries.sort_by_key(|(_, _, modified)| *modified);
        for (path, size, _) in entries {
            if total <= self.budget_bytes {
                break;
            }
            if fs::remove_file(&path).is_ok() {
                total = total.saturating_sub(size);
            }
        }
        Ok(())
    }

    fn list_entries(&self) -> Result<Vec<(PathBuf, u64, SystemTime)>, CacheError> {
        let mut out = Vec::new();
        let shards = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(out),
            Err(err) => return Err(io_err(&self.root, err)),
        };
        for shard in shards {
            let shard = shard.map_err(|e| io_err(&self.root, e))?;
            if !shard.path().is_dir() {
                continue;
            }
            let files = fs::read_dir(shard.path()).map_err(|e| io_err(&shard.path(), e))?;
            for file in files {
                let file = file.map_err(|e| io_err(&shard.path(), e))?;
                let path = file.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("bin") {
                    continue;
                }
                let meta = file.metadata().map_err(|e| io_err(&path, e))?;
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                out.push((path, meta.len(), modified));
            }
        }
        Ok(out)
    }
}

fn io_err(path: &Path, source: io::Error) -> CacheError {
    CacheError::Io { path: path.display().to_string(), source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TargetFormatTag;

    fn sample_record() -> CacheRecord {
        CacheRecord {
            object_bytes: vec![0x7f, b'E', b'L', b'F'],
            entry_symbol: "main".to_string(),
            target_format: TargetFormatTag::Elf64,
            exported_symbols: vec!["main".to_string()],
            dependency_fingerprints: Vec::new(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 0);
        let key = CacheKey::build("fn main() {}", "0.1.0", "O0", &[], &[]);
        store.put(key, &sample_record()).unwrap();
        let fetched = store.get(key).unwrap().expect("entry should be present");
        assert_eq!(fetched.entry_symbol, "main");
        assert_eq!(fetched.object_bytes, sample_record().object_bytes);
    }

    #[test]
    fn miss_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 0);
        let key = CacheKey::build("fn main() {}", "0.1.0", "O0", &[], &[]);
        assert!(store.get(key).unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_treated_as_a_miss_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path(), 0);
        let key = CacheKey::build("fn main() {}", "0.1.0", "O0", &[], &[]);
        let entry_dir = store.entry_dir(key);
        fs::create_dir_all(&entry_dir).unwrap();
        fs::write(store.entry_path(key), b"not a valid record").unwrap();
        assert!(store.get(key).is_err());
        assert!(!store.entry_path(key).exists());
    }

    #[test]
    fn eviction_keeps_total_size_under_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = sample_record();
        record.object_bytes = vec![0u8; 64];
        let budget = 100u64;
        let store = CacheStore::new(dir.path(), budget);
        for i in 0..5 {
            let key = CacheKey::build(&format!("fn f{i}() {{}}"), "0.1.0", "O0", &[], &[]);
            store.put(key, &record).unwrap();
        }
        let total: u64 = store.list_entries().unwrap().iter().map(|(_, size, _)| size).sum();
        assert!(total <= budget, "expected total {total} <= budget {budget}");
    }
}
