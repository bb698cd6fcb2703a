//! Per-owner fingerprint persistence.
//!
//! Each trigger keeps exactly one value: the fingerprint of the upstream
//! pipeline as it looked when the sink was last triggered (or when the
//! trigger was first primed). [`FileFingerprintStore`] keeps it as a single
//! line of UTF-8 text named [`FINGERPRINT_FILE_NAME`] inside the owning
//! job's storage directory.
//!
//! Reads take a shared advisory lock on a sibling lock file and writes an
//! exclusive one. Writes go to a temporary sibling that is renamed over the
//! real file, so a reader never sees a half-written value. A lock that
//! cannot be taken at all is reported as a failure of the operation that
//! asked for it.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::error::ErrorCode;

/// File name of the persisted fingerprint, relative to the owner directory.
pub const FINGERPRINT_FILE_NAME: &str = "pipeline-context.fingerprint";

const LOCK_FILE_NAME: &str = "pipeline-context.fingerprint.lock";
const TMP_FILE_NAME: &str = "pipeline-context.fingerprint.tmp";
const LOCK_RETRY: Duration = Duration::from_millis(10);

/// Errors from reading or writing a persisted fingerprint.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("fingerprint lock {path} still held after {waited:?}")]
    Contended { path: PathBuf, waited: Duration },

    #[error("failed to read fingerprint at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write fingerprint at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Contended { .. } => ErrorCode::LockContention,
            Self::Read { .. } => ErrorCode::FingerprintReadFailed,
            Self::Write { .. } => ErrorCode::FingerprintWriteFailed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Write,
}

impl Access {
    fn fault(self, path: &Path, source: io::Error) -> StoreError {
        let path = path.to_path_buf();
        match self {
            Self::Read => StoreError::Read { path, source },
            Self::Write => StoreError::Write { path, source },
        }
    }
}

/// Advisory lock on an owner's lock file; unlocked when dropped.
#[derive(Debug)]
struct OwnerLock {
    file: File,
}

impl OwnerLock {
    fn acquire(owner_dir: &Path, access: Access, timeout: Duration) -> Result<Self, StoreError> {
        fs::create_dir_all(owner_dir).map_err(|source| access.fault(owner_dir, source))?;

        let path = owner_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| access.fault(&path, source))?;

        let contended = fs2::lock_contended_error().raw_os_error();
        let start = Instant::now();
        loop {
            let attempt = match access {
                Access::Read => FileExt::try_lock_shared(&file),
                Access::Write => FileExt::try_lock_exclusive(&file),
            };
            match attempt {
                Ok(()) => return Ok(Self { file }),
                Err(err) if err.raw_os_error() == contended => {}
                Err(source) => return Err(access.fault(&path, source)),
            }

            let waited = start.elapsed();
            if waited >= timeout {
                return Err(StoreError::Contended { path, waited });
            }
            thread::sleep(LOCK_RETRY);
        }
    }
}

impl Drop for OwnerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Storage for the single fingerprint value each trigger owner keeps.
pub trait FingerprintStore {
    /// Read the persisted value for `owner_dir`, or `None` if never written.
    fn read(&self, owner_dir: &Path) -> Result<Option<String>, StoreError>;

    /// Replace the persisted value for `owner_dir`.
    fn write(&self, owner_dir: &Path, value: &str) -> Result<(), StoreError>;
}

/// [`FingerprintStore`] backed by one small file per owner directory.
#[derive(Debug, Clone)]
pub struct FileFingerprintStore {
    lock_timeout: Duration,
}

impl Default for FileFingerprintStore {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl FileFingerprintStore {
    #[must_use]
    pub const fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self { lock_timeout }
    }

    /// Path of the fingerprint file for `owner_dir`.
    #[must_use]
    pub fn fingerprint_path(owner_dir: &Path) -> PathBuf {
        owner_dir.join(FINGERPRINT_FILE_NAME)
    }
}

impl FingerprintStore for FileFingerprintStore {
    fn read(&self, owner_dir: &Path) -> Result<Option<String>, StoreError> {
        let path = Self::fingerprint_path(owner_dir);
        if !path.exists() {
            return Ok(None);
        }

        let _lock = OwnerLock::acquire(owner_dir, Access::Read, self.lock_timeout)?;

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        // An empty file carries no baseline.
        let value = content.lines().next().map(str::trim).unwrap_or_default();
        if value.is_empty() {
            debug!(path = %path.display(), "fingerprint file is empty");
            return Ok(None);
        }
        Ok(Some(value.to_string()))
    }

    fn write(&self, owner_dir: &Path, value: &str) -> Result<(), StoreError> {
        let path = Self::fingerprint_path(owner_dir);
        let tmp = owner_dir.join(TMP_FILE_NAME);

        let _lock = OwnerLock::acquire(owner_dir, Access::Write, self.lock_timeout)?;

        fs::write(&tmp, value).map_err(|source| StoreError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "fingerprint persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileFingerprintStore::default();
        assert_eq!(store.read(dir.path()).expect("read"), None);
    }

    #[test]
    fn missing_owner_dir_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileFingerprintStore::default();
        assert_eq!(store.read(&dir.path().join("never-built")).expect("read"), None);
    }

    #[test]
    fn write_then_read_returns_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let owner = dir.path().join("jobs").join("Sink-Trigger");
        let store = FileFingerprintStore::default();

        store.write(&owner, "abc123").expect("write");
        assert_eq!(store.read(&owner).expect("read").as_deref(), Some("abc123"));

        let on_disk = fs::read_to_string(owner.join(FINGERPRINT_FILE_NAME)).expect("file exists");
        assert_eq!(on_disk, "abc123");
        assert!(!owner.join(TMP_FILE_NAME).exists(), "tmp file renamed away");
    }

    #[test]
    fn write_overwrites_previous_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileFingerprintStore::default();

        store.write(dir.path(), "first").expect("write");
        store.write(dir.path(), "second").expect("write");
        assert_eq!(store.read(dir.path()).expect("read").as_deref(), Some("second"));
    }

    #[test]
    fn only_first_line_is_significant() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(FINGERPRINT_FILE_NAME), "deadbeef\r\nignored\n").expect("seed");

        let store = FileFingerprintStore::default();
        assert_eq!(store.read(dir.path()).expect("read").as_deref(), Some("deadbeef"));
    }

    #[test]
    fn empty_file_reads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(FINGERPRINT_FILE_NAME), "").expect("seed");

        let store = FileFingerprintStore::default();
        assert_eq!(store.read(dir.path()).expect("read"), None);
    }

    #[test]
    fn write_times_out_while_reader_holds_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileFingerprintStore::with_lock_timeout(Duration::from_millis(20));
        let _reader = OwnerLock::acquire(dir.path(), Access::Read, Duration::from_millis(50))
            .expect("reader lock");

        let err = store.write(dir.path(), "blocked").unwrap_err();
        assert!(matches!(err, StoreError::Contended { .. }));
        assert_eq!(err.code(), ErrorCode::LockContention);
    }

    #[test]
    fn readers_share_the_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(FINGERPRINT_FILE_NAME), "abc").expect("seed");
        let store = FileFingerprintStore::with_lock_timeout(Duration::from_millis(20));
        let _reader = OwnerLock::acquire(dir.path(), Access::Read, Duration::from_millis(50))
            .expect("reader lock");

        assert_eq!(store.read(dir.path()).expect("read").as_deref(), Some("abc"));
    }

    #[test]
    fn read_waits_out_a_writer() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(FINGERPRINT_FILE_NAME), "abc").expect("seed");
        let store = FileFingerprintStore::with_lock_timeout(Duration::from_millis(20));

        {
            let _writer = OwnerLock::acquire(dir.path(), Access::Write, Duration::from_millis(50))
                .expect("writer lock");
            let err = store.read(dir.path()).unwrap_err();
            assert_eq!(err.code(), ErrorCode::LockContention);
        }

        assert_eq!(store.read(dir.path()).expect("read").as_deref(), Some("abc"));
    }

    #[test]
    fn unlockable_read_is_a_read_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(FINGERPRINT_FILE_NAME), "abc").expect("seed");
        fs::create_dir(dir.path().join(LOCK_FILE_NAME)).expect("lock path is a directory");

        let err = FileFingerprintStore::default().read(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Read { ref path, .. } if path.ends_with(LOCK_FILE_NAME)));
        assert_eq!(err.code(), ErrorCode::FingerprintReadFailed);
        assert!(!err.to_string().contains("E300"));
    }

    #[test]
    fn unlockable_write_is_a_write_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join(LOCK_FILE_NAME)).expect("lock path is a directory");

        let err = FileFingerprintStore::default().write(dir.path(), "abc").unwrap_err();
        assert_eq!(err.code(), ErrorCode::FingerprintWriteFailed);
        assert!(!dir.path().join(FINGERPRINT_FILE_NAME).exists());
    }
}
