//! Atomic I/O operations with file locking

use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;

use crate::{Error, Result};

/// Prefix of the temporary files created next to a write target.
pub const TEMP_PREFIX: &str = ".treemirror-";

/// Tuning knobs shared by every locked, atomic write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// How long to keep retrying a contended lock before giving up.
    pub lock_timeout: Duration,
    /// Whether temporary files are fsynced before the rename.
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            enable_fsync: true,
        }
    }
}

/// Permissions and durability applied by [`write_atomic_from`].
///
/// Modes and owners are only honoured on Unix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub fsync: bool,
    pub file_mode: Option<u32>,
    pub dir_mode: Option<u32>,
    pub file_owner: Ownership,
    pub dir_owner: Ownership,
}

/// Numeric owner and group applied with `chown`; `None` leaves a field alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl Ownership {
    pub fn is_unset(&self) -> bool {
        self.uid.is_none() && self.gid.is_none()
    }
}

/// Stream `reader` into `path` atomically.
///
/// The content lands in a temporary file in the target directory, is
/// optionally fsynced, receives its final mode and owner, and is then renamed
/// over `path`. A partially written file is never visible at `path`; on any
/// failure the temporary file is removed when its handle drops.
///
/// Returns the number of bytes written.
pub fn write_atomic_from(path: &Path, reader: &mut dyn Read, options: &WriteOptions) -> Result<u64> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    create_dirs(parent, options)?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| Error::io(parent, e))?;

    let written = std::io::copy(reader, temp.as_file_mut()).map_err(|e| Error::io(temp.path(), e))?;

    if options.fsync {
        temp.as_file().sync_all().map_err(|e| Error::io(temp.path(), e))?;
    }

    apply_file_metadata(temp.path(), options.file_mode, options.file_owner)?;

    temp.persist(path).map_err(|e| Error::io(path, e.error))?;

    Ok(written)
}

/// Write a byte slice atomically.
pub fn write_atomic(path: &Path, content: &[u8], robustness: RobustnessConfig) -> Result<()> {
    let options = WriteOptions {
        fsync: robustness.enable_fsync,
        ..WriteOptions::default()
    };
    let mut reader = content;
    write_atomic_from(path, &mut reader, &options)?;
    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Append `line` to `path` as one newline-terminated record.
///
/// The file and its parent directories are created if missing. If the file
/// does not end in a newline, a previous append was torn; a newline is
/// written first so the new record starts on its own line. Callers serialize
/// appends with [`lock_exclusive`].
pub fn append_line(path: &Path, line: &[u8], robustness: RobustnessConfig) -> Result<()> {
    use std::io::{Seek, SeekFrom, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dirs(parent, &WriteOptions::default())?;
    }

    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;

    let len = file.metadata().map_err(|e| Error::io(path, e))?.len();
    let mut record = Vec::with_capacity(line.len() + 2);
    if len > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))
            .and_then(|_| file.read_exact(&mut last))
            .map_err(|e| Error::io(path, e))?;
        if last[0] != b'\n' {
            record.push(b'\n');
        }
    }
    record.extend_from_slice(line);
    record.push(b'\n');

    file.write_all(&record).map_err(|e| Error::io(path, e))?;
    if robustness.enable_fsync {
        file.sync_data().map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

/// Create `dir` and any missing ancestors, applying the directory mode and
/// owner to every directory this call creates.
pub fn create_dirs(dir: &Path, options: &WriteOptions) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut missing: Vec<PathBuf> = Vec::new();
    let mut cursor = Some(dir);
    while let Some(current) = cursor {
        if current.as_os_str().is_empty() || current.is_dir() {
            break;
        }
        missing.push(current.to_path_buf());
        cursor = current.parent();
    }

    for created in missing.iter().rev() {
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        if let Some(mode) = options.dir_mode {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        match builder.create(created) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && created.is_dir() => continue,
            Err(e) => return Err(Error::io(created, e)),
        }
        apply_dir_metadata(created, options)?;
        tracing::debug!(path = %created.display(), "created directory");
    }

    Ok(())
}

#[cfg(unix)]
fn apply_dir_metadata(dir: &Path, options: &WriteOptions) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    // DirBuilder modes are filtered by the umask; set the exact bits.
    if let Some(mode) = options.dir_mode {
        fs::set_permissions(dir, fs::Permissions::from_mode(mode)).map_err(|e| Error::io(dir, e))?;
    }
    if !options.dir_owner.is_unset() {
        std::os::unix::fs::chown(dir, options.dir_owner.uid, options.dir_owner.gid)
            .map_err(|e| Error::io(dir, e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_dir_metadata(_dir: &Path, _options: &WriteOptions) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn apply_file_metadata(path: &Path, mode: Option<u32>, owner: Ownership) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| Error::io(path, e))?;
    }
    if !owner.is_unset() {
        std::os::unix::fs::chown(path, owner.uid, owner.gid).map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_file_metadata(_path: &Path, _mode: Option<u32>, _owner: Ownership) -> Result<()> {
    Ok(())
}

/// An advisory lock held on `<target>.lock`; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

/// Acquire an exclusive lock guarding `target`.
///
/// Contended locks are retried with exponential backoff until
/// `robustness.lock_timeout` elapses.
pub fn lock_exclusive(target: &Path, robustness: RobustnessConfig) -> Result<LockGuard> {
    acquire(target, robustness, true)
}

/// Acquire a shared lock guarding `target`.
pub fn lock_shared(target: &Path, robustness: RobustnessConfig) -> Result<LockGuard> {
    acquire(target, robustness, false)
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

fn acquire(target: &Path, robustness: RobustnessConfig, exclusive: bool) -> Result<LockGuard> {
    let path = lock_path(target);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| Error::io(&path, e))?;

    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(10))
        .with_max_interval(Duration::from_millis(250))
        .with_max_elapsed_time(Some(robustness.lock_timeout))
        .build();

    let attempt = || {
        let outcome = if exclusive {
            file.try_lock_exclusive()
        } else {
            FileExt::try_lock_shared(&file)
        };
        outcome.map_err(|e| {
            if e.kind() == fs2::lock_contended_error().kind() {
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    };

    match backoff::retry(policy, attempt) {
        Ok(()) => Ok(LockGuard { file, path }),
        Err(backoff::Error::Permanent(e)) => Err(Error::io(&path, e)),
        Err(backoff::Error::Transient { .. }) => Err(Error::LockFailed { path }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_path_appends_suffix() {
        let path = lock_path(Path::new("/tmp/ledger.toml"));
        assert_eq!(path, PathBuf::from("/tmp/ledger.toml.lock"));
    }

    #[test]
    fn ownership_unset_by_default() {
        assert!(Ownership::default().is_unset());
        assert!(!Ownership { uid: Some(0), gid: None }.is_unset());
    }
}
