use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::RowSet;

const MAGIC: &[u8; 8] = b"CVEROWS\0";
const CURRENT_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checkpoint encoding failed")]
    Encoding(#[from] bincode::Error),
    #[error("{0} is not a checkpoint file")]
    NotACheckpoint(PathBuf),
    #[error("{path} has checkpoint version {found}, this build reads version {supported}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
    #[error("another run holds {0}")]
    Locked(PathBuf),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CheckpointError + '_ {
    move |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    created_at: NaiveDateTime,
    rows: RowSet,
}

/// Rows that were transformed but not yet confirmed as loaded.
///
/// The file starts with a magic tag and a little-endian format version,
/// followed by the bincode encoded rows.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes `rows` to a temporary sibling, syncs it and renames it into place.
    pub fn save(&self, rows: &RowSet) -> Result<(), CheckpointError> {
        let temp_path = sibling(&self.path, ".tmp");

        let file = File::create(&temp_path).map_err(io_error(&temp_path))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(MAGIC).map_err(io_error(&temp_path))?;
        writer
            .write_all(&CURRENT_VERSION.to_le_bytes())
            .map_err(io_error(&temp_path))?;

        let envelope = EnvelopeRef {
            created_at: Utc::now().naive_utc(),
            rows,
        };
        bincode::serialize_into(&mut writer, &envelope)?;

        let file = writer
            .into_inner()
            .map_err(|e| io_error(&temp_path)(e.into_error()))?;
        file.sync_all().map_err(io_error(&temp_path))?;
        fs::rename(&temp_path, &self.path).map_err(io_error(&self.path))?;

        log::info!(
            "staged {} rows in {}",
            rows.total(),
            self.path.display()
        );

        Ok(())
    }

    pub fn load(&self) -> Result<RowSet, CheckpointError> {
        let file = File::open(&self.path).map_err(io_error(&self.path))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        let mut version = [0u8; 4];
        let header = reader
            .read_exact(&mut magic)
            .and_then(|_| reader.read_exact(&mut version));
        if header.is_err() || &magic != MAGIC {
            return Err(CheckpointError::NotACheckpoint(self.path.clone()));
        }

        let found = u32::from_le_bytes(version);
        if found != CURRENT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                path: self.path.clone(),
                found,
                supported: CURRENT_VERSION,
            });
        }

        let envelope: Envelope = bincode::deserialize_from(reader)?;

        log::info!(
            "resuming from {} rows staged at {} in {}",
            envelope.rows.total(),
            envelope.created_at,
            self.path.display()
        );

        Ok(envelope.rows)
    }

    pub fn clear(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("removed checkpoint {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&self.path)(e)),
        }
    }

    /// Takes the single-writer lock that sits next to the checkpoint.
    pub fn lock(&self) -> Result<RunLock, CheckpointError> {
        RunLock::acquire(sibling(&self.path, ".lock"))
    }
}

// Serializes like `Envelope` without cloning the rows.
#[derive(Serialize)]
struct EnvelopeRef<'a> {
    created_at: NaiveDateTime,
    rows: &'a RowSet,
}

/// Exclusive advisory lock on `<checkpoint>.lock` held for the duration of a
/// run. The kernel drops the lock when the process dies, so a file left by a
/// killed run is reclaimed by the next one.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    // keeps the lock alive
    _file: File,
}

impl RunLock {
    pub fn acquire(path: PathBuf) -> Result<Self, CheckpointError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error(&path))?;

        match try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Err(CheckpointError::Locked(path))
            }
            Err(e) => return Err(io_error(&path)(e)),
        }

        if file.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            log::warn!("reclaiming stale lock {}", path.display());
        }
        file.set_len(0).map_err(io_error(&path))?;
        writeln!(file, "{}", std::process::id()).map_err(io_error(&path))?;

        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        let error = io::Error::last_os_error();
        if error.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Err(io::Error::new(io::ErrorKind::WouldBlock, error))
        } else {
            Err(error)
        }
    }
}

#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("could not remove lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cve_sources::cvelist;

    fn sample_rows() -> RowSet {
        let mut rows = cvelist::transform(include_bytes!("cve_sources/cvelist/fixtures/CVE-2023-4863.json"));
        rows.append(cvelist::transform(include_bytes!("cve_sources/cvelist/fixtures/CVE-2024-0001.json")));
        rows
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::at(dir.path().join("processed_data.bin"));
        let rows = sample_rows();

        assert!(!checkpoint.exists());
        checkpoint.save(&rows).unwrap();
        assert!(checkpoint.exists());
        assert!(!dir.path().join("processed_data.bin.tmp").exists());

        assert_eq!(checkpoint.load().unwrap(), rows);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::at(dir.path().join("processed_data.bin"));

        checkpoint.save(&sample_rows()).unwrap();
        checkpoint.clear().unwrap();
        assert!(!checkpoint.exists());
        checkpoint.clear().unwrap();
    }

    #[test]
    fn foreign_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_data.bin");
        fs::write(&path, b"not a checkpoint at all").unwrap();

        let err = Checkpoint::at(&path).load().unwrap_err();
        assert!(matches!(err, CheckpointError::NotACheckpoint(_)), "{err:?}");

        fs::write(&path, b"CVE").unwrap();
        let err = Checkpoint::at(&path).load().unwrap_err();
        assert!(matches!(err, CheckpointError::NotACheckpoint(_)), "{err:?}");
    }

    #[test]
    fn unknown_versions_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_data.bin");
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&7u32.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        match Checkpoint::at(&path).load().unwrap_err() {
            CheckpointError::UnsupportedVersion { found, supported, .. } => {
                assert_eq!(found, 7);
                assert_eq!(supported, CURRENT_VERSION);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(path.exists());
    }

    #[test]
    fn truncated_body_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::at(dir.path().join("processed_data.bin"));
        checkpoint.save(&sample_rows()).unwrap();

        let bytes = fs::read(checkpoint.path()).unwrap();
        fs::write(checkpoint.path(), &bytes[..bytes.len() / 2]).unwrap();

        assert!(matches!(
            checkpoint.load().unwrap_err(),
            CheckpointError::Encoding(_)
        ));
    }

    #[test]
    fn run_lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::at(dir.path().join("processed_data.bin"));

        let lock = checkpoint.lock().unwrap();
        assert_eq!(lock.path(), dir.path().join("processed_data.bin.lock"));
        assert!(matches!(
            checkpoint.lock().unwrap_err(),
            CheckpointError::Locked(_)
        ));

        drop(lock);
        assert!(!dir.path().join("processed_data.bin.lock").exists());
        checkpoint.lock().unwrap();
    }

    #[test]
    fn lock_left_by_a_killed_run_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::at(dir.path().join("processed_data.bin"));
        let lock_path = dir.path().join("processed_data.bin.lock");
        // a crashed run leaves its file behind but no process holds the lock
        fs::write(&lock_path, "4194304\n").unwrap();

        let lock = checkpoint.lock().unwrap();

        assert_eq!(
            fs::read_to_string(&lock_path).unwrap(),
            format!("{}\n", std::process::id())
        );
        assert!(matches!(
            checkpoint.lock().unwrap_err(),
            CheckpointError::Locked(_)
        ));
        drop(lock);
        assert!(!lock_path.exists());
    }
}
