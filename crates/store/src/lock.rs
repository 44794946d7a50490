//! Advisory per-record file locks.
//!
//! Each job id has a sidecar `.lock` file. Holding an exclusive `flock` on
//! it serializes every operation on that id across threads and processes.
//! The kernel drops the lock when the descriptor closes, including when the
//! holder crashes, so a lock can never be abandoned in the held state.
//!
//! Lock files are unlinked once their record is gone. A waiter may then
//! wake up holding a lock on an unlinked inode, so [`RecordLock::acquire`]
//! re-checks that the inode it locked is still the one at the lock path and
//! retries otherwise.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// An exclusive lock on one record, released on drop.
pub(crate) struct RecordLock {
    file: File,
    path: PathBuf,
}

impl RecordLock {
    /// Block until the exclusive lock at `path` is held.
    pub(crate) fn acquire(path: &Path) -> io::Result<Self> {
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;
            lock_exclusive(&file)?;

            if is_current(&file, path)? {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                });
            }
            tracing::trace!(path = %path.display(), "Lock file replaced while waiting, retrying");
        }
    }

    /// Remove the lock file while the lock is still held.
    pub(crate) fn unlink(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        if let Err(e) = unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release record lock");
        }
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    loop {
        // SAFETY: the descriptor is owned by `file` and valid for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(unix)]
fn unlock(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor is owned by `file` and valid for the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn is_current(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match std::fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// Without flock, atomic rename alone keeps readers from seeing torn writes.
#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn is_current(_file: &File, _path: &Path) -> io::Result<bool> {
    Ok(true)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn second_holder_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job-record-1.lock");

        let first = RecordLock::acquire(&path).unwrap();
        let (tx, rx) = mpsc::channel();
        let contender_path = path.clone();
        let handle = std::thread::spawn(move || {
            let _second = RecordLock::acquire(&contender_path).unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(first);
        rx.recv_timeout(Duration::from_secs(5))
            .expect("second holder should acquire after release");
        handle.join().unwrap();
    }

    #[test]
    fn waiter_retries_after_unlink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job-record-2.lock");

        let first = RecordLock::acquire(&path).unwrap();
        let contender_path = path.clone();
        let handle = std::thread::spawn(move || {
            let second = RecordLock::acquire(&contender_path).unwrap();
            is_current(&second.file, &contender_path).unwrap()
        });

        std::thread::sleep(Duration::from_millis(50));
        first.unlink().unwrap();
        drop(first);

        assert!(handle.join().unwrap(), "waiter must end up on the live lock file");
    }

    #[test]
    fn independent_paths_do_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let _a = RecordLock::acquire(&dir.path().join("job-record-a.lock")).unwrap();
        let _b = RecordLock::acquire(&dir.path().join("job-record-b.lock")).unwrap();
    }
}
