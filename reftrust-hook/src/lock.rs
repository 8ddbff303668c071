// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mutual exclusion between concurrent runs.
//!
//! Two pushes arriving at once would each read the persisted graph, mutate
//! a local copy and write it back, losing one of the updates. The whole
//! validate-and-materialize sequence therefore runs under an exclusive
//! advisory lock on a per-repository lock file; the second run blocks until
//! the first has finished.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use fs2::FileExt;

/// Exclusive lock held for the duration of one run.
#[derive(Debug)]
pub struct RunLock {
    file: File,
}

impl RunLock {
    /// Acquire the lock, blocking until it is free.
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Released on process exit anyway; unlock eagerly when we can.
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use fs2::FileExt;

    use super::RunLock;

    #[test]
    fn lock_excludes_a_second_holder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reftrust.lock");

        let lock = RunLock::acquire(&path).unwrap();
        let probe = std::fs::File::open(&path).unwrap();
        assert!(probe.try_lock_exclusive().is_err());

        drop(lock);
        assert!(probe.try_lock_exclusive().is_ok());
    }
}
