use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;
use tracing::{debug, warn};

use crate::Result;

/// Exclusive advisory file lock serializing CNI invocations on this host.
/// Acquisition blocks until granted; the lock is held until drop so every
/// interface update carries a fingerprint no local sibling can invalidate.
pub struct HostLock {
    file: File,
}

impl HostLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path.as_ref())?;
        file.lock_exclusive()?;
        debug!(path = %path.as_ref().display(), "acquired host lock");
        Ok(Self { file })
    }
}

impl Drop for HostLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(%e, "failed to release host lock");
        }
    }
}
