//! Periodic runs with mutual exclusion.
//!
//! [`Scheduler`] calls a job every `interval` until shutdown is requested.
//! Each tick first takes a [`RunGuard`], a lock file created with an
//! exclusive create in the quarantine base. A tick that finds the lock held
//! (another `watch` or a manual `scan` in progress) is skipped with a warning.
//!
//! The lock file holds the owner's pid, so it is never empty and never picked
//! up by an empty-file scan of the base. A lock left behind by a killed
//! process has to be removed by hand; the warning names its path.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::signal::ShutdownHandler;

/// File name of the run lock inside the quarantine base.
pub const LOCK_FILE_NAME: &str = ".rustquarantine.lock";

/// Errors from lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run holds the lock.
    #[error("another run holds the lock: {0}")]
    Locked(PathBuf),

    /// The lock file could not be created.
    #[error("failed to create lock file {path}: {source}")]
    CreateFailed {
        /// Lock file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Exclusive run lock, released on drop.
#[derive(Debug)]
pub struct RunGuard {
    _file: File,
    lock_path: PathBuf,
}

impl RunGuard {
    /// Take the lock in `dir`, creating `dir` if needed.
    ///
    /// Non-blocking: returns [`LockError::Locked`] immediately when held.
    ///
    /// # Errors
    ///
    /// [`LockError::Locked`] or [`LockError::CreateFailed`].
    pub fn try_acquire(dir: &Path) -> Result<Self, LockError> {
        let lock_path = dir.join(LOCK_FILE_NAME);
        let create_failed = |source: io::Error| LockError::CreateFailed {
            path: lock_path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(create_failed)?;
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(LockError::Locked(lock_path));
            }
            Err(e) => return Err(create_failed(e)),
        };

        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            let _ = fs::remove_file(&lock_path);
            return Err(create_failed(e));
        }
        log::debug!("Acquired run lock {}", lock_path.display());
        Ok(Self {
            _file: file,
            lock_path,
        })
    }

    /// Get the path to the lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        log::debug!("Releasing run lock {}", self.lock_path.display());
        if let Err(e) = fs::remove_file(&self.lock_path) {
            log::warn!("Failed to remove lock {}: {}", self.lock_path.display(), e);
        }
    }
}

/// Calls a job every `interval` under a [`RunGuard`].
#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    lock_dir: PathBuf,
    shutdown: ShutdownHandler,
    max_ticks: Option<usize>,
}

impl Scheduler {
    /// Create a scheduler locking in `lock_dir`.
    #[must_use]
    pub fn new(interval: Duration, lock_dir: impl Into<PathBuf>, shutdown: ShutdownHandler) -> Self {
        Self {
            interval,
            lock_dir: lock_dir.into(),
            shutdown,
            max_ticks: None,
        }
    }

    /// Stop after `n` ticks (whether they ran or were skipped).
    #[must_use]
    pub fn with_max_ticks(mut self, n: usize) -> Self {
        self.max_ticks = Some(n);
        self
    }

    /// Run `job` once if the lock is free.
    ///
    /// Returns `Ok(None)` when the tick was skipped because the lock is held.
    ///
    /// # Errors
    ///
    /// The job's error, or a lock file that cannot be created.
    pub fn tick<T, E>(&self, job: impl FnOnce() -> Result<T, E>) -> Result<Option<T>, E>
    where
        E: From<LockError>,
    {
        let guard = match RunGuard::try_acquire(&self.lock_dir) {
            Ok(guard) => guard,
            Err(LockError::Locked(path)) => {
                log::warn!(
                    "Skipping run: lock {} is held by another run",
                    path.display()
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let result = job();
        drop(guard);
        result.map(Some)
    }

    /// Tick until shutdown is requested (or `max_ticks` is reached).
    ///
    /// A failing job is logged and the schedule continues. Returns how many
    /// ticks actually ran the job.
    pub fn run<T, E>(&self, mut job: impl FnMut() -> Result<T, E>) -> usize
    where
        E: From<LockError> + std::fmt::Display,
    {
        let mut ticks = 0;
        let mut ran = 0;
        log::info!(
            "Running every {} minute(s); press Ctrl+C to stop",
            self.interval.as_secs() / 60
        );

        loop {
            if self.shutdown.is_shutdown_requested() {
                break;
            }
            match self.tick(&mut job) {
                Ok(Some(_)) => ran += 1,
                Ok(None) => {}
                Err(e) => log::error!("Scheduled run failed: {}", e),
            }
            ticks += 1;
            if self.max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            if !self.shutdown.sleep(self.interval) {
                break;
            }
        }
        log::info!("Scheduler stopped after {} run(s)", ran);
        ran
    }
}
