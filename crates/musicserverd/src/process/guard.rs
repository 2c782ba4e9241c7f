//! PID-file ownership: exclusive acquisition and guaranteed removal.
//!
//! A running server holds an advisory `flock` on a sibling `<pid file>.lock`
//! for its whole lifetime. Every starter must take that lock before it may
//! touch the PID file, so stale-file replacement never races with another
//! starter and a server that is alive can always be told apart from one that
//! merely left its file behind.

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::files::create_exclusive;

/// Attempts before giving up when the lock file keeps being replaced under us.
const MAX_ACQUIRE_ATTEMPTS: usize = 8;

const LOCK_SUFFIX: &str = ".lock";

/// What currently occupies a PID-file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Occupant {
    /// No file exists.
    Vacant,
    /// A file names a process that is no longer alive, this process, or
    /// holds no usable PID.
    Stale {
        /// Raw file contents.
        contents: String,
    },
    /// A file names another live process.
    Live {
        /// PID recorded in the file.
        pid: u32,
    },
}

/// Path of the advisory lock guarding the PID file at `path`.
pub(crate) fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

/// Inspects the PID file at `path` without modifying it.
///
/// A recorded PID equal to `own` is stale: it can only be left over from an
/// earlier process that happened to get the same PID.
pub(crate) fn inspect(path: &Path, own: u32) -> Result<Occupant, LaunchError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Occupant::Vacant),
        Err(source) => {
            return Err(LaunchError::PidRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    match parse_pid(&contents) {
        Some(pid) if pid != own && check_process(pid)? => Ok(Occupant::Live { pid }),
        _ => Ok(Occupant::Stale { contents }),
    }
}

/// Fails when another server holds the lock or a live process holds `path`.
///
/// Runs before detaching so the common conflict is reported on the caller's
/// terminal. Nothing is created and no lock is kept; [`acquire`] repeats the
/// check under the lock afterwards.
pub(crate) fn ensure_not_running(path: &Path) -> Result<(), LaunchError> {
    let lock = lock_path(path);
    match File::open(&lock) {
        Ok(file) => drop(try_lock(file, &lock)?),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(LaunchError::LockOpen { path: lock, source }),
    }
    match inspect(path, std::process::id())? {
        Occupant::Live { pid } => Err(already_running(path, pid)),
        Occupant::Vacant | Occupant::Stale { .. } => Ok(()),
    }
}

/// Takes the lock for `path` and creates the PID file recording `pid`.
///
/// A held lock fails with [`LaunchError::Locked`]. Under the lock, a file
/// naming another live process fails with [`LaunchError::AlreadyRunning`] and
/// is left untouched; any other existing file is stale and replaced.
pub(crate) fn acquire(path: &Path, pid: u32) -> Result<PidFileLease, LaunchError> {
    let lock = PidLock::take(lock_path(path))?;
    match inspect(path, pid) {
        Ok(Occupant::Live { pid: holder }) => {
            lock.release();
            return Err(already_running(path, holder));
        }
        Ok(Occupant::Stale { contents }) => {
            warn!(
                target: PROCESS_TARGET,
                file = %path.display(),
                recorded = contents.trim(),
                "existing server not detected; replacing stale pid file"
            );
            if let Err(error) = remove_stale(path) {
                lock.release();
                return Err(error);
            }
        }
        Ok(Occupant::Vacant) => {}
        Err(error) => {
            lock.release();
            return Err(error);
        }
    }
    if let Err(source) = create_exclusive(path, format!("{pid}\n").as_bytes()) {
        lock.release();
        return Err(LaunchError::PidWrite {
            path: path.to_path_buf(),
            source,
        });
    }
    info!(
        target: PROCESS_TARGET,
        pid,
        file = %path.display(),
        "pid file written"
    );
    Ok(PidFileLease {
        path: path.to_path_buf(),
        pid,
        lock,
    })
}

fn already_running(path: &Path, pid: u32) -> LaunchError {
    info!(
        target: PROCESS_TARGET,
        pid,
        file = %path.display(),
        "refusing to start: existing server alive"
    );
    LaunchError::AlreadyRunning {
        pid,
        path: path.to_path_buf(),
    }
}

/// Exclusive advisory lock on the lock file, held until released or dropped.
struct PidLock {
    path: PathBuf,
    file: Flock<File>,
}

impl PidLock {
    fn take(path: PathBuf) -> Result<Self, LaunchError> {
        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .mode(0o644)
                .open(&path)
                .map_err(|source| LaunchError::LockOpen {
                    path: path.clone(),
                    source,
                })?;
            let locked = try_lock(file, &path)?;
            // The previous holder unlinks the lock file on exit; a lock taken
            // on an unlinked inode guards nothing.
            if still_linked(&locked, &path)? {
                return Ok(Self { path, file: locked });
            }
            debug!(
                target: PROCESS_TARGET,
                file = %path.display(),
                "lock file replaced while locking; retrying"
            );
        }
        Err(LaunchError::PidContention { path })
    }

    /// Unlinks the lock file if it is still ours, then unlocks.
    fn release(self) {
        match still_linked(&self.file, &self.path) {
            Ok(true) => {
                if let Err(error) = fs::remove_file(&self.path) {
                    warn!(
                        target: PROCESS_TARGET,
                        file = %self.path.display(),
                        error = %error,
                        "failed to remove lock file"
                    );
                }
            }
            Ok(false) => {}
            Err(error) => warn!(
                target: PROCESS_TARGET,
                error = %error,
                "failed to inspect lock file"
            ),
        }
    }
}

fn try_lock(file: File, path: &Path) -> Result<Flock<File>, LaunchError> {
    Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| {
        if errno == Errno::EWOULDBLOCK {
            info!(
                target: PROCESS_TARGET,
                file = %path.display(),
                "refusing to start: lock held by another server"
            );
            LaunchError::Locked {
                path: path.to_path_buf(),
            }
        } else {
            LaunchError::Lock {
                path: path.to_path_buf(),
                source: errno,
            }
        }
    })
}

fn still_linked(file: &File, path: &Path) -> Result<bool, LaunchError> {
    let lock_error = |source| LaunchError::LockOpen {
        path: path.to_path_buf(),
        source,
    };
    let held = file.metadata().map_err(lock_error)?;
    match fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(lock_error(source)),
    }
}

/// Ownership of a PID file written by this process, with its lock.
pub(crate) struct PidFileLease {
    path: PathBuf,
    pid: u32,
    lock: PidLock,
}

impl fmt::Debug for PidFileLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PidFileLease")
            .field("path", &self.path)
            .field("pid", &self.pid)
            .field("lock", &self.lock.path)
            .finish()
    }
}

impl PidFileLease {
    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Removes the PID file if it still names this process, then the lock.
    ///
    /// Failures are logged, never returned: teardown must not mask the
    /// outcome of the run it follows.
    fn remove(self) {
        self.remove_pid_file();
        self.lock.release();
    }

    fn remove_pid_file(&self) {
        match fs::read_to_string(&self.path) {
            Ok(contents) if parse_pid(&contents) != Some(self.pid) => {
                warn!(
                    target: PROCESS_TARGET,
                    pid = self.pid,
                    file = %self.path.display(),
                    recorded = contents.trim(),
                    "pid file now belongs to another process; leaving it in place"
                );
                return;
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                warn!(
                    target: PROCESS_TARGET,
                    file = %self.path.display(),
                    "pid file already removed"
                );
                return;
            }
            Ok(_) | Err(_) => {}
        }
        match fs::remove_file(&self.path) {
            Ok(()) => info!(
                target: PROCESS_TARGET,
                file = %self.path.display(),
                "pid file removed"
            ),
            Err(error) => warn!(
                target: PROCESS_TARGET,
                file = %self.path.display(),
                error = %error,
                "failed to remove pid file"
            ),
        }
    }
}

/// Idempotent PID-file removal shared by every exit path.
///
/// The normal return path, unwinding, and the shutdown-signal listener all
/// hold the same teardown; whichever runs first removes the file and the rest
/// find nothing left to do.
#[derive(Debug, Default)]
pub(crate) struct Teardown {
    lease: Mutex<Option<PidFileLease>>,
}

impl Teardown {
    /// Registers the lease to release when teardown runs.
    pub(crate) fn arm(&self, lease: PidFileLease) {
        *self.lease.lock().unwrap_or_else(PoisonError::into_inner) = Some(lease);
    }

    /// Releases the armed lease. Returns `true` only for the call that did.
    pub(crate) fn run(&self) -> bool {
        let lease = self
            .lease
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match lease {
            Some(lease) => {
                lease.remove();
                true
            }
            None => false,
        }
    }
}

fn parse_pid(contents: &str) -> Option<u32> {
    contents.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

fn remove_stale(path: &Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LaunchError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn check_process(pid: u32) -> Result<bool, LaunchError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(errno) => Err(LaunchError::CheckProcess { pid, source: errno }),
    }
}
