//! Temporarily rebinding the shell's own standard output.

use nix::unistd::{close, dup, dup2};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

/// While alive, standard output of this process goes to a file.
///
/// The previous descriptor is duplicated up front and put back when the guard
/// is dropped, on every path out of the scope that holds it.
#[derive(Debug)]
pub struct StdoutRedirect {
    saved: RawFd,
}

impl StdoutRedirect {
    /// Open `path` (create, truncate, mode 0600) and bind it to standard output.
    ///
    /// If the file cannot be opened, standard output is left untouched.
    pub fn to_file(path: &Path) -> io::Result<Self> {
        let target = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;

        let stdout = io::stdout();
        stdout.lock().flush()?;
        let fd = stdout.as_raw_fd();

        let saved = dup(fd)?;
        if let Err(err) = dup2(target.as_raw_fd(), fd) {
            let _ = close(saved);
            return Err(err.into());
        }
        log::trace!("stdout bound to {}", path.display());
        Ok(Self { saved })
    }
}

impl Drop for StdoutRedirect {
    fn drop(&mut self) {
        let stdout = io::stdout();
        if let Err(err) = stdout.lock().flush() {
            log::warn!("flushing redirected stdout failed: {}", err);
        }
        if let Err(err) = dup2(self.saved, stdout.as_raw_fd()) {
            log::warn!("restoring stdout failed: {}", err);
        }
        let _ = close(self.saved);
    }
}

/// Serialises tests that rebind the test binary's own standard output.
#[cfg(test)]
pub(crate) static TEST_STDOUT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
