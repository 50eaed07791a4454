//! Forks, redirects and executes external programs.

use crate::command::{Command, ExitStatus, Outcome};
use crate::signals::{Posture, PostureSelector, select_posture};
use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use nix::sys::wait::waitpid;
use nix::unistd::{ForkResult, Pid, close, dup2, execvp, fork, write};
use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::io::RawFd;
use thiserror::Error;

/// Exit code of a child that could not set up its redirections or exec its program.
pub const CHILD_FAILURE: i32 = 1;

/// Default sink and source for background jobs that do not redirect.
pub const NULL_DEVICE: &str = "/dev/null";

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("cannot create a child process: {0}")]
    Fork(#[source] Errno),
    #[error("waiting for pid {pid} failed: {source}")]
    Wait {
        pid: Pid,
        #[source]
        source: Errno,
    },
    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),
    #[error("no program to run")]
    EmptyCommand,
}

impl LaunchError {
    /// Whether the shell itself can no longer continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LaunchError::Fork(_) | LaunchError::Wait { .. })
    }
}

/// Starts external commands in child processes.
pub struct Launcher {
    null_device: String,
    selector: PostureSelector,
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new(NULL_DEVICE, select_posture)
    }
}

impl Launcher {
    pub fn new(null_device: impl Into<String>, selector: PostureSelector) -> Self {
        Self {
            null_device: null_device.into(),
            selector,
        }
    }

    /// Run `cmd` in a new child process.
    ///
    /// Background commands return as soon as the child exists. Foreground
    /// commands block until the child terminates. Failures inside the child
    /// (bad redirect, unknown program) show up as an [`ExitStatus`] of
    /// [`CHILD_FAILURE`], never as an `Err`.
    pub fn launch(&self, cmd: &Command) -> Result<Outcome, LaunchError> {
        let plan = ChildPlan::prepare(cmd, &self.null_device, (self.selector)(cmd.background))?;

        // SAFETY: the shell is single-threaded; the child only touches
        // dispositions and descriptors before exec or _exit.
        match unsafe { fork() }.map_err(LaunchError::Fork)? {
            ForkResult::Child => plan.exec(),
            ForkResult::Parent { child } => {
                log::debug!("started pid {} for {:?}", child, cmd.program_and_args);
                if cmd.background {
                    Ok(Outcome::BackgroundStarted(child))
                } else {
                    wait_for(child).map(Outcome::Foreground)
                }
            }
        }
    }
}

/// Block until `pid` terminates.
pub fn wait_for(pid: Pid) -> Result<ExitStatus, LaunchError> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => match ExitStatus::from_wait_status(status) {
                Some(exit) => {
                    log::debug!("pid {} finished: {}", pid, exit);
                    return Ok(exit);
                }
                None => log::trace!("ignoring non-terminal status {:?}", status),
            },
            Err(Errno::EINTR) => continue,
            Err(source) => return Err(LaunchError::Wait { pid, source }),
        }
    }
}

/// Everything the child needs, converted before the fork.
struct ChildPlan {
    argv: Vec<CString>,
    input: Option<CString>,
    output: Option<CString>,
    posture: Posture,
}

impl ChildPlan {
    fn prepare(cmd: &Command, null_device: &str, posture: Posture) -> Result<Self, LaunchError> {
        if cmd.program_and_args.is_empty() {
            return Err(LaunchError::EmptyCommand);
        }
        let argv = cmd
            .program_and_args
            .iter()
            .map(|arg| to_cstring(arg))
            .collect::<Result<Vec<_>, _>>()?;

        let mut input = cmd.input_path.as_deref();
        let mut output = cmd.output_path.as_deref();
        if cmd.background {
            input = input.or(Some(null_device));
            output = output.or(Some(null_device));
        }

        Ok(Self {
            argv,
            input: input.map(to_cstring).transpose()?,
            output: output.map(to_cstring).transpose()?,
            posture,
        })
    }

    /// Runs in the child; never returns into shell code.
    fn exec(self) -> ! {
        if let Err(err) = self.posture.apply() {
            fail(format_args!("cannot set signal dispositions: {}", err));
        }

        if let Some(path) = &self.input {
            if let Err(err) = bind(path, OFlag::O_RDONLY, Mode::empty(), 0) {
                fail(format_args!("cannot open {} for input: {}", path.to_string_lossy(), err));
            }
        }

        if let Some(path) = &self.output {
            let flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
            if let Err(err) = bind(path, flags, Mode::S_IRUSR | Mode::S_IWUSR, 1) {
                fail(format_args!("cannot open {} for output: {}", path.to_string_lossy(), err));
            }
        }

        let err = match execvp(&self.argv[0], &self.argv) {
            Ok(never) => match never {},
            Err(err) => err,
        };
        fail(format_args!("{}: {}", self.argv[0].to_string_lossy(), err))
    }
}

fn to_cstring(arg: &str) -> Result<CString, LaunchError> {
    CString::new(arg).map_err(|_| LaunchError::InvalidArgument(arg.to_string()))
}

/// Open `path` and make it descriptor `target`.
fn bind(path: &CStr, flags: OFlag, mode: Mode, target: RawFd) -> nix::Result<()> {
    let fd = open(path, flags, mode)?;
    if fd != target {
        dup2(fd, target)?;
        close(fd)?;
    }
    Ok(())
}

/// Report a setup failure and leave the child.
///
/// Bypasses the locked `Stderr` handle, which another thread of the parent
/// may have held at fork time.
fn fail(message: std::fmt::Arguments<'_>) -> ! {
    let line = format!("smallsh: {}\n", message);
    let _ = write(io::stderr(), line.as_bytes());
    // SAFETY: `_exit` skips atexit handlers and stdio flushing, so nothing
    // inherited from the shell runs in the child.
    unsafe { nix::libc::_exit(CHILD_FAILURE) }
}
