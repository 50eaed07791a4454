use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use std::fmt;

/// One parsed input line, ready to be dispatched.
///
/// `program_and_args[0]` is the program (or built-in) name. The parser never
/// produces an empty command; the launcher rejects one built by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Program name followed by its arguments, in input order.
    pub program_and_args: Vec<String>,
    /// File to bind to standard input; `None` inherits the shell's descriptor.
    pub input_path: Option<String>,
    /// File to bind to standard output; `None` inherits the shell's descriptor.
    pub output_path: Option<String>,
    /// Run asynchronously and report the pid instead of waiting.
    pub background: bool,
}

impl Command {
    /// Build a foreground command without redirections.
    pub fn new<I, S>(program_and_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program_and_args: program_and_args.into_iter().map(Into::into).collect(),
            input_path: None,
            output_path: None,
            background: false,
        }
    }

    /// The program name, or `""` for a hand-built command with no words.
    pub fn program(&self) -> &str {
        self.program_and_args.first().map_or("", String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.program_and_args.get(1..).unwrap_or_default()
    }
}

/// How a child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal termination with the given exit code.
    ExitedWithCode(i32),
    /// Terminated by the given signal number.
    KilledBySignal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::ExitedWithCode(0))
    }

    /// Terminal status carried by a `waitpid` result, or `None` while the child
    /// is still alive (or only stopped/continued).
    pub fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(ExitStatus::ExitedWithCode(code)),
            WaitStatus::Signaled(_, signal, _) => Some(ExitStatus::KilledBySignal(signal as i32)),
            _ => None,
        }
    }
}

impl Default for ExitStatus {
    fn default() -> Self {
        ExitStatus::ExitedWithCode(0)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::ExitedWithCode(code) => write!(f, "exit value {}", code),
            ExitStatus::KilledBySignal(signo) => write!(f, "terminated by signal {}", signo),
        }
    }
}

/// Result of handing a [`Command`] to the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The child ran in the foreground and has terminated.
    Foreground(ExitStatus),
    /// The child is running in the background.
    BackgroundStarted(Pid),
}
