use crate::jobs::DEFAULT_CAPACITY;
use crate::launcher::NULL_DEVICE;
use crate::parser::MAX_ARGS;
use argh::FromArgs;

/// Longest input line accepted, before `$$` expansion.
pub const MAX_LINE_LEN: usize = 2048;

/// Limits and defaults of one shell session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    pub max_line_len: usize,
    pub max_args: usize,
    pub job_capacity: usize,
    /// Stands in for unset redirections of background jobs.
    pub null_device: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "$ ".to_string(),
            max_line_len: MAX_LINE_LEN,
            max_args: MAX_ARGS,
            job_capacity: DEFAULT_CAPACITY,
            null_device: NULL_DEVICE.to_string(),
        }
    }
}

#[derive(FromArgs, Debug)]
/// A small interactive shell with redirection and background jobs.
pub struct Options {
    #[argh(option)]
    /// prompt printed before each line, "$ " when omitted.
    pub prompt: Option<String>,

    #[argh(option)]
    /// how many background jobs may run at once, 10 when omitted.
    pub jobs: Option<usize>,

    #[argh(switch, short = 'v')]
    /// log debug information to standard error.
    pub verbose: bool,
}

impl Options {
    pub fn into_config(self) -> ShellConfig {
        let defaults = ShellConfig::default();
        ShellConfig {
            prompt: self.prompt.unwrap_or(defaults.prompt),
            job_capacity: self.jobs.unwrap_or(defaults.job_capacity),
            ..defaults
        }
    }
}
