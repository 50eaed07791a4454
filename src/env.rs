use crate::command::ExitStatus;
use std::env as stdenv;
use std::path::PathBuf;

/// Shell session state that built-ins read and change.
///
/// The environment contains:
/// - `current_dir`: the working directory, kept in sync with the process.
/// - `last_status`: how the last foreground command or built-in ended, shown by `status`.
/// - `exit_request`: set by `exit`; the loop stops when it is `Some`.
#[derive(Debug, Clone)]
pub struct Environment {
    pub current_dir: PathBuf,
    pub last_status: ExitStatus,
    pub exit_request: Option<i32>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            last_status: ExitStatus::default(),
            exit_request: None,
        }
    }

    /// Get the value of a process environment variable.
    pub fn get_var(&self, key: &str) -> Option<String> {
        stdenv::var(key).ok()
    }

    pub fn should_exit(&self) -> bool {
        self.exit_request.is_some()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;
    use crate::command::ExitStatus;

    #[test]
    fn test_env_starts_clean() {
        let env = Environment::new();
        assert_eq!(env.last_status, ExitStatus::ExitedWithCode(0));
        assert!(!env.should_exit());
        assert!(env.current_dir.is_absolute());
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);
    }
}
