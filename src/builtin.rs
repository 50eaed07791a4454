use crate::env::Environment;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in the shell process, always in the foreground.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Return value follows shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<i32>;
}

/// Object-safe handle to a parsed built-in, ready to run.
pub trait ExecutableBuiltin {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<i32>;
}

impl<T: BuiltinCommand> ExecutableBuiltin for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<i32> {
        match <T as BuiltinCommand>::execute(*self, stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(io::stderr(), "{:#}", e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableBuiltin for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _env: &mut Environment) -> Result<i32> {
        writeln!(stdout, "{}", self.output.trim_end())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

/// Creates a built-in from a command name and its arguments.
///
/// Returns `None` when the name belongs to some other command.
pub trait BuiltinFactory {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableBuiltin>>;
}

pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> BuiltinFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableBuiltin>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

/// `exit`, `status` and `cd`.
pub fn default_builtins() -> Vec<Box<dyn BuiltinFactory>> {
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Status>::default()),
        Box::new(Factory::<Cd>::default()),
    ]
}

#[derive(FromArgs)]
/// Change the working directory of the shell and of every later child.
pub struct Cd {
    #[argh(positional)]
    /// new working directory, $HOME when omitted.
    pub dir: Option<PathBuf>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<i32> {
        let dir = match self.dir {
            Some(dir) => dir,
            None => env.get_var("HOME").map(PathBuf::from).context("cd: HOME is not set")?,
        };

        // An absolute `dir` replaces the base entirely.
        let resolved = env
            .current_dir
            .join(&dir)
            .canonicalize()
            .with_context(|| format!("cd: {}", dir.display()))?;
        env::set_current_dir(&resolved)
            .with_context(|| format!("cd: {}", resolved.display()))?;

        log::debug!("working directory is now {}", resolved.display());
        env.current_dir = resolved;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print how the last foreground command ended.
pub struct Status {}

impl BuiltinCommand for Status {
    fn name() -> &'static str {
        "status"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<i32> {
        writeln!(stdout, "{}", env.last_status)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Terminate background jobs and leave the shell.
pub struct Exit {
    #[argh(positional)]
    /// exit code of the shell, 0 when omitted.
    pub code: Option<i32>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<i32> {
        let code = self.code.unwrap_or(0);
        env.exit_request = Some(code);
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ExitStatus;
    use std::fs;

    fn run(name: &str, args: &[&str], env: &mut Environment) -> (i32, String) {
        let cmd = default_builtins()
            .iter()
            .find_map(|f| f.try_create(name, args))
            .expect("builtin exists");
        let mut out = Vec::new();
        let code = cmd.execute(&mut out, env).unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_unknown_name_is_not_a_builtin() {
        assert!(default_builtins().iter().all(|f| f.try_create("ls", &[]).is_none()));
        // Names are matched exactly, not by prefix.
        assert!(default_builtins().iter().all(|f| f.try_create("exitnow", &[]).is_none()));
    }

    #[test]
    fn test_status_prints_last_status() {
        let mut env = Environment::new();
        assert_eq!(run("status", &[], &mut env), (0, "exit value 0\n".to_string()));

        env.last_status = ExitStatus::KilledBySignal(2);
        assert_eq!(
            run("status", &[], &mut env),
            (0, "terminated by signal 2\n".to_string())
        );
    }

    #[test]
    fn test_exit_requests_shutdown() {
        let mut env = Environment::new();
        run("exit", &[], &mut env);
        assert_eq!(env.exit_request, Some(0));

        let mut env = Environment::new();
        run("exit", &["3"], &mut env);
        assert_eq!(env.exit_request, Some(3));
    }

    #[test]
    fn test_bad_arguments_report_usage() {
        let mut env = Environment::new();
        let (code, out) = run("status", &["extra"], &mut env);
        assert_eq!(code, 1);
        assert!(!out.is_empty());
    }

    #[test]
    fn test_cd_to_missing_directory_fails() {
        let mut env = Environment::new();
        let before = env.current_dir.clone();
        let (code, _) = run("cd", &["/definitely/not/a/dir/8841"], &mut env);
        assert_eq!(code, 1);
        assert_eq!(env.current_dir, before);
    }

    #[test]
    fn test_cd_absolute_then_relative() {
        let saved = std::env::current_dir().expect("cwd");
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let mut env = Environment::new();

        let (first, _) = run("cd", &[dir.path().to_str().unwrap()], &mut env);
        let after_first = env.current_dir.clone();
        let (second, _) = run("cd", &["sub"], &mut env);
        let process_cwd = std::env::current_dir().expect("cwd");
        std::env::set_current_dir(&saved).ok();

        let root = fs::canonicalize(dir.path()).unwrap();
        assert_eq!((first, second), (0, 0));
        assert_eq!(after_first, root);
        assert_eq!(env.current_dir, root.join("sub"));
        assert_eq!(process_cwd, root.join("sub"));
    }
}
