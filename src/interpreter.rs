use crate::builtin::{BuiltinFactory, ExecutableBuiltin, default_builtins};
use crate::command::{Command, ExitStatus, Outcome};
use crate::config::ShellConfig;
use crate::env::Environment;
use crate::expand::expand_current;
use crate::jobs::JobTable;
use crate::launcher::{CHILD_FAILURE, Launcher, wait_for};
use crate::parser::{self, ParsingError};
use crate::redirect::StdoutRedirect;
use crate::signals::{SignalManager, select_posture};
use anyhow::Context;
use rustyline::error::ReadlineError;
use rustyline::{
    Cmd, ConditionalEventHandler, DefaultEditor, Event, EventContext, EventHandler, KeyEvent,
    RepeatCount,
};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The read-eval loop: prompts, parses, dispatches and reaps.
///
/// Built-ins run in-process; everything else goes through the [`Launcher`].
/// Background pids are tracked in a [`JobTable`] and reported at the start
/// of the next iteration, together with foreground-only mode changes.
///
/// Example
/// ```
/// use smallsh::{Interpreter, ShellConfig};
/// let mut sh = Interpreter::new(ShellConfig::default());
/// let mut out = Vec::new();
/// sh.execute_line("status", &mut out).unwrap();
/// assert_eq!(out, b"exit value 0\n");
/// ```
pub struct Interpreter {
    config: ShellConfig,
    env: Environment,
    builtins: Vec<Box<dyn BuiltinFactory>>,
    signals: SignalManager,
    launcher: Launcher,
    jobs: JobTable,
}

impl Interpreter {
    /// Create an interpreter. Signal dispositions are left alone until
    /// [`Interpreter::install_signal_posture`] is called.
    pub fn new(config: ShellConfig) -> Self {
        Self {
            env: Environment::new(),
            builtins: default_builtins(),
            signals: SignalManager::new(),
            launcher: Launcher::new(config.null_device.clone(), select_posture),
            jobs: JobTable::with_capacity(config.job_capacity),
            config,
        }
    }

    /// Ignore SIGINT and latch SIGTSTP as a mode toggle.
    pub fn install_signal_posture(&self) -> io::Result<()> {
        self.signals.install()
    }

    pub fn signals(&self) -> &SignalManager {
        &self.signals
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    /// Report a pending mode change and every finished background job.
    pub fn housekeeping(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if let Some(mode) = self.signals.poll() {
            writeln!(out, "{}", mode.announcement())?;
        }
        for (pid, status) in self.jobs.poll_all() {
            writeln!(out, "background pid {} is done: {}", pid, status)?;
        }
        out.flush()
    }

    /// Expand, parse and run one input line.
    ///
    /// Problems with the line itself or with a single command are reported
    /// and swallowed; only errors that leave the shell unable to continue are
    /// returned.
    pub fn execute_line(&mut self, line: &str, out: &mut dyn Write) -> anyhow::Result<()> {
        let len = line.chars().count();
        if len > self.config.max_line_len {
            let err = ParsingError::LineTooLong {
                len,
                max: self.config.max_line_len,
            };
            eprintln!("smallsh: {}", err);
            return Ok(());
        }

        let expanded = expand_current(line);
        let mut cmd = match parser::parse_with_limit(&expanded, self.config.max_args) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return Ok(()),
            Err(err) => {
                eprintln!("smallsh: {}", err);
                return Ok(());
            }
        };
        self.signals.apply(&mut cmd);

        let args: Vec<&str> = cmd.args().iter().map(String::as_str).collect();
        let builtin = self
            .builtins
            .iter()
            .find_map(|factory| factory.try_create(cmd.program(), &args));
        if let Some(builtin) = builtin {
            let code = self.run_builtin(builtin, &cmd, out)?;
            self.env.last_status = ExitStatus::ExitedWithCode(code);
            return Ok(());
        }

        self.run_external(&cmd, out)
    }

    fn run_builtin(
        &mut self,
        builtin: Box<dyn ExecutableBuiltin>,
        cmd: &Command,
        out: &mut dyn Write,
    ) -> anyhow::Result<i32> {
        let Some(path) = &cmd.output_path else {
            return builtin.execute(out, &mut self.env);
        };
        let _guard = match StdoutRedirect::to_file(Path::new(path)) {
            Ok(guard) => guard,
            Err(err) => {
                eprintln!("smallsh: cannot open {} for output: {}", path, err);
                return Ok(CHILD_FAILURE);
            }
        };
        builtin.execute(&mut io::stdout().lock(), &mut self.env)
    }

    fn run_external(&mut self, cmd: &Command, out: &mut dyn Write) -> anyhow::Result<()> {
        if cmd.background && self.jobs.is_full() {
            eprintln!(
                "smallsh: too many background jobs ({} running), not starting {}",
                self.jobs.len(),
                cmd.program()
            );
            return Ok(());
        }

        // Anything still buffered would be duplicated into the child.
        out.flush()?;
        match self.launcher.launch(cmd) {
            Ok(Outcome::Foreground(status)) => {
                if let ExitStatus::KilledBySignal(_) = status {
                    writeln!(out, "{}", status)?;
                }
                self.env.last_status = status;
            }
            Ok(Outcome::BackgroundStarted(pid)) => {
                writeln!(out, "background pid is {}", pid)?;
                if let Err(full) = self.jobs.register(pid) {
                    eprintln!("smallsh: {}, waiting for it in the foreground", full);
                    self.env.last_status = wait_for(pid)?;
                }
            }
            Err(err) if err.is_fatal() => return Err(err).context("shell cannot continue"),
            Err(err) => eprintln!("smallsh: {}", err),
        }
        out.flush()?;
        Ok(())
    }

    /// Terminate remaining background jobs and return the shell's exit code.
    pub fn shutdown(&mut self) -> i32 {
        let signalled = self.jobs.terminate_all();
        if signalled > 0 {
            log::debug!("sent SIGTERM to {} background jobs", signalled);
        }
        self.env.exit_request.unwrap_or(0)
    }

    /// Prompt for lines until `exit` or end of input. Returns the exit code.
    pub fn repl(&mut self) -> anyhow::Result<i32> {
        let mut rl = DefaultEditor::new()?;
        // Raw mode turns Ctrl-Z into a key press instead of SIGTSTP.
        rl.bind_sequence(
            KeyEvent::ctrl('Z'),
            EventHandler::Conditional(Box::new(RaiseToggle(self.signals.pending_flag()))),
        );

        let mut stdout = io::stdout();
        while !self.env.should_exit() {
            self.housekeeping(&mut stdout)?;
            match rl.readline(&self.config.prompt) {
                Ok(line) => self.execute_line(&line, &mut stdout)?,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err).context("cannot read input"),
            }
        }

        Ok(self.shutdown())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

/// Ctrl-Z at the prompt behaves like a SIGTSTP delivered to the shell.
struct RaiseToggle(Arc<AtomicBool>);

impl ConditionalEventHandler for RaiseToggle {
    fn handle(&self, _: &Event, _: RepeatCount, _: bool, _: &EventContext) -> Option<Cmd> {
        self.0.store(true, Ordering::SeqCst);
        Some(Cmd::Noop)
    }
}
