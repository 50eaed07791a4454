//! A small line-oriented Unix shell.
//!
//! Each input line is expanded (`$$` becomes the shell's pid), parsed into a
//! [`Command`], and either handled by a built-in (`exit`, `status`, `cd`) or
//! launched as an external program. External programs may redirect their
//! standard input and output and may run in the background; finished
//! background jobs are reaped and reported once per loop iteration.
//!
//! The main entry point is [`Interpreter`]. The [`parser`], [`launcher`],
//! [`jobs`] and [`signals`] modules expose the pieces it is built from.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod expand;
mod interpreter;
pub mod jobs;
pub mod launcher;
pub mod parser;
pub mod redirect;
pub mod signals;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;

pub use command::{Command, ExitStatus, Outcome};
pub use config::ShellConfig;
