//! Turns one raw input line into a [`Command`].
//!
//! The grammar is deliberately flat: whitespace separates tokens, a token
//! starting with `<` or `>` takes the following token as its file name, a token
//! starting with `&` requests background execution, and everything else is an
//! argument. There is no quoting.

use crate::command::Command;
use thiserror::Error;

/// Maximum number of arguments (program name included) kept per command.
pub const MAX_ARGS: usize = 512;

/// Errors that reject a single input line. The shell reports them and keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    /// A redirection operator was the last token on the line.
    #[error("no file specified for redirect '{operator}'")]
    MissingRedirectTarget { operator: char },
    /// The line is longer than the shell accepts.
    #[error("input line is {len} characters long, the limit is {max}")]
    LineTooLong { len: usize, max: usize },
}

struct CommandBuilder<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
    max_args: usize,
}

impl<'a> CommandBuilder<'a> {
    fn from(line: &'a str, max_args: usize) -> Self {
        CommandBuilder {
            tokens: line.split_whitespace().collect(),
            pos: 0,
            max_args,
        }
    }

    fn consume(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn build(mut self) -> Result<Option<Command>, ParsingError> {
        let mut argv: Vec<String> = Vec::new();
        let mut input_path = None;
        let mut output_path = None;
        let mut background = false;
        let mut dropped = 0usize;

        while let Some(token) = self.consume() {
            if token.starts_with('<') || token.starts_with('>') {
                let operator = if token.starts_with('<') { '<' } else { '>' };
                let target = self
                    .consume()
                    .ok_or(ParsingError::MissingRedirectTarget { operator })?;
                // Last redirect of each kind wins.
                if operator == '<' {
                    input_path = Some(target.to_string());
                } else {
                    output_path = Some(target.to_string());
                }
            } else if token.starts_with('&') {
                background = true;
            } else if argv.is_empty() && token.starts_with('#') {
                return Ok(None);
            } else if argv.len() < self.max_args {
                argv.push(token.to_string());
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            log::debug!("dropped {} arguments beyond the limit of {}", dropped, self.max_args);
        }

        if argv.is_empty() {
            return Ok(None);
        }

        Ok(Some(Command {
            program_and_args: argv,
            input_path,
            output_path,
            background,
        }))
    }
}

/// Parse a line with the default argument limit.
///
/// Returns `Ok(None)` for blank and comment lines, which the caller skips.
pub fn parse(line: &str) -> Result<Option<Command>, ParsingError> {
    parse_with_limit(line, MAX_ARGS)
}

/// Parse a line keeping at most `max_args` arguments; extra arguments are dropped.
pub fn parse_with_limit(line: &str, max_args: usize) -> Result<Option<Command>, ParsingError> {
    let parsed = CommandBuilder::from(line, max_args).build()?;
    log::trace!("parsed {:?} into {:?}", line, parsed);
    Ok(parsed)
}
