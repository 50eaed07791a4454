//! Signal dispositions for the shell and the children it spawns.
//!
//! The shell ignores SIGINT so that Ctrl-C only reaches foreground children,
//! and uses SIGTSTP (Ctrl-Z) to switch foreground-only mode on and off. The
//! handler only sets a flag; [`SignalManager::poll`] turns that flag into a
//! mode change once per loop iteration.

use crate::command::Command;
use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// `&` starts background jobs.
    #[default]
    Normal,
    /// `&` is ignored and every command runs in the foreground.
    ForegroundOnly,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Normal => Mode::ForegroundOnly,
            Mode::ForegroundOnly => Mode::Normal,
        }
    }

    /// Message printed when the shell enters this mode.
    pub fn announcement(self) -> &'static str {
        match self {
            Mode::ForegroundOnly => "Entering foreground-only mode (& is now ignored)",
            Mode::Normal => "Exiting foreground-only mode",
        }
    }
}

/// What a process does when it receives a given signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ignore,
    Default,
    /// Latch a mode toggle for the shell's next loop iteration.
    ToggleMode,
}

/// The set of dispositions an execution context holds for SIGINT and SIGTSTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    Shell,
    ForegroundChild,
    BackgroundChild,
}

/// Maps a command's background flag to the posture its child takes.
pub type PostureSelector = fn(bool) -> Posture;

/// The standard posture selector.
pub fn select_posture(background: bool) -> Posture {
    if background {
        Posture::BackgroundChild
    } else {
        Posture::ForegroundChild
    }
}

impl Posture {
    pub fn interrupt(self) -> Disposition {
        match self {
            Posture::Shell | Posture::BackgroundChild => Disposition::Ignore,
            Posture::ForegroundChild => Disposition::Default,
        }
    }

    pub fn interactive_stop(self) -> Disposition {
        match self {
            Posture::Shell => Disposition::ToggleMode,
            Posture::ForegroundChild | Posture::BackgroundChild => Disposition::Ignore,
        }
    }

    /// Install this posture's dispositions in the current process.
    ///
    /// Intended for a freshly forked child before `exec`. The shell posture
    /// needs the pending flag owned by a [`SignalManager`] and is rejected
    /// with `EINVAL` here; use [`SignalManager::install`] instead.
    ///
    /// SIGPIPE is put back to its default as well: the Rust runtime ignores
    /// it in the shell, and an ignored disposition survives `exec`.
    pub fn apply(self) -> nix::Result<()> {
        if matches!(self, Posture::Shell) {
            return Err(Errno::EINVAL);
        }
        set_disposition(Signal::SIGPIPE, Disposition::Default)?;
        set_disposition(Signal::SIGINT, self.interrupt())?;
        set_disposition(Signal::SIGTSTP, self.interactive_stop())
    }
}

fn set_disposition(signal: Signal, disposition: Disposition) -> nix::Result<()> {
    let handler = match disposition {
        Disposition::Ignore => SigHandler::SigIgn,
        Disposition::Default => SigHandler::SigDfl,
        Disposition::ToggleMode => return Err(Errno::EINVAL),
    };
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    // SAFETY: only SIG_IGN / SIG_DFL are installed, no handler code runs.
    unsafe { sigaction(signal, &action) }.map(|_| ())
}

/// Owns the foreground-only mode and the flag SIGTSTP raises.
#[derive(Debug, Default)]
pub struct SignalManager {
    pending: Arc<AtomicBool>,
    mode: Mode,
}

impl SignalManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put the calling process into the shell posture.
    pub fn install(&self) -> io::Result<()> {
        set_disposition(Signal::SIGINT, Posture::Shell.interrupt())?;
        signal_hook::flag::register(Signal::SIGTSTP as i32, Arc::clone(&self.pending))?;
        log::debug!("shell signal posture installed");
        Ok(())
    }

    /// Handle to the pending-toggle flag. Setting it has the same effect as a SIGTSTP.
    pub fn pending_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.pending)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Consume a pending toggle, if any, and return the new mode.
    ///
    /// Any number of SIGTSTPs received since the previous poll count as one.
    pub fn poll(&mut self) -> Option<Mode> {
        if !self.pending.swap(false, Ordering::SeqCst) {
            return None;
        }
        self.mode = self.mode.toggled();
        log::debug!("signal mode switched to {:?}", self.mode);
        Some(self.mode)
    }

    /// Force `cmd` into the foreground while in foreground-only mode.
    pub fn apply(&self, cmd: &mut Command) {
        if self.mode == Mode::ForegroundOnly {
            cmd.background = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posture_table() {
        assert_eq!(Posture::Shell.interrupt(), Disposition::Ignore);
        assert_eq!(Posture::Shell.interactive_stop(), Disposition::ToggleMode);
        assert_eq!(Posture::ForegroundChild.interrupt(), Disposition::Default);
        assert_eq!(Posture::ForegroundChild.interactive_stop(), Disposition::Ignore);
        assert_eq!(Posture::BackgroundChild.interrupt(), Disposition::Ignore);
        assert_eq!(Posture::BackgroundChild.interactive_stop(), Disposition::Ignore);
    }

    #[test]
    fn test_select_posture() {
        assert_eq!(select_posture(true), Posture::BackgroundChild);
        assert_eq!(select_posture(false), Posture::ForegroundChild);
    }

    #[test]
    fn test_shell_posture_cannot_be_applied_directly() {
        assert_eq!(Posture::Shell.apply(), Err(Errno::EINVAL));
    }

    #[test]
    fn test_no_toggle_without_signal() {
        let mut manager = SignalManager::new();
        assert_eq!(manager.poll(), None);
        assert_eq!(manager.mode(), Mode::Normal);
    }

    #[test]
    fn test_one_signal_one_toggle() {
        let mut manager = SignalManager::new();
        let flag = manager.pending_flag();

        // Several raises before a poll still only toggle once.
        flag.store(true, Ordering::SeqCst);
        flag.store(true, Ordering::SeqCst);
        assert_eq!(manager.poll(), Some(Mode::ForegroundOnly));
        assert_eq!(manager.poll(), None);
        assert_eq!(manager.mode(), Mode::ForegroundOnly);
    }

    #[test]
    fn test_two_toggles_return_to_normal() {
        let mut manager = SignalManager::new();
        let flag = manager.pending_flag();

        flag.store(true, Ordering::SeqCst);
        assert_eq!(manager.poll(), Some(Mode::ForegroundOnly));
        flag.store(true, Ordering::SeqCst);
        assert_eq!(manager.poll(), Some(Mode::Normal));
        assert_eq!(manager.mode(), Mode::Normal);
    }

    #[test]
    fn test_foreground_only_forces_foreground() {
        let mut manager = SignalManager::new();
        manager.pending_flag().store(true, Ordering::SeqCst);
        manager.poll();

        let mut cmd = crate::parser::parse("sleep 5 &").unwrap().unwrap();
        assert!(cmd.background);
        manager.apply(&mut cmd);
        assert!(!cmd.background);
    }

    #[test]
    fn test_normal_mode_keeps_background() {
        let manager = SignalManager::new();
        let mut cmd = crate::parser::parse("sleep 5 &").unwrap().unwrap();
        manager.apply(&mut cmd);
        assert!(cmd.background);
    }

    #[test]
    fn test_announcements() {
        assert_eq!(
            Mode::ForegroundOnly.announcement(),
            "Entering foreground-only mode (& is now ignored)"
        );
        assert_eq!(Mode::Normal.announcement(), "Exiting foreground-only mode");
    }
}
