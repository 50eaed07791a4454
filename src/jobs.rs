//! Fixed-capacity table of running background jobs.

use crate::command::ExitStatus;
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use thiserror::Error;

/// Number of background jobs tracked at once unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 10;

/// A background pid could not be recorded because every slot is taken.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("too many background jobs ({capacity} running), cannot track pid {pid}")]
pub struct JobTableFull {
    pub capacity: usize,
    pub pid: Pid,
}

/// Slots of background pids, reaped by polling.
///
/// Completed jobs are reported in slot order, not in the order they finished.
#[derive(Debug)]
pub struct JobTable {
    slots: Vec<Option<Pid>>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl JobTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of active jobs.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Active pids in slot order.
    pub fn active(&self) -> impl Iterator<Item = Pid> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// Store `pid` in the first free slot and return the slot index.
    pub fn register(&mut self, pid: Pid) -> Result<usize, JobTableFull> {
        let capacity = self.capacity();
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(JobTableFull { capacity, pid })?;
        *slot = Some(pid);
        log::debug!("background pid {} tracked in slot {}", pid, index);
        Ok(index)
    }

    /// Reap every finished job without blocking.
    pub fn poll_all(&mut self) -> Vec<(Pid, ExitStatus)> {
        self.poll_with(|pid| waitpid(pid, Some(WaitPidFlag::WNOHANG)))
    }

    /// Reap using `check` as the non-blocking completion check.
    pub fn poll_with<F>(&mut self, mut check: F) -> Vec<(Pid, ExitStatus)>
    where
        F: FnMut(Pid) -> nix::Result<WaitStatus>,
    {
        let mut done = Vec::new();
        for slot in self.slots.iter_mut() {
            let Some(pid) = *slot else { continue };
            match check(pid) {
                Ok(status) => {
                    if let Some(exit) = ExitStatus::from_wait_status(status) {
                        log::debug!("reaped background pid {}: {}", pid, exit);
                        *slot = None;
                        done.push((pid, exit));
                    }
                }
                Err(Errno::ECHILD) => {
                    log::warn!("background pid {} is not our child any more, dropping it", pid);
                    *slot = None;
                }
                Err(err) => log::warn!("cannot check background pid {}: {}", pid, err),
            }
        }
        done
    }

    /// Send SIGTERM to every active job. Returns how many were signalled.
    pub fn terminate_all(&mut self) -> usize {
        let mut signalled = 0;
        for pid in self.active() {
            match kill(pid, Signal::SIGTERM) {
                Ok(()) => signalled += 1,
                Err(err) => log::warn!("cannot terminate background pid {}: {}", pid, err),
            }
        }
        signalled
    }
}
