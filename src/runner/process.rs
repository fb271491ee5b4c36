//! Worker process abstraction
//!
//! The supervisor talks to the worker only through [`Launcher`] and
//! [`WorkerProcess`], so tests can script exit codes without spawning anything.

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

/// A live worker process.
pub trait WorkerProcess: Send {
    fn id(&self) -> u32;

    /// Non-blocking exit check. `Some(code)` once the process has exited;
    /// a process killed by a signal reports the negated signal number.
    fn try_wait(&mut self) -> io::Result<Option<i32>>;

    /// Ask the process to stop without waiting for it.
    fn request_stop(&mut self) -> io::Result<()>;

    /// Ask the process to stop, escalate to a kill after `grace`, then reap it.
    fn terminate(&mut self, grace: Duration) -> io::Result<()>;
}

/// Starts worker processes.
pub trait Launcher {
    fn launch(
        &mut self,
        command: &[OsString],
        stdout: File,
        stderr: File,
    ) -> io::Result<Box<dyn WorkerProcess>>;
}

/// Time source for run deadlines.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Launches real OS processes.
#[derive(Debug, Default)]
pub struct SystemLauncher;

impl SystemLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Launcher for SystemLauncher {
    fn launch(
        &mut self,
        command: &[OsString],
        stdout: File,
        stderr: File,
    ) -> io::Result<Box<dyn WorkerProcess>> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()?;

        debug!("Spawned worker process {}", child.id());
        Ok(Box::new(ChildProcess { child }))
    }
}

/// Worker backed by [`std::process::Child`]. Terminated on drop if still running.
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl WorkerProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(exit_code))
    }

    fn request_stop(&mut self) -> io::Result<()> {
        if !self.is_alive() {
            return Ok(());
        }
        match send_sigterm(self.child.id()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Unsupported => self.child.kill(),
            Err(e) => Err(e),
        }
    }

    fn terminate(&mut self, grace: Duration) -> io::Result<()> {
        if !self.is_alive() {
            return Ok(());
        }

        // Graceful: SIGTERM first, then SIGKILL once the grace period runs out
        if send_sigterm(self.child.id()).is_ok() {
            let deadline = Instant::now() + grace;
            while Instant::now() < deadline {
                if !self.is_alive() {
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(20));
            }
        }

        if self.is_alive() {
            self.child.kill()?;
        }
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.terminate(Duration::from_millis(50));
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Send SIGTERM to a process. Returns `Err` if the signal could not be delivered.
#[cfg(unix)]
fn send_sigterm(pid: u32) -> io::Result<()> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "graceful termination is not supported on this platform",
    ))
}
