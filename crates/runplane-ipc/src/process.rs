//! Handles on spawned worker and service processes.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info};

/// How often [`ProcessHandle::wait`] re-checks the child.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Spawn `program` with `args`, inheriting stdout/stderr.
///
/// The child is not killed when the handle is dropped; whoever holds the
/// handle owns the child's lifetime.
pub fn open_ipc_subprocess<I, S>(program: &Path, args: I) -> io::Result<ProcessHandle>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).kill_on_drop(false);

    debug!("Spawning process: {:?}", cmd);
    let child = cmd.spawn()?;
    let handle = ProcessHandle::new(child);

    info!(program = %program.display(), pid = ?handle.pid(), "Process spawned");
    Ok(handle)
}

/// Shell-style exit code: the status code, or `128 + signal` for a child
/// killed by a signal.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

/// Shared handle on a child process.
///
/// Clones refer to the same child. [`terminate`](Self::terminate) and
/// [`kill`](Self::kill) can be called any number of times and do nothing
/// once the child has exited.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: Option<u32>,
    child: Arc<Mutex<Child>>,
}

impl ProcessHandle {
    pub fn new(child: Child) -> Self {
        Self {
            pid: child.id(),
            child: Arc::new(Mutex::new(child)),
        }
    }

    /// OS process id, if the child was running when spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exit status if the child has exited, without blocking.
    pub fn try_status(&self) -> io::Result<Option<ExitStatus>> {
        self.lock().try_wait()
    }

    /// True while the child is still running.
    pub fn is_alive(&self) -> bool {
        matches!(self.try_status(), Ok(None))
    }

    /// Ask the child to shut down (SIGTERM on unix).
    pub fn terminate(&self) -> io::Result<()> {
        let mut child = self.lock();
        if child.try_wait()?.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            match self.pid {
                Some(pid) => send_sigterm(pid),
                None => Ok(()),
            }
        }

        #[cfg(not(unix))]
        {
            child.start_kill()
        }
    }

    /// Force the child to exit (SIGKILL on unix).
    pub fn kill(&self) -> io::Result<()> {
        let mut child = self.lock();
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        child.start_kill()
    }

    /// Wait for the child to exit.
    ///
    /// Polls instead of holding the lock, so other clones keep working
    /// while one task waits.
    pub async fn wait(&self) -> io::Result<ExitStatus> {
        loop {
            if let Some(status) = self.try_status()? {
                return Ok(status);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Wait up to `timeout`; `None` if the child is still running.
    pub async fn wait_timeout(&self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(status) => status.map(Some),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    // The child is unreaped (checked under the lock by the caller), so the
    // pid cannot have been recycled.
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.into()),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;

    fn sh(script: &str) -> ProcessHandle {
        open_ipc_subprocess(Path::new("sh"), ["-c", script]).unwrap()
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let handle = sh("exit 3");
        let status = handle.wait().await.unwrap();
        assert_eq!(exit_code(&status), 3);
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let handle = sh("exec sleep 30");
        assert!(handle.is_alive());

        handle.terminate().unwrap();
        handle.terminate().unwrap();
        let status = handle
            .wait_timeout(Duration::from_secs(5))
            .await
            .unwrap()
            .expect("sleep should exit on SIGTERM");
        assert_eq!(exit_code(&status), 128 + Signal::SIGTERM as i32);

        // Already exited: both are no-ops.
        handle.terminate().unwrap();
        handle.kill().unwrap();
    }

    #[tokio::test]
    async fn test_kill_after_ignored_terminate() {
        let handle = sh("trap '' TERM; exec sleep 30");
        // Let the shell install the trap before signalling it.
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.terminate().unwrap();
        assert!(handle
            .wait_timeout(Duration::from_millis(300))
            .await
            .unwrap()
            .is_none());

        handle.kill().unwrap();
        handle.kill().unwrap();
        let status = handle.wait().await.unwrap();
        assert_eq!(exit_code(&status), 128 + Signal::SIGKILL as i32);
    }

    #[tokio::test]
    async fn test_clones_share_the_child() {
        let handle = sh("exec sleep 30");
        let clone = handle.clone();
        assert_eq!(clone.pid(), handle.pid());

        clone.kill().unwrap();
        handle.wait().await.unwrap();
        assert!(!clone.is_alive());
    }
}
