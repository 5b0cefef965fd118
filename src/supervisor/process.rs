use super::{ChildProcess, LaunchSpec, Launcher};
use std::io::{self, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_POLL: Duration = Duration::from_millis(10);
const QUIT_KEY: &[u8] = b"q";

/// Spawns real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&mut self, spec: &LaunchSpec) -> io::Result<Box<dyn ChildProcess>> {
        let stdin = if spec.control_input {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(stdin)
            .spawn()?;
        Ok(Box::new(OsChild { child }))
    }
}

struct OsChild {
    child: Child,
}

impl ChildProcess for OsChild {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn exit_code(&mut self) -> io::Result<Option<i32>> {
        Ok(self.child.try_wait()?.map(status_code))
    }

    fn send_quit(&mut self) -> io::Result<()> {
        let stdin = self.child.stdin.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "no control input")
        })?;
        stdin.write_all(QUIT_KEY)?;
        stdin.flush()
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        use rustix::process::{kill_process, Pid, Signal};

        // Never signal a pid that has already been reaped.
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        let pid = Pid::from_child(&self.child);
        kill_process(pid, Signal::TERM).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.child.kill()
    }

    fn wait(&mut self, timeout: Option<Duration>) -> io::Result<Option<i32>> {
        let Some(timeout) = timeout else {
            return self.child.wait().map(|status| Some(status_code(status)));
        };
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status_code(status)));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(WAIT_POLL.min(deadline - now));
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()?;
        self.child.wait().map(|_| ())
    }
}

/// Exit code, or the negated signal number when the child died from a signal.
fn status_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}
