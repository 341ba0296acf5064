//! Process launcher: spawns a job process detached from the caller.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

/// What to run and where its output goes.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// stdout and stderr are appended here.
    pub output: PathBuf,
}

/// Starts a process that outlives its parent and returns its pid.
pub trait ProcessLauncher {
    fn spawn(&self, spec: &LaunchSpec) -> io::Result<u32>;
}

/// Launches into a new session with stdin closed.
///
/// The child has no controlling terminal, so neither Ctrl-C nor a hangup
/// of the parent's terminal reaches it, and it keeps running after the
/// parent exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedLauncher;

impl ProcessLauncher for DetachedLauncher {
    fn spawn(&self, spec: &LaunchSpec) -> io::Result<u32> {
        if let Some(parent) = spec.output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&spec.output)?;
        let stderr = stdout.try_clone()?;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // SAFETY: setsid is async-signal-safe and touches no memory of
            // the parent; it runs in the forked child before exec.
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        let mut child = cmd.spawn()?;
        let pid = child.id();
        debug!(pid, program = ?spec.program, output = ?spec.output, "detached process spawned");

        // Reap the child if it exits while we are still around.
        std::thread::spawn(move || {
            let _ = child.wait();
        });

        Ok(pid)
    }
}
