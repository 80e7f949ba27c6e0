use std::{
    ffi::OsStr,
    io,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use tokio::{io::AsyncReadExt as _, process::Command, time::Instant};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Cannot open stdin file '{}': {}", .0.display(), .1)]
    Stdin(PathBuf, #[source] io::Error),

    #[error("Failed to communicate with subprocess '{program}': {source}")]
    Communicate {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` if terminated by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Exited(ProcessOutput),
    TimedOut { elapsed: Duration },
}

/// Runs external commands under a wall-clock budget.
/// A process that outlives the budget is killed and reaped.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shell: PathBuf,
    timeout: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    const DEFAULT_SHELL: &str = "/bin/sh";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new() -> Self {
        Self {
            shell: Self::DEFAULT_SHELL.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs `<shell> -c <script>` with stdin closed.
    pub async fn run_script(&self, script: &str) -> Result<ProcessOutcome, ProcessError> {
        let mut cmd = Command::new(&self.shell);
        cmd.args(["-c", script]);
        let label = format!("{} -c {}", self.shell.to_string_lossy(), script);
        self.run(cmd, label, None).await
    }

    /// Runs `program` directly, with stdin redirected from `stdin` when given.
    pub async fn run_program<I, S>(
        &self,
        program: impl AsRef<OsStr>,
        args: I,
        stdin: Option<&Path>,
    ) -> Result<ProcessOutcome, ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let mut cmd = Command::new(program);
        cmd.args(args);
        self.run(cmd, program.to_string_lossy().into_owned(), stdin)
            .await
    }

    async fn run(
        &self,
        mut cmd: Command,
        label: String,
        stdin: Option<&Path>,
    ) -> Result<ProcessOutcome, ProcessError> {
        let stdin = match stdin {
            Some(path) => std::fs::File::open(path)
                .map(Stdio::from)
                .map_err(|e| ProcessError::Stdin(path.to_owned(), e))?,
            None => Stdio::null(),
        };

        log::trace!("spawn: {}", label);
        let start_at = Instant::now();
        let mut proc = cmd
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: label.clone(),
                source,
            })?;

        let (Some(mut stdout), Some(mut stderr)) = (proc.stdout.take(), proc.stderr.take()) else {
            return Err(ProcessError::Communicate {
                program: label,
                source: io::Error::new(io::ErrorKind::BrokenPipe, "stdio is not captured"),
            });
        };

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let res = tokio::time::timeout(self.timeout, async {
            tokio::try_join!(
                stdout.read_to_end(&mut stdout_buf),
                stderr.read_to_end(&mut stderr_buf),
                proc.wait(),
            )
        })
        .await;
        let elapsed = start_at.elapsed();

        match res {
            Err(_) => {
                proc.kill()
                    .await
                    .unwrap_or_else(|e| log::warn!("Failed to kill timed-out '{}': {:#}", label, e));
                Ok(ProcessOutcome::TimedOut { elapsed })
            }

            Ok(Err(source)) => Err(ProcessError::Communicate {
                program: label,
                source,
            }),

            Ok(Ok((_, _, exit_status))) => Ok(ProcessOutcome::Exited(ProcessOutput {
                status: exit_status.code(),
                stdout: stdout_buf,
                stderr: stderr_buf,
                elapsed,
            })),
        }
    }
}
