use std::{
    collections::HashMap,
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use lazy_regex::regex_captures;

use super::{Artifact, ExecJob, Executor};
use crate::{
    config::{Config, ExecutionMode, TimingSource},
    error::*,
    process::{ProcessError, ProcessOutcome, ProcessOutput, ProcessRunner},
    template::shell_quote,
    testing::{ExecOutcome, ExecStatus},
};

/// Links with the local cross toolchain and runs natively or under the emulator.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    cfg: Arc<Config>,
    runner: ProcessRunner,
}

impl LocalExecutor {
    pub fn new(cfg: Arc<Config>) -> Self {
        let runner = ProcessRunner::new()
            .shell(&cfg.bench.shell)
            .timeout(cfg.bench.timeout());
        Self { cfg, runner }
    }

    fn link_command(&self, asm: &Path, exe: &Path) -> Result<String> {
        let tc = &self.cfg.toolchain;
        let mut vars: HashMap<&'static str, String> = HashMap::new();
        vars.insert("cc", tc.cc.clone());
        vars.insert("target", tc.target.flags().to_owned());
        vars.insert("input", shell_quote(asm));
        vars.insert("runtime", shell_quote(&tc.runtime_lib));
        vars.insert("output", shell_quote(exe));
        Ok(tc.link.render(&vars)?)
    }

    /// Returns `None` if linking failed or timed out.
    async fn link(&self, id: &str, asm: &Path) -> Result<Option<PathBuf>> {
        let exe = asm.with_extension("exec");
        let cmd = self.link_command(asm, &exe)?;
        log::debug!("[{}] link: {}", id, cmd);

        match self.runner.run_script(&cmd).await? {
            ProcessOutcome::Exited(out) if out.success() => Ok(Some(exe)),
            ProcessOutcome::Exited(out) => {
                log::warn!(
                    "[{}] linker exited with {:?}: {}",
                    id,
                    out.status,
                    out.stderr_lossy().trim_end()
                );
                Ok(None)
            }
            ProcessOutcome::TimedOut { .. } => {
                log::warn!("[{}] linker timed out", id);
                Ok(None)
            }
        }
    }

    fn run_command(&self, exe: &Path) -> (OsString, Vec<OsString>) {
        match self.cfg.toolchain.execution {
            ExecutionMode::Native => (exe.into(), vec![]),
            ExecutionMode::Emulated => (
                self.cfg.toolchain.emulator.clone().into(),
                vec![exe.into()],
            ),
        }
    }

    fn measured_time(&self, id: &str, out: &ProcessOutput) -> Duration {
        if self.cfg.bench.timing_source == TimingSource::Runtime {
            match parse_runtime_report(&out.stderr_lossy()) {
                Some(t) => return t,
                None => log::warn!(
                    "[{}] no runtime timing report on stderr, using wall clock",
                    id
                ),
            }
        }
        out.elapsed
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, job: ExecJob<'_>) -> Result<ExecOutcome> {
        let id = job.testcase.name();
        let asm = match job.artifact {
            Artifact::Local(path) => path,
            Artifact::Hosted(name) => {
                log::error!("[{}] '{}' exists only on a remote host", id, name);
                return Ok(ExecOutcome::Terminal(ExecStatus::ToolError));
            }
        };

        let Some(exe) = self.link(id, asm).await? else {
            return Ok(ExecOutcome::Terminal(ExecStatus::LinkError));
        };

        let (program, args) = self.run_command(&exe);
        let stdin = job.testcase.stdin();
        let mut total = Duration::ZERO;

        for round in 1..=job.repetitions {
            let outcome = match self.runner.run_program(&program, &args, stdin).await {
                Ok(outcome) => outcome,
                Err(e @ ProcessError::Spawn { .. }) => {
                    log::error!("[{}] {:#}", id, e);
                    return Ok(ExecOutcome::Terminal(ExecStatus::ToolError));
                }
                Err(e) => return Err(e.into()),
            };

            let out = match outcome {
                ProcessOutcome::Exited(out) => out,
                ProcessOutcome::TimedOut { elapsed } => {
                    log::info!("[{}] round {} timed out after {:?}", id, round, elapsed);
                    return Ok(ExecOutcome::Terminal(ExecStatus::TimedOut));
                }
            };

            if !job.answer.verify(&out.stdout_lossy(), out.status) {
                log::info!(
                    "[{}] round {}: wrong answer (exit code {:?}, expected {})",
                    id,
                    round,
                    out.status,
                    job.answer.exit_code
                );
                return Ok(ExecOutcome::Terminal(ExecStatus::WrongAnswer));
            }

            let t = self.measured_time(id, &out);
            log::debug!("[{}] round {}: {:?}", id, round, t);
            total += t;
        }

        if !job.timing {
            return Ok(ExecOutcome::Terminal(ExecStatus::Passed));
        }
        let mean_ms = total.as_secs_f64() * 1000.0 / f64::from(job.repetitions.max(1));
        Ok(ExecOutcome::Timing(mean_ms))
    }
}

/// Parses the runtime library's `TOTAL: <h>H-<m>M-<s>S-<us>us` report on the last stderr line.
fn parse_runtime_report(stderr: &str) -> Option<Duration> {
    let last = stderr.lines().rev().find(|l| !l.trim().is_empty())?;
    let (_, h, m, s, us) = regex_captures!(r"TOTAL:\s*(\d+)H-(\d+)M-(\d+)S-(\d+)us", last)?;
    let secs = h.parse::<u64>().ok()? * 3600 + m.parse::<u64>().ok()? * 60 + s.parse::<u64>().ok()?;
    Some(Duration::from_secs(secs) + Duration::from_micros(us.parse().ok()?))
}
