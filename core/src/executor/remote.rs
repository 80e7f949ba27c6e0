use std::path::Path;

use async_trait::async_trait;
use rivalbench_remote::{FailureCode, RemoteHost, RunReport, UploadField};

use super::{Artifact, ExecJob, Executor};
use crate::{
    config::{Config, RemoteConfig},
    error::*,
    rival::RivalBuild,
    testing::{ExecOutcome, ExecStatus, RivalFailure, TestCase},
};

/// Compiles locally, links and runs on a remote execution host.
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    host: RemoteHost,
    hosted_rival: bool,
}

impl RemoteExecutor {
    pub fn new(host: RemoteHost, hosted_rival: bool) -> Self {
        Self { host, hosted_rival }
    }

    pub fn connect(cfg: &Config, remote: &RemoteConfig) -> Result<Self> {
        let host = RemoteHost::new(&remote.address, remote.port, cfg.bench.timeout())
            .context("Cannot set up remote host client")?;
        log::debug!("Remote workspace folder: {}", host.folder());
        Ok(Self::new(host, cfg.uses_hosted_rival()))
    }

    pub fn host(&self) -> &RemoteHost {
        &self.host
    }

    async fn upload_artifact(&self, job: &ExecJob<'_>, asm: &Path) -> rivalbench_remote::Result<()> {
        let mut files = vec![(UploadField::Asm, asm)];
        if let Some(input) = job.testcase.stdin() {
            files.push((UploadField::Input, input));
        }
        if job.testcase.answer().is_file() {
            files.push((UploadField::Answer, job.testcase.answer()));
        }
        self.host.upload(&files).await
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl Executor for RemoteExecutor {
    async fn execute(&self, job: ExecJob<'_>) -> Result<ExecOutcome> {
        let id = job.testcase.name();
        let name = match job.artifact {
            Artifact::Local(asm) => {
                if let Err(e) = self.upload_artifact(&job, asm).await {
                    log::warn!("[{}] upload failed: {:#}", id, e);
                    return Ok(ExecOutcome::Terminal(ExecStatus::ToolError));
                }
                file_stem(asm)
            }
            Artifact::Hosted(name) => name.clone(),
        };
        if job.repetitions > 1 {
            log::debug!("[{}] the remote host runs a single round", id);
        }

        let target = self.host.target(name, id);
        let outcome = match self.host.run(&target).await {
            Ok(RunReport::Finished { time_ms }) if job.timing => ExecOutcome::Timing(time_ms),
            Ok(RunReport::Finished { .. }) => ExecOutcome::Terminal(ExecStatus::Passed),
            Ok(RunReport::Failed { status, code }) => {
                let exec_status = match code {
                    FailureCode::LinkError => ExecStatus::LinkError,
                    FailureCode::WrongAnswer => ExecStatus::WrongAnswer,
                    FailureCode::Other(_) | FailureCode::Unrecognized => {
                        log::warn!("[{}] remote run failed: {} ({:?})", id, status, code);
                        ExecStatus::ToolError
                    }
                };
                ExecOutcome::Terminal(exec_status)
            }
            Err(e) if e.is_timeout() => {
                log::info!("[{}] remote run timed out", id);
                ExecOutcome::Terminal(ExecStatus::TimedOut)
            }
            Err(e) => {
                log::warn!("[{}] remote run failed: {:#}", id, e);
                ExecOutcome::Terminal(ExecStatus::ToolError)
            }
        };
        Ok(outcome)
    }

    async fn build_rival_on_host(&self, testcase: &TestCase) -> Result<Option<RivalBuild>> {
        if !self.hosted_rival {
            return Ok(None);
        }
        let id = testcase.name();
        let source = testcase.source();

        if let Err(e) = self.host.upload(&[(UploadField::Source, source)]).await {
            log::warn!("[{}] source upload failed: {:#}", id, e);
            return Ok(Some(RivalBuild::Failed(RivalFailure::CompilerError)));
        }

        let stem = file_stem(source);
        let build = match self.host.compile(&self.host.target(stem.as_str(), "")).await {
            Ok(()) => RivalBuild::Built(Artifact::Hosted(format!("{}-gcc", stem))),
            Err(e) if e.is_timeout() => RivalBuild::Failed(RivalFailure::CompilerTimeout),
            Err(e) => {
                log::warn!("[{}] remote rival compile failed: {:#}", id, e);
                RivalBuild::Failed(RivalFailure::CompilerError)
            }
        };
        Ok(Some(build))
    }

    async fn finish(&self) {
        match self.host.clean().await {
            Ok(()) => log::debug!("Cleaned remote folder {}", self.host.folder()),
            Err(e) => log::warn!("Cannot clean remote folder {}: {:#}", self.host.folder(), e),
        }
    }
}
