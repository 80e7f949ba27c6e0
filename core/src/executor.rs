pub mod local;
pub mod remote;

pub use local::LocalExecutor;
pub use remote::RemoteExecutor;

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;

use crate::{
    answer::Answer,
    config::Config,
    error::*,
    rival::RivalBuild,
    testing::{ExecOutcome, TestCase},
};

/// A program ready to be linked and run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Assembly file on the local file system.
    Local(PathBuf),
    /// An artifact that only exists in the remote workspace, by name.
    Hosted(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ExecJob<'a> {
    pub artifact: &'a Artifact,
    pub testcase: &'a TestCase,
    pub answer: &'a Answer,
    pub repetitions: u32,
    pub timing: bool,
}

/// Links and runs artifacts and verifies them against the golden answer.
///
/// Per-test problems are reported in the returned [`ExecOutcome`];
/// `Err` is reserved for faults that should abort the whole run.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, job: ExecJob<'_>) -> Result<ExecOutcome>;

    /// Builds the rival on the execution host itself, if this executor does that.
    /// `None` means the rival has to be compiled locally.
    async fn build_rival_on_host(&self, _testcase: &TestCase) -> Result<Option<RivalBuild>> {
        Ok(None)
    }

    /// Called once after every test has finished.
    async fn finish(&self) {}
}

/// [`RemoteExecutor`] if `[remote]` is configured, else [`LocalExecutor`].
pub fn from_config(cfg: Arc<Config>) -> Result<Arc<dyn Executor>> {
    match &cfg.remote {
        Some(remote) => {
            let exe = RemoteExecutor::connect(&cfg, remote)?;
            log::info!("Executing on remote host {}", exe.host().base_url());
            Ok(Arc::new(exe))
        }
        None => Ok(Arc::new(LocalExecutor::new(cfg))),
    }
}
