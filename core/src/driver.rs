use std::{collections::HashMap, path::Path, sync::Arc};

use crate::{
    answer::Answer,
    config::Config,
    error::*,
    executor::{Artifact, ExecJob, Executor},
    process::{ProcessOutcome, ProcessRunner},
    rival::{RivalBuild, RivalCache, RivalCompiler},
    score::relative_score,
    template::shell_quote,
    testing::{Benchmark, ExecOutcome, RivalFailure, TestCase, TestReport, Verdict},
};

/// Drives one test case: compile, execute, verify, and optionally time it against the rival.
#[derive(Clone)]
pub struct Driver {
    cfg: Arc<Config>,
    executor: Arc<dyn Executor>,
    cache: Arc<RivalCache>,
    rival: Arc<RivalCompiler>,
    runner: ProcessRunner,
}

impl Driver {
    pub fn new(cfg: Arc<Config>, executor: Arc<dyn Executor>, cache: Arc<RivalCache>) -> Self {
        let rival = Arc::new(RivalCompiler::resolve(&cfg));
        let runner = ProcessRunner::new()
            .shell(&cfg.bench.shell)
            .timeout(cfg.bench.timeout());
        Self {
            cfg,
            executor,
            cache,
            rival,
            runner,
        }
    }

    /// `Err` only for a malformed golden answer or an unexpected I/O fault.
    pub async fn run(&self, testcase: &TestCase) -> Result<TestReport> {
        let id = testcase.name();
        let answer = Answer::load(testcase.answer())?;

        let asm = self
            .cfg
            .bench
            .tempdir
            .join(format!("{}-{:08x}.s", id, rand::random::<u32>()));
        if let Some(verdict) = self.compile_candidate(testcase, &asm).await? {
            return Ok(TestReport::new(id, verdict));
        }

        let artifact = Artifact::Local(asm);
        let outcome = self
            .executor
            .execute(ExecJob {
                artifact: &artifact,
                testcase,
                answer: &answer,
                repetitions: self.cfg.bench.rounds,
                timing: self.cfg.bench.benchmark,
            })
            .await?;

        let candidate_ms = match outcome {
            ExecOutcome::Terminal(status) => return Ok(TestReport::new(id, status.into())),
            ExecOutcome::Timing(ms) if ms == 0.0 => {
                log::debug!("[{}] zero timing, skipping benchmark", id);
                return Ok(TestReport::new(id, Verdict::Passed));
            }
            ExecOutcome::Timing(ms) => ms,
        };

        let verdict = match self.rival_time(testcase, &answer).await? {
            Ok(rival_ms) => Verdict::Benchmarked(Benchmark {
                candidate_ms,
                rival_ms,
                score: relative_score(candidate_ms, rival_ms),
            }),
            Err(failure) => {
                log::warn!("[{}] rival failed: {}", id, failure);
                Verdict::RivalFailed(failure)
            }
        };
        Ok(TestReport::new(id, verdict))
    }

    fn compile_command(&self, source: &Path, output: &Path) -> Result<String> {
        let c = &self.cfg.candidate;
        let mut vars: HashMap<&'static str, String> = HashMap::new();
        vars.insert("compiler", shell_quote(&c.compiler));
        vars.insert("args", c.args.clone());
        vars.insert("source", shell_quote(source));
        vars.insert("output", shell_quote(output));
        Ok(c.command.render(&vars)?)
    }

    /// Returns the failing verdict, or `None` if `output` was produced.
    async fn compile_candidate(&self, testcase: &TestCase, output: &Path) -> Result<Option<Verdict>> {
        let id = testcase.name();
        let cmd = self.compile_command(testcase.source(), output)?;
        log::debug!("[{}] compile: {}", id, cmd);

        let verdict = match self.runner.run_script(&cmd).await? {
            ProcessOutcome::Exited(out) if out.success() => None,
            ProcessOutcome::Exited(out) => {
                log::info!(
                    "[{}] compiler exited with {:?}: {}",
                    id,
                    out.status,
                    out.stderr_lossy().trim_end()
                );
                Some(Verdict::CompilerError)
            }
            ProcessOutcome::TimedOut { elapsed } => {
                log::info!("[{}] compiler timed out after {:?}", id, elapsed);
                Some(Verdict::CompilerTimeout)
            }
        };
        Ok(verdict)
    }

    /// Rival time from the cache, or freshly measured (and cached).
    async fn rival_time(
        &self,
        testcase: &TestCase,
        answer: &Answer,
    ) -> Result<std::result::Result<f64, RivalFailure>> {
        let id = testcase.name();
        if !self.cfg.bench.store_time {
            if let Some(ms) = self.cache.get(id) {
                log::debug!("[{}] cached rival time: {:.3}ms", id, ms);
                return Ok(Ok(ms));
            }
        }

        let build = match self.executor.build_rival_on_host(testcase).await? {
            Some(build) => build,
            None => {
                let output = self.cfg.bench.tempdir.join(format!("{}-rival.s", id));
                self.rival.compile(testcase, &output, &self.runner).await?
            }
        };
        let artifact = match build {
            RivalBuild::Built(artifact) => artifact,
            RivalBuild::Failed(failure) => return Ok(Err(failure)),
        };

        let outcome = self
            .executor
            .execute(ExecJob {
                artifact: &artifact,
                testcase,
                answer,
                repetitions: self.cfg.bench.rounds,
                timing: true,
            })
            .await?;
        match outcome {
            ExecOutcome::Timing(ms) => {
                self.cache.put(id, ms);
                Ok(Ok(ms))
            }
            ExecOutcome::Terminal(status) => Ok(Err(RivalFailure::Exec(status))),
        }
    }
}
