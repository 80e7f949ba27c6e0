use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    config::Config,
    error::*,
    executor::Artifact,
    process::{ProcessOutcome, ProcessRunner},
    template::{shell_quote, CommandTemplate},
    testing::{RivalFailure, TestCase},
};

#[derive(Debug, Clone, PartialEq)]
pub enum RivalBuild {
    Built(Artifact),
    Failed(RivalFailure),
}

/// The reference compiler the candidate is timed against.
#[derive(Debug, Clone)]
pub struct RivalCompiler {
    program: PathBuf,
    command: CommandTemplate,
    target_flags: &'static str,
    header: PathBuf,
}

impl RivalCompiler {
    /// `<rival.dir>/<name>/<name>` if it exists, otherwise `<name>` looked up on `$PATH`.
    pub fn resolve(cfg: &Config) -> Self {
        let name = cfg.rival.name.as_str();
        let private_build = cfg.rival_home().join(name);
        let program = if private_build.is_file() {
            private_build
        } else {
            PathBuf::from(name)
        };
        let command = if Self::is_gcc_like(name) {
            cfg.rival.gcc_command.clone()
        } else {
            cfg.rival.generic_command.clone()
        };
        log::debug!("Rival '{}' resolved to {}", name, program.display());
        Self {
            program,
            command,
            target_flags: cfg.toolchain.target.flags(),
            header: cfg.toolchain.runtime_header.clone(),
        }
    }

    pub fn is_gcc_like(name: &str) -> bool {
        name.contains("gcc")
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn command_line(&self, source: &Path, output: &Path) -> Result<String> {
        let mut vars: HashMap<&'static str, String> = HashMap::new();
        vars.insert("rival", shell_quote(&self.program));
        vars.insert("target", self.target_flags.to_owned());
        vars.insert("header", shell_quote(&self.header));
        vars.insert("source", shell_quote(source));
        vars.insert("output", shell_quote(output));
        Ok(self.command.render(&vars)?)
    }

    /// Compiles `testcase` into the assembly file `output`.
    pub async fn compile(
        &self,
        testcase: &TestCase,
        output: &Path,
        runner: &ProcessRunner,
    ) -> Result<RivalBuild> {
        let id = testcase.name();
        let cmd = self.command_line(testcase.source(), output)?;
        log::debug!("[{}] rival compile: {}", id, cmd);

        let outcome = match runner.run_script(&cmd).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("[{}] Cannot run rival compiler: {:#}", id, e);
                return Ok(RivalBuild::Failed(RivalFailure::CompilerError));
            }
        };
        let build = match outcome {
            ProcessOutcome::TimedOut { .. } => RivalBuild::Failed(RivalFailure::CompilerTimeout),
            ProcessOutcome::Exited(out) if !out.success() => {
                log::warn!(
                    "[{}] rival compiler exited with {:?}: {}",
                    id,
                    out.status,
                    out.stderr_lossy().trim_end()
                );
                RivalBuild::Failed(RivalFailure::CompilerError)
            }
            ProcessOutcome::Exited(_) => RivalBuild::Built(Artifact::Local(output.to_owned())),
        };
        Ok(build)
    }
}
