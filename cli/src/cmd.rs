use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, ensure, Context as _};
use rivalbench_core::{
    config::{Config, ExecutionMode, RemoteConfig, TargetArch},
    driver::Driver,
    executor,
    orchestrator::{self, Mode},
    rival::RivalCache,
    score::Mean,
    style,
    testing::TestCase,
};

use crate::util;

/// Compile, run and verify a SysY test suite, and score it against a rival compiler.
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding `<id>.sy`, `<id>.in` and `<id>.out` files
    #[arg(short = 't', long)]
    pub testcases: Option<PathBuf>,

    /// Candidate compiler executable
    #[arg(long)]
    pub compiler: Option<PathBuf>,

    /// Passed to the candidate compiler as `-O<level>`
    #[arg(short = 'O', long)]
    pub optimize_level: Option<u8>,

    /// Cross toolchain driver used for linking
    #[arg(short = 'c', long)]
    pub cc: Option<String>,

    /// Name of the rival compiler (looked up in `<rivals-dir>/<name>/<name>`, then $PATH)
    #[arg(short = 'r', long)]
    pub rival: Option<String>,

    /// Run tests in parallel
    #[arg(short = 'p', long)]
    pub parallel: bool,

    /// Number of parallel workers (default: number of CPUs)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Time every test against the rival
    #[arg(short = 'b', long)]
    pub benchmark: bool,

    /// Run executables natively instead of under the emulator
    #[arg(long)]
    pub on_riscv: bool,

    /// Re-measure the rival and store its timings
    #[arg(long)]
    pub store_time: bool,

    #[arg(long)]
    pub remote_address: Option<String>,

    #[arg(long)]
    pub remote_port: Option<u16>,

    #[arg(long, value_enum)]
    pub mean: Option<ArgMean>,

    /// Executions per test; the timing is their mean
    #[arg(long)]
    pub rounds: Option<u32>,

    #[arg(long, value_enum)]
    pub target: Option<ArgTarget>,

    /// Config file (default: nearest `rivalbench.toml`)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print an example config file and exit
    #[arg(long)]
    pub example_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum ArgMean {
    Geometric,
    Arithmetic,
}

impl From<ArgMean> for Mean {
    fn from(value: ArgMean) -> Self {
        match value {
            ArgMean::Geometric => Mean::Geometric,
            ArgMean::Arithmetic => Mean::Arithmetic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum ArgTarget {
    Rv64,
    Rv32,
}

impl From<ArgTarget> for TargetArch {
    fn from(value: ArgTarget) -> Self {
        match value {
            ArgTarget::Rv64 => TargetArch::Rv64,
            ArgTarget::Rv32 => TargetArch::Rv32,
        }
    }
}

impl Args {
    /// Command-line flags take precedence over the config file.
    pub fn apply(&self, cfg: &mut Config) -> anyhow::Result<()> {
        let b = &mut cfg.bench;
        if let Some(dir) = &self.testcases {
            b.testcases = dir.clone();
        }
        b.parallel |= self.parallel;
        b.benchmark |= self.benchmark;
        b.store_time |= self.store_time;
        if self.jobs.is_some() {
            b.jobs = self.jobs;
        }
        if let Some(mean) = self.mean {
            b.mean = mean.into();
        }
        if let Some(rounds) = self.rounds {
            b.rounds = rounds;
        }

        if let Some(compiler) = &self.compiler {
            cfg.candidate.compiler = compiler.clone();
        }
        if let Some(level) = self.optimize_level {
            cfg.candidate.args = format!("-O{}", level);
        }

        if let Some(cc) = &self.cc {
            cfg.toolchain.cc = cc.clone();
        }
        if let Some(target) = self.target {
            cfg.toolchain.target = target.into();
        }
        if self.on_riscv {
            cfg.toolchain.execution = ExecutionMode::Native;
        }

        if let Some(rival) = &self.rival {
            cfg.rival.name = rival.clone();
        }

        match (&self.remote_address, self.remote_port, &mut cfg.remote) {
            (None, None, _) => (),
            (Some(address), Some(port), remote) => {
                *remote = Some(RemoteConfig {
                    address: address.clone(),
                    port,
                })
            }
            (address, port, Some(remote)) => {
                if let Some(address) = address {
                    remote.address = address.clone();
                }
                if let Some(port) = port {
                    remote.port = port;
                }
            }
            (_, _, None) => bail!("--remote-address and --remote-port must be given together"),
        }

        if cfg.bench.store_time && !cfg.bench.benchmark {
            log::warn!("--store-time has no effect without --benchmark");
        }
        Ok(())
    }
}

/// Returns whether every test passed.
pub async fn exec(args: &Args) -> anyhow::Result<bool> {
    if args.example_config {
        print!("{}", Config::example_toml());
        return Ok(true);
    }

    let mut cfg = Config::load(args.config.clone(), util::current_dir())?;
    args.apply(&mut cfg)?;
    cfg.validate()?;
    let cfg = Arc::new(cfg);

    let suite = &cfg.bench.testcases;
    let testcases = TestCase::enumerate(suite, &cfg.bench.source_ext)?;
    ensure!(
        !testcases.is_empty(),
        "No test programs (*.{}) found in '{}'",
        cfg.bench.source_ext,
        suite.display()
    );
    fsutil::reset_dir(&cfg.bench.tempdir).context("Cannot prepare the temporary dir")?;

    let sidecar = cfg.rival_cache_file();
    let cache = Arc::new(
        RivalCache::load(&sidecar, cfg.suite_key()).context("Cannot load rival timings")?,
    );
    let executor = executor::from_config(Arc::clone(&cfg))?;
    let driver = Driver::new(Arc::clone(&cfg), Arc::clone(&executor), Arc::clone(&cache));

    let mode = if cfg.bench.parallel {
        Mode::Parallel {
            workers: cfg.worker_count(),
        }
    } else {
        Mode::Sequential
    };
    log::info!("Running {} tests ({:?})", testcases.len(), mode);

    let res = orchestrator::run_all(&driver, testcases, mode, style::print_report).await;
    executor.finish().await;
    let summary = res?;

    if cfg.bench.store_time {
        cache
            .persist(&sidecar)
            .context("Cannot store rival timings")?;
    }

    style::print_summary(&summary, cfg.bench.mean);
    Ok(summary.all_passed())
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let args = Args::try_parse_from([
            "rivalbench",
            "-t",
            "tests/perf",
            "-O",
            "1",
            "-c",
            "gcc",
            "-r",
            "clang",
            "-pb",
            "-j",
            "3",
            "--on-riscv",
            "--mean",
            "arithmetic",
            "--rounds",
            "5",
            "--target",
            "rv32",
        ])
        .unwrap();

        let mut cfg = Config::default();
        args.apply(&mut cfg).unwrap();

        assert_eq!(cfg.bench.testcases, PathBuf::from("tests/perf"));
        assert_eq!(cfg.candidate.args, "-O1");
        assert_eq!(cfg.toolchain.cc, "gcc");
        assert_eq!(cfg.rival.name, "clang");
        assert!(cfg.bench.parallel);
        assert!(cfg.bench.benchmark);
        assert_eq!(cfg.bench.jobs, Some(3));
        assert_eq!(cfg.worker_count(), 3);
        assert_eq!(cfg.toolchain.execution, ExecutionMode::Native);
        assert_eq!(cfg.bench.mean, Mean::Arithmetic);
        assert_eq!(cfg.bench.rounds, 5);
        assert_eq!(cfg.toolchain.target, TargetArch::Rv32);
        assert_eq!(cfg.remote, None);
    }

    #[test]
    fn remote_flags() {
        let mut cfg = Config::default();
        Args::try_parse_from(["rivalbench", "--remote-address", "10.0.0.2", "--remote-port", "8080"])
            .unwrap()
            .apply(&mut cfg)
            .unwrap();
        assert_eq!(
            cfg.remote,
            Some(RemoteConfig {
                address: "10.0.0.2".into(),
                port: 8080,
            })
        );

        Args::try_parse_from(["rivalbench", "--remote-port", "9000"])
            .unwrap()
            .apply(&mut cfg)
            .unwrap();
        assert_eq!(cfg.remote.as_ref().map(|r| r.port), Some(9000));

        let mut cfg = Config::default();
        let res = Args::try_parse_from(["rivalbench", "--remote-address", "10.0.0.2"])
            .unwrap()
            .apply(&mut cfg);
        assert!(res.is_err());
    }
}
