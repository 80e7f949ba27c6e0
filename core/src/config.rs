use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    result::Result as StdResult,
    time::Duration,
};

use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::{error::*, score::Mean, template::CommandTemplate};

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    #[serde(skip)]
    pub source_config_file: Option<PathBuf>,
    pub bench: BenchConfig,
    pub candidate: CandidateConfig,
    pub toolchain: ToolchainConfig,
    pub rival: RivalConfig,
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BenchConfig {
    pub testcases: PathBuf,
    pub tempdir: PathBuf,
    pub parallel: bool,
    pub jobs: Option<usize>,
    pub benchmark: bool,
    pub store_time: bool,
    pub rounds: u32,
    pub timeout_secs: u64,
    /// Interpreter of the compile and link command lines, run as `<shell> -c <line>`.
    pub shell: PathBuf,
    pub mean: Mean,
    pub source_ext: String,
    pub timing_source: TimingSource,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CandidateConfig {
    pub compiler: PathBuf,
    pub args: String,
    pub command: CommandTemplate,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolchainConfig {
    pub cc: String,
    pub target: TargetArch,
    pub runtime_lib: PathBuf,
    pub runtime_header: PathBuf,
    pub link: CommandTemplate,
    pub execution: ExecutionMode,
    pub emulator: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RivalConfig {
    pub name: String,
    pub dir: PathBuf,
    pub gcc_command: CommandTemplate,
    pub generic_command: CommandTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoteConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TargetArch {
    #[default]
    Rv64,
    Rv32,
}

impl TargetArch {
    pub fn flags(&self) -> &'static str {
        match self {
            TargetArch::Rv64 => "-march=rv64gc -mabi=lp64d",
            TargetArch::Rv32 => "-march=rv32gc -mabi=ilp32f",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExecutionMode {
    /// Run the linked executable directly (on a RISC-V machine).
    Native,
    /// Run it through `toolchain.emulator`.
    #[default]
    Emulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TimingSource {
    #[default]
    WallClock,
    /// The `TOTAL: ..` line the runtime library prints to stderr.
    Runtime,
}

pub const COMPILE_VARS: &[&str] = &["compiler", "args", "source", "output"];
pub const LINK_VARS: &[&str] = &["cc", "target", "input", "runtime", "output"];
pub const RIVAL_VARS: &[&str] = &["rival", "target", "header", "source", "output"];

fn template(s: &str) -> CommandTemplate {
    CommandTemplate::parse(s).unwrap_or_else(|e| panic!("invalid builtin template {:?}: {}", s, e))
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            testcases: "testcases".into(),
            tempdir: "build".into(),
            parallel: false,
            jobs: None,
            benchmark: false,
            store_time: false,
            rounds: 1,
            timeout_secs: 120,
            shell: "/bin/sh".into(),
            mean: Mean::default(),
            source_ext: "sy".into(),
            timing_source: TimingSource::default(),
        }
    }
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            compiler: "./tmp/compiler".into(),
            args: "-O2".into(),
            command: template("ulimit -s unlimited && exec {compiler} {args} {source} -o {output}"),
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            cc: "riscv64-unknown-elf-gcc".into(),
            target: TargetArch::default(),
            runtime_lib: "runtime/libsysy.a".into(),
            runtime_header: "runtime/sylib.h".into(),
            link: template("exec {cc} {target} {input} {runtime} -o {output}"),
            execution: ExecutionMode::default(),
            emulator: "qemu-riscv64".into(),
        }
    }
}

impl Default for RivalConfig {
    fn default() -> Self {
        Self {
            name: "riscv64-unknown-elf-gcc".into(),
            dir: "rivals".into(),
            gcc_command: template(
                "exec {rival} -xc++ -O2 -S {target} -include {header} {source} -o {output}",
            ),
            generic_command: template("exec {rival} -S -o {output} {source}"),
        }
    }
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "rivalbench.toml";

    pub fn example_toml() -> String {
        Asset::get(Self::FILENAME)
            .map(|file| String::from_utf8_lossy(file.data.as_ref()).into_owned())
            .unwrap_or_default()
    }

    pub fn from_toml(s: &str) -> StdResult<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_toml_file(filepath: PathBuf) -> Result<Self> {
        let toml = fsutil::read_to_string(&filepath).context("Cannot read a file")?;
        let mut cfg = Self::from_toml(&toml)
            .with_context(|| format!("Invalid config TOML: {:?}", filepath))?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> Option<PathBuf> {
        cur_dir
            .as_ref()
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
    }

    /// Uses `explicit` if given, else the nearest `rivalbench.toml`, else the defaults.
    pub fn load(explicit: Option<PathBuf>, cur_dir: impl AsRef<Path>) -> Result<Self> {
        match explicit.or_else(|| Self::find_file_in_ancestors(cur_dir)) {
            Some(path) => {
                log::debug!("Loading config from {}", path.display());
                Self::from_toml_file(path)
            }
            None => {
                log::debug!("No {} found, using defaults", Self::FILENAME);
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let b = &self.bench;
        ensure!(b.rounds >= 1, "bench.rounds must be at least 1");
        ensure!(b.timeout_secs >= 1, "bench.timeout-secs must be at least 1");
        ensure!(b.jobs != Some(0), "bench.jobs must be at least 1");
        ensure!(!b.source_ext.is_empty(), "bench.source-ext must not be empty");

        let templates = [
            ("candidate.command", &self.candidate.command, COMPILE_VARS),
            ("toolchain.link", &self.toolchain.link, LINK_VARS),
            ("rival.gcc-command", &self.rival.gcc_command, RIVAL_VARS),
            ("rival.generic-command", &self.rival.generic_command, RIVAL_VARS),
        ];
        for (key, tmpl, known) in templates {
            tmpl.ensure_known_vars(known)
                .with_context(|| format!("Invalid template in {}: {:?}", key, tmpl.as_str()))?;
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.bench.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    /// Directory holding the rival's optional private build and its timing sidecar.
    pub fn rival_home(&self) -> PathBuf {
        self.rival.dir.join(&self.rival.name)
    }

    pub fn rival_cache_file(&self) -> PathBuf {
        self.rival_home().join(format!("{}.json", self.rival.name))
    }

    /// Suite key of the rival cache: the suite path as given.
    pub fn suite_key(&self) -> String {
        self.bench.testcases.to_string_lossy().into_owned()
    }

    /// The rival is built by the remote host's own toolchain.
    pub fn uses_hosted_rival(&self) -> bool {
        self.remote.is_some() && self.rival.name == "gcc"
    }
}

impl BenchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
