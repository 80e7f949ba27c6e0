use std::fmt;

/// Terminal status of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ExecStatus {
    #[strum(serialize = "Linker Error")]
    LinkError,
    Passed,
    #[strum(serialize = "Wrong Answer")]
    WrongAnswer,
    #[strum(serialize = "Time Limit Exceeded")]
    TimedOut,
    #[strum(serialize = "Tool Error")]
    ToolError,
}

/// Result of an executor run. A timed run that passed every round carries its mean time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecOutcome {
    Terminal(ExecStatus),
    Timing(f64),
}

/// Why the rival side of a benchmark produced no time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RivalFailure {
    CompilerError,
    CompilerTimeout,
    Exec(ExecStatus),
}

impl fmt::Display for RivalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RivalFailure::CompilerError => f.write_str("Compiler Error"),
            RivalFailure::CompilerTimeout => f.write_str("Compiler TLE"),
            RivalFailure::Exec(status) => write!(f, "{}", status),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Benchmark {
    pub candidate_ms: f64,
    pub rival_ms: f64,
    pub score: f64,
}

/// Final status of one test case.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Passed,
    Benchmarked(Benchmark),
    /// The candidate passed but the rival could not be timed.
    RivalFailed(RivalFailure),
    CompilerError,
    CompilerTimeout,
    LinkError,
    WrongAnswer,
    TimedOut,
    ToolError,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(
            self,
            Verdict::Passed | Verdict::Benchmarked(_) | Verdict::RivalFailed(_)
        )
    }

    pub fn label(&self) -> &'static str {
        use Verdict::*;
        match self {
            Passed | Benchmarked(_) => "Passed",
            RivalFailed(_) => "Rival Error",
            CompilerError => "Compiler Error",
            CompilerTimeout => "Compiler TLE",
            LinkError => "Linker Error",
            WrongAnswer => "Wrong Answer",
            TimedOut => "Time Limit Exceeded",
            ToolError => "Tool Error",
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Verdict::Benchmarked(b) => Some(b.score),
            _ => None,
        }
    }
}

impl From<ExecStatus> for Verdict {
    fn from(status: ExecStatus) -> Self {
        match status {
            ExecStatus::LinkError => Verdict::LinkError,
            ExecStatus::Passed => Verdict::Passed,
            ExecStatus::WrongAnswer => Verdict::WrongAnswer,
            ExecStatus::TimedOut => Verdict::TimedOut,
            ExecStatus::ToolError => Verdict::ToolError,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub name: String,
    pub verdict: Verdict,
}

impl TestReport {
    pub fn new(name: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            name: name.into(),
            verdict,
        }
    }
}
