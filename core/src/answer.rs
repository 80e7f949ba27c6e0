use std::path::{Path, PathBuf};

/// Golden answer of a test case: expected stdout lines followed by the expected exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub lines: Vec<String>,
    pub exit_code: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum AnswerError {
    #[error("Malformed answer file '{}': {reason}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        reason: MalformedAnswer,
    },

    #[error(transparent)]
    Read(#[from] fsutil::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedAnswer {
    #[error("the file is empty")]
    Empty,

    #[error("last line {0:?} is not an integer exit code")]
    ExitCode(String),
}

impl Answer {
    pub fn parse(s: &str) -> Result<Self, MalformedAnswer> {
        let mut lines: Vec<String> = s.lines().map(|l| l.trim().to_owned()).collect();
        let last = lines.pop().ok_or(MalformedAnswer::Empty)?;
        let exit_code = last
            .parse()
            .map_err(|_| MalformedAnswer::ExitCode(last.clone()))?;
        Ok(Self { lines, exit_code })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AnswerError> {
        let path = path.as_ref();
        let s = fsutil::read_to_string(path)?;
        Self::parse(&s).map_err(|reason| AnswerError::Malformed {
            path: path.to_owned(),
            reason,
        })
    }

    /// `exit_code` is `None` when the process was terminated by a signal, which never matches.
    pub fn verify(&self, stdout: &str, exit_code: Option<i32>) -> bool {
        exit_code == Some(self.exit_code)
            && stdout
                .lines()
                .map(str::trim)
                .eq(self.lines.iter().map(String::as_str))
    }
}
