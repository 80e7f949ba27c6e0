use std::path::{Path, PathBuf};

/// One test program of a suite, identified by its file stem.
/// Sibling files `<id>.in` (optional stdin) and `<id>.out` (golden answer) belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    name: String,
    source: PathBuf,
    input: PathBuf,
    answer: PathBuf,
}

impl TestCase {
    pub const INPUT_EXT: &str = "in";
    pub const ANSWER_EXT: &str = "out";

    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        input: impl Into<PathBuf>,
        answer: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            input: input.into(),
            answer: answer.into(),
        }
    }

    /// Returns `None` if `source` has no file stem.
    pub fn from_source(source: impl Into<PathBuf>) -> Option<Self> {
        let source = source.into();
        let name = source.file_stem()?.to_string_lossy().into_owned();
        Some(Self {
            input: source.with_extension(Self::INPUT_EXT),
            answer: source.with_extension(Self::ANSWER_EXT),
            name,
            source,
        })
    }

    /// Lists `<suite_dir>/*.<source_ext>` sorted by test id.
    pub fn enumerate(suite_dir: impl AsRef<Path>, source_ext: &str) -> fsutil::Result<Vec<Self>> {
        let pattern = format!("*.{}", ::glob::Pattern::escape(source_ext));
        let mut testcases: Vec<Self> = fsutil::glob_files(suite_dir, &pattern)?
            .into_iter()
            .filter_map(Self::from_source)
            .collect();
        testcases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(testcases)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn answer(&self) -> &Path {
        &self.answer
    }

    /// The stdin file, if this test has one.
    pub fn stdin(&self) -> Option<&Path> {
        self.input.is_file().then_some(self.input.as_path())
    }
}
