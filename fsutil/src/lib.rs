use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, ErrorKind, Write as _},
    path::{Path, PathBuf},
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("{0} (from='{1}', to='{2}'): {3}")]
        FromToIO(Msg, PathBuf, PathBuf, #[source] io::Error),

        #[error("Invalid glob pattern '{0}': {1}")]
        InvalidGlob(String, #[source] ::glob::PatternError),

        #[error("Cannot serialize to JSON (dest='{0}'): {1}")]
        SerializeToJson(PathBuf, #[source] serde_json::Error),

        #[error("Cannot deserialize from JSON (src='{0}'): {1}")]
        DeserializeFromJson(PathBuf, #[source] serde_json::Error),
    }
}
pub use error::{Error, Result};

pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

/// Removes `dir` with everything inside it (if it exists) and creates it again empty.
pub fn reset_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    match fs::remove_dir_all(dir) {
        Ok(()) => log::debug!("Removed stale dir {}", dir.to_string_lossy()),
        Err(e) if e.kind() == ErrorKind::NotFound => (),
        Err(e) => return Err(Error::SingleIO("Cannot remove dir", dir.to_owned(), e)),
    }
    self::mkdir_all(dir)
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        self::mkdir_all(dir)?;
    }
    self::write(filepath, contents)
}

/// Writes `contents` to a temporary file next to `filepath` and renames it into place,
/// so readers never observe a half-written file.
pub fn write_atomic<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    let filepath = filepath.as_ref();
    let dir = match filepath.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    self::mkdir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| Error::SingleIO("Cannot create temporary file", dir.to_owned(), e))?;
    tmp.write_all(contents.as_ref())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::SingleIO("Cannot write file", tmp.path().to_owned(), e))?;
    tmp.persist(filepath).map_err(|e| {
        Error::FromToIO(
            "Cannot rename temporary file",
            e.file.path().to_owned(),
            filepath.to_owned(),
            e.error,
        )
    })?;
    Ok(())
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

pub fn write_json_atomic<P, T>(filepath: P, data: &T) -> Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let s = serde_json::to_string_pretty(data)
        .map_err(|e| Error::SerializeToJson(filepath.as_ref().to_owned(), e))?;
    write_atomic(filepath, s)
}

#[must_use]
pub fn read_json_with_deserialize<P, T>(filepath: P) -> Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let filepath = filepath.as_ref();
    let f = File::open(filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.to_owned(), e))?;
    serde_json::from_reader(BufReader::new(f))
        .map_err(|e| Error::DeserializeFromJson(filepath.to_owned(), e))
}

/// Like [`read_json_with_deserialize`], but a missing file yields `T::default()`.
pub fn read_json_or_default<P, T>(filepath: P) -> Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned + Default,
{
    let filepath = filepath.as_ref();
    match File::open(filepath) {
        Ok(f) => serde_json::from_reader(BufReader::new(f))
            .map_err(|e| Error::DeserializeFromJson(filepath.to_owned(), e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(Error::SingleIO("Cannot read file", filepath.to_owned(), e)),
    }
}

/// Lists regular files in `dir` whose name matches `file_pattern`, sorted by path.
pub fn glob_files(dir: impl AsRef<Path>, file_pattern: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let pattern = dir.join(file_pattern);
    let pattern = pattern.to_string_lossy();
    let entries =
        ::glob::glob(&pattern).map_err(|e| Error::InvalidGlob(pattern.to_string(), e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|r| {
            r.map_err(|e| log::warn!("Cannot access globbed path: {}, skipping...", e))
                .ok()
        })
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}
