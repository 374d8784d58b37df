//! Input file discovery.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// One problem instance to hand to the solver.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputFile {
    pub path: PathBuf,
    /// Task identifier: the file stem, e.g. `afiro` for `mps/afiro.mps`.
    pub id: String,
}

impl InputFile {
    pub fn new(path: PathBuf) -> Self {
        let id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, id }
    }
}

/// List the regular files directly inside `dir` whose extension matches
/// `extension` (case-insensitive, no leading dot), sorted by path.
pub fn discover(dir: &Path, extension: &str) -> Result<Vec<InputFile>> {
    let dir_err = |source| Error::InputDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir).map_err(dir_err)? {
        let entry = entry.map_err(dir_err)?;
        let path = entry.path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension));
        // file_type() does not follow symlinks; metadata() does.
        if matches && fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
            inputs.push(InputFile::new(path));
        }
    }
    inputs.sort();
    Ok(inputs)
}
