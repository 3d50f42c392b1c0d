//! Resolution of requested names against the base directory
//!
//! A name resolves only if it stays inside the base directory both lexically
//! (no `..`, no absolute path) and after following symlinks.

use std::path::{Component, Path, PathBuf};

use super::ArchiveError;

/// A requested name that passed the containment checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical on-disk location
    pub path: PathBuf,
    /// Normal components of the requested name, `.` dropped
    pub relative: PathBuf,
}

/// Resolve `name` under `base`, which must already be canonical
pub fn resolve(base: &Path, name: &str) -> Result<ResolvedPath, ArchiveError> {
    if name.is_empty() {
        return Err(ArchiveError::EmptyName);
    }

    let relative = lexical_relative(name)?;
    if relative.as_os_str().is_empty() {
        // "." or "./" names the base directory itself
        return Err(ArchiveError::NotAFile(name.to_string()));
    }

    let path = base
        .join(&relative)
        .canonicalize()
        .map_err(|e| ArchiveError::file_access(name, e))?;

    if !path.starts_with(base) {
        return Err(ArchiveError::OutsideBase(name.to_string()));
    }

    Ok(ResolvedPath { path, relative })
}

/// Keep normal components only; anything that could climb out is rejected
fn lexical_relative(name: &str) -> Result<PathBuf, ArchiveError> {
    let mut relative = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::OutsideBase(name.to_string()));
            }
        }
    }
    Ok(relative)
}
