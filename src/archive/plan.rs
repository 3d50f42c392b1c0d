//! Prepare phase of the archive pipeline
//!
//! Every requested file is resolved, stat'ed, named and proven readable before
//! the first archive byte is produced. Nothing stays open afterwards.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::resolve::{resolve, ResolvedPath};
use super::{ArchiveError, FileRequest};
use crate::config::EntryNaming;

/// One file scheduled for the archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Name as requested by the client, used in error messages
    pub requested: String,
    /// Canonical on-disk path
    pub source: PathBuf,
    /// Name stored inside the archive
    pub name: String,
    pub size: u64,
    /// Unix permission bits, when the platform reports them
    pub mode: Option<u32>,
    pub modified: Option<SystemTime>,
    /// Device and inode seen at prepare time
    pub file_id: Option<(u64, u64)>,
}

/// Ordered, validated entries for one request
#[derive(Debug, Clone, Default)]
pub struct ArchivePlan {
    base: PathBuf,
    entries: Vec<ArchiveEntry>,
}

impl ArchivePlan {
    /// Validate every requested name against `base`, in request order.
    /// The first failure aborts the whole plan.
    pub fn prepare(
        base: &Path,
        request: &FileRequest,
        naming: EntryNaming,
    ) -> Result<Self, ArchiveError> {
        let mut entries = Vec::with_capacity(request.len());
        let mut seen = HashSet::with_capacity(request.len());

        for requested in request.names() {
            let resolved = resolve(base, requested)?;

            let metadata =
                fs::metadata(&resolved.path).map_err(|e| ArchiveError::file_access(requested, e))?;
            if !metadata.is_file() {
                return Err(ArchiveError::NotAFile(requested.clone()));
            }

            let name = entry_name(&resolved, naming)
                .ok_or_else(|| ArchiveError::Naming(requested.clone()))?;
            if !seen.insert(name.clone()) {
                return Err(ArchiveError::DuplicateEntry(name));
            }

            // Readability check; the handle is released at the end of this statement
            File::open(&resolved.path).map_err(|e| ArchiveError::file_access(requested, e))?;

            entries.push(ArchiveEntry {
                requested: requested.clone(),
                source: resolved.path,
                name,
                size: metadata.len(),
                mode: unix_mode(&metadata),
                modified: metadata.modified().ok(),
                file_id: file_id(&metadata),
            });
        }

        Ok(Self {
            base: base.to_path_buf(),
            entries,
        })
    }

    /// Canonical base directory the entries were resolved against
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the uncompressed entry sizes
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// In-archive name for a resolved path; `None` when it is not valid UTF-8
fn entry_name(resolved: &ResolvedPath, naming: EntryNaming) -> Option<String> {
    match naming {
        EntryNaming::Relative => {
            let parts: Option<Vec<&str>> = resolved
                .relative
                .components()
                .map(|c| c.as_os_str().to_str())
                .collect();
            parts.map(|p| p.join("/"))
        }
        EntryNaming::BaseName => resolved
            .relative
            .file_name()
            .and_then(|n| n.to_str())
            .map(ToString::to_string),
    }
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
const fn unix_mode(_metadata: &fs::Metadata) -> Option<u32> {
    None
}

/// Identity of the file behind `metadata`, compared again at commit time
#[cfg(unix)]
pub(crate) fn file_id(metadata: &fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
pub(crate) const fn file_id(_metadata: &fs::Metadata) -> Option<(u64, u64)> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::write(dir.path().join("b.txt"), b"world").unwrap();
        fs::write(dir.path().join("docs/a.txt"), b"nested").unwrap();
        let root = dir.path().canonicalize().unwrap();
        (dir, root)
    }

    fn request(files: &str) -> FileRequest {
        FileRequest::parse(files).unwrap()
    }

    #[test]
    fn test_prepare_keeps_request_order() {
        let (_dir, root) = base();
        let plan = ArchivePlan::prepare(&root, &request("b.txt,a.txt"), EntryNaming::Relative)
            .unwrap();

        let names: Vec<_> = plan.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["b.txt", "a.txt"]);
        assert_eq!(plan.total_size(), 10);
        assert_eq!(plan.entries()[0].source, root.join("b.txt"));
        assert!(plan.entries()[0].modified.is_some());
        assert_eq!(plan.base(), root.as_path());
    }

    #[test]
    fn test_relative_and_base_name_conventions() {
        let (_dir, root) = base();

        let plan =
            ArchivePlan::prepare(&root, &request("./docs/a.txt"), EntryNaming::Relative).unwrap();
        assert_eq!(plan.entries()[0].name, "docs/a.txt");

        let plan =
            ArchivePlan::prepare(&root, &request("docs/a.txt"), EntryNaming::BaseName).unwrap();
        assert_eq!(plan.entries()[0].name, "a.txt");
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let (_dir, root) = base();
        let err = ArchivePlan::prepare(&root, &request("a.txt,a.txt"), EntryNaming::Relative)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntry(ref n) if n == "a.txt"));

        // Distinct paths can collide once reduced to base names
        let err = ArchivePlan::prepare(&root, &request("a.txt,docs/a.txt"), EntryNaming::BaseName)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntry(_)));
    }

    #[test]
    fn test_missing_file_aborts_whole_plan() {
        let (_dir, root) = base();
        let err = ArchivePlan::prepare(
            &root,
            &request("a.txt,missing.txt,b.txt"),
            EntryNaming::Relative,
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::FileAccess { ref name, .. } if name == "missing.txt"));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let (_dir, root) = base();
        let err =
            ArchivePlan::prepare(&root, &request("docs"), EntryNaming::Relative).unwrap_err();
        assert!(matches!(err, ArchiveError::NotAFile(ref n) if n == "docs"));
    }

    #[cfg(unix)]
    #[test]
    fn test_mode_is_captured() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, root) = base();
        fs::set_permissions(root.join("a.txt"), fs::Permissions::from_mode(0o640)).unwrap();

        let plan = ArchivePlan::prepare(&root, &request("a.txt"), EntryNaming::Relative).unwrap();
        assert_eq!(plan.entries()[0].mode, Some(0o640));
    }
}
