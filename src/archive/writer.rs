//! Commit phase of the archive pipeline
//!
//! Entries are written in plan order. Each source file is opened right before
//! its entry starts and closed before the next one, so at most one request
//! file is open at a time.

use std::cell::Cell;
use std::fs::File;
use std::io::{self, Cursor, Seek, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::SystemTime;

use chrono::{Datelike, Local, Timelike};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::plan::{file_id, ArchiveEntry, ArchivePlan};
use super::ArchiveError;
use crate::config::Compression;

/// Build the complete archive in memory
pub fn build_in_memory(
    plan: &ArchivePlan,
    compression: Compression,
) -> Result<Vec<u8>, ArchiveError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    append_entries(&mut zip, plan, compression)?;
    let cursor = zip.finish().map_err(ArchiveError::Finalize)?;
    Ok(cursor.into_inner())
}

/// Write the archive into a forward-only sink and flush it.
///
/// Entries carry data descriptors since sizes and CRCs cannot be patched
/// back into already-sent local headers. On failure nothing more reaches
/// the sink, in particular no central directory.
pub fn write_to_stream<W: Write>(
    plan: &ArchivePlan,
    compression: Compression,
    sink: &mut W,
) -> Result<(), ArchiveError> {
    let open = Rc::new(Cell::new(true));
    let mut zip = ZipWriter::new_stream(Gate {
        inner: &mut *sink,
        open: Rc::clone(&open),
    });

    if let Err(e) = append_entries(&mut zip, plan, compression) {
        // Dropping a ZipWriter finalizes it
        open.set(false);
        drop(zip);
        return Err(e);
    }
    zip.finish().map_err(ArchiveError::Finalize)?;
    sink.flush().map_err(|e| ArchiveError::Finalize(e.into()))
}

/// Passes writes through until closed, then swallows them.
/// A failed write closes it too.
struct Gate<'a, W: Write> {
    inner: &'a mut W,
    open: Rc<Cell<bool>>,
}

impl<W: Write> Write for Gate<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.open.get() {
            return Ok(buf.len());
        }
        match self.inner.write(buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.open.set(false);
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.open.get() {
            self.inner.flush()
        } else {
            Ok(())
        }
    }
}

fn append_entries<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    plan: &ArchivePlan,
    compression: Compression,
) -> Result<(), ArchiveError> {
    for entry in plan.entries() {
        append_entry(zip, plan.base(), entry, compression)?;
    }
    Ok(())
}

fn append_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    base: &Path,
    entry: &ArchiveEntry,
    compression: Compression,
) -> Result<(), ArchiveError> {
    let mut file = reopen(base, entry)?;

    zip.start_file(entry.name.as_str(), entry_options(entry, compression))
        .map_err(|e| ArchiveError::write(&entry.requested, e))?;
    io::copy(&mut file, zip).map_err(|e| ArchiveError::write(&entry.requested, e))?;

    Ok(())
}

/// Open a prepared file again, refusing a path that now leaves `base`
/// or a file that was replaced since prepare.
fn reopen(base: &Path, entry: &ArchiveEntry) -> Result<File, ArchiveError> {
    let access = |e| ArchiveError::file_access(&entry.requested, e);

    let path = entry.source.canonicalize().map_err(access)?;
    if !path.starts_with(base) {
        return Err(ArchiveError::OutsideBase(entry.requested.clone()));
    }

    let file = File::open(&path).map_err(access)?;
    let metadata = file.metadata().map_err(access)?;
    if !metadata.is_file() || file_id(&metadata) != entry.file_id {
        return Err(ArchiveError::Changed(entry.requested.clone()));
    }
    Ok(file)
}

fn entry_options(entry: &ArchiveEntry, compression: Compression) -> SimpleFileOptions {
    let mut options = SimpleFileOptions::default()
        .compression_method(compression.into())
        .large_file(entry.size >= u64::from(u32::MAX));
    if let Some(mode) = entry.mode {
        options = options.unix_permissions(mode);
    }
    if let Some(modified) = entry.modified {
        options = options.last_modified_time(zip_datetime(modified));
    }
    options
}

/// MS-DOS timestamps are local time and start in 1980; earlier times clamp to the epoch
fn zip_datetime(time: SystemTime) -> zip::DateTime {
    let local: chrono::DateTime<Local> = time.into();
    let narrow = |v: u32| u8::try_from(v).unwrap_or(0);
    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).unwrap_or(0),
        narrow(local.month()),
        narrow(local.day()),
        narrow(local.hour()),
        narrow(local.minute()),
        narrow(local.second()),
    )
    .unwrap_or_default()
}
