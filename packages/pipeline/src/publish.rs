//! Atomic output publication.
//!
//! Every stage writes to a `.tmp` sibling and renames on success, so a
//! crash mid-write never exposes a partially written output to downstream
//! consumers.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// Temporary sibling path used during the write.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(std::ffi::OsString::new, std::ffi::OsString::from);
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `path` through the supplied closure and publishes it atomically.
///
/// The closure receives a buffered writer over the temporary file. The
/// rename only happens after a successful write and flush; on any error
/// the temporary file is removed and `path` is left untouched.
///
/// # Errors
///
/// Propagates any error from the closure, the flush, or the rename.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<(), PipelineError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), PipelineError>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);

    let result = (|| {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        write(&mut writer)?;
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = result {
        std::fs::remove_file(&tmp).ok();
        return Err(e);
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}
