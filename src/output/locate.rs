use std::path::{Path, PathBuf};

use crate::foundation::error::{FramepassError, FramepassResult};
use crate::host::{RenderHost, document_dir};
use crate::output::format::OutputFormat;

/// Extensions tried, in order, when the expected file is missing.
pub const ALTERNATIVE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".tif", ".tiff", ".exr", ".bmp"];

/// Find a rendered file for `stem` in `dir`.
///
/// Returns the file with the format's own extension when it exists, otherwise the first existing
/// alternative. `None` if nothing matches.
pub fn locate_output(dir: &Path, stem: &str, preferred: OutputFormat) -> Option<PathBuf> {
    let expected = dir.join(format!("{stem}{}", preferred.for_stills().extension()));
    if expected.is_file() {
        return Some(expected);
    }
    ALTERNATIVE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{stem}{ext}")))
        .find(|p| p.is_file())
}

/// Where a run writes its images.
///
/// An explicit folder wins and is created if missing. Otherwise the directory of the host's
/// document, and for unsaved documents the current working directory.
pub fn resolve_output_dir(
    preferred: Option<&Path>,
    host: &dyn RenderHost,
) -> FramepassResult<PathBuf> {
    if let Some(dir) = preferred.filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| {
            FramepassError::io(format!("create output directory '{}'", dir.display()), e)
        })?;
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = document_dir(host) {
        return Ok(dir);
    }
    std::env::current_dir().map_err(|e| FramepassError::io("resolve current directory", e))
}

/// Fail unless a file can be created in `dir`.
///
/// Creates and removes a uniquely named marker, so an existing folder on a read-only mount or
/// without write permission is caught before anything is rendered.
pub fn ensure_writable(dir: &Path) -> FramepassResult<()> {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let marker = dir.join(format!(".framepass-{}-{nanos}.tmp", std::process::id()));
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&marker)
        .map_err(|e| {
            FramepassError::io(
                format!("output directory '{}' is not writable", dir.display()),
                e,
            )
        })?;
    std::fs::remove_file(&marker)
        .map_err(|e| FramepassError::io(format!("remove '{}'", marker.display()), e))
}
