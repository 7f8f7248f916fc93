//! Materialize an archived page to the mirrored local directory tree.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::urltools;

/// Write `body` to `<archive_root>/<host>/<page>`'s mapped local path,
/// creating intermediate directories (mode 0700) first. Returns the
/// byte count written, or `None` if the destination already existed
/// (no write performed).
pub fn archive_page(
    body: &[u8],
    archive_root: &Path,
    host: &str,
    page: &str,
) -> Result<Option<usize>> {
    let path = urltools::make_local_path(archive_root, host, page);
    if path.exists() {
        return Ok(None);
    }
    if let Some(parent) = path.parent() {
        create_dir_all_mode(parent, 0o700).map_err(|source| Error::ArchiveIo {
            path: parent.display().to_string(),
            source,
        })?;
    }
    std::fs::write(&path, body).map_err(|source| Error::ArchiveIo {
        path: path.display().to_string(),
        source,
    })?;
    set_file_mode(&path, 0o600)?;
    Ok(Some(body.len()))
}

#[cfg(unix)]
fn create_dir_all_mode(dir: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    let mut built = PathBuf::new();
    for component in dir.components() {
        built.push(component);
        if !built.exists() {
            std::fs::DirBuilder::new().mode(mode).create(&built)?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn create_dir_all_mode(dir: &Path, _mode: u32) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(unix)]
fn set_file_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|source| {
        Error::ArchiveIo {
            path: path.display().to_string(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
