//! Packing local files into a single archive visible to the remote side.
//!
//! Sources are flattened to their base names inside a gzip tar. The archive
//! lands in a local transfer directory which is assumed to be mirrored at
//! [`STAGING_ROOT`](crate::contract::STAGING_ROOT) on the execution host, so
//! the remote location is derived from the archive's own base name.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::contract::staged_path;
use crate::error::{GlotError, Result};

const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// A packed archive and the path under which the remote side will find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub archive_path: PathBuf,
    pub remote_location: String,
    pub entries: Vec<String>,
    pub sha256: String,
}

impl Bundle {
    /// Delete the local archive. A file that is already gone is fine.
    pub fn remove(&self) {
        remove_archive(&self.archive_path);
    }
}

/// Removes the wrapped bundle's archive when dropped.
#[derive(Debug)]
pub struct StagedBundle(Bundle);

impl From<Bundle> for StagedBundle {
    fn from(bundle: Bundle) -> Self {
        Self(bundle)
    }
}

impl Drop for StagedBundle {
    fn drop(&mut self) {
        self.0.remove();
    }
}

#[derive(Debug, Clone)]
pub struct FileBundler {
    transfer_dir: PathBuf,
}

impl FileBundler {
    pub fn new(transfer_dir: impl Into<PathBuf>) -> Self {
        Self {
            transfer_dir: transfer_dir.into(),
        }
    }

    pub fn transfer_dir(&self) -> &Path {
        &self.transfer_dir
    }

    /// Pack `files` into a fresh archive inside the transfer directory.
    ///
    /// # Errors
    ///
    /// Fails before writing anything if a source is missing or unreadable, or
    /// if two sources share a base name.
    pub fn bundle<P: AsRef<Path>>(&self, files: &[P]) -> Result<Bundle> {
        let sources = flattened_sources(files)?;

        let tmp = tempfile::Builder::new()
            .prefix("glot-")
            .suffix(ARCHIVE_SUFFIX)
            .tempfile_in(&self.transfer_dir)
            .map_err(GlotError::io("failed to create bundle", &self.transfer_dir))?;
        let (file, archive_path) = tmp
            .keep()
            .map_err(|error| GlotError::Io {
                context: "failed to keep bundle",
                path: self.transfer_dir.clone(),
                source: error.error,
            })?;

        let sha256 = seal_archive(file, &archive_path, &sources)?;

        let basename = archive_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bundle = Bundle {
            remote_location: staged_path(&basename),
            archive_path,
            entries: sources.into_iter().map(|(_, name)| name).collect(),
            sha256,
        };
        tracing::debug!(
            path = %bundle.archive_path.display(),
            remote = %bundle.remote_location,
            sha256 = %bundle.sha256,
            "made temporary tar"
        );
        Ok(bundle)
    }
}

fn flattened_sources<P: AsRef<Path>>(files: &[P]) -> Result<Vec<(PathBuf, String)>> {
    let mut seen = HashSet::new();
    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        let path = file.as_ref();
        let metadata = fs::metadata(path).map_err(GlotError::io("bundle source unavailable", path))?;
        if !metadata.is_file() {
            return Err(GlotError::Io {
                context: "bundle source is not a regular file",
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a file"),
            });
        }
        File::open(path).map_err(GlotError::io("bundle source unreadable", path))?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| GlotError::Io {
                context: "bundle source has no file name",
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "no file name"),
            })?;
        if !seen.insert(name.clone()) {
            return Err(GlotError::DuplicateBaseName { name });
        }
        sources.push((path.to_path_buf(), name));
    }
    Ok(sources)
}

// Writes, locks down and digests a kept archive. The file is removed again
// if any step fails.
fn seal_archive(file: File, archive_path: &Path, sources: &[(PathBuf, String)]) -> Result<String> {
    let sealed = write_archive(file, sources)
        .and_then(|()| widen_permissions(archive_path))
        .and_then(|()| file_digest(archive_path));
    if sealed.is_err() {
        remove_archive(archive_path);
    }
    sealed
}

fn remove_archive(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed bundle"),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => tracing::debug!(path = %path.display(), %error, "could not remove bundle"),
    }
}

fn write_archive(file: File, sources: &[(PathBuf, String)]) -> Result<()> {
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, name) in sources {
        builder
            .append_path_with_name(path, name)
            .map_err(GlotError::io("failed to add file to bundle", path))?;
        tracing::debug!(entry = %name, "added");
    }
    let encoder = builder
        .into_inner()
        .map_err(GlotError::io("failed to finish bundle", PathBuf::new()))?;
    let mut writer = encoder
        .finish()
        .map_err(GlotError::io("failed to compress bundle", PathBuf::new()))?;
    io::Write::flush(&mut writer).map_err(GlotError::io("failed to flush bundle", PathBuf::new()))
}

// The archive becomes readable by everyone; the parent of the transfer
// directory controls access.
#[cfg(unix)]
fn widen_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o444))
        .map_err(GlotError::io("failed to set bundle permissions", path))
}

#[cfg(not(unix))]
fn widen_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn file_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(GlotError::io("failed to read bundle", path))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(GlotError::io("failed to read bundle", path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
