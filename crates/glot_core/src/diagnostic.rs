//! Turning a retrieved diagnostic archive back into a runnable directory.
//!
//! The archive is overlaid onto a freshly materialised scaffold: the common
//! directory prefix shared by all entries is stripped, `input.final` is
//! renamed to `input`, and mode-specific files are copied into place.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::{GlotError, Result};
use crate::scaffold::{ScaffoldCloner, ScaffoldTable};

const INPUT_DIR: &str = "input";
const FINAL_INPUT_DIR: &str = "input.final";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub struct DiagnosticUnpacker {
    scaffolds: ScaffoldTable,
    cloner: Box<dyn ScaffoldCloner + Send + Sync>,
    force: bool,
    verbose: bool,
}

impl DiagnosticUnpacker {
    pub fn new(scaffolds: ScaffoldTable, cloner: Box<dyn ScaffoldCloner + Send + Sync>) -> Self {
        Self {
            scaffolds,
            cloner,
            force: false,
            verbose: false,
        }
    }

    /// Replace an existing destination instead of refusing to touch it.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Log every entry → output path mapping at info level.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Unpack `archive` onto the scaffold for `mode` and return the
    /// destination directory.
    ///
    /// The destination defaults to the archive path without its extension.
    pub fn inspect(&self, archive: &Path, destination: Option<&Path>, mode: &str) -> Result<PathBuf> {
        if !archive.exists() {
            return Err(GlotError::MissingArchive {
                path: archive.to_path_buf(),
            });
        }

        let root = destination
            .map(Path::to_path_buf)
            .unwrap_or_else(|| archive.with_extension(""));
        let spec = self.scaffolds.lookup(mode)?;

        if self.force {
            match fs::remove_dir_all(&root) {
                Ok(()) => {}
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => {
                    return Err(GlotError::Io {
                        context: "failed to remove existing destination",
                        path: root,
                        source: error,
                    })
                }
            }
        } else if root.exists() {
            return Err(GlotError::DestinationExists { path: root });
        }

        tracing::debug!(path = %root.display(), "extracting");
        tracing::debug!(source = %spec.source, "cloning control");
        self.cloner
            .materialize(&spec.source, &root)
            .map_err(|message| GlotError::Scaffold {
                source_location: spec.source.clone(),
                message,
            })?;

        tracing::debug!(archive = %archive.display(), "opening diagnostic archive");
        let names = entry_names(archive)?;
        let prefix = common_prefix(
            names.iter().filter(|(_, is_dir)| !is_dir).map(|(name, _)| name.as_str()),
        );
        tracing::debug!(prefix = %prefix, "stripping prefix");

        let has_input = names.iter().any(|(name, _)| {
            name.strip_prefix(prefix.as_str())
                .and_then(|residual| residual.split('/').next())
                .map(|first| first == INPUT_DIR || first == FINAL_INPUT_DIR)
                .unwrap_or(false)
        });
        if !has_input {
            let input = root.join(INPUT_DIR);
            fs::create_dir_all(&input).map_err(GlotError::io("failed to create input directory", &input))?;
        }

        self.extract(archive, &prefix, &root)?;
        tracing::info!("done extracting");

        for (from, to) in &spec.copies {
            let from = root.join(from);
            let to = root.join(to);
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent).map_err(GlotError::io("failed to create directory", parent))?;
            }
            fs::copy(&from, &to).map_err(GlotError::io("failed to copy scaffold file", &from))?;
            tracing::debug!(from = %from.display(), to = %to.display(), "copied");
        }

        Ok(root)
    }

    fn extract(&self, archive: &Path, prefix: &str, root: &Path) -> Result<()> {
        let mut reader = open_archive(archive)?;
        let entries = reader
            .entries()
            .map_err(GlotError::io("failed to read archive", archive))?;

        for entry in entries {
            let mut entry = entry.map_err(GlotError::io("failed to read archive entry", archive))?;
            let name = normalized_name(&entry.path_bytes());
            let Some(residual) = name.strip_prefix(prefix) else {
                continue;
            };
            if residual.is_empty() {
                continue;
            }
            let Some(relative) = remap_entry(residual) else {
                tracing::warn!(entry = %name, "skipping entry outside destination");
                continue;
            };
            let out = root.join(&relative);
            if self.verbose {
                tracing::info!("{name} --> {}", out.display());
            }

            let kind = entry.header().entry_type();
            if kind.is_dir() {
                fs::create_dir_all(&out).map_err(GlotError::io("failed to create directory", &out))?;
            } else if kind.is_file() {
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent).map_err(GlotError::io("failed to create directory", parent))?;
                }
                let mut file = File::create(&out).map_err(GlotError::io("failed to create file", &out))?;
                io::copy(&mut entry, &mut file).map_err(GlotError::io("failed to extract file", &out))?;
            } else {
                tracing::debug!(entry = %name, "skipping non-regular entry");
            }
        }
        Ok(())
    }
}

/// Unpack every entry of `archive` below `destination`, creating it first.
pub fn extract_archive(archive: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination).map_err(GlotError::io("failed to create destination", destination))?;
    let mut reader = open_archive(archive)?;
    reader
        .unpack(destination)
        .map_err(GlotError::io("failed to unpack archive", archive))
}

/// Common directory prefix of the non-directory entries of `archive`.
pub fn archive_prefix(archive: &Path) -> Result<String> {
    let names = entry_names(archive)?;
    Ok(common_prefix(
        names.iter().filter(|(_, is_dir)| !is_dir).map(|(name, _)| name.as_str()),
    ))
}

/// Longest run of leading directories shared by every entry, with a
/// trailing slash, or an empty string when nothing is shared.
pub fn common_prefix<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut shared: Option<Vec<&str>> = None;
    for name in names {
        let mut dirs: Vec<&str> = name.split('/').filter(|part| !part.is_empty()).collect();
        dirs.pop();
        shared = Some(match shared {
            None => dirs,
            Some(current) => current
                .into_iter()
                .zip(dirs)
                .take_while(|(left, right)| left == right)
                .map(|(left, _)| left)
                .collect(),
        });
    }

    match shared {
        Some(dirs) if !dirs.is_empty() => format!("{}/", dirs.join("/")),
        _ => String::new(),
    }
}

/// Relative output path for an entry once its prefix is gone; `None` for
/// anything that would land outside the destination.
pub fn remap_entry(residual: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for (index, component) in Path::new(residual).components().enumerate() {
        match component {
            Component::Normal(part) if index == 0 && part == FINAL_INPUT_DIR => out.push(INPUT_DIR),
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn entry_names(archive: &Path) -> Result<Vec<(String, bool)>> {
    let mut reader = open_archive(archive)?;
    let entries = reader
        .entries()
        .map_err(GlotError::io("failed to read archive", archive))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(GlotError::io("failed to read archive entry", archive))?;
        let is_dir = entry.header().entry_type().is_dir();
        names.push((normalized_name(&entry.path_bytes()), is_dir));
    }
    Ok(names)
}

fn normalized_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    let name = name.trim_start_matches("./").trim_end_matches('/');
    name.to_string()
}

fn open_archive(path: &Path) -> Result<tar::Archive<Box<dyn Read>>> {
    let mut file = File::open(path).map_err(GlotError::io("failed to open archive", path))?;
    let mut magic = [0u8; 2];
    let gzipped = match file.read_exact(&mut magic) {
        Ok(()) => magic == GZIP_MAGIC,
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(error) => return Err(GlotError::io("failed to read archive", path)(error)),
    };
    file.seek(SeekFrom::Start(0))
        .map_err(GlotError::io("failed to read archive", path))?;

    let reader: Box<dyn Read> = if gzipped {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(tar::Archive::new(reader))
}
