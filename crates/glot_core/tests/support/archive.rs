use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use glot_core::ScaffoldCloner;

/// Write a gzipped tar at `path` holding `entries` (name, body).
pub fn write_tgz(path: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
    let file = File::create(path).expect("create archive");
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, body) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *body)
            .expect("append entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
    path.to_path_buf()
}

/// Every regular file below `root`, relative and sorted, with its bytes.
pub fn tree(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut out = Vec::new();
    collect(root, root, &mut out);
    out.sort();
    out
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
    for entry in fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            collect(root, &path, out);
        } else {
            let relative = path
                .strip_prefix(root)
                .expect("below root")
                .to_string_lossy()
                .into_owned();
            out.push((relative, fs::read(&path).expect("read file")));
        }
    }
}

/// Scaffold cloner that lays down a minimal control tree.
pub struct FakeCloner;

impl ScaffoldCloner for FakeCloner {
    fn materialize(&self, _source: &str, destination: &Path) -> Result<(), String> {
        fs::create_dir_all(destination.join("settings")).map_err(|error| error.to_string())?;
        fs::write(destination.join("README.md"), b"control\n").map_err(|error| error.to_string())
    }
}

/// Scaffold cloner that always fails.
pub struct BrokenCloner;

impl ScaffoldCloner for BrokenCloner {
    fn materialize(&self, source: &str, _destination: &Path) -> Result<(), String> {
        Err(format!("cannot reach {source}"))
    }
}
