use std::path::Path;
use std::process::Command;

use glot_core::ScaffoldCloner;

/// Materialises scaffolds with `git clone --quiet`.
#[derive(Debug, Clone)]
pub struct GitCommandCloner {
    program: String,
}

impl Default for GitCommandCloner {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCommandCloner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ScaffoldCloner for GitCommandCloner {
    fn materialize(&self, source: &str, destination: &Path) -> Result<(), String> {
        tracing::debug!("+ {} clone --quiet {source} {}", self.program, destination.display());
        let output = Command::new(&self.program)
            .args(["clone", "--quiet", source])
            .arg(destination)
            .output()
            .map_err(|error| format!("failed to execute {}: {error}", self.program))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!(
            "{} clone exited with {}: {}",
            self.program,
            output.status,
            stderr.trim()
        ))
    }
}
