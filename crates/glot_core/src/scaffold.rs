//! Scaffold directories that diagnostic archives are overlaid onto.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GlotError, Result};

pub const GOOSEFOOT_MODE: &str = "goosefoot";
pub const GOOSEFOOT_SOURCE: &str = "https://github.com/go-smart/glossia-container-goosefoot-control";

/// Materialises a scaffold source into an empty destination directory.
pub trait ScaffoldCloner {
    fn materialize(&self, source: &str, destination: &Path) -> Result<(), String>;
}

/// Where a mode's scaffold comes from and which files must be copied into
/// place once the archive has been extracted over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldSpec {
    pub source: String,
    /// `(from, to)` pairs relative to the destination root.
    #[serde(default)]
    pub copies: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldTable {
    pub modes: BTreeMap<String, ScaffoldSpec>,
}

impl Default for ScaffoldTable {
    fn default() -> Self {
        Self {
            modes: BTreeMap::from([(
                GOOSEFOOT_MODE.to_string(),
                ScaffoldSpec {
                    source: GOOSEFOOT_SOURCE.to_string(),
                    copies: vec![(
                        "input/settings.xml".to_string(),
                        "settings/settings.xml".to_string(),
                    )],
                },
            )]),
        }
    }
}

impl ScaffoldTable {
    pub fn empty() -> Self {
        Self {
            modes: BTreeMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>, spec: ScaffoldSpec) -> Self {
        self.modes.insert(mode.into(), spec);
        self
    }

    /// Built-in modes overlaid with the entries of a JSON table file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(GlotError::io("failed to read scaffold table", path))?;
        let overrides: ScaffoldTable = serde_json::from_str(&text).map_err(|error| GlotError::Io {
            context: "invalid scaffold table",
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, error),
        })?;
        let mut table = Self::default();
        table.modes.extend(overrides.modes);
        Ok(table)
    }

    pub fn lookup(&self, mode: &str) -> Result<&ScaffoldSpec> {
        self.modes.get(mode).ok_or_else(|| GlotError::UnknownScaffoldMode {
            mode: mode.to_string(),
        })
    }
}
