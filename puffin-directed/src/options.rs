use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::counters::DEFAULT_ENTRY_POINT;
use crate::error::{Error, Result};

/// Configuration of the [`DirectedFuzzingPass`](crate::pass::DirectedFuzzingPass).
///
/// Can be read from a TOML file:
///
/// ```toml
/// distance_file = "out/distance.cfg.txt"
/// entry_point = "LLVMFuzzerTestOneInput"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// File containing the distance of each basic block to the targets.
    pub distance_file: Option<PathBuf>,
    /// Symbol whose presence makes a unit the owner of the counter definitions.
    pub entry_point: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            distance_file: None,
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
        }
    }
}

impl Options {
    pub fn new(distance_file: impl Into<PathBuf>) -> Self {
        Self {
            distance_file: Some(distance_file.into()),
            ..Self::default()
        }
    }

    pub fn from_toml(toml_str: impl AsRef<str>) -> Result<Self> {
        Ok(toml::from_str(toml_str.as_ref())?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|source| Error::ConfigUnreadable {
                path: path.as_ref().to_path_buf(),
                source,
            })?;
        Self::from_toml(content)
    }

    pub fn distance_file(&self) -> Option<&Path> {
        self.distance_file.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_defaults() {
        let options = Options::default();

        assert_eq!(options.distance_file(), None);
        assert_eq!(options.entry_point, "LLVMFuzzerTestOneInput");
    }

    #[test_log::test]
    fn test_from_toml() {
        let options = Options::from_toml(
            r#"
            distance_file = "out/distance.cfg.txt"
            "#,
        )
        .unwrap();

        assert_eq!(
            options.distance_file(),
            Some(Path::new("out/distance.cfg.txt"))
        );
        assert_eq!(options.entry_point, DEFAULT_ENTRY_POINT);
    }

    #[test_log::test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(
            Options::from_toml("distance_file = 3"),
            Err(Error::ConfigMalformed(_))
        ));
    }

    #[test_log::test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            Options::from_file(dir.path().join("directed.toml")),
            Err(Error::ConfigUnreadable { .. })
        ));
    }
}
