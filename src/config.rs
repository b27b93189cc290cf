//! Session configuration and the on-disk data layout.
//!
//! Configuration comes from an optional YAML file. Fields that are missing
//! from the file keep their defaults, and command line flags override both.
//!
//! ```yaml
//! test_split: 0.25
//! batch_size: 10
//! excluded_species: Felis catus
//! labels:
//!   present: Wildlife
//!   absent: Empty
//!   tokens:
//!     49: Present
//!     48: Absent
//!     32: Ignore
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::DEFAULT_EXCLUDED_SPECIES;
use crate::error::WildlabelError;
use crate::label::LabelScheme;
use crate::placement::DEFAULT_TEST_SPLIT;

/// Labels buffered in memory before they are appended to the history.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Name of the history file inside the labelled directory.
pub const HISTORY_FILE_NAME: &str = "wildlife_presence.csv";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub test_split: f64,
    pub batch_size: usize,
    pub excluded_species: String,
    pub labels: LabelScheme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            test_split: DEFAULT_TEST_SPLIT,
            batch_size: DEFAULT_BATCH_SIZE,
            excluded_species: DEFAULT_EXCLUDED_SPECIES.to_string(),
            labels: LabelScheme::default(),
        }
    }
}

impl Config {
    /// Reads a YAML config file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, WildlabelError> {
        let data = fs::read_to_string(path).map_err(WildlabelError::Io)?;
        serde_yaml::from_str(&data).map_err(|source| WildlabelError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the file if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, WildlabelError> {
        match path {
            Some(path) => Self::from_yaml_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), WildlabelError> {
        if !(0.0..=1.0).contains(&self.test_split) {
            return Err(WildlabelError::InvalidConfig(format!(
                "test_split must be in [0.0, 1.0], got {}",
                self.test_split
            )));
        }
        if self.batch_size == 0 {
            return Err(WildlabelError::InvalidConfig(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        self.labels.validate()
    }
}

/// Paths under the data root.
#[derive(Clone, Debug)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Observation datasets.
    pub fn observations_dir(&self) -> PathBuf {
        self.root.join("observations")
    }

    /// Local images waiting for a label.
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    /// Fetched images waiting for a label.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn labelled_dir(&self) -> PathBuf {
        self.root.join("labelled")
    }

    pub fn history_path(&self) -> PathBuf {
        self.labelled_dir().join(HISTORY_FILE_NAME)
    }

    /// Root of the per-label output tree.
    pub fn labelled_images_dir(&self) -> PathBuf {
        self.labelled_dir().join("images")
    }
}
