//! Filing labelled images into the output tree.
//!
//! Images land in `<root>/<label>/`, except for a random fraction that is
//! held out under `<root>/test/<label>/`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::error::WildlabelError;

/// Name of the held-out partition directory.
pub const TEST_DIR: &str = "test";

/// Default fraction of images diverted to the test partition.
pub const DEFAULT_TEST_SPLIT: f64 = 0.2;

/// How the staged image is consumed by placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagingMode {
    /// Copy the file and keep its name. The staged file stays where it is.
    Copy,
    /// Move the file, renaming it to `<label>_image_<id>.jpg`.
    Move,
}

/// Which partition an image was placed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Test,
}

impl Partition {
    /// Chooses the partition for a uniform draw in `[0, 1)`.
    ///
    /// Draws at or above `1 - test_split` go to the test partition.
    pub fn for_draw(draw: f64, test_split: f64) -> Self {
        if draw >= 1.0 - test_split {
            Partition::Test
        } else {
            Partition::Train
        }
    }
}

/// Where an image ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub path: PathBuf,
    pub partition: Partition,
}

/// Files labelled images under a root directory.
#[derive(Debug)]
pub struct PlacementEngine {
    root: PathBuf,
    test_split: f64,
    rng: StdRng,
}

impl PlacementEngine {
    pub fn new(root: impl Into<PathBuf>, test_split: f64, rng: StdRng) -> Self {
        Self {
            root: root.into(),
            test_split: test_split.clamp(0.0, 1.0),
            rng,
        }
    }

    /// Creates an engine with a seeded RNG, or an OS-seeded one.
    pub fn with_seed(root: impl Into<PathBuf>, test_split: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::new(root, test_split, rng)
    }

    /// Places an image using a fresh random draw.
    pub fn place(
        &mut self,
        id: &str,
        label: &str,
        source: &Path,
        mode: StagingMode,
    ) -> Result<Placement, WildlabelError> {
        let draw: f64 = self.rng.random();
        self.place_with_draw(id, label, source, mode, draw)
    }

    /// Places an image using the given draw to pick the partition.
    pub fn place_with_draw(
        &self,
        id: &str,
        label: &str,
        source: &Path,
        mode: StagingMode,
        draw: f64,
    ) -> Result<Placement, WildlabelError> {
        let partition = Partition::for_draw(draw, self.test_split);
        let dir = match partition {
            Partition::Train => self.root.join(label),
            Partition::Test => self.root.join(TEST_DIR).join(label),
        };
        fs::create_dir_all(&dir).map_err(WildlabelError::Io)?;

        let path = dir.join(destination_name(id, label, source, mode));
        match mode {
            StagingMode::Copy => {
                fs::copy(source, &path).map_err(WildlabelError::Io)?;
            }
            StagingMode::Move => move_file(source, &path).map_err(WildlabelError::Io)?,
        }

        tracing::debug!(
            id,
            label,
            partition = ?partition,
            path = %path.display(),
            "placed labelled image"
        );
        Ok(Placement { path, partition })
    }
}

fn destination_name(id: &str, label: &str, source: &Path, mode: StagingMode) -> String {
    match mode {
        StagingMode::Copy => source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.to_string()),
        StagingMode::Move => format!("{label}_image_{id}.jpg"),
    }
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    fs::copy(from, to)?;
    fs::remove_file(from)
}
