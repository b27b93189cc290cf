//! Image acquisition for the labelling loop.
//!
//! Local sessions read images straight from the staging directory and leave
//! them there. Remote sessions fetch each image into a cache directory
//! first; placement later moves the cached file into the output tree.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::dataset::{is_safe_identifier, Candidate};
use crate::error::WildlabelError;
use crate::fetch::Fetcher;
use crate::placement::StagingMode;

/// An image ready to be shown to the operator.
#[derive(Clone, Debug)]
pub struct StagedImage {
    pub id: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Produces image bytes for a candidate.
pub trait ImageSource {
    fn acquire(&mut self, candidate: &Candidate) -> Result<StagedImage, WildlabelError>;

    /// How placement must treat the staged file.
    fn staging_mode(&self) -> StagingMode;
}

/// Lists the regular files directly inside a staging directory, sorted.
pub fn list_staged_images(dir: &Path) -> Result<Vec<String>, WildlabelError> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| WildlabelError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Images already on disk, named by identifier.
#[derive(Clone, Debug)]
pub struct LocalDirectory {
    dir: PathBuf,
}

impl LocalDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ImageSource for LocalDirectory {
    fn acquire(&mut self, candidate: &Candidate) -> Result<StagedImage, WildlabelError> {
        let path = self.dir.join(&candidate.id);
        let bytes = fs::read(&path).map_err(WildlabelError::Io)?;
        Ok(StagedImage {
            id: candidate.id.clone(),
            path,
            bytes,
        })
    }

    fn staging_mode(&self) -> StagingMode {
        StagingMode::Copy
    }
}

/// Images fetched from each candidate's `image_url` and cached on disk.
pub struct RemoteSource<F> {
    fetcher: F,
    cache_dir: PathBuf,
}

impl<F: Fetcher> RemoteSource<F> {
    pub fn new(fetcher: F, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cached_path(&self, id: &str) -> PathBuf {
        self.cache_dir.join(format!("{id}.jpg"))
    }
}

impl<F: Fetcher> ImageSource for RemoteSource<F> {
    fn acquire(&mut self, candidate: &Candidate) -> Result<StagedImage, WildlabelError> {
        if !is_safe_identifier(&candidate.id) {
            return Err(WildlabelError::InvalidIdentifier {
                path: self.cache_dir.clone(),
                id: candidate.id.clone(),
            });
        }

        let path = self.cached_path(&candidate.id);
        if path.is_file() {
            tracing::debug!(id = %candidate.id, "using cached image");
            let bytes = fs::read(&path).map_err(WildlabelError::Io)?;
            return Ok(StagedImage {
                id: candidate.id.clone(),
                path,
                bytes,
            });
        }

        let url = candidate
            .image_url
            .as_deref()
            .ok_or_else(|| WildlabelError::MissingImageUrl {
                id: candidate.id.clone(),
            })?;
        let bytes = self.fetcher.fetch(url)?;

        fs::create_dir_all(&self.cache_dir).map_err(WildlabelError::Io)?;
        fs::write(&path, &bytes).map_err(WildlabelError::Io)?;

        Ok(StagedImage {
            id: candidate.id.clone(),
            path,
            bytes,
        })
    }

    fn staging_mode(&self) -> StagingMode {
        StagingMode::Move
    }
}
