//! Observation dataset aggregation.
//!
//! Observation tables are CSV files with one row per observation. The
//! identifier comes from an `id` column, or from the first column when no
//! `id` column exists. Rows whose `taxon_species_name` matches the excluded
//! species are dropped, and the survivors of every file are concatenated in
//! input order.
//!
//! Identifiers repeated across input files are kept as-is; aggregation only
//! logs them.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::WildlabelError;

/// Column holding the identifier, when present.
pub const ID_COLUMN: &str = "id";
/// Column holding the species name used for filtering.
pub const SPECIES_COLUMN: &str = "taxon_species_name";
/// Column holding the remote image location.
pub const IMAGE_URL_COLUMN: &str = "image_url";

/// Species dropped from every aggregated dataset by default.
pub const DEFAULT_EXCLUDED_SPECIES: &str = "Felis catus";

/// An image awaiting a label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub image_url: Option<String>,
    pub species: Option<String>,
    /// Remaining columns in file order.
    pub metadata: Vec<(String, String)>,
}

impl Candidate {
    /// A candidate that is only known by its identifier.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image_url: None,
            species: None,
            metadata: Vec::new(),
        }
    }

    /// A candidate fetched from a URL.
    pub fn with_url(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Self::from_id(id)
        }
    }
}

/// The aggregated candidates, in concatenation order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateTable {
    pub candidates: Vec<Candidate>,
}

impl CandidateTable {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|c| c.id.as_str())
    }
}

impl IntoIterator for CandidateTable {
    type Item = Candidate;
    type IntoIter = std::vec::IntoIter<Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

/// Aggregation options.
#[derive(Clone, Debug)]
pub struct AggregateOptions {
    pub excluded_species: String,
    /// Fail on tables without an `image_url` column.
    pub require_image_url: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            excluded_species: DEFAULT_EXCLUDED_SPECIES.to_string(),
            require_image_url: false,
        }
    }
}

/// Reads and concatenates several observation tables.
///
/// # Errors
/// Fails on the first file that cannot be opened, parsed, or that lacks a
/// required column. No partial table is returned.
pub fn aggregate_datasets<P: AsRef<Path>>(
    paths: &[P],
    opts: &AggregateOptions,
) -> Result<CandidateTable, WildlabelError> {
    let mut table = CandidateTable::default();
    let mut seen: HashSet<String> = HashSet::new();

    for path in paths {
        let path = path.as_ref();
        let loaded = read_dataset(path, opts)?;
        tracing::debug!(
            path = %path.display(),
            candidates = loaded.len(),
            "loaded observation dataset"
        );

        for candidate in loaded.candidates {
            if !seen.insert(candidate.id.clone()) {
                tracing::warn!(
                    id = %candidate.id,
                    path = %path.display(),
                    "identifier appears in more than one observation row"
                );
            }
            table.candidates.push(candidate);
        }
    }

    Ok(table)
}

/// Reads a single observation table, applying the species filter.
pub fn read_dataset(path: &Path, opts: &AggregateOptions) -> Result<CandidateTable, WildlabelError> {
    let file = File::open(path).map_err(WildlabelError::Io)?;
    parse_dataset(BufReader::new(file), path, opts)
}

/// Reads an observation table from a CSV string.
///
/// Useful for testing without file I/O.
pub fn from_dataset_csv_str(
    csv_str: &str,
    opts: &AggregateOptions,
) -> Result<CandidateTable, WildlabelError> {
    from_dataset_csv_slice(csv_str.as_bytes(), opts)
}

/// Reads an observation table from CSV bytes.
///
/// Useful for fuzzing and processing raw bytes without requiring UTF-8 upfront.
pub fn from_dataset_csv_slice(
    bytes: &[u8],
    opts: &AggregateOptions,
) -> Result<CandidateTable, WildlabelError> {
    parse_dataset(bytes, Path::new("<bytes>"), opts)
}

fn parse_dataset<R: Read>(
    reader: R,
    path: &Path,
    opts: &AggregateOptions,
) -> Result<CandidateTable, WildlabelError> {
    let parse_err = |source| WildlabelError::DatasetCsvParse {
        path: path.to_path_buf(),
        source,
    };

    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers().map_err(parse_err)?.clone();

    let missing = |column: &str| WildlabelError::MissingColumn {
        path: path.to_path_buf(),
        column: column.to_string(),
    };

    if headers.is_empty() {
        return Err(missing(ID_COLUMN));
    }
    let id_index = headers.iter().position(|h| h == ID_COLUMN).unwrap_or(0);
    let species_index = headers
        .iter()
        .position(|h| h == SPECIES_COLUMN)
        .ok_or_else(|| missing(SPECIES_COLUMN))?;
    let url_index = headers.iter().position(|h| h == IMAGE_URL_COLUMN);
    if opts.require_image_url && url_index.is_none() {
        return Err(missing(IMAGE_URL_COLUMN));
    }

    let mut table = CandidateTable::default();
    for result in csv_reader.records() {
        let record = result.map_err(parse_err)?;
        let field = |index: usize| record.get(index).unwrap_or("");

        let species = field(species_index);
        if species == opts.excluded_species {
            continue;
        }

        let id = field(id_index);
        if !is_safe_identifier(id) {
            return Err(WildlabelError::InvalidIdentifier {
                path: path.to_path_buf(),
                id: id.to_string(),
            });
        }

        let metadata = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != id_index && *i != species_index && Some(*i) != url_index)
            .map(|(i, name)| (name.to_string(), field(i).to_string()))
            .collect();

        table.candidates.push(Candidate {
            id: id.to_string(),
            image_url: url_index
                .map(field)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
            species: Some(species.to_string()).filter(|s| !s.is_empty()),
            metadata,
        });
    }

    Ok(table)
}

/// Whether an identifier can be used as a file name stem.
///
/// Identifiers name cached and placed files, so they must not be empty,
/// contain path separators, or refer to a directory.
pub fn is_safe_identifier(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\', '\0'])
}

#[derive(Serialize)]
struct CandidateRow<'a> {
    id: &'a str,
    taxon_species_name: &'a str,
    image_url: &'a str,
}

/// Writes a candidate table as `id,taxon_species_name,image_url` CSV.
pub fn write_candidates(path: &Path, table: &CandidateTable) -> Result<(), WildlabelError> {
    let file = File::create(path).map_err(WildlabelError::Io)?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    for candidate in &table.candidates {
        let row = CandidateRow {
            id: &candidate.id,
            taxon_species_name: candidate.species.as_deref().unwrap_or(""),
            image_url: candidate.image_url.as_deref().unwrap_or(""),
        };
        csv_writer
            .serialize(&row)
            .map_err(|source| WildlabelError::DatasetCsvWrite {
                path: path.to_path_buf(),
                source,
            })?;
    }

    csv_writer
        .into_inner()
        .map_err(|e| WildlabelError::Io(e.into_error()))?
        .flush()
        .map_err(WildlabelError::Io)?;

    Ok(())
}

/// Resolves a dataset name against the observations directory.
///
/// Absolute paths and paths that exist as given are used unchanged.
pub fn resolve_dataset_path(observations_dir: &Path, name: &Path) -> PathBuf {
    if name.is_absolute() || name.exists() {
        name.to_path_buf()
    } else {
        observations_dir.join(name)
    }
}
