#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use wildlabel::config::DataLayout;
use wildlabel::fetch::Fetcher;
use wildlabel::history::{BatchWriter, HistoryStore};
use wildlabel::label::LabelScheme;
use wildlabel::placement::PlacementEngine;
use wildlabel::present::Presenter;
use wildlabel::session::Session;
use wildlabel::source::StagedImage;
use wildlabel::tally::{self, Tally};
use wildlabel::WildlabelError;

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// Answers with a fixed sequence of key codes and remembers what it showed.
pub struct ScriptedPresenter {
    tokens: VecDeque<u32>,
    pub shown: Vec<String>,
    pub tallies: Vec<Tally>,
    /// History row counts observed at each presentation.
    pub history_rows: Vec<usize>,
    history_path: Option<PathBuf>,
}

impl ScriptedPresenter {
    pub fn new(tokens: &[u32]) -> Self {
        Self {
            tokens: tokens.iter().copied().collect(),
            shown: Vec::new(),
            tallies: Vec::new(),
            history_rows: Vec::new(),
            history_path: None,
        }
    }

    /// Also records how many rows the history holds before each answer.
    pub fn watching(mut self, history_path: &Path) -> Self {
        self.history_path = Some(history_path.to_path_buf());
        self
    }
}

impl Presenter for ScriptedPresenter {
    fn present(&mut self, image: &StagedImage) -> io::Result<u32> {
        self.shown.push(image.id.clone());
        if let Some(path) = &self.history_path {
            let rows = fs::read_to_string(path)?.lines().count().saturating_sub(1);
            self.history_rows.push(rows);
        }
        self.tokens
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }

    fn show_tally(&mut self, tally: &Tally) {
        self.tallies.push(*tally);
    }
}

/// Serves image bytes from memory; unknown URLs fail like a network error.
#[derive(Default)]
pub struct MemoryFetcher {
    images: HashMap<String, Vec<u8>>,
    pub requests: Vec<String>,
}

impl MemoryFetcher {
    pub fn with_images(urls: &[&str]) -> Self {
        Self {
            images: urls
                .iter()
                .map(|url| (url.to_string(), bmp_bytes(2, 2)))
                .collect(),
            requests: Vec::new(),
        }
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&mut self, url: &str) -> Result<Vec<u8>, WildlabelError> {
        self.requests.push(url.to_string());
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| WildlabelError::Fetch {
                url: url.to_string(),
                message: "connection refused".to_string(),
            })
    }
}

/// Builds a session resumed from the history under `layout`.
pub fn resume_session(layout: &DataLayout, batch_size: usize, test_split: f64) -> Session {
    let scheme = LabelScheme::default();
    let store = HistoryStore::new(layout.history_path());
    let history = store.load().expect("load history");
    let tally = tally::reconcile(&history, &scheme);
    let placement = PlacementEngine::with_seed(layout.labelled_images_dir(), test_split, Some(7));
    Session::new(scheme, BatchWriter::new(store, batch_size), placement, tally)
}

pub fn history_rows(layout: &DataLayout) -> Vec<(String, String)> {
    HistoryStore::new(layout.history_path())
        .load()
        .expect("load history")
        .into_iter()
        .map(|record| (record.id, record.label))
        .collect()
}

pub fn row(id: &str, label: &str) -> (String, String) {
    (id.to_string(), label.to_string())
}
