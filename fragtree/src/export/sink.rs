use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::FragTreeResult;

/// Destination of exported documents.
///
/// `dir` arguments are the tree or data subdirectory configured for the
/// export, empty when pages live next to the collection document.
pub trait FragmentSink {
    fn write_collection(&mut self, name: &str, document: &Value) -> FragTreeResult<()>;

    fn write_tree_page(&mut self, dir: &str, page: u64, document: &Value) -> FragTreeResult<()>;

    fn write_data_page(&mut self, dir: &str, page: u64, document: &Value) -> FragTreeResult<()>;
}

pub fn tree_page_name(page: u64) -> String {
    format!("t{}.jsonld", page)
}

pub fn data_page_name(page: u64) -> String {
    format!("d{}.jsonld", page)
}

/// Writes documents as files below an output directory:
/// `<out>/<collection>`, `<out>/<tree dir>/t<n>.jsonld` and
/// `<out>/<data dir>/d<n>.jsonld`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    out_dir: PathBuf,
}

impl DirectorySink {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn write(&self, dir: &str, file: &str, document: &Value) -> FragTreeResult<()> {
        let dir = self.out_dir.join(dir.trim_matches('/'));
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(file), serde_json::to_vec(document)?)?;
        Ok(())
    }
}

impl FragmentSink for DirectorySink {
    fn write_collection(&mut self, name: &str, document: &Value) -> FragTreeResult<()> {
        self.write("", name, document)
    }

    fn write_tree_page(&mut self, dir: &str, page: u64, document: &Value) -> FragTreeResult<()> {
        self.write(dir, &tree_page_name(page), document)
    }

    fn write_data_page(&mut self, dir: &str, page: u64, document: &Value) -> FragTreeResult<()> {
        self.write(dir, &data_page_name(page), document)
    }
}

/// Keeps every document in memory, keyed by page number.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub collection: Option<(String, Value)>,
    pub tree_pages: BTreeMap<u64, Value>,
    pub data_pages: BTreeMap<u64, Value>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FragmentSink for MemorySink {
    fn write_collection(&mut self, name: &str, document: &Value) -> FragTreeResult<()> {
        self.collection = Some((name.to_string(), document.clone()));
        Ok(())
    }

    fn write_tree_page(&mut self, _dir: &str, page: u64, document: &Value) -> FragTreeResult<()> {
        self.tree_pages.insert(page, document.clone());
        Ok(())
    }

    fn write_data_page(&mut self, _dir: &str, page: u64, document: &Value) -> FragTreeResult<()> {
        self.data_pages.insert(page, document.clone());
        Ok(())
    }
}
