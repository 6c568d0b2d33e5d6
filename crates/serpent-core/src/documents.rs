use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::SpeciesDocument;

/// A knowledge-base file holds either one species record or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentFile {
    Many(Vec<SpeciesDocument>),
    One(SpeciesDocument),
}

#[derive(Default)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self { Self }

    /// Load every `.json` file under `data_dir`, sorted by path.
    pub fn load_directory(&self, data_dir: &Path) -> Result<Vec<SpeciesDocument>> {
        if !data_dir.exists() {
            return Err(Error::NotFound(format!("data directory {}", data_dir.display())));
        }
        let files = self.list_json_files(data_dir);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no .json files found");
            return Ok(vec![]);
        }
        let mut documents = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            info!(file = %file_path.display(), "loading file {}/{}", file_index + 1, files.len());
            documents.extend(self.load_file(file_path)?);
        }
        info!(files = files.len(), documents = documents.len(), "loaded species documents");
        Ok(documents)
    }

    pub fn load_file(&self, file_path: &Path) -> Result<Vec<SpeciesDocument>> {
        let raw = fs::read_to_string(file_path)
            .map_err(|e| Error::Persistence(format!("reading {}: {}", file_path.display(), e)))?;
        let parsed: DocumentFile = serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidInput(format!("parsing {}: {}", file_path.display(), e)))?;
        let docs = match parsed {
            DocumentFile::Many(docs) => docs,
            DocumentFile::One(doc) => vec![doc],
        };
        for doc in &docs {
            if doc.name.trim().is_empty() {
                return Err(Error::InvalidInput(format!("{}: species record without a name", file_path.display())));
            }
        }
        Ok(docs)
    }

    fn list_json_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut json_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        json_files.sort();
        json_files
    }
}
