// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON document store: one file per document, one directory per collection.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from document operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Replace path-hostile characters so any id can become a file name.
///
/// Device ids like `192.168.0.12:5555` must map to stable, unique names.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Key→document JSON store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_path(&self, collection: &str, id: &str) -> PathBuf {
        self.root
            .join(collection)
            .join(format!("{}.json", sanitize_id(id)))
    }

    /// Load a document, or `NotFound` when the file does not exist.
    pub fn get<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<T, StorageError> {
        let path = self.doc_path(collection, id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    /// Load a document if present.
    pub fn try_get<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, StorageError> {
        match self.get(collection, id) {
            Ok(doc) => Ok(Some(doc)),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write a document. Creates the collection directory on first write;
    /// the write goes through a temp file + rename so readers never observe
    /// a half-written document.
    pub fn put<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<(), StorageError> {
        let path = self.doc_path(collection, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(doc)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Delete a document. Returns false when it did not exist.
    pub fn delete(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let path = self.doc_path(collection, id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Load every document in a collection. Unparseable files are skipped
    /// with a warning rather than failing the listing.
    pub fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, StorageError> {
        let dir = self.root.join(collection);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut docs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('_'))
            {
                continue;
            }
            let data = fs::read(&path)?;
            match serde_json::from_slice(&data) {
                Ok(doc) => docs.push(doc),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unparseable document");
                }
            }
        }
        Ok(docs)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
