//! Document payloads written by the workloads.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use thiserror::Error;

use crate::config::RunConfig;

/// The document source file could not be read.
#[derive(Debug, Error)]
#[error("failed to read document file {}", path.display())]
pub struct DocumentError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
}

/// Produces the values stored by the workloads.
///
/// Only the size of a document matters to the store, its contents are arbitrary.
#[derive(Clone, Debug)]
pub enum DocumentFactory {
    /// Every document is a fresh buffer of random bytes.
    Random {
        /// Length of each document in bytes.
        size: usize,
    },
    /// Every document is the same payload, loaded once from a file.
    File {
        /// The shared payload.
        payload: Bytes,
    },
}

impl DocumentFactory {
    /// Creates a factory generating random documents of `size` bytes.
    pub fn random(size: usize) -> Self {
        DocumentFactory::Random { size }
    }

    /// Reads `path` and joins its trimmed lines into a single payload.
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let contents = fs::read_to_string(path).map_err(|source| DocumentError {
            path: path.to_owned(),
            source,
        })?;

        let payload: String = contents.lines().map(str::trim).collect();
        Ok(DocumentFactory::File {
            payload: Bytes::from(payload),
        })
    }

    /// Picks the file source if a filename is configured, random documents otherwise.
    pub fn from_config(config: &RunConfig) -> Result<Self, DocumentError> {
        match &config.filename {
            Some(path) => Self::from_file(path),
            None => Ok(Self::random(
                usize::try_from(config.doc_size.as_u64()).unwrap_or(usize::MAX),
            )),
        }
    }

    /// Returns the next document.
    pub fn get_document(&self) -> Bytes {
        match self {
            DocumentFactory::Random { size } => {
                let mut rng = SmallRng::from_rng(&mut rand::rng());
                let mut buf = vec![0; *size];
                rng.fill_bytes(&mut buf);
                Bytes::from(buf)
            }
            // cloning `Bytes` shares the underlying buffer
            DocumentFactory::File { payload } => payload.clone(),
        }
    }
}
