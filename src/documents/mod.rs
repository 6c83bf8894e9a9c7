// Document source
// Enumerates the knowledge-base folder and classifies files by extension

pub mod extractor;

#[cfg(test)]
mod tests;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::Result;

pub use extractor::{ExtractError, extract};

/// Formats the text extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Spreadsheet,
    PlainText,
}

impl DocumentFormat {
    /// Classify a file by its extension, case-insensitively
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();

        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Spreadsheet),
            "txt" | "text" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Spreadsheet => write!(f, "spreadsheet"),
            Self::PlainText => write!(f, "text"),
        }
    }
}

/// A file read from the document folder
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

impl Document {
    #[inline]
    pub fn new(name: impl Into<String>, format: DocumentFormat, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            format,
            bytes,
        }
    }
}

/// Result of enumerating a document folder
#[derive(Debug, Default)]
pub struct SourceScan {
    /// Supported documents, ordered by file name
    pub documents: Vec<Document>,
    /// Names of files that were skipped because their format is unsupported
    pub skipped: Vec<String>,
}

/// Read every supported document in `folder`.
///
/// A missing folder yields an empty scan. Subdirectories are ignored.
#[inline]
pub fn scan(folder: &Path) -> Result<SourceScan> {
    if !folder.exists() {
        info!(
            "Document folder {} does not exist, nothing to index",
            folder.display()
        );
        return Ok(SourceScan::default());
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                warn!("Failed to read entry in {}: {}", folder.display(), e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut scan = SourceScan::default();

    for path in paths {
        let name = display_name(&path);

        let Some(format) = DocumentFormat::from_path(&path) else {
            info!("Skipping unsupported file {}", name);
            scan.skipped.push(name);
            continue;
        };

        match fs::read(&path) {
            Ok(bytes) => {
                debug!("Read {} ({}, {} bytes)", name, format, bytes.len());
                scan.documents.push(Document::new(name, format, bytes));
            }
            Err(e) => {
                warn!("Failed to read {}: {}", name, e);
                scan.skipped.push(name);
            }
        }
    }

    Ok(scan)
}

/// Copy files into `folder`, creating it if needed. Returns the stored paths.
///
/// Only the final path component of each source is kept, so a stored file
/// can never land outside `folder`.
#[inline]
pub fn store_files(folder: &Path, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(folder)?;

    let mut stored = Vec::with_capacity(files.len());
    for source in files {
        let Some(file_name) = source.file_name() else {
            warn!("Ignoring {} because it has no file name", source.display());
            continue;
        };

        let target = folder.join(file_name);
        fs::copy(source, &target)?;
        debug!("Stored {} as {}", source.display(), target.display());
        stored.push(target);
    }

    Ok(stored)
}

/// Delete every file in `folder`. A missing folder is not an error.
#[inline]
pub fn clear_folder(folder: &Path) -> Result<usize> {
    if !folder.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }

    info!("Removed {} files from {}", removed, folder.display());
    Ok(removed)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
