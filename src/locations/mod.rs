// Campus locations
// Named map points loaded from CSV uploads

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{CampusError, Result};

/// Name of the file holding accepted locations inside the locations folder
pub const LOCATIONS_FILE: &str = "locations.csv";

/// A point of interest shown on the campus map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub details: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
struct LocationRow {
    name: String,
    #[serde(default)]
    details: Option<String>,
    lat: f64,
    lon: f64,
}

/// Counts from one ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocationIngestReport {
    pub files_uploaded: usize,
    pub locations_added: usize,
    pub rows_skipped: usize,
}

/// Append-only set of locations keyed by case-insensitive name
#[derive(Debug, Default)]
pub struct LocationStore {
    locations: RwLock<Vec<Location>>,
}

impl LocationStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add locations from CSV files with `name, details, lat, lon` columns.
    ///
    /// Every file counts as uploaded; only `.csv` files are parsed. Names
    /// already present, in any case, are skipped. Rows that do not parse are
    /// logged and skipped.
    #[inline]
    pub async fn ingest_files(&self, files: &[PathBuf]) -> Result<LocationIngestReport> {
        let mut report = LocationIngestReport {
            files_uploaded: files.len(),
            ..LocationIngestReport::default()
        };

        let mut parsed = Vec::new();
        for path in files {
            if !is_csv(path) {
                debug!("Not a CSV file, ignoring {}", path.display());
                continue;
            }

            let contents = fs::read(path)?;
            let (rows, skipped) = parse_csv(&contents, path)?;
            parsed.extend(rows);
            report.rows_skipped += skipped;
        }

        let mut locations = self.locations.write().await;
        let mut known: HashSet<String> = locations
            .iter()
            .map(|location| location.name.to_lowercase())
            .collect();

        for location in parsed {
            if known.insert(location.name.to_lowercase()) {
                locations.push(location);
                report.locations_added += 1;
            } else {
                debug!("Location {} already known, skipping", location.name);
            }
        }

        info!(
            "Added {} locations from {} files",
            report.locations_added, report.files_uploaded
        );
        Ok(report)
    }

    /// Load the saved location file from `folder`. A missing folder or file
    /// adds nothing.
    #[inline]
    pub async fn load_folder(&self, folder: &Path) -> Result<LocationIngestReport> {
        let saved = folder.join(LOCATIONS_FILE);
        if !saved.is_file() {
            return Ok(LocationIngestReport::default());
        }

        self.ingest_files(&[saved]).await
    }

    /// Write every accepted location, in insertion order, to `folder`.
    ///
    /// The file is replaced atomically, so rows rejected as duplicates never
    /// reach disk and the first accepted entry for a name survives reloads.
    #[inline]
    pub async fn save(&self, folder: &Path) -> Result<PathBuf> {
        fs::create_dir_all(folder)?;
        let target = folder.join(LOCATIONS_FILE);
        let staging = folder.join(format!("{LOCATIONS_FILE}.tmp"));

        let locations = self.locations.read().await;
        let mut writer = csv::Writer::from_path(&staging)
            .map_err(|e| CampusError::Location(format!("{}: {}", staging.display(), e)))?;
        for location in locations.iter() {
            writer
                .serialize(location)
                .map_err(|e| CampusError::Location(format!("{}: {}", staging.display(), e)))?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&staging, &target)?;
        debug!("Saved {} locations to {}", locations.len(), target.display());
        Ok(target)
    }

    /// All locations in insertion order
    #[inline]
    pub async fn snapshot(&self) -> Vec<Location> {
        self.locations.read().await.clone()
    }

    #[inline]
    pub async fn len(&self) -> usize {
        self.locations.read().await.len()
    }

    #[inline]
    pub async fn is_empty(&self) -> bool {
        self.locations.read().await.is_empty()
    }

    #[inline]
    pub async fn reset(&self) {
        self.locations.write().await.clear();
        info!("All locations removed");
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Parse CSV bytes into locations, returning them with the number of rejected rows
fn parse_csv(contents: &[u8], source: &Path) -> Result<(Vec<Location>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(contents);

    let headers = reader
        .headers()
        .map_err(|e| CampusError::Location(format!("{}: {}", source.display(), e)))?
        .clone();

    let mut locations = Vec::new();
    let mut skipped = 0;

    for (line, record) in reader.records().enumerate() {
        let row = record.and_then(|record| record.deserialize::<LocationRow>(Some(&headers)));

        match row {
            Ok(row) if !row.name.is_empty() && row.lat.is_finite() && row.lon.is_finite() => {
                locations.push(Location {
                    name: row.name,
                    details: row.details.unwrap_or_default(),
                    lat: row.lat,
                    lon: row.lon,
                });
            }
            Ok(_) => {
                warn!(
                    "Skipping row {} of {}: missing name or coordinates",
                    line + 2,
                    source.display()
                );
                skipped += 1;
            }
            Err(e) => {
                warn!("Skipping invalid row {} of {}: {}", line + 2, source.display(), e);
                skipped += 1;
            }
        }
    }

    Ok((locations, skipped))
}
