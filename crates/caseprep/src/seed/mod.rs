//! Demo dataset seeding: images from a local folder become blobs plus one
//! pending case row each.

use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use rand::Rng;
use walkdir::WalkDir;

use crate::case::MaintenanceCase;
use crate::db::CaseRepository;
use crate::error::SeedError;
use crate::storage::{BlobStore, UploadOutcome};

pub mod dummy;

pub use dummy::DummyCaseGenerator;

/// File extensions treated as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub uploaded: usize,
    pub already_present: usize,
    pub inserted: usize,
    /// File names that produced no case row.
    pub skipped: Vec<String>,
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Lists image files at the top level of `dir`, sorted by path.
pub fn scan_images(dir: &Path) -> Result<Vec<PathBuf>, SeedError> {
    if !dir.is_dir() {
        return Err(SeedError::MissingDataFolder(dir.to_path_buf()));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| SeedError::ScanDataFolder {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_file() && is_image(entry.path()) {
            debug!("Found image: {}", entry.path().display());
            images.push(entry.into_path());
        }
    }

    images.sort();
    Ok(images)
}

enum SeedOutcome {
    Inserted(UploadOutcome),
    Skipped(String),
}

/// Uploads images and inserts their case rows with bounded concurrency.
pub struct Seeder {
    blobs: BlobStore,
    cases: CaseRepository,
    concurrency: usize,
}

impl Seeder {
    pub fn new(blobs: BlobStore, cases: CaseRepository, concurrency: usize) -> Self {
        Self {
            blobs,
            cases,
            concurrency: concurrency.max(1),
        }
    }

    /// Seeds one case per image in `data_dir`. An image that fails to upload
    /// or insert is logged and skipped; the others carry on.
    pub async fn seed<R: Rng>(
        &self,
        data_dir: &Path,
        generator: &mut DummyCaseGenerator<R>,
    ) -> Result<SeedReport, SeedError> {
        let images = scan_images(data_dir)?;
        info!(
            "Seeding {} images from {}",
            images.len(),
            data_dir.display()
        );

        // Random attributes are drawn up front so the generator never has to
        // be shared between tasks.
        let mut planned = Vec::with_capacity(images.len());
        let mut report = SeedReport::default();
        for path in images {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(String::from)
            else {
                warn!("Skipping image with non UTF-8 name: {}", path.display());
                report.skipped.push(path.display().to_string());
                continue;
            };
            match self.blobs.url_for(&file_name) {
                Ok(url) => planned.push((path, generator.case_for(url, file_name))),
                Err(e) => {
                    warn!("Skipping {}: {}", file_name, e);
                    report.skipped.push(file_name);
                }
            }
        }

        let outcomes: Vec<SeedOutcome> = stream::iter(planned)
            .map(|(path, case)| self.seed_one(path, case))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                SeedOutcome::Inserted(UploadOutcome::Uploaded(_)) => {
                    report.uploaded += 1;
                    report.inserted += 1;
                }
                SeedOutcome::Inserted(UploadOutcome::AlreadyPresent(_)) => {
                    report.already_present += 1;
                    report.inserted += 1;
                }
                SeedOutcome::Skipped(name) => report.skipped.push(name),
            }
        }
        report.skipped.sort();

        info!(
            "Seeded {} cases ({} uploaded, {} already present, {} skipped)",
            report.inserted,
            report.uploaded,
            report.already_present,
            report.skipped.len()
        );
        Ok(report)
    }

    async fn seed_one(&self, path: PathBuf, mut case: MaintenanceCase) -> SeedOutcome {
        let upload = match self.blobs.upload_file(&path).await {
            Ok(upload) => upload,
            Err(e) => {
                warn!("Failed to upload {}: {}", case.file_name, e);
                return SeedOutcome::Skipped(case.file_name);
            }
        };
        case.image_url = upload.url().to_string();

        if let Err(e) = self.cases.insert(&case).await {
            warn!("Failed to insert case for {}: {}", case.file_name, e);
            return SeedOutcome::Skipped(case.file_name);
        }

        info!("Processed {}", case.file_name);
        SeedOutcome::Inserted(upload)
    }
}
