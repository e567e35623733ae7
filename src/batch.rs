use log::{error, info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::config::Settings;
use crate::error::{Result, SealError};
use crate::files;
use crate::overlay::{self, StampGeometry};
use crate::stamp::{self, StampOutcome};

pub const SIGNED_SUFFIX: &str = "_signed.pdf";
pub const OVERLAY_PREFIX: &str = "temp_stamp_";

/// One input file's worth of work.
#[derive(Debug, Clone, PartialEq)]
pub struct StampJob {
    pub source_path: PathBuf,
    /// Folder and file name prefix of the transient single-page overlay.
    /// The file itself gets a fresh name and is removed when the job ends.
    pub overlay_dir: PathBuf,
    pub overlay_prefix: String,
    pub output_path: PathBuf,
    pub output_name: String,
    pub target_page: usize,
    pub stamp_image_path: PathBuf,
    pub stamp_text: Option<String>,
}

impl StampJob {
    pub fn run(&self, geometry: &StampGeometry) -> Result<StampOutcome> {
        let overlay = tempfile::Builder::new()
            .prefix(&self.overlay_prefix)
            .suffix(".pdf")
            .tempfile_in(&self.overlay_dir)?;

        let outcome = self.stamp_with(overlay.path(), geometry);
        discard_overlay(overlay);
        outcome
    }

    fn stamp_with(&self, overlay_path: &Path, geometry: &StampGeometry) -> Result<StampOutcome> {
        overlay::create_overlay(
            &self.stamp_image_path,
            overlay_path,
            geometry,
            self.stamp_text.as_deref(),
        )?;
        stamp::apply_stamp(&self.source_path, overlay_path, &self.output_path, self.target_page)
    }
}

fn discard_overlay(overlay: NamedTempFile) {
    let path = overlay.path().to_path_buf();
    if let Err(e) = overlay.close() {
        warn!("Could not remove temporary overlay {}: {}", path.display(), e);
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    Signed {
        source: PathBuf,
        output_name: String,
        page_count: usize,
        stamped: bool,
    },
    Failed {
        source: PathBuf,
        error: SealError,
    },
}

/// Why a batch stopped before touching any input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchHalt {
    StampImageMissing(PathBuf),
    OutputDirectory { path: PathBuf, reason: String },
    NoInputFiles(PathBuf),
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub halt: Option<BatchHalt>,
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    fn halted(halt: BatchHalt) -> Self {
        Self { halt: Some(halt), outcomes: Vec::new() }
    }

    /// Output file names of the jobs that finished, in processing order.
    pub fn signed_names(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                JobOutcome::Signed { output_name, .. } => Some(output_name.clone()),
                JobOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &SealError)> {
        self.outcomes.iter().filter_map(|o| match o {
            JobOutcome::Failed { source, error } => Some((source.as_path(), error)),
            JobOutcome::Signed { .. } => None,
        })
    }
}

/// Stamps every invoice in `input_dir` and returns the names of the signed
/// copies written to `output_dir`. Failures are logged, not returned.
pub fn process_batch(
    input_dir: &Path,
    output_dir: &Path,
    stamp_image_path: &Path,
    company_text: &str,
    geometry: &StampGeometry,
) -> Vec<String> {
    let settings = Settings {
        input_directory: input_dir.to_path_buf(),
        output_directory: output_dir.to_path_buf(),
        stamp_image_path: stamp_image_path.to_path_buf(),
        company_name: company_text.to_string(),
        ..Settings::default()
    };
    run_batch(&settings, geometry).signed_names()
}

pub fn run_batch(settings: &Settings, geometry: &StampGeometry) -> BatchReport {
    let output_dir = &settings.output_directory;
    if !output_dir.is_dir() {
        if let Err(e) = fs::create_dir_all(output_dir) {
            error!("Cannot create output folder {}: {}", output_dir.display(), e);
            return BatchReport::halted(BatchHalt::OutputDirectory {
                path: output_dir.clone(),
                reason: e.to_string(),
            });
        }
        info!("Created output folder: {}", output_dir.display());
    }

    if !settings.stamp_image_path.exists() {
        error!("Stamp image not found: {}", settings.stamp_image_path.display());
        return BatchReport::halted(BatchHalt::StampImageMissing(settings.stamp_image_path.clone()));
    }

    files::log_directory(&settings.input_directory);

    let inputs = files::list_candidate_files(&settings.input_directory);
    if inputs.is_empty() {
        error!("No PDF files found in {}", settings.input_directory.display());
        info!("Check that:");
        info!("  1. the folder contains PDF files");
        info!("  2. the files have a .pdf extension");
        info!("  3. the path is correct");
        return BatchReport::halted(BatchHalt::NoInputFiles(settings.input_directory.clone()));
    }

    info!("Found {} PDF file(s) to process:", inputs.len());
    for input in &inputs {
        info!("  - {}", display_name(input));
    }

    let jobs = plan_jobs(settings, inputs);
    let mut report = BatchReport::default();
    for job in jobs {
        info!("Processing: {}", display_name(&job.source_path));
        let outcome = match job.run(geometry) {
            Ok(result) => {
                info!("Signed: {}", job.output_name);
                JobOutcome::Signed {
                    source: job.source_path,
                    output_name: job.output_name,
                    page_count: result.page_count,
                    stamped: result.stamped_page.is_some(),
                }
            }
            Err(e) => {
                error!("Failed to process {}: {}", job.source_path.display(), e);
                JobOutcome::Failed { source: job.source_path, error: e }
            }
        };
        report.outcomes.push(outcome);
    }
    report
}

/// Builds one job per input. Output names are unique within the batch,
/// compared case-insensitively, so `A.pdf` and `a.PDF` never share a
/// target. A generated name never takes the natural name of another input.
pub fn plan_jobs(settings: &Settings, inputs: Vec<PathBuf>) -> Vec<StampJob> {
    let reserved: HashSet<String> = inputs.iter().map(|p| file_stem(p).to_lowercase()).collect();
    let mut taken = HashSet::new();
    let stamp_text = settings.stamp_text().map(str::to_string);

    inputs
        .into_iter()
        .map(|source_path| {
            let stem = unique_stem(&source_path, &reserved, &mut taken);
            let output_name = format!("{stem}{SIGNED_SUFFIX}");
            StampJob {
                overlay_dir: settings.output_directory.clone(),
                overlay_prefix: format!("{OVERLAY_PREFIX}{stem}_"),
                output_path: settings.output_directory.join(&output_name),
                output_name,
                source_path,
                target_page: settings.target_page,
                stamp_image_path: settings.stamp_image_path.clone(),
                stamp_text: stamp_text.clone(),
            }
        })
        .collect()
}

fn unique_stem(source: &Path, reserved: &HashSet<String>, taken: &mut HashSet<String>) -> String {
    let base = file_stem(source);
    if taken.insert(base.to_lowercase()) {
        return base;
    }

    let mut n = 2;
    loop {
        let stem = format!("{base}_{n}");
        let key = stem.to_lowercase();
        if !reserved.contains(&key) && taken.insert(key) {
            warn!(
                "{} clashes with an earlier file name; writing {stem}{SIGNED_SUFFIX} instead",
                display_name(source)
            );
            return stem;
        }
        n += 1;
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
