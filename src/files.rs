use log::{error, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const PDF_EXTENSION: &str = "pdf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File { size: u64 },
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub kind: EntryKind,
}

/// Lists the PDF files directly inside `dir`, sorted by file name.
///
/// Files whose extension is exactly `pdf` win. Only when there are none does
/// the scan accept any casing (`.PDF`, `.Pdf`, ...). A missing or unreadable
/// directory is logged and yields an empty list.
pub fn list_candidate_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        error!("Input folder does not exist: {}", dir.display());
        return Vec::new();
    }

    match scan(dir) {
        Ok(files) => files,
        Err(e) => {
            error!("Could not read folder {}: {}", dir.display(), e);
            Vec::new()
        }
    }
}

fn scan(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        // Follows symlinks, so a linked invoice counts as a file.
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let exact: Vec<PathBuf> = files
        .iter()
        .filter(|p| p.extension().and_then(|ext| ext.to_str()) == Some(PDF_EXTENSION))
        .cloned()
        .collect();
    if !exact.is_empty() {
        return Ok(exact);
    }

    Ok(files.into_iter().filter(|p| has_pdf_suffix(p)).collect())
}

fn has_pdf_suffix(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_lowercase().ends_with(".pdf"))
}

/// Reads every entry of `dir` for diagnostics. Never fails; problems are
/// logged and produce an empty listing.
pub fn describe_directory(dir: &Path) -> Vec<DirEntryInfo> {
    if !dir.exists() {
        warn!("Folder does not exist: {}", dir.display());
        return Vec::new();
    }

    let read = || -> io::Result<Vec<DirEntryInfo>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let kind = if metadata.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File { size: metadata.len() }
            };
            entries.push(DirEntryInfo { name: entry.file_name().to_string_lossy().into_owned(), kind });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    };

    match read() {
        Ok(entries) => entries,
        Err(e) => {
            error!("Cannot list contents of {}: {}", dir.display(), e);
            Vec::new()
        }
    }
}

pub fn log_directory(dir: &Path) {
    let entries = describe_directory(dir);
    info!("Contents of '{}':", dir.display());
    if entries.is_empty() {
        info!("  (empty)");
        return;
    }
    for entry in &entries {
        match entry.kind {
            EntryKind::File { size } => info!("  file {} ({} bytes)", entry.name, size),
            EntryKind::Directory => info!("  dir  {}", entry.name),
        }
    }
}

/// Creates each folder that does not exist yet. Returns the ones created.
pub fn ensure_folders(folders: &[&Path]) -> io::Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for folder in folders {
        if folder.is_dir() {
            info!("Folder already exists: {}", folder.display());
        } else {
            fs::create_dir_all(folder)?;
            info!("Created folder: {}", folder.display());
            created.push(folder.to_path_buf());
        }
    }
    Ok(created)
}
