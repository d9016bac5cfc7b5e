use crate::error::{BackupError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tar::{Archive, Builder};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Packs the contents of `source_dir` into a gzipped tarball. Entries are
/// stored relative to `source_dir`; an existing tarball is replaced.
pub fn compress_dir_to_tar_gz(source_dir: &Path, dest_path: &Path) -> Result<()> {
    if !source_dir.is_dir() {
        return Err(BackupError::Archive(format!(
            "source for archival is not a directory: {}",
            source_dir.display()
        )));
    }
    info!("Compressing {} to {}", source_dir.display(), dest_path.display());

    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if dest_path.exists() {
        std::fs::remove_file(dest_path)?;
    }

    let dest_file = File::create(dest_path)?;
    let encoder = GzEncoder::new(BufWriter::new(dest_file), Compression::default());
    let mut tar = Builder::new(encoder);

    for entry in WalkDir::new(source_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| BackupError::Archive(format!("failed to walk {}: {}", source_dir.display(), e)))?;
        let name = entry.file_name();
        let appended = if entry.file_type().is_dir() {
            tar.append_dir_all(name, entry.path())
        } else {
            tar.append_path_with_name(entry.path(), name)
        };
        appended.map_err(|e| BackupError::Archive(format!("failed to add {}: {}", entry.path().display(), e)))?;
    }

    let encoder = tar
        .into_inner()
        .map_err(|e| BackupError::Archive(format!("failed to finish tar stream: {}", e)))?;
    let mut writer = encoder
        .finish()
        .map_err(|e| BackupError::Archive(format!("failed to finish gzip stream: {}", e)))?;
    writer.flush()?;

    let dest_size = std::fs::metadata(dest_path)?.len();
    debug!("Compression complete: {} bytes", dest_size);
    Ok(())
}

/// Unpacks a gzipped tarball into `dest_dir`, replacing whatever was there.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    if !archive_path.is_file() {
        return Err(BackupError::Archive(format!(
            "archive for extraction is not a file: {}",
            archive_path.display()
        )));
    }
    info!("Extracting {} to {}", archive_path.display(), dest_dir.display());

    if dest_dir.exists() {
        std::fs::remove_dir_all(dest_dir)?;
    }
    std::fs::create_dir_all(dest_dir)?;

    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.unpack(dest_dir).map_err(|e| {
        BackupError::Archive(format!(
            "failed to unpack {} to {}: {}",
            archive_path.display(),
            dest_dir.display(),
            e
        ))
    })?;

    Ok(())
}

pub fn calculate_sha256(file_path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
