//! Offline checks of backup files.
//!
//! # Usage
//!
//! ```bash
//! ac-cli backup verify backup-full-20240601-120000.json
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use agencia_check_admin::services::backups::{BackupPayload, PayloadError, SectionCounts};
use agencia_check_admin::services::backups::payload::format_size;

/// Errors that can occur while checking a backup file.
#[derive(Debug, Error)]
pub enum BackupFileError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not a valid backup.
    #[error("Invalid backup file: {0}")]
    Invalid(#[from] PayloadError),
}

/// Parse `path`, check version, checksum and sections, and print a summary.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation.
pub async fn verify(path: &Path) -> Result<SectionCounts, BackupFileError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| BackupFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let payload = BackupPayload::from_slice(&bytes)?;
    let counts = payload.section_counts();

    #[allow(clippy::print_stdout)]
    {
        println!("Backup file OK: {}", path.display());
        println!("  version:    {}", payload.version);
        println!("  kind:       {}", payload.kind.as_str());
        println!("  created at: {}", payload.created_at.to_rfc3339());
        println!(
            "  checksum:   {}",
            payload.checksum.as_deref().unwrap_or("(none)")
        );
        println!("  size:       {}", format_size(u64::try_from(bytes.len()).unwrap_or(u64::MAX)));
        for (section, count) in [
            ("sales", counts.sales),
            ("resellers", counts.resellers),
            ("inventory", counts.inventory),
            ("users", counts.users),
        ] {
            if let Some(count) = count {
                println!("  {section:<11} {count} records");
            }
        }
    }

    tracing::debug!(?counts, "Backup verified");
    Ok(counts)
}
