//! Environment preparation before the timed test run.
//!
//! Two steps happen here: moving into the application directory, which every
//! later relative path depends on, and a synthetic disk write that brings the
//! page cache and disk queue into a comparable state across runs so the
//! measured test duration is less noisy.

use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use crate::config::PrimeConfig;

/// Errors raised while preparing the environment.
#[derive(Debug, thiserror::Error)]
pub enum PrimerError {
    #[error("Failed to change directory to {path}: {source}")]
    ChangeDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Disk priming failed: {0}")]
    Prime(#[from] std::io::Error),
}

/// Changes the process working directory to `app_path`.
///
/// An empty path leaves the working directory untouched.
///
/// # Errors
///
/// Returns [`PrimerError::ChangeDir`] if the directory does not exist or
/// cannot be entered.
pub fn enter_application_dir(app_path: &Path) -> Result<(), PrimerError> {
    if app_path.as_os_str().is_empty() {
        debug!("No application path configured, staying in current directory");
        return Ok(());
    }

    std::env::set_current_dir(app_path).map_err(|source| PrimerError::ChangeDir {
        path: app_path.display().to_string(),
        source,
    })?;

    info!("Working directory: {}", app_path.display());
    Ok(())
}

/// Writes `blocks × block_size` zero bytes to a temporary file and flushes
/// it to disk.
///
/// The file lives in the system temp directory and is removed when this
/// function returns. Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`PrimerError::Prime`] if the file cannot be created, written or
/// synced. Callers treat this as non-fatal.
pub fn prime_disk(config: &PrimeConfig) -> Result<u64, PrimerError> {
    prime_disk_in(&std::env::temp_dir(), config)
}

/// Same as [`prime_disk`], writing into `dir`.
pub fn prime_disk_in(dir: &Path, config: &PrimeConfig) -> Result<u64, PrimerError> {
    let mut file = tempfile::Builder::new()
        .prefix("flaky-input")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    let block = vec![0u8; config.block_size];
    for _ in 0..config.blocks {
        file.write_all(&block)?;
    }
    file.flush()?;
    file.as_file().sync_all()?;

    let written = config.total_bytes();
    debug!(
        "Primed disk with {} bytes at {}",
        written,
        file.path().display()
    );

    file.close()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prime_disk_writes_and_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = PrimeConfig {
            blocks: 8,
            block_size: 4096,
        };

        let written = prime_disk_in(temp_dir.path(), &config).unwrap();

        assert_eq!(written, 8 * 4096);
        let leftovers = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_prime_disk_zero_blocks() {
        let temp_dir = TempDir::new().unwrap();
        let config = PrimeConfig {
            blocks: 0,
            block_size: 4096,
        };

        assert_eq!(prime_disk_in(temp_dir.path(), &config).unwrap(), 0);
    }

    #[test]
    fn test_prime_disk_missing_dir_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("does-not-exist");

        let err = prime_disk_in(&missing, &PrimeConfig::default()).unwrap_err();
        assert!(matches!(err, PrimerError::Prime(_)));
    }

    #[test]
    fn test_enter_empty_path_is_noop() {
        let before = std::env::current_dir().unwrap();
        enter_application_dir(Path::new("")).unwrap();
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn test_enter_missing_dir_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("no-such-app");

        let err = enter_application_dir(&missing).unwrap_err();
        assert!(matches!(err, PrimerError::ChangeDir { .. }));
        assert!(err.to_string().contains("no-such-app"));
    }
}
