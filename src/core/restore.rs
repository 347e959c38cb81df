//! Whole-database file replacement.
//!
//! Swapping the live `SQLite` file for an uploaded one is the only operation
//! here that touches the filesystem directly. Everything is synchronous
//! `std::fs`; callers on an async runtime wrap the call in `spawn_blocking`.
//! The current file is kept as a `.bak` sibling until the replacement is
//! verified in place, so a failure at any step can roll back.

use crate::errors::{Error, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// First 16 bytes of every valid `SQLite` database file.
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// How many times to retry renaming a file the OS still holds locked.
const RENAME_ATTEMPTS: u32 = 5;

/// Initial delay between rename attempts; doubles on each retry.
const RENAME_BACKOFF: Duration = Duration::from_millis(100);

/// Checks that `path` starts with the `SQLite` magic header.
///
/// A short or absent file fails the same way as a wrong header, so callers
/// get one error for every kind of non-database upload.
pub fn validate_sqlite_header(path: &Path) -> Result<()> {
    let mut header = [0u8; 16];
    let mut file = fs::File::open(path).map_err(|e| Error::InvalidBackup {
        message: format!("cannot open {}: {e}", path.display()),
    })?;
    file.read_exact(&mut header).map_err(|_| Error::InvalidBackup {
        message: "file is too short to be a SQLite database".to_string(),
    })?;
    if &header == SQLITE_MAGIC {
        Ok(())
    } else {
        Err(Error::InvalidBackup {
            message: "file is not a SQLite database".to_string(),
        })
    }
}

/// Renames `from` to `to`, retrying with exponential backoff.
///
/// A lingering connection can keep the database file locked for a moment
/// after it is dropped; the retry loop is bounded so a genuinely stuck lock
/// surfaces as an error instead of a hang.
fn rename_with_retry(from: &Path, to: &Path) -> Result<()> {
    let mut delay = RENAME_BACKOFF;
    let mut last_error = None;
    for attempt in 1..=RENAME_ATTEMPTS {
        match fs::rename(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(
                    attempt,
                    from = %from.display(),
                    "rename failed, retrying: {e}"
                );
                last_error = Some(e);
                if attempt < RENAME_ATTEMPTS {
                    std::thread::sleep(delay);
                    delay *= 2;
                }
            }
        }
    }
    Err(Error::RestoreFailed {
        message: format!(
            "could not move {} aside after {RENAME_ATTEMPTS} attempts: {}",
            from.display(),
            last_error.map_or_else(String::new, |e| e.to_string()),
        ),
    })
}

fn backup_sibling(path: &Path) -> PathBuf {
    let mut bak = path.as_os_str().to_owned();
    bak.push(".bak");
    PathBuf::from(bak)
}

/// Replaces the live database file at `target` with the file at `upload`.
///
/// The replacement is validated before anything moves, the old file is
/// parked as `<target>.bak` and only deleted once the new file verifies in
/// place. On any failure the `.bak` is moved back so the live file is never
/// lost. The caller must have closed every connection to `target` first.
pub fn replace_database_file(target: &Path, upload: &Path) -> Result<()> {
    validate_sqlite_header(upload)?;

    let bak = backup_sibling(target);
    let had_original = target.exists();
    if had_original {
        rename_with_retry(target, &bak)?;
    }

    let result = install_upload(target, upload);
    match result {
        Ok(()) => {
            if had_original {
                if let Err(e) = fs::remove_file(&bak) {
                    // The restore itself succeeded; a stale .bak is only noise.
                    warn!("could not remove {}: {e}", bak.display());
                }
            }
            info!(target = %target.display(), "database file replaced");
            Ok(())
        }
        Err(e) => {
            if had_original {
                if let Err(undo) = fs::rename(&bak, target) {
                    return Err(Error::RestoreFailed {
                        message: format!(
                            "restore failed ({e}) and the original could not be put back: {undo}"
                        ),
                    });
                }
            }
            Err(e)
        }
    }
}

/// Copies the upload into place and verifies the written header.
fn install_upload(target: &Path, upload: &Path) -> Result<()> {
    fs::copy(upload, target).map_err(|e| Error::RestoreFailed {
        message: format!("could not write {}: {e}", target.display()),
    })?;
    validate_sqlite_header(target).map_err(|_| Error::RestoreFailed {
        message: "replacement file failed verification after writing".to_string(),
    })
}
