//! Input resolution: validate a user-supplied path before opening it.
//!
//! pdfium crashes unhelpfully on non-PDF bytes, so we check existence,
//! readability, and the `%PDF` magic up front and return a meaningful error
//! instead.

use crate::error::ConvertError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable, and starts with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<PathBuf, ConvertError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(ConvertError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ConvertError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ConvertError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_not_a_pdf() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fake.pdf");
        std::fs::write(&path, b"PK\x03\x04zipzipzip").unwrap();
        let err = resolve_local(&path).unwrap_err();
        assert!(matches!(err, ConvertError::NotAPdf { .. }));
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.7\n%rest-of-file").unwrap();
        assert_eq!(resolve_local(&path).unwrap(), path);
    }
}
