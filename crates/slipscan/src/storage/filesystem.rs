use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};

use crate::error::StorageError;

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Keeps uploaded documents on the local filesystem under
/// `<upload_directory>/<yyyy>/<mm>/`.
pub struct FileStorage {
    upload_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(upload_directory: P) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
        }
    }

    pub fn upload_directory(&self) -> &Path {
        &self.upload_directory
    }

    /// Writes the bytes under a sanitized version of `original_name` and
    /// returns the final path. Never overwrites an existing file.
    pub fn store_upload(&self, original_name: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        if content.is_empty() {
            return Err(StorageError::EmptyUpload(original_name.to_string()));
        }

        let now = Utc::now();
        let dir_path = self
            .upload_directory
            .join(format!("{:04}", now.year()))
            .join(format!("{:02}", now.month()));
        self.ensure_directory(&dir_path)?;

        self.store_with_atomic_creation(&dir_path, &sanitize_file_name(original_name), content)
    }

    /// Best-effort removal of a stored upload.
    pub fn remove(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Failed to remove stored upload {}: {}", path.display(), e);
        }
    }

    fn store_with_atomic_creation(
        &self,
        dir_path: &Path,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let (base, ext) = match filename.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
            _ => (filename, None),
        };

        for counter in 1..=MAX_NAME_ATTEMPTS {
            let try_filename = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };

            let try_path = dir_path.join(&try_filename);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut file) => {
                    if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
                        drop(file);
                        let _ = std::fs::remove_file(&try_path);
                        return Err(StorageError::WriteFile {
                            path: try_path,
                            source: e,
                        });
                    }
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::FileExists(dir_path.join(filename)))
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// Reduces a client-supplied name to a safe single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}
