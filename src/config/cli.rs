use crate::core::Storage;
use crate::utils::error::{DnsgateError, Result};
use chrono::Utc;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Filesystem storage. Relative paths resolve against `base_path`, absolute
/// paths are used as they are.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.base_path.join(path)
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Write to a sibling temporary file, then rename over `path`.
fn write_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    // Temporary files are created 0600; the DNS server usually runs as another user.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let full_path = self.resolve(path);
        match fs::read(&full_path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DnsgateError::SourceNotFound { path: full_path })
            }
            Err(e) => Err(DnsgateError::IoError(e)),
        }
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);
        write_atomically(&full_path, data).map_err(|source| DnsgateError::OutputWriteError {
            path: full_path.clone(),
            source,
        })
    }

    async fn backup_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        let full_path = self.resolve(path);
        if !full_path.exists() {
            return Ok(None);
        }

        let mut name = full_path.as_os_str().to_os_string();
        name.push(format!(".bak.{}", Utc::now().timestamp()));
        let backup = PathBuf::from(name);

        fs::copy(&full_path, &backup).map_err(|source| DnsgateError::OutputWriteError {
            path: backup.clone(),
            source,
        })?;
        Ok(Some(backup))
    }
}
