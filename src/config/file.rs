//! Async file-based config source with SHA-256 fingerprinting.
//!
//! [`FileSource`] reads the file via Tokio, deserializes it according to
//! its extension, validates the result, and hashes the raw bytes into a
//! [`ConfigVersion`].

use std::path::{Path, PathBuf};

use super::model::Config;
use super::validation::validate;
use super::{parse_config_str, sha256_hex, ConfigVersion, AUTO_DETECT_CANDIDATES};
use crate::error::TandemError;

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Use `explicit` if given, otherwise the first auto-detect candidate
    /// present in the working directory.
    pub async fn resolve(explicit: Option<&Path>) -> Result<Self, TandemError> {
        if let Some(path) = explicit {
            return Ok(Self::new(path.to_path_buf()));
        }

        for name in AUTO_DETECT_CANDIDATES {
            let path = PathBuf::from(name);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tracing::info!(path = %path.display(), "auto-detected config file");
                return Ok(Self::new(path));
            }
        }

        Err(TandemError::NoConfigSource {
            hint: "Provide --config <file> or create ./tandem.yaml.\n  \
                   Run 'tandem init' to create a config file."
                .into(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short label for the format, as reported by `/health`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.extension()
    }

    fn extension(&self) -> &str {
        self.path.extension().and_then(|e| e.to_str()).unwrap_or("")
    }

    async fn read_content(&self) -> Result<String, TandemError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TandemError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                TandemError::Io(e)
            }
        })
    }

    pub async fn load(&self) -> Result<(Config, ConfigVersion), TandemError> {
        let content = self.read_content().await?;
        let config = parse_config_str(self.extension(), &content, &self.path.display().to_string())?;

        if let Err(errors) = validate(&config) {
            return Err(TandemError::ConfigValidation { errors });
        }

        let hash = sha256_hex(content.as_bytes());
        Ok((config, ConfigVersion::Hash(hash)))
    }
}
