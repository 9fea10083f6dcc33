//! Configuration loading and validation.
//!
//! Configuration comes from a single file whose format is picked by
//! extension (YAML, JSON or TOML, each behind its feature flag). The
//! loaded file is validated up front and fingerprinted with a SHA-256
//! [`ConfigVersion`] that `/health` reports. Submodules provide the data
//! model, validation logic, and the async [`FileSource`](file::FileSource).

pub mod file;
pub mod model;
pub mod validation;

use sha2::{Digest, Sha256};

use crate::error::TandemError;
use model::Config;

/// File names probed in the working directory when no `--config` is given.
pub const AUTO_DETECT_CANDIDATES: &[&str] = &["tandem.yaml", "tandem.yml", "tandem.json", "tandem.toml"];

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}

impl ConfigVersion {
    /// First eight hex digits, for display.
    #[must_use]
    pub fn short(&self) -> &str {
        match self {
            Self::Hash(h) => h.get(..8).unwrap_or(h),
        }
    }
}

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, TandemError> {
    let parsed: Result<Config, Box<dyn std::error::Error + Send + Sync>> = match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(Into::into),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(Into::into),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(Into::into),

        other => return Err(TandemError::UnsupportedFormat(other.to_string())),
    };

    parsed.map_err(|source| TandemError::ConfigParse {
        path: path_display.to_string(),
        source,
    })
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
