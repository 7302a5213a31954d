// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connector configuration: where the XML comes from and where the native
//! library lives.
//!
//! # Configuration location
//!
//! | Form | Meaning |
//! |------|---------|
//! | `/path/to/app.xml` | file on disk |
//! | `file:///path/to/app.xml` | file on disk |
//! | `str://"<dds>...</dds>"` | inline XML, quotes optional |
//!
//! # Native library
//!
//! `RTI_CONNECTOR_LIBRARY=/opt/rti/lib/librtiddsconnector.so` overrides the
//! platform default file name, which is otherwise resolved by the system
//! loader search path.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Prefix of an inline configuration.
pub const INLINE_PREFIX: &str = "str://";

/// Optional prefix of a file configuration.
pub const FILE_PREFIX: &str = "file://";

/// Environment variable overriding the native library location.
pub const LIBRARY_ENV: &str = "RTI_CONNECTOR_LIBRARY";

/// Platform default file name of the native library.
#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY_NAME: &str = "rtiddsconnector.dll";
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAME: &str = "librtiddsconnector.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const DEFAULT_LIBRARY_NAME: &str = "librtiddsconnector.so";

/// Parsed configuration location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path to an XML file.
    File(PathBuf),
    /// Full XML text.
    Inline(String),
}

impl ConfigSource {
    /// Classify a configuration location by its prefix.
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(Error::InvalidArgument(
                "configuration location cannot be empty".into(),
            ));
        }

        if let Some(inline) = location.strip_prefix(INLINE_PREFIX) {
            let inline = inline
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(inline);
            return Ok(Self::Inline(inline.to_string()));
        }

        let path = location.strip_prefix(FILE_PREFIX).unwrap_or(location);
        Ok(Self::File(PathBuf::from(path)))
    }

    /// Load the XML text.
    pub fn load(&self) -> Result<String> {
        match self {
            Self::Inline(xml) => Ok(xml.clone()),
            Self::File(path) => std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e))),
        }
    }
}

/// Location of the native library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    pub path: PathBuf,
}

impl LibraryConfig {
    /// Use an explicit library path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `RTI_CONNECTOR_LIBRARY` if set, else [`DEFAULT_LIBRARY_NAME`].
    pub fn from_env() -> Self {
        match std::env::var_os(LIBRARY_ENV) {
            Some(path) if !path.is_empty() => {
                log::debug!("[CONNECTOR] Using native library from {}", LIBRARY_ENV);
                Self {
                    path: PathBuf::from(path),
                }
            }
            _ => Self::new(DEFAULT_LIBRARY_NAME),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_file_paths_are_files() {
        assert_eq!(
            ConfigSource::parse("/usr/local/config.xml").unwrap(),
            ConfigSource::File(PathBuf::from("/usr/local/config.xml"))
        );
        assert_eq!(
            ConfigSource::parse("file:///usr/local/config.xml").unwrap(),
            ConfigSource::File(PathBuf::from("/usr/local/config.xml"))
        );
    }

    #[test]
    fn inline_strips_prefix_and_quotes() {
        assert_eq!(
            ConfigSource::parse(r#"str://"<dds/>""#).unwrap(),
            ConfigSource::Inline("<dds/>".into())
        );
        assert_eq!(
            ConfigSource::parse("str://<dds/>").unwrap(),
            ConfigSource::Inline("<dds/>".into())
        );
    }

    #[test]
    fn empty_location_is_rejected() {
        assert!(matches!(
            ConfigSource::parse("  "),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let source = ConfigSource::parse("invalid/path/to/xml").unwrap();
        assert!(matches!(source.load(), Err(Error::Config(_))));
    }

    #[test]
    fn explicit_library_path() {
        let cfg = LibraryConfig::new("/opt/lib/libfoo.so");
        assert_eq!(cfg.path, PathBuf::from("/opt/lib/libfoo.so"));
    }
}
