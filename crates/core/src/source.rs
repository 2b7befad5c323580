// Data source model and URI resolution

use crate::error::{PlayerError, Result};
use std::path::Path;

/// Raw descriptor number handed over by the host
pub type RawDescriptor = i32;

/// Length used when the caller wants "the rest of the file".
/// Intentionally less than `i64::MAX`.
pub const WHOLE_FILE_LENGTH: i64 = 0x7ff_ffff_ffff_ffff;

/// A byte-addressable media source the engine can open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Local file path or network URL
    Path(String),
    /// Open descriptor plus the byte range to play
    Fd {
        fd: RawDescriptor,
        offset: i64,
        length: i64,
    },
    /// URI passed through for the engine to interpret
    Uri(String),
}

impl DataSource {
    pub fn fd(fd: RawDescriptor) -> Self {
        DataSource::Fd {
            fd,
            offset: 0,
            length: WHOLE_FILE_LENGTH,
        }
    }

    /// Check what can be checked before the engine is engaged.
    pub fn validate(&self) -> Result<()> {
        match self {
            DataSource::Path(path) => {
                if path.is_empty() {
                    return Err(PlayerError::SourceUnavailable("empty path".into()));
                }
                if is_local_path(path) && !Path::new(path).exists() {
                    return Err(PlayerError::SourceUnavailable(format!(
                        "no such file: {path}"
                    )));
                }
                Ok(())
            }
            DataSource::Fd { fd, offset, length } => {
                if *fd < 0 {
                    return Err(PlayerError::SourceUnavailable(format!(
                        "invalid descriptor {fd}"
                    )));
                }
                if *offset < 0 || *length < 0 {
                    return Err(PlayerError::SourceUnavailable(format!(
                        "invalid range offset={offset} length={length}"
                    )));
                }
                Ok(())
            }
            DataSource::Uri(uri) => {
                if uri.is_empty() {
                    Err(PlayerError::SourceUnavailable("empty uri".into()))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Descriptor returned by a content lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub fd: RawDescriptor,
    pub start_offset: i64,
    /// Negative when the provider returns the full file
    pub declared_length: i64,
}

/// Resolves non-file URIs (content providers and the like) to descriptors.
pub trait ContentResolver {
    fn open_asset(&self, uri: &str) -> std::io::Result<AssetDescriptor>;
}

/// Split the scheme off a URI, if it has one.
pub fn uri_scheme(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        Some(scheme)
    } else {
        None
    }
}

/// Map a URI to a data source.
///
/// No scheme or `file:` becomes a path. Anything else goes through the
/// resolver; when the lookup fails the URI string itself is handed to the
/// engine.
pub fn resolve_uri(resolver: &dyn ContentResolver, uri: &str) -> DataSource {
    match uri_scheme(uri) {
        None => return DataSource::Path(uri.to_string()),
        Some(scheme) if scheme.eq_ignore_ascii_case("file") => {
            return DataSource::Path(file_uri_path(uri).to_string());
        }
        Some(_) => {}
    }

    match resolver.open_asset(uri) {
        Ok(asset) if asset.declared_length < 0 => DataSource::fd(asset.fd),
        Ok(asset) => DataSource::Fd {
            fd: asset.fd,
            offset: asset.start_offset,
            length: asset.declared_length,
        },
        Err(err) => {
            log::debug!("content lookup for {} failed ({}), passing uri through", uri, err);
            DataSource::Uri(uri.to_string())
        }
    }
}

fn file_uri_path(uri: &str) -> &str {
    let rest = &uri["file:".len()..];
    // file:///a/b and file:/a/b both name /a/b
    rest.strip_prefix("//").unwrap_or(rest)
}

fn is_local_path(path: &str) -> bool {
    uri_scheme(path).is_none()
}
