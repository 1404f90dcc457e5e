//! Backend-relative resource identifiers.
//!
//! # Design
//! - A path is an immutable `(scope, relative)` pair; every operation returns a new value.
//! - Relative references are normalised on construction and never climb above their scope.
//! - Percent-encoding is a derived view computed on demand.
//! - The two variants differ only in how the scope is resolved: service paths match a
//!   namespace prefix, device paths hang off one fixed root.

mod device;
mod service;

pub use device::{DEVICE_ROOT, DevicePath};
pub use service::{SERVICE_WEBDAV_PREFIX, ServiceNamespace, ServicePath};

use std::borrow::Cow;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use thiserror::Error;

/// Validation failures raised while constructing or deriving paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The reference carried a leading root and is therefore not relative to its scope.
    #[error("path is not relative to its scope")]
    NotRelative {
        /// Offending raw reference.
        path: String,
    },
    /// The reference used `..` segments to climb above its scope.
    #[error("path escapes its scope")]
    EscapesScope {
        /// Offending raw reference.
        path: String,
    },
    /// A single segment was malformed.
    #[error("invalid path segment")]
    InvalidSegment {
        /// Offending segment.
        segment: String,
        /// Static reason describing the problem.
        reason: &'static str,
    },
    /// A server-returned href did not start with any known scope prefix.
    #[error("no namespace matches path")]
    UnknownNamespace {
        /// Href that could not be resolved.
        href: String,
    },
    /// The operation needs a named resource but received the scope root.
    #[error("operation requires a named resource")]
    ScopeRoot {
        /// Absolute form of the root that was rejected.
        path: String,
    },
}

/// Convenience alias for path construction results.
pub type PathResult<T> = Result<T, PathError>;

/// Shared contract of the service and device path variants.
pub trait RemotePath:
    Clone + Debug + Display + Eq + Hash + FromStr<Err = PathError> + Send + Sync + 'static
{
    /// Absolute prefix the relative reference is resolved against.
    fn scope(&self) -> Cow<'_, str>;

    /// Normalised reference below the scope; empty for the scope root.
    fn relative(&self) -> &str;

    /// Build a value in the same scope from an already-normalised reference.
    fn with_relative(&self, relative: String) -> Self;

    /// Parse a server-returned href (absolute path or full URL, possibly percent-encoded).
    ///
    /// # Errors
    ///
    /// Returns [`PathError::UnknownNamespace`] when the href matches no scope of this variant.
    fn from_href(href: &str) -> PathResult<Self>;

    /// Scope joined with the relative reference.
    fn absolute(&self) -> String {
        let scope = self.scope();
        if self.relative().is_empty() {
            scope.into_owned()
        } else {
            format!("{}/{}", scope.trim_end_matches('/'), self.relative())
        }
    }

    /// Append one or more segments.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is absolute or climbs above the scope.
    fn join(&self, segment: &str) -> PathResult<Self> {
        if segment.starts_with('/') {
            return Err(PathError::NotRelative {
                path: segment.to_string(),
            });
        }
        let combined = if self.relative().is_empty() {
            segment.to_string()
        } else {
            format!("{}/{segment}", self.relative())
        };
        Ok(self.with_relative(normalize_relative(&combined)?))
    }

    /// Containing folder; the scope root is its own parent.
    #[must_use]
    fn parent(&self) -> Self {
        let parent = self
            .relative()
            .rsplit_once('/')
            .map_or_else(String::new, |(head, _)| head.to_string());
        self.with_relative(parent)
    }

    /// Final segment; empty for the scope root.
    fn name(&self) -> &str {
        let relative = self.relative();
        relative.rsplit_once('/').map_or(relative, |(_, name)| name)
    }

    /// Whether this value points at the scope itself.
    fn is_root(&self) -> bool {
        self.relative().is_empty()
    }

    /// Percent-encoded absolute form, segment by segment.
    fn encoded(&self) -> String {
        encode_absolute(&self.absolute())
    }
}

/// Normalise a relative reference: collapse empty and `.` segments, resolve `..` without
/// leaving the scope, and reject leading roots.
///
/// # Errors
///
/// Returns an error when the reference is absolute, escapes the scope, or holds a NUL byte.
pub fn normalize_relative(raw: &str) -> PathResult<String> {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(PathError::NotRelative {
            path: raw.to_string(),
        });
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::EscapesScope {
                        path: raw.to_string(),
                    });
                }
            }
            other if other.contains('\0') => {
                return Err(PathError::InvalidSegment {
                    segment: other.to_string(),
                    reason: "segment contains a NUL byte",
                });
            }
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}

/// Percent-encode each segment of an absolute path, keeping the separators.
#[must_use]
pub fn encode_absolute(absolute: &str) -> String {
    absolute
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reduce an href to its decoded path component: drop scheme, authority, query and fragment,
/// then percent-decode.
pub(crate) fn href_path(href: &str) -> PathResult<String> {
    let without_origin = match href.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |index| &rest[index..]),
        None => href,
    };
    let path = without_origin
        .split(['?', '#'])
        .next()
        .unwrap_or(without_origin);
    urlencoding::decode(path)
        .map(Cow::into_owned)
        .map_err(|_| PathError::InvalidSegment {
            segment: path.to_string(),
            reason: "invalid percent-encoding",
        })
}

/// Strip `prefix` from `path` when it matches on a segment boundary.
pub(crate) fn strip_scope<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_redundant_segments() -> Result<(), PathError> {
        assert_eq!(normalize_relative("a//b/./c/")?, "a/b/c");
        assert_eq!(normalize_relative("a/b/../c")?, "a/c");
        assert_eq!(normalize_relative("")?, "");
        Ok(())
    }

    #[test]
    fn normalize_rejects_absolute_and_escaping_references() {
        assert!(matches!(
            normalize_relative("/etc/passwd"),
            Err(PathError::NotRelative { .. })
        ));
        assert!(matches!(
            normalize_relative("a/../../b"),
            Err(PathError::EscapesScope { .. })
        ));
        assert!(matches!(
            normalize_relative("a/b\0c"),
            Err(PathError::InvalidSegment { .. })
        ));
    }

    #[test]
    fn href_path_drops_origin_and_decodes() -> Result<(), PathError> {
        assert_eq!(
            href_path("https://files.example.com/webdav/Users/a%20b?x=1")?,
            "/webdav/Users/a b"
        );
        assert_eq!(href_path("/share/docs#frag")?, "/share/docs");
        assert_eq!(href_path("https://host")?, "/");
        Ok(())
    }

    #[test]
    fn strip_scope_respects_segment_boundaries() {
        assert_eq!(strip_scope("/share/docs", "/share"), Some("docs"));
        assert_eq!(strip_scope("/share", "/share"), Some(""));
        assert_eq!(strip_scope("/shared/docs", "/share"), None);
    }

    #[test]
    fn encode_absolute_keeps_separators() {
        assert_eq!(encode_absolute("/share/a b/c#d"), "/share/a%20b/c%23d");
    }
}
