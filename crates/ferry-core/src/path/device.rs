use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use super::{PathError, PathResult, RemotePath, href_path, normalize_relative, strip_scope};

/// Fixed root every path on the embedded device hangs off.
pub const DEVICE_ROOT: &str = "/share";

/// Path on a single embedded device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DevicePath {
    relative: String,
}

impl DevicePath {
    /// Build a path from a reference relative to [`DEVICE_ROOT`].
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is absolute or escapes the root.
    pub fn new(relative: &str) -> PathResult<Self> {
        Ok(Self {
            relative: normalize_relative(relative)?,
        })
    }

    /// The device root.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            relative: String::new(),
        }
    }
}

impl RemotePath for DevicePath {
    fn scope(&self) -> Cow<'_, str> {
        Cow::Borrowed(DEVICE_ROOT)
    }

    fn relative(&self) -> &str {
        &self.relative
    }

    fn with_relative(&self, relative: String) -> Self {
        Self { relative }
    }

    fn from_href(href: &str) -> PathResult<Self> {
        let path = href_path(href)?;
        let relative =
            strip_scope(&path, DEVICE_ROOT).ok_or_else(|| PathError::UnknownNamespace {
                href: href.to_string(),
            })?;
        Self::new(relative)
    }
}

/// Raw string form: the reference relative to the root, `.` for the root itself.
impl FromStr for DevicePath {
    type Err = PathError;

    fn from_str(raw: &str) -> PathResult<Self> {
        Self::new(raw)
    }
}

impl Display for DevicePath {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        if self.relative.is_empty() {
            formatter.write_str(".")
        } else {
            formatter.write_str(&self.relative)
        }
    }
}
